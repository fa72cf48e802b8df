//! Client-side vote encryption.
//!
//! Every call generates a fresh x25519 keypair, agrees a shared secret with
//! the compute network's published key, and encrypts plaintext integers
//! under a random 16-byte nonce with a [`VoteCipher`] keyed from that secret.
//! The network recomputes the same shared secret from the ephemeral public
//! key sent alongside the ciphertexts.
//!
//! The MXE decrypts with the Rescue cipher over the curve25519 base field.
//! [`Sha512CtrCipher`] is a different construction: its ciphertexts are only
//! readable by a peer running the same code, not by a deployed MXE. Swap
//! [`DefaultCipher`] for a Rescue implementation to vote against a live
//! network.

use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::{Zeroize, Zeroizing};

use crate::errors::VoteError;

/// Fixed number of tally slots in the on-chain layout.
pub const MAX_OPTIONS: usize = 8;

const KEY_DOMAIN: &[u8] = b"cipherballot/vote-cipher/key/v1";
const STREAM_DOMAIN: &[u8] = b"cipherballot/vote-cipher/stream/v1";

/// The x25519 key published by the compute network once its keys are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkPublicKey([u8; 32]);

impl NetworkPublicKey {
    /// An all-zero key is what an unfinalized network account holds.
    pub fn new(bytes: [u8; 32]) -> Result<Self, VoteError> {
        if bytes.iter().all(|b| *b == 0) {
            return Err(VoteError::NetworkKeyUnavailable(
                "network public key is not finalized".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedVote {
    pub ephemeral_public_key: [u8; 32],
    pub nonce: u128,
    pub ciphertext: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedTallyInit {
    pub ephemeral_public_key: [u8; 32],
    pub nonce: u128,
    pub ciphertexts: [[u8; 32]; MAX_OPTIONS],
}

/// Symmetric encryption of plaintext integers keyed from an x25519 shared
/// secret.
pub trait VoteCipher: Sized {
    /// Whether a deployed MXE can decrypt this cipher's output.
    const MXE_COMPATIBLE: bool;

    fn from_shared_secret(shared_secret: &[u8; 32]) -> Self;

    /// One 32-byte ciphertext per plaintext, in order.
    fn encrypt(&self, plaintext: &[u128], nonce: &[u8; 16]) -> Vec<[u8; 32]>;

    /// Inverse of `encrypt`. `None` when any ciphertext does not decode.
    fn decrypt(&self, ciphertexts: &[[u8; 32]], nonce: &[u8; 16]) -> Option<Vec<u128>>;
}

/// The cipher the client encrypts with.
pub type DefaultCipher = Sha512CtrCipher;

/// SHA-256 key derivation and a SHA-512 scalar keystream in counter mode.
///
/// Not wire-compatible with the MXE's Rescue cipher.
pub struct Sha512CtrCipher {
    key: Zeroizing<[u8; 32]>,
}

impl Sha512CtrCipher {
    fn keystream(&self, nonce: &[u8; 16], counter: u64) -> Scalar {
        let mut hasher = Sha512::new();
        hasher.update(STREAM_DOMAIN);
        hasher.update(self.key.as_ref());
        hasher.update(nonce);
        hasher.update(counter.to_le_bytes());
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&hasher.finalize());
        let scalar = Scalar::from_bytes_mod_order_wide(&wide);
        wide.zeroize();
        scalar
    }
}

impl VoteCipher for Sha512CtrCipher {
    const MXE_COMPATIBLE: bool = false;

    fn from_shared_secret(shared_secret: &[u8; 32]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(shared_secret);
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&hasher.finalize());
        Self { key }
    }

    fn encrypt(&self, plaintext: &[u128], nonce: &[u8; 16]) -> Vec<[u8; 32]> {
        plaintext
            .iter()
            .enumerate()
            .map(|(i, value)| (Scalar::from(*value) + self.keystream(nonce, i as u64)).to_bytes())
            .collect()
    }

    // Fails on non-canonical ciphertexts or plaintexts wider than u128.
    fn decrypt(&self, ciphertexts: &[[u8; 32]], nonce: &[u8; 16]) -> Option<Vec<u128>> {
        ciphertexts
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                let ct: Option<Scalar> = Scalar::from_canonical_bytes(*bytes).into();
                let plain = (ct? - self.keystream(nonce, i as u64)).to_bytes();
                if plain[16..].iter().any(|b| *b != 0) {
                    return None;
                }
                let mut low = [0u8; 16];
                low.copy_from_slice(&plain[..16]);
                Some(u128::from_le_bytes(low))
            })
            .collect()
    }
}

/// x25519 agreement between a private key and the network key.
pub fn shared_secret(private_key: &[u8; 32], network_key: &NetworkPublicKey) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(x25519_dalek::x25519(*private_key, network_key.0))
}

/// Encrypt a single option index for `cast_vote` with [`DefaultCipher`].
///
/// The caller is responsible for checking `option_index` against the
/// proposal's option count.
pub fn encrypt_choice(option_index: u8, network_key: &NetworkPublicKey) -> EncryptedVote {
    encrypt_choice_with::<DefaultCipher>(option_index, network_key)
}

pub fn encrypt_choice_with<C: VoteCipher>(option_index: u8, network_key: &NetworkPublicKey) -> EncryptedVote {
    let session = Session::<C>::open(network_key);
    let ciphertext = session.cipher.encrypt(&[u128::from(option_index)], &session.nonce)[0];
    EncryptedVote {
        ephemeral_public_key: session.public_key,
        nonce: u128::from_le_bytes(session.nonce),
        ciphertext,
    }
}

/// Encrypt the zero tally used by `init_tally` with [`DefaultCipher`].
///
/// The vector always has [`MAX_OPTIONS`] slots whatever `option_count` is,
/// since the on-chain tally has fixed width.
pub fn encrypt_initial_tally(option_count: usize, network_key: &NetworkPublicKey) -> EncryptedTallyInit {
    encrypt_initial_tally_with::<DefaultCipher>(option_count, network_key)
}

pub fn encrypt_initial_tally_with<C: VoteCipher>(
    option_count: usize,
    network_key: &NetworkPublicKey,
) -> EncryptedTallyInit {
    tracing::debug!(option_count, slots = MAX_OPTIONS, "encrypting initial tally");
    let session = Session::<C>::open(network_key);
    let encrypted = session.cipher.encrypt(&[0u128; MAX_OPTIONS], &session.nonce);
    let mut ciphertexts = [[0u8; 32]; MAX_OPTIONS];
    ciphertexts.copy_from_slice(&encrypted);
    EncryptedTallyInit {
        ephemeral_public_key: session.public_key,
        nonce: u128::from_le_bytes(session.nonce),
        ciphertexts,
    }
}

// Ephemeral secret and shared secret are dropped (and zeroized) with this.
struct Session<C> {
    public_key: [u8; 32],
    nonce: [u8; 16],
    cipher: C,
}

impl<C: VoteCipher> Session<C> {
    fn open(network_key: &NetworkPublicKey) -> Self {
        if !C::MXE_COMPATIBLE {
            tracing::warn!("encrypting with a cipher the MXE cannot decrypt");
        }
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret).to_bytes();
        let shared = secret.diffie_hellman(&PublicKey::from(network_key.0));
        let cipher = C::from_shared_secret(shared.as_bytes());

        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        Self {
            public_key,
            nonce,
            cipher,
        }
    }
}
