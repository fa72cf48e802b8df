//! Wire encoding for the voting program's instructions.
//!
//! Each instruction is an 8-byte discriminator (`sha256("global:<name>")[..8]`)
//! followed by the Borsh encoding of its arguments in declaration order. The
//! program checks byte equality, so every layout here is positional and fixed.

use anchor_lang::prelude::borsh;
use anchor_lang::{AnchorDeserialize, AnchorSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

use crate::cipher::{EncryptedTallyInit, EncryptedVote};
use crate::errors::VoteError;

pub const TITLE_MAX_LEN: usize = 128;
pub const OPTION_MAX_LEN: usize = 128;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = crate::cipher::MAX_OPTIONS;
pub const MAX_WHITELIST: usize = 64;

pub const CREATE_PROPOSAL_DISCRIMINATOR: [u8; 8] = [132, 116, 68, 174, 216, 160, 198, 22];
pub const INIT_TALLY_DISCRIMINATOR: [u8; 8] = [87, 83, 59, 73, 151, 157, 116, 215];
pub const CAST_VOTE_DISCRIMINATOR: [u8; 8] = [20, 212, 15, 189, 69, 180, 69, 151];
pub const FINALIZE_TALLY_DISCRIMINATOR: [u8; 8] = [72, 47, 105, 182, 37, 98, 194, 176];

/// Anchor instruction discriminator for `name`.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    crate::accounts::sighash("global", name)
}

/// Arguments of one program instruction.
pub trait InstructionArgs: AnchorSerialize + AnchorDeserialize + Sized {
    const DISCRIMINATOR: [u8; 8];

    fn data(&self) -> Vec<u8> {
        let mut data = Self::DISCRIMINATOR.to_vec();
        // Writing into a Vec cannot fail.
        self.serialize(&mut data).unwrap_or_default();
        data
    }

    fn decode(data: &[u8]) -> Result<Self, VoteError> {
        if data.len() < 8 || data[..8] != Self::DISCRIMINATOR {
            return Err(VoteError::InvalidProposal(
                "instruction discriminator mismatch".to_string(),
            ));
        }
        Self::try_from_slice(&data[8..])
            .map_err(|e| VoteError::InvalidProposal(format!("malformed instruction data: {}", e)))
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateProposalArgs {
    pub proposal_salt: [u8; 8],
    pub title: [u8; TITLE_MAX_LEN],
    pub options: Vec<[u8; OPTION_MAX_LEN]>,
    pub start_time: i64,
    pub end_time: i64,
    pub eligibility_mode: u8,
    pub whitelist: Vec<Pubkey>,
}

impl InstructionArgs for CreateProposalArgs {
    const DISCRIMINATOR: [u8; 8] = CREATE_PROPOSAL_DISCRIMINATOR;
}

impl CreateProposalArgs {
    pub fn new(
        proposal_salt: [u8; 8],
        title: &str,
        options: &[String],
        start_time: i64,
        end_time: i64,
        eligibility_mode: u8,
        whitelist: Vec<Pubkey>,
    ) -> Self {
        Self {
            proposal_salt,
            title: pad_text(title),
            options: options.iter().map(|o| pad_text(o)).collect(),
            start_time,
            end_time,
            eligibility_mode,
            whitelist,
        }
    }

    pub fn title_text(&self) -> String {
        trim_text(&self.title)
    }

    pub fn option_texts(&self) -> Vec<String> {
        self.options.iter().map(|o| trim_text(o)).collect()
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct InitTallyArgs {
    pub creator_x25519_pubkey: [u8; 32],
    pub nonce: u128,
    pub encrypted_tally: Vec<[u8; 32]>,
}

impl InstructionArgs for InitTallyArgs {
    const DISCRIMINATOR: [u8; 8] = INIT_TALLY_DISCRIMINATOR;
}

impl From<&EncryptedTallyInit> for InitTallyArgs {
    fn from(init: &EncryptedTallyInit) -> Self {
        Self {
            creator_x25519_pubkey: init.ephemeral_public_key,
            nonce: init.nonce,
            encrypted_tally: init.ciphertexts.to_vec(),
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CastVoteArgs {
    pub voter_x25519_pubkey: [u8; 32],
    pub nonce: u128,
    pub encrypted_vote: [u8; 32],
    pub vote_index: u8,
}

impl InstructionArgs for CastVoteArgs {
    const DISCRIMINATOR: [u8; 8] = CAST_VOTE_DISCRIMINATOR;
}

impl CastVoteArgs {
    pub fn new(vote: &EncryptedVote, vote_index: u8) -> Self {
        Self {
            voter_x25519_pubkey: vote.ephemeral_public_key,
            nonce: vote.nonce,
            encrypted_vote: vote.ciphertext,
            vote_index,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeTallyArgs {}

impl InstructionArgs for FinalizeTallyArgs {
    const DISCRIMINATOR: [u8; 8] = FINALIZE_TALLY_DISCRIMINATOR;
}

/// Right-pad with NUL to `N` bytes, truncating on a char boundary if longer.
pub fn pad_text<const N: usize>(text: &str) -> [u8; N] {
    let mut end = text.len().min(N);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = [0u8; N];
    out[..end].copy_from_slice(&text.as_bytes()[..end]);
    out
}

/// Inverse of [`pad_text`]: drop NUL padding and surrounding whitespace.
pub fn trim_text(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end])
        .replace('\0', "")
        .trim()
        .to_string()
}

pub fn create_proposal(
    program_id: &Pubkey,
    creator: &Pubkey,
    proposal: &Pubkey,
    mint: Option<&Pubkey>,
    args: &CreateProposalArgs,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*proposal, false),
            AccountMeta::new(*creator, true),
            // Unused unless token gated; the program only records the key.
            AccountMeta::new_readonly(mint.copied().unwrap_or(system_program::ID), false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: args.data(),
    }
}

pub fn init_tally(
    program_id: &Pubkey,
    creator: &Pubkey,
    proposal: &Pubkey,
    encrypted_tally: &Pubkey,
    args: &InitTallyArgs,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*creator, true),
            AccountMeta::new(*proposal, false),
            AccountMeta::new(*encrypted_tally, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: args.data(),
    }
}

/// `voter_token` is the voter's token account for token-gated proposals.
/// Anchor reads an optional account equal to the program id as `None`.
pub fn cast_vote(
    program_id: &Pubkey,
    voter: &Pubkey,
    proposal: &Pubkey,
    encrypted_tally: &Pubkey,
    voter_record: &Pubkey,
    voter_token: Option<&Pubkey>,
    args: &CastVoteArgs,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*voter, true),
            AccountMeta::new(*proposal, false),
            AccountMeta::new(*encrypted_tally, false),
            AccountMeta::new(*voter_record, false),
            AccountMeta::new_readonly(voter_token.copied().unwrap_or(*program_id), false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: args.data(),
    }
}

pub fn finalize_tally(program_id: &Pubkey, creator: &Pubkey, proposal: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*creator, true), AccountMeta::new(*proposal, false)],
        data: FinalizeTallyArgs::default().data(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminators_match_sighash() {
        assert_eq!(instruction_discriminator("create_proposal"), CREATE_PROPOSAL_DISCRIMINATOR);
        assert_eq!(instruction_discriminator("init_tally"), INIT_TALLY_DISCRIMINATOR);
        assert_eq!(instruction_discriminator("cast_vote"), CAST_VOTE_DISCRIMINATOR);
        assert_eq!(instruction_discriminator("finalize_tally"), FINALIZE_TALLY_DISCRIMINATOR);
    }

    #[test]
    fn test_discriminators_are_unique() {
        let all = [
            CREATE_PROPOSAL_DISCRIMINATOR,
            INIT_TALLY_DISCRIMINATOR,
            CAST_VOTE_DISCRIMINATOR,
            FINALIZE_TALLY_DISCRIMINATOR,
        ];
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(all[i], all[j]);
            }
        }
    }

    #[test]
    fn test_pad_text() {
        let padded: [u8; 8] = pad_text("Yes");
        assert_eq!(&padded, b"Yes\0\0\0\0\0");
    }

    #[test]
    fn test_pad_text_truncates() {
        let long = "x".repeat(200);
        let padded: [u8; TITLE_MAX_LEN] = pad_text(&long);
        assert!(padded.iter().all(|b| *b == b'x'));
    }

    #[test]
    fn test_pad_text_truncates_on_char_boundary() {
        // 'é' is two bytes; the third byte would split it.
        let padded: [u8; 3] = pad_text("aéé");
        assert_eq!(&padded, &[b'a', 0xC3, 0xA9]);
        assert_eq!(trim_text(&padded), "aé");
    }

    #[test]
    fn test_trim_text_strips_padding() {
        assert_eq!(trim_text(b"No\0\0\0"), "No");
        assert_eq!(trim_text(&[0u8; 16]), "");
    }

    #[test]
    fn test_cast_vote_layout() {
        let args = CastVoteArgs {
            voter_x25519_pubkey: [1u8; 32],
            nonce: 0x0102,
            encrypted_vote: [2u8; 32],
            vote_index: 1,
        };
        let data = args.data();

        assert_eq!(data.len(), 8 + 32 + 16 + 32 + 1);
        assert_eq!(&data[..8], &CAST_VOTE_DISCRIMINATOR);
        assert_eq!(&data[8..40], &[1u8; 32]);
        assert_eq!(&data[40..56], &0x0102u128.to_le_bytes());
        assert_eq!(&data[56..88], &[2u8; 32]);
        assert_eq!(data[88], 1);
    }

    #[test]
    fn test_create_proposal_whitelist_is_length_prefixed() {
        let whitelist = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        let args = CreateProposalArgs::new(
            [0; 8],
            "T",
            &["Yes".to_string(), "No".to_string()],
            100,
            200,
            1,
            whitelist.clone(),
        );
        let data = args.data();

        let tail = &data[data.len() - (4 + 64)..];
        assert_eq!(&tail[..4], &2u32.to_le_bytes());
        assert_eq!(&tail[4..36], whitelist[0].as_ref());
    }

    #[test]
    fn test_encoding_is_reproducible() {
        let options = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let a = CreateProposalArgs::new([3; 8], "Budget", &options, 10, 20, 0, vec![]).data();
        let b = CreateProposalArgs::new([3; 8], "Budget", &options, 10, 20, 0, vec![]).data();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_rejects_wrong_discriminator() {
        let data = FinalizeTallyArgs::default().data();
        assert!(CastVoteArgs::decode(&data).is_err());
        assert!(FinalizeTallyArgs::decode(&data).is_ok());
    }

    #[test]
    fn test_cast_vote_placeholder_token_account() {
        let program_id = Pubkey::new_unique();
        let args = CastVoteArgs {
            voter_x25519_pubkey: [0; 32],
            nonce: 0,
            encrypted_vote: [0; 32],
            vote_index: 0,
        };
        let ix = cast_vote(
            &program_id,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            None,
            &args,
        );

        assert_eq!(ix.accounts.len(), 6);
        assert_eq!(ix.accounts[4].pubkey, program_id);
        assert!(!ix.accounts[4].is_writable);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[5].pubkey, system_program::ID);
    }

    #[test]
    fn test_finalize_has_no_arguments() {
        let ix = finalize_tally(&Pubkey::new_unique(), &Pubkey::new_unique(), &Pubkey::new_unique());
        assert_eq!(ix.data, FINALIZE_TALLY_DISCRIMINATOR.to_vec());
        assert_eq!(ix.accounts.len(), 2);
    }
}
