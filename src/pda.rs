//! Program-derived addresses for every account the voting program owns.

use solana_sdk::pubkey::Pubkey;

use crate::errors::VoteError;

pub const PROPOSAL_SEED: &[u8] = b"proposal";
pub const ENCRYPTED_TALLY_SEED: &[u8] = b"encrypted_tally";
pub const VOTER_SEED: &[u8] = b"voter";
pub const MXE_ACCOUNT_SEED: &[u8] = b"MXEAccount";

/// Which account is being located, with the key material its seeds need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Proposal { creator: Pubkey, salt: [u8; 8] },
    EncryptedTally { proposal: Pubkey },
    Voter { voter: Pubkey, proposal: Pubkey },
}

impl AccountRole {
    pub fn tag(&self) -> &'static [u8] {
        match self {
            AccountRole::Proposal { .. } => PROPOSAL_SEED,
            AccountRole::EncryptedTally { .. } => ENCRYPTED_TALLY_SEED,
            AccountRole::Voter { .. } => VOTER_SEED,
        }
    }

    /// Ordered seeds, tag first.
    pub fn seeds(&self) -> Vec<&[u8]> {
        match self {
            AccountRole::Proposal { creator, salt } => {
                vec![self.tag(), creator.as_ref(), salt.as_ref()]
            }
            AccountRole::EncryptedTally { proposal } => vec![self.tag(), proposal.as_ref()],
            AccountRole::Voter { voter, proposal } => {
                vec![self.tag(), voter.as_ref(), proposal.as_ref()]
            }
        }
    }
}

/// Derive the address and bump for `role` under `program_id`.
///
/// Exhausting the bump space is a configuration problem (wrong program id or
/// seeds), never something a retry fixes.
pub fn derive_address(program_id: &Pubkey, role: &AccountRole) -> Result<(Pubkey, u8), VoteError> {
    Pubkey::try_find_program_address(&role.seeds(), program_id).ok_or_else(|| {
        VoteError::Config(format!(
            "no valid program address for seed '{}' under program {}",
            String::from_utf8_lossy(role.tag()),
            program_id
        ))
    })
}

pub fn proposal_address(program_id: &Pubkey, creator: &Pubkey, salt: [u8; 8]) -> Result<Pubkey, VoteError> {
    derive_address(program_id, &AccountRole::Proposal { creator: *creator, salt }).map(|(key, _)| key)
}

pub fn encrypted_tally_address(program_id: &Pubkey, proposal: &Pubkey) -> Result<Pubkey, VoteError> {
    derive_address(program_id, &AccountRole::EncryptedTally { proposal: *proposal }).map(|(key, _)| key)
}

pub fn voter_record_address(program_id: &Pubkey, voter: &Pubkey, proposal: &Pubkey) -> Result<Pubkey, VoteError> {
    derive_address(
        program_id,
        &AccountRole::Voter {
            voter: *voter,
            proposal: *proposal,
        },
    )
    .map(|(key, _)| key)
}

/// The MXE account the compute network keeps for `program_id`.
pub fn mxe_account_address(arcium_program_id: &Pubkey, program_id: &Pubkey) -> Result<Pubkey, VoteError> {
    Pubkey::try_find_program_address(&[MXE_ACCOUNT_SEED, program_id.as_ref()], arcium_program_id)
        .map(|(key, _)| key)
        .ok_or_else(|| VoteError::Config(format!("no MXE account address for program {}", program_id)))
}

/// Associated token account holding `mint` for `owner` (token-gated voting).
pub fn voter_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(owner, mint)
}

/// Little-endian salt for a numeric proposal id.
pub fn salt_from_id(proposal_id: u64) -> [u8; 8] {
    proposal_id.to_le_bytes()
}
