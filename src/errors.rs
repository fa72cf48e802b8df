use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors raised by the voting client core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Confidential compute network not ready: {0}")]
    NetworkNotReady(String),

    #[error("Network public key unavailable: {0}")]
    NetworkKeyUnavailable(String),

    #[error("Insufficient SOL balance: {0}")]
    InsufficientFunds(String),

    #[error("Failed to decode account {address}: {reason}")]
    Decode { address: Pubkey, reason: String },

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Wallet {voter} has already voted on proposal {proposal}")]
    AlreadyVoted { voter: Pubkey, proposal: Pubkey },

    #[error("Invalid option index {index}: proposal has {count} options")]
    InvalidOption { index: u8, count: usize },

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(Pubkey),

    #[error("Solana RPC error: {0}")]
    Rpc(String),
}

impl VoteError {
    pub fn decode(address: Pubkey, reason: impl Into<String>) -> Self {
        VoteError::Decode {
            address,
            reason: reason.into(),
        }
    }

    /// Whether a later attempt could succeed without the caller changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VoteError::NetworkNotReady(_) | VoteError::NetworkKeyUnavailable(_) | VoteError::Rpc(_)
        )
    }
}

/// Map a raw ledger failure onto the error taxonomy.
///
/// Known balance failures become `InsufficientFunds`, an already-allocated
/// voter record becomes `AlreadyVoted` when the pair is known, anything else
/// is surfaced verbatim as a rejection.
pub fn classify_ledger_error(raw: &str, vote_pair: Option<(Pubkey, Pubkey)>) -> VoteError {
    let lower = raw.to_lowercase();
    if lower.contains("insufficient lamports")
        || lower.contains("insufficient funds")
        || has_custom_error_code(&lower, "0x1")
    {
        return VoteError::InsufficientFunds(raw.to_string());
    }
    if let Some((voter, proposal)) = vote_pair {
        if lower.contains("already in use") {
            return VoteError::AlreadyVoted { voter, proposal };
        }
    }
    VoteError::Rejected(raw.to_string())
}

fn has_custom_error_code(lower: &str, code: &str) -> bool {
    let needle = format!("custom program error: {}", code);
    lower.match_indices(&needle).any(|(at, _)| {
        lower[at + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_hexdigit())
    })
}

/// Errors specific to the command line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Wallet not found. Run 'cipherballot-cli wallet create' first")]
    WalletNotFound,

    #[error("Invalid cluster name: {0}. Valid options: devnet, mainnet-beta, localnet")]
    InvalidCluster(String),

    #[error("Invalid public key: {0}")]
    InvalidPubkey(String),

    #[error("Invalid timestamp: {0}. Use unix seconds or RFC 3339")]
    InvalidTimestamp(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
