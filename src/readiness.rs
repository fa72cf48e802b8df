//! Availability of the confidential compute network (MXE).
//!
//! Encryption needs the x25519 key the network publishes in its MXE account.
//! The account may be missing (network never deployed for this program) or
//! present with an unfinalized key; both are "not ready", never client bugs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::cipher::NetworkPublicKey;
use crate::errors::VoteError;
use crate::ledger::Ledger;

pub const DEFAULT_KEY_RETRIES: u32 = 6;
pub const DEFAULT_KEY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where the network key lives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkKeySource: Send + Sync {
    fn mxe_account(&self) -> Pubkey;

    async fn mxe_account_exists(&self) -> Result<bool, VoteError>;

    /// `Ok(None)` while the key is not finalized.
    async fn fetch_public_key(&self) -> Result<Option<[u8; 32]>, VoteError>;
}

/// Reads the key straight out of the MXE account data.
pub struct LedgerKeySource<L> {
    ledger: Arc<L>,
    mxe_account: Pubkey,
    key_offset: usize,
}

impl<L: Ledger> LedgerKeySource<L> {
    pub fn new(ledger: Arc<L>, mxe_account: Pubkey, key_offset: usize) -> Self {
        Self {
            ledger,
            mxe_account,
            key_offset,
        }
    }
}

#[async_trait]
impl<L: Ledger> NetworkKeySource for LedgerKeySource<L> {
    fn mxe_account(&self) -> Pubkey {
        self.mxe_account
    }

    async fn mxe_account_exists(&self) -> Result<bool, VoteError> {
        Ok(self.ledger.get_account(&self.mxe_account).await?.is_some())
    }

    async fn fetch_public_key(&self) -> Result<Option<[u8; 32]>, VoteError> {
        let account = self
            .ledger
            .get_account(&self.mxe_account)
            .await?
            .ok_or_else(|| VoteError::NetworkNotReady(format!("MXE account {} not found", self.mxe_account)))?;

        let end = self.key_offset + 32;
        if account.data.len() < end {
            return Err(VoteError::NetworkNotReady(format!(
                "MXE account is {} bytes, key expected at {}..{}",
                account.data.len(),
                self.key_offset,
                end
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&account.data[self.key_offset..end]);
        if key.iter().all(|b| *b == 0) {
            return Ok(None);
        }
        Ok(Some(key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    Probing,
    Ready,
    NotFound,
    KeyNotFinalized,
    Error(String),
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeState::Probing => write!(f, "probing"),
            ProbeState::Ready => write!(f, "ready"),
            ProbeState::NotFound => write!(f, "not found"),
            ProbeState::KeyNotFinalized => write!(f, "key not finalized"),
            ProbeState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub reason: String,
    pub state: ProbeState,
    pub mxe_account: Pubkey,
}

/// Bounded, fixed-delay polling of the network key.
#[derive(Debug, Clone, Copy)]
pub struct Prober {
    retries: u32,
    delay: Duration,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_RETRIES, DEFAULT_KEY_RETRY_DELAY)
    }
}

impl Prober {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries: retries.max(1),
            delay,
        }
    }

    /// One probe attempt, for status displays.
    pub async fn check_ready<K: NetworkKeySource + ?Sized>(&self, source: &K) -> Readiness {
        let mxe_account = source.mxe_account();
        let (state, _) = self.probe(source, 1).await;
        let reason = match &state {
            ProbeState::Ready => "MXE is ready.".to_string(),
            ProbeState::NotFound => format!("MXE account {} is not initialized.", mxe_account),
            ProbeState::KeyNotFinalized => "MXE keys are not finalized yet.".to_string(),
            ProbeState::Error(reason) => reason.clone(),
            ProbeState::Probing => "probe did not complete".to_string(),
        };
        Readiness {
            ready: state == ProbeState::Ready,
            reason,
            state,
            mxe_account,
        }
    }

    /// The network key, or the last observed failure once retries run out.
    pub async fn fetch_key_with_retry<K: NetworkKeySource + ?Sized>(
        &self,
        source: &K,
    ) -> Result<NetworkPublicKey, VoteError> {
        match self.probe(source, self.retries).await {
            (ProbeState::Ready, Some(key)) => NetworkPublicKey::new(key),
            (ProbeState::NotFound, _) => Err(VoteError::NetworkNotReady(format!(
                "MXE account {} not found",
                source.mxe_account()
            ))),
            (ProbeState::Error(reason), _) => Err(VoteError::NetworkKeyUnavailable(reason)),
            (state, _) => Err(VoteError::NetworkKeyUnavailable(state.to_string())),
        }
    }

    async fn probe<K: NetworkKeySource + ?Sized>(&self, source: &K, attempts: u32) -> (ProbeState, Option<[u8; 32]>) {
        match source.mxe_account_exists().await {
            Ok(true) => {}
            Ok(false) => return (ProbeState::NotFound, None),
            Err(e) => return (ProbeState::Error(e.to_string()), None),
        }

        let mut state = ProbeState::Probing;
        for attempt in 1..=attempts {
            match source.fetch_public_key().await {
                Ok(Some(key)) => {
                    info!(attempt, "network public key available");
                    return (ProbeState::Ready, Some(key));
                }
                Ok(None) => state = ProbeState::KeyNotFinalized,
                Err(e) => state = ProbeState::Error(e.to_string()),
            }
            debug!(attempt, attempts, %state, "network key not available");
            if attempt < attempts {
                tokio::time::sleep(self.delay).await;
            }
        }
        if attempts > 1 {
            warn!(attempts, %state, "giving up on network key");
        }
        (state, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn prober() -> Prober {
        Prober::new(6, Duration::from_millis(1))
    }

    fn source() -> MockNetworkKeySource {
        let mut mock = MockNetworkKeySource::new();
        mock.expect_mxe_account().return_const(Pubkey::new_unique());
        mock
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let mut mock = source();
        mock.expect_mxe_account_exists().returning(|| Ok(false));
        mock.expect_fetch_public_key().never();

        let readiness = prober().check_ready(&mock).await;
        assert!(!readiness.ready);
        assert_eq!(readiness.state, ProbeState::NotFound);
    }

    #[tokio::test]
    async fn test_retry_ceiling() {
        let mut mock = source();
        mock.expect_mxe_account_exists().returning(|| Ok(true));
        mock.expect_fetch_public_key().times(6).returning(|| Ok(None));

        let err = prober().fetch_key_with_retry(&mock).await.unwrap_err();
        assert!(matches!(err, VoteError::NetworkKeyUnavailable(_)));
    }

    #[tokio::test]
    async fn test_last_error_is_surfaced() {
        let mut mock = source();
        let mut seq = Sequence::new();
        mock.expect_mxe_account_exists().returning(|| Ok(true));
        mock.expect_fetch_public_key()
            .times(5)
            .in_sequence(&mut seq)
            .returning(|| Ok(None));
        mock.expect_fetch_public_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(VoteError::Rpc("connection reset".to_string())));

        let err = prober().fetch_key_with_retry(&mock).await.unwrap_err();
        assert_eq!(err, VoteError::NetworkKeyUnavailable("Solana RPC error: connection reset".to_string()));
    }

    #[tokio::test]
    async fn test_unfinalized_key_reported() {
        let mut mock = source();
        mock.expect_mxe_account_exists().returning(|| Ok(true));
        mock.expect_fetch_public_key().times(1).returning(|| Ok(None));

        let readiness = prober().check_ready(&mock).await;
        assert_eq!(readiness.state, ProbeState::KeyNotFinalized);
        assert!(readiness.reason.contains("not finalized"));
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let mut mock = source();
        let mut seq = Sequence::new();
        mock.expect_mxe_account_exists().returning(|| Ok(true));
        mock.expect_fetch_public_key()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Ok(None));
        mock.expect_fetch_public_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some([9u8; 32])));

        let key = prober().fetch_key_with_retry(&mock).await.unwrap();
        assert_eq!(key.as_bytes(), &[9u8; 32]);
    }

    #[test]
    fn test_probe_state_display() {
        assert_eq!(ProbeState::KeyNotFinalized.to_string(), "key not finalized");
        assert_eq!(ProbeState::Error("boom".into()).to_string(), "error: boom");
    }
}
