//! Consumer operations over the ledger and network key seams.
//!
//! Reads return view models. Writes never return `Err`: every path ends in a
//! terminal [`WriteOutcome`], and an optional observer also sees the
//! `Sending` state before submission.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use tracing::{debug, info, warn};

use crate::accounts::{decode_batch, decode_proposal, DecodePolicy, Decoded, Eligibility, PROPOSAL_DISCRIMINATOR};
use crate::cipher::{encrypt_choice, encrypt_initial_tally, NetworkPublicKey};
use crate::config::Config;
use crate::errors::{classify_ledger_error, VoteError};
use crate::instructions::{self, CastVoteArgs, CreateProposalArgs, InitTallyArgs, MAX_OPTIONS, MAX_WHITELIST, MIN_OPTIONS};
use crate::ledger::{Ledger, ProgramSubscription};
use crate::pda;
use crate::readiness::{NetworkKeySource, Prober, Readiness};
use crate::view::{build_view, sort_views, ProposalView, SortOrder};
use crate::watch::{ProposalFeed, Subscription};

pub struct ClientSettings {
    pub program_id: Pubkey,
    pub decode_policy: DecodePolicy,
    pub prober: Prober,
    pub poll_interval: Duration,
}

impl ClientSettings {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            decode_policy: DecodePolicy::default(),
            prober: Prober::default(),
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, VoteError> {
        Ok(Self {
            program_id: config.program_id()?,
            decode_policy: config.decode_policy(),
            prober: Prober::new(config.key_retries, config.key_retry_delay()),
            poll_interval: config.poll_interval(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    CreateProposal,
    InitTally,
    CastVote,
    FinalizeTally,
}

impl WriteAction {
    fn sending_message(&self) -> &'static str {
        match self {
            WriteAction::CreateProposal => "Creating proposal...",
            WriteAction::InitTally => "Initializing encrypted tally...",
            WriteAction::CastVote => "Encrypting & transmitting...",
            WriteAction::FinalizeTally => "Finalizing tally computation...",
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            WriteAction::CreateProposal => "Proposal created",
            WriteAction::InitTally => "Tally initialized successfully",
            WriteAction::CastVote => "Vote cast successfully",
            WriteAction::FinalizeTally => "Tally finalized & revealed",
        }
    }

    fn insufficient_funds_message(&self) -> &'static str {
        match self {
            WriteAction::CreateProposal => "Insufficient SOL balance to create proposal (Rent).",
            WriteAction::InitTally => "Insufficient SOL balance to initialize tally (Rent).",
            WriteAction::CastVote => "Insufficient balance to vote.",
            WriteAction::FinalizeTally => "Insufficient SOL to finalize (Rent/Gas).",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Sending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub action: WriteAction,
    pub status: WriteStatus,
    pub message: String,
    pub signature: Option<String>,
    /// The account the write created, when it created one.
    pub account: Option<Pubkey>,
    pub error: Option<VoteError>,
}

impl WriteOutcome {
    fn sending(action: WriteAction) -> Self {
        Self {
            action,
            status: WriteStatus::Sending,
            message: action.sending_message().to_string(),
            signature: None,
            account: None,
            error: None,
        }
    }

    fn success(action: WriteAction, signature: Signature, account: Option<Pubkey>) -> Self {
        Self {
            action,
            status: WriteStatus::Success,
            message: action.success_message().to_string(),
            signature: Some(signature.to_string()),
            account,
            error: None,
        }
    }

    fn failure(action: WriteAction, error: VoteError) -> Self {
        let message = match &error {
            VoteError::InsufficientFunds(_) => action.insufficient_funds_message().to_string(),
            VoteError::Rejected(raw) => raw.clone(),
            other => other.to_string(),
        };
        Self {
            action,
            status: WriteStatus::Error,
            message,
            signature: None,
            account: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WriteStatus::Success
    }
}

pub type StatusObserver = Arc<dyn Fn(&WriteOutcome) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProposalParams {
    pub title: String,
    pub options: Vec<String>,
    pub start_ts: i64,
    pub end_ts: i64,
    pub eligibility: Eligibility,
    pub salt: [u8; 8],
}

impl CreateProposalParams {
    pub fn validate(&self) -> Result<(), VoteError> {
        if self.title.trim().is_empty() {
            return Err(VoteError::InvalidProposal("title is required".to_string()));
        }
        if self.options.len() < MIN_OPTIONS {
            return Err(VoteError::InvalidProposal(format!("At least {} options required", MIN_OPTIONS)));
        }
        if self.options.len() > MAX_OPTIONS {
            return Err(VoteError::InvalidProposal(format!("Max {} options allowed", MAX_OPTIONS)));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err(VoteError::InvalidProposal("options must not be empty".to_string()));
        }
        if self.end_ts <= self.start_ts {
            return Err(VoteError::InvalidProposal("end time must be after start time".to_string()));
        }
        if let Eligibility::Whitelist { voters } = &self.eligibility {
            if voters.is_empty() {
                return Err(VoteError::InvalidProposal("whitelist is empty".to_string()));
            }
            if voters.len() > MAX_WHITELIST {
                return Err(VoteError::InvalidProposal(format!(
                    "whitelist has {} entries, at most {} allowed",
                    voters.len(),
                    MAX_WHITELIST
                )));
            }
        }
        Ok(())
    }

    fn args(&self) -> CreateProposalArgs {
        let whitelist = match &self.eligibility {
            Eligibility::Whitelist { voters } => voters.clone(),
            _ => Vec::new(),
        };
        CreateProposalArgs::new(
            self.salt,
            self.title.trim(),
            &self.options,
            self.start_ts,
            self.end_ts,
            self.eligibility.mode(),
            whitelist,
        )
    }
}

/// Read side shared by the client and its change feed.
pub struct ProposalReader<L: ?Sized> {
    ledger: Arc<L>,
    program_id: Pubkey,
    policy: DecodePolicy,
}

impl<L: ?Sized> Clone for ProposalReader<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            program_id: self.program_id,
            policy: self.policy,
        }
    }
}

impl<L: Ledger + ?Sized> ProposalReader<L> {
    pub fn new(ledger: Arc<L>, program_id: Pubkey, policy: DecodePolicy) -> Self {
        Self {
            ledger,
            program_id,
            policy,
        }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// All displayable proposals, freshly decoded and sorted.
    pub async fn snapshot(&self, order: SortOrder) -> Result<Vec<ProposalView>, VoteError> {
        let accounts = self
            .ledger
            .get_program_accounts(&self.program_id, &PROPOSAL_DISCRIMINATOR)
            .await?;
        let now = Utc::now().timestamp();
        let mut views: Vec<ProposalView> = decode_batch(&accounts, &self.policy)
            .iter()
            .map(|(address, record)| build_view(*address, record, now))
            .collect();
        sort_views(&mut views, order);
        Ok(views)
    }

    pub async fn subscribe_changes(&self) -> Result<ProgramSubscription, VoteError> {
        self.ledger
            .subscribe_program(&self.program_id, &PROPOSAL_DISCRIMINATOR)
            .await
    }

    /// A single proposal. The display cutoff does not apply to direct lookups.
    pub async fn by_address(&self, address: &Pubkey) -> Result<ProposalView, VoteError> {
        let account = self
            .ledger
            .get_account(address)
            .await?
            .ok_or(VoteError::ProposalNotFound(*address))?;
        let policy = DecodePolicy {
            min_display_ts: i64::MIN,
            ..self.policy
        };
        match decode_proposal(address, &account.data, &policy)? {
            Decoded::Proposal(record) => Ok(build_view(*address, &record, Utc::now().timestamp())),
            Decoded::Legacy { len } => Err(VoteError::decode(
                *address,
                format!("legacy layout ({} bytes) is no longer supported", len),
            )),
            Decoded::Hidden { .. } => Err(VoteError::ProposalNotFound(*address)),
        }
    }
}

pub struct VoteClient<L: ?Sized, K> {
    reader: ProposalReader<L>,
    key_source: K,
    prober: Prober,
    poll_interval: Duration,
    observer: Option<StatusObserver>,
}

impl<L, K> VoteClient<L, K>
where
    L: Ledger + ?Sized + 'static,
    K: NetworkKeySource,
{
    pub fn new(ledger: Arc<L>, key_source: K, settings: ClientSettings) -> Self {
        Self {
            reader: ProposalReader::new(ledger, settings.program_id, settings.decode_policy),
            key_source,
            prober: settings.prober,
            poll_interval: settings.poll_interval,
            observer: None,
        }
    }

    /// Receive every status transition of write operations.
    pub fn with_observer(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn program_id(&self) -> Pubkey {
        self.reader.program_id
    }

    pub async fn fetch_proposals(&self, order: SortOrder) -> Result<Vec<ProposalView>, VoteError> {
        self.reader.snapshot(order).await
    }

    pub async fn fetch_proposal_by_address(&self, address: &Pubkey) -> Result<ProposalView, VoteError> {
        self.reader.by_address(address).await
    }

    /// Push the full proposal list to `on_change` on every ledger change and
    /// on each poll tick, until the returned handle is dropped or cancelled.
    pub fn subscribe_proposal_changes<F>(&self, order: SortOrder, on_change: F) -> Subscription
    where
        F: Fn(Vec<ProposalView>) + Send + Sync + 'static,
    {
        let feed = ProposalFeed::spawn(self.reader.clone(), order, self.poll_interval);
        feed.subscribe(on_change)
    }

    pub async fn has_user_voted(&self, voter: &Pubkey, proposal: &Pubkey) -> Result<bool, VoteError> {
        let record = pda::voter_record_address(&self.program_id(), voter, proposal)?;
        Ok(self.reader.ledger.get_account(&record).await?.is_some())
    }

    pub async fn check_network_readiness(&self) -> Readiness {
        self.prober.check_ready(&self.key_source).await
    }

    async fn network_key(&self) -> Result<NetworkPublicKey, VoteError> {
        self.prober.fetch_key_with_retry(&self.key_source).await
    }

    pub async fn create_proposal(&self, creator: &Keypair, params: CreateProposalParams) -> WriteOutcome {
        self.run_write(WriteAction::CreateProposal, async {
            params.validate()?;
            let program_id = self.program_id();
            let proposal = pda::proposal_address(&program_id, &creator.pubkey(), params.salt)?;
            let mint = match &params.eligibility {
                Eligibility::TokenGated { mint } => Some(*mint),
                _ => None,
            };
            let ix = instructions::create_proposal(
                &program_id,
                &creator.pubkey(),
                &proposal,
                mint.as_ref(),
                &params.args(),
            );
            let signature = self.send(ix, creator, None).await?;
            Ok::<_, VoteError>((signature, Some(proposal)))
        })
        .await
    }

    pub async fn init_encrypted_tally(&self, creator: &Keypair, proposal: &Pubkey) -> WriteOutcome {
        self.run_write(WriteAction::InitTally, async {
            let view = self.reader.by_address(proposal).await?;
            let network_key = self.network_key().await?;
            let init = encrypt_initial_tally(view.options.len(), &network_key);

            let program_id = self.program_id();
            let tally = pda::encrypted_tally_address(&program_id, proposal)?;
            let ix = instructions::init_tally(
                &program_id,
                &creator.pubkey(),
                proposal,
                &tally,
                &InitTallyArgs::from(&init),
            );
            let signature = self.send(ix, creator, None).await?;
            Ok::<_, VoteError>((signature, Some(tally)))
        })
        .await
    }

    pub async fn submit_encrypted_vote(&self, voter: &Keypair, proposal: &Pubkey, option_index: u8) -> WriteOutcome {
        self.run_write(WriteAction::CastVote, async {
            let view = self.reader.by_address(proposal).await?;
            if usize::from(option_index) >= view.options.len() {
                return Err(VoteError::InvalidOption {
                    index: option_index,
                    count: view.options.len(),
                });
            }
            if self.has_user_voted(&voter.pubkey(), proposal).await? {
                return Err(VoteError::AlreadyVoted {
                    voter: voter.pubkey(),
                    proposal: *proposal,
                });
            }

            let network_key = self.network_key().await?;
            let vote = encrypt_choice(option_index, &network_key);

            let program_id = self.program_id();
            let tally = pda::encrypted_tally_address(&program_id, proposal)?;
            let record = pda::voter_record_address(&program_id, &voter.pubkey(), proposal)?;
            let voter_token = view
                .required_mint()
                .map(|mint| pda::voter_token_address(&voter.pubkey(), &mint));
            let ix = instructions::cast_vote(
                &program_id,
                &voter.pubkey(),
                proposal,
                &tally,
                &record,
                voter_token.as_ref(),
                &CastVoteArgs::new(&vote, option_index),
            );
            let signature = self
                .send(ix, voter, Some((voter.pubkey(), *proposal)))
                .await?;
            Ok::<_, VoteError>((signature, Some(record)))
        })
        .await
    }

    pub async fn finalize_tally(&self, creator: &Keypair, proposal: &Pubkey) -> WriteOutcome {
        self.run_write(WriteAction::FinalizeTally, async {
            let view = self.reader.by_address(proposal).await?;
            if !view.tally_initialized {
                return Err(VoteError::InvalidProposal(
                    "tally was never initialized; run init-tally first".to_string(),
                ));
            }
            let ix = instructions::finalize_tally(&self.program_id(), &creator.pubkey(), proposal);
            let signature = self.send(ix, creator, None).await?;
            Ok::<_, VoteError>((signature, None))
        })
        .await
    }

    async fn send(
        &self,
        ix: solana_sdk::instruction::Instruction,
        signer: &Keypair,
        vote_pair: Option<(Pubkey, Pubkey)>,
    ) -> Result<Signature, VoteError> {
        self.reader
            .ledger
            .send_instruction(ix, signer)
            .await
            .map_err(|e| match e {
                VoteError::Rpc(raw) => classify_ledger_error(&raw, vote_pair),
                other => other,
            })
    }

    async fn run_write<F>(&self, action: WriteAction, write: F) -> WriteOutcome
    where
        F: Future<Output = Result<(Signature, Option<Pubkey>), VoteError>>,
    {
        self.notify(&WriteOutcome::sending(action));
        let outcome = match write.await {
            Ok((signature, account)) => {
                info!(?action, %signature, "transaction confirmed");
                WriteOutcome::success(action, signature, account)
            }
            Err(e) => {
                warn!(?action, error = %e, "write failed");
                WriteOutcome::failure(action, e)
            }
        };
        debug!(?action, status = ?outcome.status, "write finished");
        self.notify(&outcome);
        outcome
    }

    fn notify(&self, outcome: &WriteOutcome) {
        if let Some(observer) = &self.observer {
            observer(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CreateProposalParams {
        CreateProposalParams {
            title: "T".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            start_ts: 100,
            end_ts: 200,
            eligibility: Eligibility::Open,
            salt: pda::salt_from_id(1),
        }
    }

    #[test]
    fn test_params_valid() {
        assert!(params().validate().is_ok());
    }

    #[test]
    fn test_params_option_bounds() {
        let mut p = params();
        p.options = vec!["Only".to_string()];
        assert!(matches!(p.validate(), Err(VoteError::InvalidProposal(_))));

        p.options = (0..9).map(|i| format!("Option {}", i)).collect();
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("Max 8 options"));
    }

    #[test]
    fn test_params_time_window() {
        let mut p = params();
        p.end_ts = p.start_ts;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_params_whitelist_limit() {
        let mut p = params();
        p.eligibility = Eligibility::Whitelist {
            voters: (0..65).map(|_| Pubkey::new_unique()).collect(),
        };
        assert!(p.validate().is_err());

        p.eligibility = Eligibility::Whitelist {
            voters: (0..64).map(|_| Pubkey::new_unique()).collect(),
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_args_carry_whitelist_only_for_whitelist_mode() {
        let mut p = params();
        let member = Pubkey::new_unique();
        p.eligibility = Eligibility::Whitelist { voters: vec![member] };
        let args = p.args();
        assert_eq!(args.eligibility_mode, 1);
        assert_eq!(args.whitelist, vec![member]);

        p.eligibility = Eligibility::TokenGated { mint: Pubkey::new_unique() };
        let args = p.args();
        assert_eq!(args.eligibility_mode, 2);
        assert!(args.whitelist.is_empty());
    }

    #[test]
    fn test_failure_messages_per_action() {
        let funds = VoteError::InsufficientFunds("insufficient lamports".to_string());
        let outcome = WriteOutcome::failure(WriteAction::CreateProposal, funds.clone());
        assert_eq!(outcome.status, WriteStatus::Error);
        assert!(outcome.message.contains("create proposal"));

        let outcome = WriteOutcome::failure(WriteAction::CastVote, funds);
        assert_eq!(outcome.message, "Insufficient balance to vote.");

        let outcome = WriteOutcome::failure(
            WriteAction::CastVote,
            VoteError::Rejected("Voter is not whitelisted".to_string()),
        );
        assert_eq!(outcome.message, "Voter is not whitelisted");
    }
}
