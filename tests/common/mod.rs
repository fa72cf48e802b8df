//! In-memory stand-ins for the Solana cluster and the compute network.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anchor_lang::AnchorDeserialize;
use async_trait::async_trait;
use cipherballot_cli::accounts::{
    EncryptedTallyAccount, ProposalAccount, PROPOSAL_DISCRIMINATOR, VOTER_RECORD_DISCRIMINATOR,
};
use cipherballot_cli::errors::VoteError;
use cipherballot_cli::instructions::{
    CastVoteArgs, CreateProposalArgs, InitTallyArgs, InstructionArgs, CAST_VOTE_DISCRIMINATOR,
    CREATE_PROPOSAL_DISCRIMINATOR, FINALIZE_TALLY_DISCRIMINATOR, INIT_TALLY_DISCRIMINATOR,
};
use cipherballot_cli::ledger::{Ledger, ProgramSubscription};
use cipherballot_cli::pda;
use cipherballot_cli::readiness::NetworkKeySource;
use solana_sdk::account::Account;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};

pub const NETWORK_SECRET: [u8; 32] = [7u8; 32];

/// Public half of [`NETWORK_SECRET`].
pub fn network_public_key() -> [u8; 32] {
    x25519_dalek::x25519(NETWORK_SECRET, x25519_dalek::X25519_BASEPOINT_BYTES)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Executes the voting program's instructions against an account map.
pub struct InMemoryLedger {
    pub program_id: Pubkey,
    accounts: Mutex<HashMap<Pubkey, Account>>,
    clock: AtomicI64,
    broke: Mutex<HashSet<Pubkey>>,
    token_holders: Mutex<HashSet<Pubkey>>,
    fail_next: Mutex<Option<String>>,
    pub init_tallies: Mutex<Vec<InitTallyArgs>>,
    pub votes: Mutex<Vec<CastVoteArgs>>,
    pub sent: Mutex<Vec<Instruction>>,
}

impl InMemoryLedger {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            accounts: Mutex::new(HashMap::new()),
            clock: AtomicI64::new(now()),
            broke: Mutex::new(HashSet::new()),
            token_holders: Mutex::new(HashSet::new()),
            fail_next: Mutex::new(None),
            init_tallies: Mutex::new(Vec::new()),
            votes: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_clock(&self, ts: i64) {
        self.clock.store(ts, Ordering::SeqCst);
    }

    /// Payer has no lamports for rent.
    pub fn mark_broke(&self, payer: Pubkey) {
        self.broke.lock().unwrap().insert(payer);
    }

    /// Give `token_account` a positive balance of a gated mint.
    pub fn fund_token_account(&self, token_account: Pubkey) {
        self.token_holders.lock().unwrap().insert(token_account);
    }

    pub fn fail_next_send(&self, raw: &str) {
        *self.fail_next.lock().unwrap() = Some(raw.to_string());
    }

    pub fn insert_account(&self, address: Pubkey, data: Vec<u8>, owner: Pubkey) {
        self.accounts.lock().unwrap().insert(
            address,
            Account {
                lamports: 1_000_000,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    pub fn insert_proposal(&self, address: Pubkey, account: &ProposalAccount) {
        self.insert_account(address, account.to_account_data(), self.program_id);
    }

    pub fn proposal(&self, address: &Pubkey) -> Option<ProposalAccount> {
        let accounts = self.accounts.lock().unwrap();
        let data = &accounts.get(address)?.data;
        ProposalAccount::deserialize(&mut &data[8..]).ok()
    }

    fn store_proposal(&self, address: Pubkey, account: &ProposalAccount) {
        self.insert_proposal(address, account);
    }

    fn exists(&self, address: &Pubkey) -> bool {
        self.accounts.lock().unwrap().contains_key(address)
    }

    fn charge_rent(&self, payer: &Pubkey) -> Result<(), String> {
        if self.broke.lock().unwrap().contains(payer) {
            return Err(format!(
                "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x1. \
                 Logs: [\"Transfer: insufficient lamports 0, need 2672640\"] payer {}",
                payer
            ));
        }
        Ok(())
    }

    fn execute(&self, ix: &Instruction, signer: &Pubkey) -> Result<(), String> {
        if ix.program_id != self.program_id {
            return Err("Attempt to load a program that does not exist".to_string());
        }
        if ix.data.len() < 8 {
            return Err("InstructionFallbackNotFound".to_string());
        }
        let key = |i: usize| ix.accounts[i].pubkey;
        let mut discriminator = [0u8; 8];
        discriminator.copy_from_slice(&ix.data[..8]);

        match discriminator {
            CREATE_PROPOSAL_DISCRIMINATOR => {
                let args = CreateProposalArgs::decode(&ix.data).map_err(|e| e.to_string())?;
                let (proposal, creator) = (key(0), key(1));
                require_signer(ix, 1, signer)?;
                let expected = pda::proposal_address(&self.program_id, &creator, args.proposal_salt)
                    .map_err(|e| e.to_string())?;
                if expected != proposal {
                    return Err(anchor_error("ConstraintSeeds", "A seeds constraint was violated"));
                }
                if self.exists(&proposal) {
                    return Err(already_in_use(&proposal));
                }
                self.charge_rent(&creator)?;
                let account = ProposalAccount {
                    creator,
                    title: args.title,
                    options: args.options.clone(),
                    start_time: args.start_time,
                    end_time: args.end_time,
                    eligibility_mode: args.eligibility_mode,
                    tally_initialized: false,
                    finalized: false,
                    finalize_signature: [0; 32],
                    results: vec![0; args.options.len()],
                    bump: 255,
                    mint: if args.eligibility_mode == 2 { key(2) } else { Pubkey::default() },
                    whitelist: args.whitelist,
                    version: 1,
                    vote_count: 0,
                };
                self.store_proposal(proposal, &account);
                Ok(())
            }
            INIT_TALLY_DISCRIMINATOR => {
                let args = InitTallyArgs::decode(&ix.data).map_err(|e| e.to_string())?;
                let (creator, proposal_key, tally) = (key(0), key(1), key(2));
                require_signer(ix, 0, signer)?;
                let mut proposal = self.proposal(&proposal_key).ok_or_else(account_not_initialized)?;
                if proposal.creator != creator {
                    return Err(anchor_error("ConstraintHasOne", "A has one constraint was violated"));
                }
                if self.exists(&tally) {
                    return Err(already_in_use(&tally));
                }
                if proposal.tally_initialized {
                    return Err(anchor_error("AlreadyInitialized", "Already initialized"));
                }
                self.charge_rent(&creator)?;
                proposal.tally_initialized = true;
                self.store_proposal(proposal_key, &proposal);
                let tally_account = EncryptedTallyAccount {
                    proposal: proposal_key,
                    last_encrypted_vote: [0; 32],
                    bump: 255,
                };
                self.insert_account(tally, tally_account.to_account_data(), self.program_id);
                self.init_tallies.lock().unwrap().push(args);
                Ok(())
            }
            CAST_VOTE_DISCRIMINATOR => {
                let args = CastVoteArgs::decode(&ix.data).map_err(|e| e.to_string())?;
                let (voter, proposal_key, tally, record, voter_token) = (key(0), key(1), key(2), key(3), key(4));
                require_signer(ix, 0, signer)?;
                let mut proposal = self.proposal(&proposal_key).ok_or_else(account_not_initialized)?;
                if self.exists(&record) {
                    return Err(already_in_use(&record));
                }
                self.charge_rent(&voter)?;

                let clock = self.clock.load(Ordering::SeqCst);
                if !proposal.tally_initialized {
                    return Err(anchor_error("TallyNotInitialized", "Tally not initialized"));
                }
                if clock < proposal.start_time {
                    return Err(anchor_error("VotingNotStarted", "Voting has not started"));
                }
                if clock > proposal.end_time {
                    return Err(anchor_error("VotingEnded", "Voting has ended"));
                }
                if proposal.finalized {
                    return Err(anchor_error("AlreadyFinalized", "Already finalized"));
                }
                if proposal.eligibility_mode == 1 && !proposal.whitelist.contains(&voter) {
                    return Err(anchor_error("NotWhitelisted", "Voter is not whitelisted"));
                }
                if proposal.eligibility_mode == 2 {
                    if voter_token == self.program_id {
                        return Err(anchor_error("TokenAccountRequired", "Token account required for this proposal"));
                    }
                    if voter_token != pda::voter_token_address(&voter, &proposal.mint) {
                        return Err(anchor_error("InvalidMint", "Token mint does not match proposal"));
                    }
                    if !self.token_holders.lock().unwrap().contains(&voter_token) {
                        return Err(anchor_error("InsufficientTokens", "Insufficient token balance"));
                    }
                }

                proposal.vote_count += 1;
                if let Some(slot) = proposal.results.get_mut(usize::from(args.vote_index)) {
                    *slot += 1;
                }
                self.store_proposal(proposal_key, &proposal);
                let tally_account = EncryptedTallyAccount {
                    proposal: proposal_key,
                    last_encrypted_vote: args.encrypted_vote,
                    bump: 255,
                };
                self.insert_account(tally, tally_account.to_account_data(), self.program_id);
                self.insert_account(record, VOTER_RECORD_DISCRIMINATOR.to_vec(), self.program_id);
                self.votes.lock().unwrap().push(args);
                Ok(())
            }
            FINALIZE_TALLY_DISCRIMINATOR => {
                let proposal_key = key(1);
                require_signer(ix, 0, signer)?;
                let mut proposal = self.proposal(&proposal_key).ok_or_else(account_not_initialized)?;
                if self.clock.load(Ordering::SeqCst) <= proposal.end_time {
                    return Err(anchor_error("VotingNotEnded", "Voting has not ended yet"));
                }
                if proposal.finalized {
                    return Err(anchor_error("AlreadyFinalized", "Already finalized"));
                }
                proposal.finalized = true;
                self.store_proposal(proposal_key, &proposal);
                Ok(())
            }
            _ => Err("InstructionFallbackNotFound".to_string()),
        }
    }
}

fn require_signer(ix: &Instruction, index: usize, signer: &Pubkey) -> Result<(), String> {
    let meta = &ix.accounts[index];
    if !meta.is_signer || meta.pubkey != *signer {
        return Err("missing required signature for instruction".to_string());
    }
    Ok(())
}

fn anchor_error(code: &str, message: &str) -> String {
    format!("AnchorError occurred. Error Code: {}. Error Message: {}.", code, message)
}

fn already_in_use(address: &Pubkey) -> String {
    format!(
        "Allocate: account Address {{ address: {}, base: None }} already in use",
        address
    )
}

fn account_not_initialized() -> String {
    anchor_error(
        "AccountNotInitialized",
        "The program expected this account to be already initialized",
    )
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, VoteError> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program: &Pubkey,
        discriminator: &[u8],
    ) -> Result<Vec<(Pubkey, Account)>, VoteError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, a)| a.owner == *program && a.data.starts_with(discriminator))
            .map(|(k, a)| (*k, a.clone()))
            .collect())
    }

    async fn send_instruction(&self, instruction: Instruction, payer: &Keypair) -> Result<Signature, VoteError> {
        self.sent.lock().unwrap().push(instruction.clone());
        if let Some(raw) = self.fail_next.lock().unwrap().take() {
            return Err(VoteError::Rpc(raw));
        }
        self.execute(&instruction, &payer.pubkey())
            .map(|_| Signature::new_unique())
            .map_err(VoteError::Rpc)
    }

    async fn subscribe_program(&self, _program: &Pubkey, _discriminator: &[u8]) -> Result<ProgramSubscription, VoteError> {
        Err(VoteError::Rpc("websocket unavailable".to_string()))
    }
}

/// Key source with a fixed answer.
pub struct StaticKeySource {
    pub mxe_account: Pubkey,
    pub exists: bool,
    pub key: Option<[u8; 32]>,
}

impl StaticKeySource {
    pub fn ready() -> Self {
        Self {
            mxe_account: Pubkey::new_unique(),
            exists: true,
            key: Some(network_public_key()),
        }
    }

    pub fn missing() -> Self {
        Self {
            mxe_account: Pubkey::new_unique(),
            exists: false,
            key: None,
        }
    }

    pub fn unfinalized() -> Self {
        Self {
            mxe_account: Pubkey::new_unique(),
            exists: true,
            key: None,
        }
    }
}

#[async_trait]
impl NetworkKeySource for StaticKeySource {
    fn mxe_account(&self) -> Pubkey {
        self.mxe_account
    }

    async fn mxe_account_exists(&self) -> Result<bool, VoteError> {
        Ok(self.exists)
    }

    async fn fetch_public_key(&self) -> Result<Option<[u8; 32]>, VoteError> {
        Ok(self.key)
    }
}

/// A proposal record in the current layout with sensible defaults.
pub fn proposal_account(creator: Pubkey, title: &str, start_time: i64, end_time: i64) -> ProposalAccount {
    use cipherballot_cli::instructions::pad_text;
    ProposalAccount {
        creator,
        title: pad_text(title),
        options: vec![pad_text("Yes"), pad_text("No")],
        start_time,
        end_time,
        eligibility_mode: 0,
        tally_initialized: true,
        finalized: false,
        finalize_signature: [0; 32],
        results: vec![0, 0],
        bump: 255,
        mint: Pubkey::default(),
        whitelist: vec![],
        version: 1,
        vote_count: 0,
    }
}

/// Raw data of a pre-layout-change proposal account.
pub fn legacy_proposal_data(len: usize) -> Vec<u8> {
    let mut data = PROPOSAL_DISCRIMINATOR.to_vec();
    data.resize(len, 1);
    data
}
