//! Decoding of the program's account records.
//!
//! Proposal records have gone through layout and naming changes. Every shape
//! the client still accepts is listed in [`ProposalSchema`] and mapped onto
//! the one logical [`ProposalRecord`] by [`ProposalSchema::migrate`].

use std::str::FromStr;

use anchor_lang::prelude::borsh;
use anchor_lang::{AnchorDeserialize, AnchorSerialize};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::errors::VoteError;
use crate::instructions::{trim_text, MAX_OPTIONS, MAX_WHITELIST, MIN_OPTIONS, OPTION_MAX_LEN, TITLE_MAX_LEN};

pub const PROPOSAL_DISCRIMINATOR: [u8; 8] = [26, 94, 189, 187, 116, 136, 53, 33];
pub const ENCRYPTED_TALLY_DISCRIMINATOR: [u8; 8] = [225, 85, 36, 119, 69, 71, 7, 1];
pub const VOTER_RECORD_DISCRIMINATOR: [u8; 8] = [178, 96, 138, 116, 143, 202, 115, 33];

/// Allocated size of a current-layout proposal account.
pub const PROPOSAL_ACCOUNT_LEN: usize = 8
    + 32
    + TITLE_MAX_LEN
    + 4 + (MAX_OPTIONS * OPTION_MAX_LEN)
    + 8
    + 8
    + 1
    + 1
    + 1
    + 32
    + 4 + (8 * MAX_OPTIONS)
    + 1
    + 32
    + 4 + (MAX_WHITELIST * 32)
    + 1
    + 8;

/// Accounts shorter than this predate the fixed-width title/option layout.
pub const DEFAULT_MIN_CURRENT_LEN: usize = 1000;

/// `sha256("<namespace>:<name>")[..8]`, the Anchor discriminator scheme.
pub fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let preimage = format!("{}:{}", namespace, name);
    let hash = Sha256::digest(preimage.as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Current on-chain proposal layout, field for field.
#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProposalAccount {
    pub creator: Pubkey,
    pub title: [u8; TITLE_MAX_LEN],
    pub options: Vec<[u8; OPTION_MAX_LEN]>,
    pub start_time: i64,
    pub end_time: i64,
    pub eligibility_mode: u8,
    pub tally_initialized: bool,
    pub finalized: bool,
    pub finalize_signature: [u8; 32],
    pub results: Vec<u64>,
    pub bump: u8,
    pub mint: Pubkey,
    pub whitelist: Vec<Pubkey>,
    pub version: u8,
    pub vote_count: u64,
}

impl ProposalAccount {
    /// Account bytes as the program stores them, zero padded to the
    /// allocated length.
    pub fn to_account_data(&self) -> Vec<u8> {
        let mut data = PROPOSAL_DISCRIMINATOR.to_vec();
        self.serialize(&mut data).unwrap_or_default();
        if data.len() < PROPOSAL_ACCOUNT_LEN {
            data.resize(PROPOSAL_ACCOUNT_LEN, 0);
        }
        data
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncryptedTallyAccount {
    pub proposal: Pubkey,
    pub last_encrypted_vote: [u8; 32],
    pub bump: u8,
}

impl EncryptedTallyAccount {
    pub fn to_account_data(&self) -> Vec<u8> {
        let mut data = ENCRYPTED_TALLY_DISCRIMINATOR.to_vec();
        self.serialize(&mut data).unwrap_or_default();
        data
    }
}

/// Who may vote on a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Open,
    Whitelist { voters: Vec<Pubkey> },
    TokenGated { mint: Pubkey },
}

impl Eligibility {
    pub fn mode(&self) -> u8 {
        match self {
            Eligibility::Open => 0,
            Eligibility::Whitelist { .. } => 1,
            Eligibility::TokenGated { .. } => 2,
        }
    }

    pub fn from_parts(mode: u8, whitelist: Vec<Pubkey>, mint: Pubkey) -> Result<Self, String> {
        match mode {
            0 => Ok(Eligibility::Open),
            1 => Ok(Eligibility::Whitelist { voters: whitelist }),
            2 => Ok(Eligibility::TokenGated { mint }),
            other => Err(format!("unknown eligibility mode {}", other)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Eligibility::Open => "Open",
            Eligibility::Whitelist { .. } => "Whitelist",
            Eligibility::TokenGated { .. } => "Token gated",
        }
    }
}

/// A proposal after decoding and schema migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRecord {
    pub creator: Pubkey,
    pub title: String,
    pub options: Vec<String>,
    pub start_ts: i64,
    pub end_ts: i64,
    pub eligibility: Eligibility,
    pub tally_initialized: bool,
    pub finalized: bool,
    pub finalization_sig: [u8; 32],
    pub final_tally: Vec<u64>,
    pub vote_count: u64,
}

impl ProposalRecord {
    fn validate(self) -> Result<Self, String> {
        let count = self.options.len();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
            return Err(format!("option count {} outside [{}, {}]", count, MIN_OPTIONS, MAX_OPTIONS));
        }
        if self.end_ts <= self.start_ts {
            return Err(format!("end {} is not after start {}", self.end_ts, self.start_ts));
        }
        if self.finalized && !self.tally_initialized {
            return Err("finalized without an initialized tally".to_string());
        }
        if !self.final_tally.is_empty() && self.final_tally.len() != count {
            return Err(format!(
                "tally has {} entries for {} options",
                self.final_tally.len(),
                count
            ));
        }
        Ok(self)
    }
}

/// Every record shape the decoder accepts.
#[derive(Debug, Clone)]
pub enum ProposalSchema {
    /// Borsh account data in the current layout.
    Current(ProposalAccount),
    /// IDL-rendered JSON, camelCase or snake_case per field.
    Idl(IdlProposal),
}

impl ProposalSchema {
    /// Map any accepted shape onto the logical record and check its invariants.
    pub fn migrate(self) -> Result<ProposalRecord, String> {
        let record = match self {
            ProposalSchema::Current(account) => ProposalRecord {
                creator: account.creator,
                title: trim_text(&account.title),
                options: account.options.iter().map(|o| trim_text(o)).collect(),
                start_ts: account.start_time,
                end_ts: account.end_time,
                eligibility: Eligibility::from_parts(
                    account.eligibility_mode,
                    account.whitelist,
                    account.mint,
                )?,
                tally_initialized: account.tally_initialized,
                finalized: account.finalized,
                finalization_sig: account.finalize_signature,
                final_tally: if account.finalized { account.results } else { Vec::new() },
                vote_count: account.vote_count,
            },
            ProposalSchema::Idl(json) => json.into_record()?,
        };
        record.validate()
    }
}

/// Limits that separate current records from historical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodePolicy {
    pub min_current_len: usize,
    /// Proposals starting before this are known-broken and hidden.
    pub min_display_ts: i64,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self {
            min_current_len: DEFAULT_MIN_CURRENT_LEN,
            min_display_ts: 0,
        }
    }
}

/// Result of looking at one raw proposal account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Proposal(ProposalRecord),
    /// Shorter than the current layout; never shown.
    Legacy { len: usize },
    /// Decoded but hidden by the display cutoff.
    Hidden { start_ts: i64 },
}

/// Decode one proposal account.
pub fn decode_proposal(address: &Pubkey, data: &[u8], policy: &DecodePolicy) -> Result<Decoded, VoteError> {
    if data.len() < 8 || data[..8] != PROPOSAL_DISCRIMINATOR {
        return Err(VoteError::decode(*address, "not a proposal account"));
    }
    if data.len() < policy.min_current_len {
        return Ok(Decoded::Legacy { len: data.len() });
    }

    let account = ProposalAccount::deserialize(&mut &data[8..])
        .map_err(|e| VoteError::decode(*address, e.to_string()))?;
    let record = ProposalSchema::Current(account)
        .migrate()
        .map_err(|reason| VoteError::decode(*address, reason))?;

    if record.start_ts < policy.min_display_ts {
        return Ok(Decoded::Hidden {
            start_ts: record.start_ts,
        });
    }
    Ok(Decoded::Proposal(record))
}

/// Decode a fetched batch. Legacy, hidden and undecodable accounts are
/// logged and left out; they never fail the batch.
pub fn decode_batch(accounts: &[(Pubkey, Account)], policy: &DecodePolicy) -> Vec<(Pubkey, ProposalRecord)> {
    let decoded: Vec<_> = accounts
        .iter()
        .filter_map(|(address, account)| match decode_proposal(address, &account.data, policy) {
            Ok(Decoded::Proposal(record)) => Some((*address, record)),
            Ok(Decoded::Legacy { len }) => {
                warn!(%address, len, "skipping legacy proposal account");
                None
            }
            Ok(Decoded::Hidden { start_ts }) => {
                debug!(%address, start_ts, "skipping proposal before display cutoff");
                None
            }
            Err(e) => {
                warn!(%address, error = %e, "failed to decode proposal");
                None
            }
        })
        .collect();
    debug!(fetched = accounts.len(), parsed = decoded.len(), "decoded proposal batch");
    decoded
}

/// Decode the JSON rendering of a proposal (e.g. `anchor account` output).
pub fn decode_proposal_json(json: &str) -> Result<ProposalRecord, String> {
    ProposalSchema::Idl(IdlProposal::from_json(json)?).migrate()
}

// Keys each JSON field may appear under, in lookup order. Every field is
// resolved on its own, so one record may mix naming styles.
const CREATOR_KEYS: &[&str] = &["creator"];
const TITLE_KEYS: &[&str] = &["title"];
const OPTIONS_KEYS: &[&str] = &["options"];
const START_TIME_KEYS: &[&str] = &["startTime", "start_time"];
const END_TIME_KEYS: &[&str] = &["endTime", "end_time"];
const ELIGIBILITY_MODE_KEYS: &[&str] = &["eligibilityMode", "eligibility_mode"];
const TALLY_INITIALIZED_KEYS: &[&str] = &["tallyInitialized", "tally_initialized"];
const FINALIZED_KEYS: &[&str] = &["finalized"];
const FINALIZE_SIGNATURE_KEYS: &[&str] = &["finalizeSignature", "finalize_signature"];
/// `results` was renamed to `finalTally` in a later IDL.
const FINAL_TALLY_KEYS: &[&str] = &["results", "finalTally", "final_tally"];
const MINT_KEYS: &[&str] = &["mint"];
const WHITELIST_KEYS: &[&str] = &["whitelist"];
const VOTE_COUNT_KEYS: &[&str] = &["voteCount", "vote_count"];

/// IDL-rendered proposal with every field resolved to a single value.
#[derive(Debug, Clone)]
pub struct IdlProposal {
    pub creator: String,
    pub title: TextField,
    pub options: Vec<TextField>,
    pub start_time: WideInt,
    pub end_time: WideInt,
    pub eligibility_mode: WideInt,
    pub tally_initialized: bool,
    pub finalized: bool,
    pub finalize_signature: Option<String>,
    pub final_tally: Vec<WideInt>,
    pub mint: Option<String>,
    pub whitelist: Vec<String>,
    pub vote_count: WideInt,
}

impl IdlProposal {
    pub fn from_json(json: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let object = value.as_object().ok_or("proposal JSON must be an object")?;
        Ok(Self {
            creator: required(object, CREATOR_KEYS)?,
            title: required(object, TITLE_KEYS)?,
            options: required(object, OPTIONS_KEYS)?,
            start_time: required(object, START_TIME_KEYS)?,
            end_time: required(object, END_TIME_KEYS)?,
            eligibility_mode: field(object, ELIGIBILITY_MODE_KEYS)?.unwrap_or_default(),
            tally_initialized: field(object, TALLY_INITIALIZED_KEYS)?.unwrap_or_default(),
            finalized: field(object, FINALIZED_KEYS)?.unwrap_or_default(),
            finalize_signature: field(object, FINALIZE_SIGNATURE_KEYS)?,
            final_tally: field(object, FINAL_TALLY_KEYS)?.unwrap_or_default(),
            mint: field(object, MINT_KEYS)?,
            whitelist: field(object, WHITELIST_KEYS)?.unwrap_or_default(),
            vote_count: field(object, VOTE_COUNT_KEYS)?.unwrap_or_default(),
        })
    }

    fn into_record(self) -> Result<ProposalRecord, String> {
        let mint = match self.mint {
            Some(mint) => parse_pubkey(&mint)?,
            None => Pubkey::default(),
        };
        let whitelist = self
            .whitelist
            .iter()
            .map(|key| parse_pubkey(key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProposalRecord {
            creator: parse_pubkey(&self.creator)?,
            title: self.title.into_text(),
            options: self.options.into_iter().map(TextField::into_text).collect(),
            start_ts: self.start_time.to_i64(),
            end_ts: self.end_time.to_i64(),
            eligibility: Eligibility::from_parts(self.eligibility_mode.to_u8(), whitelist, mint)?,
            tally_initialized: self.tally_initialized,
            finalized: self.finalized,
            finalization_sig: parse_signature(self.finalize_signature.as_deref())?,
            final_tally: if self.finalized {
                self.final_tally.into_iter().map(WideInt::to_u64).collect()
            } else {
                Vec::new()
            },
            vote_count: self.vote_count.to_u64(),
        })
    }
}

/// The first present, non-null key in `keys`.
fn field<T: DeserializeOwned>(object: &Map<String, Value>, keys: &[&str]) -> Result<Option<T>, String> {
    match keys.iter().find_map(|key| object.get(*key).filter(|v| !v.is_null()).map(|v| (key, v))) {
        None => Ok(None),
        Some((key, value)) => T::deserialize(value)
            .map(Some)
            .map_err(|e| format!("field {}: {}", key, e)),
    }
}

fn required<T: DeserializeOwned>(object: &Map<String, Value>, keys: &[&str]) -> Result<T, String> {
    field(object, keys)?.ok_or_else(|| format!("missing field {}", keys.join(" or ")))
}

fn parse_pubkey(value: &str) -> Result<Pubkey, String> {
    Pubkey::from_str(value).map_err(|_| format!("invalid public key '{}'", value))
}

fn parse_signature(value: Option<&str>) -> Result<[u8; 32], String> {
    match value {
        None => Ok([0u8; 32]),
        Some(text) => Ok(parse_pubkey(text)?.to_bytes()),
    }
}

/// Fixed-width text rendered either as a byte array or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Bytes(Vec<u8>),
    Text(String),
}

impl TextField {
    pub fn into_text(self) -> String {
        match self {
            TextField::Bytes(bytes) => trim_text(&bytes),
            TextField::Text(text) => trim_text(text.as_bytes()),
        }
    }
}

/// An integer of any width as JSON renders it. JSON numbers are decimal.
/// Strings are Anchor BN renderings, which are hex with an optional `0x`
/// prefix and sign. Unparsable input reads as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WideInt(pub i128);

impl WideInt {
    pub fn to_u64(self) -> u64 {
        self.0.clamp(0, u64::MAX as i128) as u64
    }

    pub fn to_i64(self) -> i64 {
        self.0.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn to_u8(self) -> u8 {
        self.0.clamp(0, u8::MAX as i128) as u8
    }

    /// Parse a BN hex string.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let hex = digits.strip_prefix("0x").unwrap_or(digits);
        let magnitude = parse_saturating(hex, 16);
        match magnitude {
            Some(value) if negative => WideInt(-value),
            Some(value) => WideInt(value),
            None => WideInt(0),
        }
    }
}

fn parse_saturating(digits: &str, radix: u32) -> Option<i128> {
    if digits.is_empty() {
        return None;
    }
    let mut value: i128 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(radix)? as i128;
        value = value.saturating_mul(radix as i128).saturating_add(digit);
    }
    Some(value)
}

impl<'de> Deserialize<'de> for WideInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    WideInt(v as i128)
                } else if let Some(v) = n.as_u64() {
                    WideInt(v as i128)
                } else {
                    // Float casts saturate.
                    n.as_f64().map(|v| WideInt(v as i128)).unwrap_or_default()
                }
            }
            serde_json::Value::String(s) => WideInt::parse(&s),
            _ => WideInt(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::pad_text;

    fn sample_account() -> ProposalAccount {
        ProposalAccount {
            creator: Pubkey::new_unique(),
            title: pad_text("Treasury"),
            options: vec![pad_text("Yes"), pad_text("No")],
            start_time: 100,
            end_time: 200,
            eligibility_mode: 0,
            tally_initialized: true,
            finalized: false,
            finalize_signature: [0; 32],
            results: vec![0, 0],
            bump: 254,
            mint: Pubkey::default(),
            whitelist: vec![],
            version: 1,
            vote_count: 3,
        }
    }

    #[test]
    fn test_account_discriminators_match_sighash() {
        assert_eq!(sighash("account", "Proposal"), PROPOSAL_DISCRIMINATOR);
        assert_eq!(sighash("account", "EncryptedTally"), ENCRYPTED_TALLY_DISCRIMINATOR);
        assert_eq!(sighash("account", "VoterRecord"), VOTER_RECORD_DISCRIMINATOR);
    }

    #[test]
    fn test_account_len() {
        assert_eq!(PROPOSAL_ACCOUNT_LEN, 3409);
        assert_eq!(sample_account().to_account_data().len(), PROPOSAL_ACCOUNT_LEN);
    }

    #[test]
    fn test_decode_current_layout() {
        let address = Pubkey::new_unique();
        let data = sample_account().to_account_data();

        let record = match decode_proposal(&address, &data, &DecodePolicy::default()).unwrap() {
            Decoded::Proposal(record) => record,
            other => panic!("expected a proposal, got {:?}", other),
        };
        assert_eq!(record.title, "Treasury");
        assert_eq!(record.options, vec!["Yes", "No"]);
        assert_eq!(record.vote_count, 3);
        assert!(record.final_tally.is_empty());
    }

    #[test]
    fn test_wrong_discriminator_is_rejected() {
        let mut data = sample_account().to_account_data();
        data[0] ^= 0xff;
        let err = decode_proposal(&Pubkey::new_unique(), &data, &DecodePolicy::default()).unwrap_err();
        assert!(matches!(err, VoteError::Decode { .. }));
    }

    #[test]
    fn test_short_record_is_legacy() {
        // Parseable under the current layout, but too short to be a
        // current-schema account.
        let mut data = sample_account().to_account_data();
        data.truncate(600);

        let decoded = decode_proposal(&Pubkey::new_unique(), &data, &DecodePolicy::default()).unwrap();
        assert_eq!(decoded, Decoded::Legacy { len: 600 });
    }

    #[test]
    fn test_display_cutoff_hides_old_records() {
        let policy = DecodePolicy {
            min_display_ts: 150,
            ..DecodePolicy::default()
        };
        let data = sample_account().to_account_data();
        let decoded = decode_proposal(&Pubkey::new_unique(), &data, &policy).unwrap();
        assert_eq!(decoded, Decoded::Hidden { start_ts: 100 });
    }

    #[test]
    fn test_invariants_are_enforced() {
        let mut account = sample_account();
        account.options = vec![pad_text("Only")];
        let data = account.to_account_data();
        assert!(decode_proposal(&Pubkey::new_unique(), &data, &DecodePolicy::default()).is_err());

        let mut account = sample_account();
        account.finalized = true;
        account.tally_initialized = false;
        let data = account.to_account_data();
        assert!(decode_proposal(&Pubkey::new_unique(), &data, &DecodePolicy::default()).is_err());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let good = sample_account().to_account_data();
        let mut legacy = good.clone();
        legacy.truncate(600);
        let mut corrupt = good.clone();
        corrupt[8 + 32 + 128] = 0xff; // option count prefix

        let account = |data: Vec<u8>| Account {
            lamports: 1,
            data,
            owner: Pubkey::new_unique(),
            executable: false,
            rent_epoch: 0,
        };
        let good_key = Pubkey::new_unique();
        let batch = vec![
            (Pubkey::new_unique(), account(legacy)),
            (good_key, account(good)),
            (Pubkey::new_unique(), account(corrupt)),
        ];

        let decoded = decode_batch(&batch, &DecodePolicy::default());
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, good_key);
    }

    #[test]
    fn test_finalized_results_become_final_tally() {
        let mut account = sample_account();
        account.finalized = true;
        account.results = vec![4, 1];
        let data = account.to_account_data();

        let Decoded::Proposal(record) =
            decode_proposal(&Pubkey::new_unique(), &data, &DecodePolicy::default()).unwrap()
        else {
            panic!("expected a proposal");
        };
        assert_eq!(record.final_tally, vec![4, 1]);
    }

    #[test]
    fn test_json_camel_and_snake_case_agree() {
        let creator = Pubkey::new_unique().to_string();
        let camel = format!(
            r#"{{"creator":"{}","title":[84,0,0],"options":["Yes","No\u0000"],
                "startTime":"64","endTime":200,"eligibilityMode":0,
                "tallyInitialized":true,"finalized":true,"results":["3","1"],"voteCount":"4"}}"#,
            creator
        );
        let snake = format!(
            r#"{{"creator":"{}","title":"T","options":["Yes","No"],
                "start_time":100,"end_time":200,"eligibility_mode":0,
                "tally_initialized":true,"finalized":true,"final_tally":[3,1],"vote_count":4}}"#,
            creator
        );

        let a = decode_proposal_json(&camel).unwrap();
        let b = decode_proposal_json(&snake).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.title, "T");
        assert_eq!(a.start_ts, 100);
        assert_eq!(a.final_tally, vec![3, 1]);
    }

    #[test]
    fn test_json_final_tally_alias() {
        let json = format!(
            r#"{{"creator":"{}","title":"T","options":["A","B"],"startTime":1,"endTime":2,
                "tallyInitialized":true,"finalized":true,"finalTally":[5,6]}}"#,
            Pubkey::new_unique()
        );
        assert_eq!(decode_proposal_json(&json).unwrap().final_tally, vec![5, 6]);
    }

    #[test]
    fn test_wide_int_saturates() {
        assert_eq!(WideInt::parse("ffffffffffffffffffffffffffffffff").to_u64(), u64::MAX);
        assert_eq!(WideInt::parse("-5").to_u64(), 0);
        assert_eq!(WideInt::parse("-5").to_i64(), -5);
        assert_eq!(WideInt::parse("not a number").to_u64(), 0);
    }

    #[test]
    fn test_wide_int_strings_are_bn_hex() {
        assert_eq!(WideInt::parse("64").to_i64(), 100);
        assert_eq!(WideInt::parse("c8").to_i64(), 200);
        assert_eq!(WideInt::parse("0x10").to_i64(), 16);
        assert_eq!(WideInt::parse("10").to_u64(), 16);
    }

    #[test]
    fn test_json_numbers_are_decimal_and_strings_hex() {
        let json = format!(
            r#"{{"creator":"{}","title":"T","options":["A","B"],
                "startTime":"64","endTime":"c8","voteCount":"10","eligibilityMode":0}}"#,
            Pubkey::new_unique()
        );
        let record = decode_proposal_json(&json).unwrap();
        assert_eq!(record.start_ts, 100);
        assert_eq!(record.end_ts, 200);
        assert_eq!(record.vote_count, 16);

        let json = format!(
            r#"{{"creator":"{}","title":"T","options":["A","B"],
                "startTime":64,"endTime":200,"voteCount":10}}"#,
            Pubkey::new_unique()
        );
        let record = decode_proposal_json(&json).unwrap();
        assert_eq!(record.start_ts, 64);
        assert_eq!(record.vote_count, 10);

        let json = format!(
            r#"{{"creator":"{}","title":"T","options":["A","B"],
                "startTime":64,"endTime":200,"voteCount":1e20}}"#,
            Pubkey::new_unique()
        );
        assert_eq!(decode_proposal_json(&json).unwrap().vote_count, u64::MAX);
    }

    #[test]
    fn test_json_fields_resolve_independently() {
        let json = format!(
            r#"{{"creator":"{}","title":"T","options":["A","B"],
                "startTime":100,"end_time":200,
                "tally_initialized":true,"vote_count":7}}"#,
            Pubkey::new_unique()
        );
        let record = decode_proposal_json(&json).unwrap();
        assert_eq!(record.end_ts, 200);
        assert!(record.tally_initialized);
        assert_eq!(record.vote_count, 7);
    }

    #[test]
    fn test_json_camel_key_wins_over_snake() {
        let json = format!(
            r#"{{"creator":"{}","title":"T","options":["A","B"],
                "startTime":100,"start_time":5,"endTime":200}}"#,
            Pubkey::new_unique()
        );
        assert_eq!(decode_proposal_json(&json).unwrap().start_ts, 100);
    }

    #[test]
    fn test_json_missing_times_is_an_error() {
        let err = decode_proposal_json(r#"{"creator":"x","title":"T","options":[]}"#).unwrap_err();
        assert!(err.contains("missing field startTime or start_time"));
    }
}
