//! UI-agnostic proposal view model.

use std::cmp::Ordering;

use serde_json::json;
use solana_sdk::pubkey::Pubkey;

use crate::accounts::{Eligibility, ProposalRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Upcoming,
    Active,
    Ended,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Upcoming => "Upcoming",
            ProposalStatus::Active => "Active",
            ProposalStatus::Ended => "Ended",
        }
    }
}

/// Voting is open on both boundary seconds.
pub fn derive_status(start_ts: i64, end_ts: i64, now: i64) -> ProposalStatus {
    if now < start_ts {
        ProposalStatus::Upcoming
    } else if now > end_ts {
        ProposalStatus::Ended
    } else {
        ProposalStatus::Active
    }
}

/// A proposal as consumers see it. Built fresh on every read; the status is
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalView {
    pub address: Pubkey,
    pub creator: Pubkey,
    pub title: String,
    pub options: Vec<String>,
    pub start_ts: i64,
    pub end_ts: i64,
    pub votes_cast: u64,
    pub tally_initialized: bool,
    pub finalized: bool,
    pub final_tally: Vec<u64>,
    pub finalization_sig: [u8; 32],
    pub eligibility: Eligibility,
    pub status: ProposalStatus,
}

pub fn build_view(address: Pubkey, record: &ProposalRecord, now: i64) -> ProposalView {
    ProposalView {
        address,
        creator: record.creator,
        title: record.title.clone(),
        options: record.options.clone(),
        start_ts: record.start_ts,
        end_ts: record.end_ts,
        votes_cast: record.vote_count,
        tally_initialized: record.tally_initialized,
        finalized: record.finalized,
        final_tally: record.final_tally.clone(),
        finalization_sig: record.finalization_sig,
        eligibility: record.eligibility.clone(),
        status: derive_status(record.start_ts, record.end_ts, now),
    }
}

impl ProposalView {
    pub fn required_mint(&self) -> Option<Pubkey> {
        match &self.eligibility {
            Eligibility::TokenGated { mint } => Some(*mint),
            _ => None,
        }
    }

    pub fn whitelist(&self) -> &[Pubkey] {
        match &self.eligibility {
            Eligibility::Whitelist { voters } => voters,
            _ => &[],
        }
    }

    pub fn total_votes(&self) -> u64 {
        if self.finalized {
            self.final_tally.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
        } else {
            self.votes_cast
        }
    }

    /// Share of the final tally per option, in percent. Empty until finalized.
    pub fn percentages(&self) -> Vec<f64> {
        let total = self.total_votes();
        if !self.finalized || total == 0 {
            return vec![0.0; self.final_tally.len()];
        }
        self.final_tally
            .iter()
            .map(|v| *v as f64 * 100.0 / total as f64)
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "address": self.address.to_string(),
            "creator": self.creator.to_string(),
            "title": self.title,
            "options": self.options,
            "startTs": self.start_ts,
            "endTs": self.end_ts,
            "votesCast": self.votes_cast,
            "tallyInitialized": self.tally_initialized,
            "finalized": self.finalized,
            "finalTally": self.final_tally,
            "finalizationSig": bs58::encode(self.finalization_sig).into_string(),
            "eligibilityMode": self.eligibility.mode(),
            "requiredMint": self.required_mint().map(|m| m.to_string()).unwrap_or_default(),
            "whitelist": self.whitelist().iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            "status": self.status.as_str(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest start time first.
    #[default]
    Newest,
    /// Finalized proposals first, newest first within each group.
    FinalizedFirst,
    /// Ended proposals last, newest first within each group.
    EndedLast,
}

pub fn sort_views(views: &mut [ProposalView], order: SortOrder) {
    let newest = |a: &ProposalView, b: &ProposalView| b.start_ts.cmp(&a.start_ts);
    match order {
        SortOrder::Newest => views.sort_by(newest),
        SortOrder::FinalizedFirst => views.sort_by(|a, b| match (a.finalized, b.finalized) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => newest(a, b),
        }),
        SortOrder::EndedLast => views.sort_by(|a, b| {
            let ended = |v: &ProposalView| v.status == ProposalStatus::Ended;
            ended(a).cmp(&ended(b)).then_with(|| newest(a, b))
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewFilter {
    #[default]
    All,
    Status(ProposalStatus),
    WhitelistedFor(Pubkey),
}

impl ViewFilter {
    pub fn matches(&self, view: &ProposalView) -> bool {
        match self {
            ViewFilter::All => true,
            ViewFilter::Status(status) => view.status == *status,
            ViewFilter::WhitelistedFor(key) => view.whitelist().contains(key),
        }
    }
}

/// Human countdown to `end_ts`, e.g. "Ends in 2d 3h".
pub fn time_remaining(end_ts: i64, now: i64) -> String {
    let diff = end_ts.saturating_sub(now);
    if diff <= 0 {
        return "Ended".to_string();
    }
    let days = diff / 86_400;
    let hours = (diff % 86_400) / 3_600;
    let minutes = (diff % 3_600) / 60;
    if days > 0 {
        format!("Ends in {}d {}h", days, hours)
    } else {
        format!("Ends in {}h {}m", hours, minutes)
    }
}
