pub mod create;
pub mod finalize;
pub mod has_voted;
pub mod init_tally;
pub mod proposals;
pub mod readiness;
pub mod vote;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use cipherballot_cli::client::{ClientSettings, StatusObserver, VoteClient, WriteOutcome, WriteStatus};
use cipherballot_cli::config::Config;
use cipherballot_cli::errors::{CliError, VoteError};
use cipherballot_cli::ledger::RpcLedger;
use cipherballot_cli::pda;
use cipherballot_cli::readiness::LedgerKeySource;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use solana_sdk::pubkey::Pubkey;

pub type RpcVoteClient = VoteClient<RpcLedger, LedgerKeySource<RpcLedger>>;

/// Build a client against the configured cluster.
pub fn connect(config: &Config) -> Result<RpcVoteClient> {
    let ledger = Arc::new(RpcLedger::new(&config.rpc_url, &config.ws_url));
    let settings = ClientSettings::from_config(config)?;
    let mxe_account = pda::mxe_account_address(&config.arcium_program_id()?, &settings.program_id)?;
    let key_source = LedgerKeySource::new(Arc::clone(&ledger), mxe_account, config.mxe_key_offset);
    Ok(VoteClient::new(ledger, key_source, settings))
}

/// Spinner that follows the `Sending` message of a write.
pub fn write_spinner() -> (ProgressBar, StatusObserver) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    let handle = spinner.clone();
    let observer: StatusObserver = Arc::new(move |outcome: &WriteOutcome| {
        if outcome.status == WriteStatus::Sending {
            handle.set_message(outcome.message.clone());
        }
    });
    (spinner, observer)
}

pub fn parse_pubkey(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).map_err(|_| CliError::InvalidPubkey(value.to_string()).into())
}

/// Unix seconds, RFC 3339, or "YYYY-MM-DD HH:MM" in UTC.
pub fn parse_timestamp(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(ts) = value.parse::<i64>() {
        return Ok(ts);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M") {
        return Ok(dt.and_utc().timestamp());
    }
    Err(CliError::InvalidTimestamp(value.to_string()).into())
}

pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn explorer_url(kind: &str, id: &str, cluster: &str) -> String {
    let suffix = match cluster {
        "mainnet-beta" => String::new(),
        "localnet" => "?cluster=custom&customUrl=http%3A%2F%2Flocalhost%3A8899".to_string(),
        other => format!("?cluster={}", other),
    };
    format!("https://explorer.solana.com/{}/{}{}", kind, id, suffix)
}

/// Print a terminal write state. Errors return `Err` after the hints so the
/// process exits non-zero.
pub fn report_outcome(outcome: &WriteOutcome, cluster: &str, hints: &[&str]) -> Result<()> {
    println!();
    if outcome.is_success() {
        println!("{}", format!("✅ {}", outcome.message).bright_green());
        println!();
        if let Some(account) = &outcome.account {
            println!("  Account:     {}", account.to_string().bright_yellow());
        }
        if let Some(signature) = &outcome.signature {
            println!("  Transaction: {}", signature.bright_yellow());
            println!("  Explorer: {}", explorer_url("tx", signature, cluster).bright_blue());
        }
        return Ok(());
    }

    println!("{}", "❌ Transaction failed".bright_red());
    println!("  Error: {}", outcome.message);
    let retryable = outcome.error.as_ref().is_some_and(VoteError::is_retryable);
    if !hints.is_empty() || retryable {
        println!();
        println!("{}", "Troubleshooting:".bright_yellow());
        if retryable {
            println!("  • The network may still be starting up, retry in a minute");
        }
        for hint in hints {
            println!("  • {}", hint);
        }
    }
    Err(anyhow::anyhow!(outcome.message.clone()))
}
