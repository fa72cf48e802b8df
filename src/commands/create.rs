use anyhow::Result;
use chrono::Utc;
use cipherballot_cli::accounts::Eligibility;
use cipherballot_cli::client::CreateProposalParams;
use cipherballot_cli::config::Config;
use cipherballot_cli::errors::CliError;
use cipherballot_cli::pda::salt_from_id;
use cipherballot_cli::wallet;
use colored::Colorize;
use solana_sdk::signature::Signer;

use super::{connect, format_timestamp, parse_pubkey, parse_timestamp, report_outcome, write_spinner};

pub struct CreateArgs {
    pub title: String,
    pub options: Vec<String>,
    pub start: Option<String>,
    pub end: String,
    pub whitelist: Vec<String>,
    pub mint: Option<String>,
    pub salt: Option<u64>,
    pub skip_tally: bool,
}

/// Create a proposal and, unless told otherwise, initialize its tally.
pub async fn execute(args: CreateArgs) -> Result<()> {
    let params = build_params(&args, Utc::now().timestamp())?;

    let config = Config::load()?;
    let keypair = wallet::load_wallet()?;

    println!("{}", "Creating proposal...".bright_cyan());
    println!("  Creator:     {}", keypair.pubkey().to_string().bright_yellow());
    println!("  Title:       {}", params.title);
    println!("  Options:     {}", params.options.join(" / "));
    println!("  Window:      {} → {}", format_timestamp(params.start_ts), format_timestamp(params.end_ts));
    println!("  Eligibility: {}", params.eligibility.label());

    let (spinner, observer) = write_spinner();
    let client = connect(&config)?.with_observer(observer);

    let outcome = client.create_proposal(&keypair, params).await;
    spinner.finish_and_clear();
    report_outcome(
        &outcome,
        &config.cluster,
        &["Ensure you have SOL for rent and transaction fees", "Check the program id with 'config show'"],
    )?;

    let Some(proposal) = outcome.account else {
        return Ok(());
    };
    if args.skip_tally {
        println!();
        println!("{}", "Run 'cipherballot-cli init-tally' before voting opens".yellow());
        return Ok(());
    }

    let (spinner, observer) = write_spinner();
    let client = client.with_observer(observer);
    let outcome = client.init_encrypted_tally(&keypair, &proposal).await;
    spinner.finish_and_clear();
    report_outcome(
        &outcome,
        &config.cluster,
        &[
            "The proposal exists; retry with 'cipherballot-cli init-tally <proposal>'",
            "Check the network with 'cipherballot-cli readiness'",
        ],
    )?;

    println!();
    println!("{}", "Success! Proposal is live.".bright_green());
    Ok(())
}

fn build_params(args: &CreateArgs, now: i64) -> Result<CreateProposalParams> {
    let start_ts = match &args.start {
        Some(value) => parse_timestamp(value)?,
        None => now,
    };
    let end_ts = parse_timestamp(&args.end)?;

    let eligibility = match (&args.mint, args.whitelist.is_empty()) {
        (Some(_), false) => {
            return Err(CliError::ConfigError("--mint and --whitelist are mutually exclusive".to_string()).into())
        }
        (Some(mint), true) => Eligibility::TokenGated { mint: parse_pubkey(mint)? },
        (None, false) => Eligibility::Whitelist {
            voters: args
                .whitelist
                .iter()
                .map(|k| parse_pubkey(k))
                .collect::<Result<Vec<_>>>()?,
        },
        (None, true) => Eligibility::Open,
    };

    let params = CreateProposalParams {
        title: args.title.trim().to_string(),
        options: args.options.iter().map(|o| o.trim().to_string()).collect(),
        start_ts,
        end_ts,
        eligibility,
        salt: salt_from_id(args.salt.unwrap_or(now.max(0) as u64)),
    };
    params.validate()?;
    Ok(params)
}
