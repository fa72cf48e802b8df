use anyhow::Result;
use cipherballot_cli::config::Config;
use cipherballot_cli::wallet;
use colored::Colorize;
use solana_sdk::signature::Signer;

use super::{connect, parse_pubkey};

/// Check whether a wallet already has a voter record for a proposal
pub async fn execute(proposal: String, voter: Option<String>) -> Result<()> {
    let proposal = parse_pubkey(&proposal)?;
    let voter = match voter {
        Some(key) => parse_pubkey(&key)?,
        None => wallet::load_wallet()?.pubkey(),
    };

    let config = Config::load()?;
    let client = connect(&config)?;

    println!("  Voter:    {}", voter.to_string().bright_yellow());
    println!("  Proposal: {}", proposal);
    println!();
    if client.has_user_voted(&voter, &proposal).await? {
        println!("{}", "✓ This wallet has already voted on this proposal".bright_green());
    } else {
        println!("{}", "This wallet has not voted yet".yellow());
    }
    Ok(())
}
