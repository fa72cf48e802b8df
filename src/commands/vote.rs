use anyhow::Result;
use cipherballot_cli::config::Config;
use cipherballot_cli::errors::VoteError;
use cipherballot_cli::wallet;
use colored::Colorize;
use solana_sdk::signature::Signer;

use super::{connect, parse_pubkey, report_outcome, write_spinner};

/// Encrypt and cast a vote
pub async fn execute(proposal: String, option: u8) -> Result<()> {
    let proposal = parse_pubkey(&proposal)?;
    let config = Config::load()?;
    let keypair = wallet::load_wallet()?;
    let client = connect(&config)?;

    let view = client.fetch_proposal_by_address(&proposal).await?;
    let choice = view.options.get(usize::from(option)).cloned().unwrap_or_default();

    println!("{}", "Casting encrypted vote...".bright_cyan());
    println!("  Voter:    {}", keypair.pubkey().to_string().bright_yellow());
    println!("  Proposal: {}", view.title);
    println!("  Choice:   [{}] {}", option, choice);

    let (spinner, observer) = write_spinner();
    let client = client.with_observer(observer);

    let outcome = client.submit_encrypted_vote(&keypair, &proposal, option).await;
    spinner.finish_and_clear();

    if let Some(VoteError::AlreadyVoted { .. }) = &outcome.error {
        println!();
        println!("{}", "You have already voted on this proposal.".yellow());
        return Ok(());
    }

    report_outcome(
        &outcome,
        &config.cluster,
        &[
            "Voting is only open between the proposal's start and end time",
            "Whitelist and token-gated proposals only accept eligible wallets",
            "Ensure you have SOL for the voter record rent",
        ],
    )?;

    println!();
    println!("{}", "Your choice left this machine encrypted; only the final tally is revealed.".dimmed());
    Ok(())
}
