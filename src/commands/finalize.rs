use anyhow::Result;
use cipherballot_cli::config::Config;
use cipherballot_cli::wallet;
use colored::Colorize;
use solana_sdk::signature::Signer;

use super::{connect, parse_pubkey, report_outcome, write_spinner};

/// Reveal the final tally once voting has ended
pub async fn execute(proposal: String) -> Result<()> {
    let proposal = parse_pubkey(&proposal)?;
    let config = Config::load()?;
    let keypair = wallet::load_wallet()?;

    println!("{}", "Finalizing tally...".bright_cyan());
    println!("  Creator:  {}", keypair.pubkey().to_string().bright_yellow());
    println!("  Proposal: {}", proposal);

    let (spinner, observer) = write_spinner();
    let client = connect(&config)?.with_observer(observer);
    let outcome = client.finalize_tally(&keypair, &proposal).await;
    spinner.finish_and_clear();

    report_outcome(
        &outcome,
        &config.cluster,
        &[
            "Voting must have ended before the tally can be finalized",
            "Only the proposal creator can finalize",
        ],
    )?;

    println!();
    println!(
        "{}",
        format!("View results with 'cipherballot-cli proposals show {}'", proposal).dimmed()
    );
    Ok(())
}
