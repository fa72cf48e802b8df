use anyhow::Result;
use cipherballot_cli::config::Config;
use cipherballot_cli::wallet;
use colored::Colorize;
use solana_sdk::signature::Signer;

use super::{connect, parse_pubkey, report_outcome, write_spinner};

/// Initialize the encrypted tally of a proposal you created
pub async fn execute(proposal: String) -> Result<()> {
    let proposal = parse_pubkey(&proposal)?;
    let config = Config::load()?;
    let keypair = wallet::load_wallet()?;

    println!("{}", "Initializing encrypted tally...".bright_cyan());
    println!("  Creator:  {}", keypair.pubkey().to_string().bright_yellow());
    println!("  Proposal: {}", proposal);

    let (spinner, observer) = write_spinner();
    let client = connect(&config)?.with_observer(observer);
    let outcome = client.init_encrypted_tally(&keypair, &proposal).await;
    spinner.finish_and_clear();

    report_outcome(
        &outcome,
        &config.cluster,
        &[
            "Only the proposal creator can initialize its tally",
            "A tally can only be initialized once",
            "Check the network with 'cipherballot-cli readiness'",
        ],
    )
}
