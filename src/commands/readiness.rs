use anyhow::Result;
use cipherballot_cli::config::Config;
use cipherballot_cli::readiness::ProbeState;
use colored::Colorize;

use super::{connect, explorer_url};

/// Report whether the confidential compute network can accept votes
pub async fn execute() -> Result<()> {
    let config = Config::load()?;
    let client = connect(&config)?;

    println!("{}", "═══ Confidential Compute Network ═══".bright_cyan());
    let readiness = client.check_network_readiness().await;

    let state = match &readiness.state {
        ProbeState::Ready => "Ready".bright_green(),
        ProbeState::KeyNotFinalized => "Keys pending".yellow(),
        ProbeState::NotFound => "Not deployed".bright_red(),
        ProbeState::Error(_) => "Unreachable".bright_red(),
        ProbeState::Probing => "Probing".dimmed(),
    };
    println!("  Status:      {}", state);
    println!("  MXE account: {}", readiness.mxe_account.to_string().bright_yellow());
    println!("  Details:     {}", readiness.reason);
    println!(
        "  Explorer: {}",
        explorer_url("address", &readiness.mxe_account.to_string(), &config.cluster).bright_blue()
    );

    if !readiness.ready {
        println!();
        println!("{}", "Votes and tally initialization will fail until the network is ready.".yellow());
    }
    Ok(())
}
