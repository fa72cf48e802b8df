mod commands;

use anyhow::Result;
use cipherballot_cli::{config, wallet};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use commands::create::CreateArgs;
use commands::proposals::ProposalCommands;

#[derive(Parser)]
#[command(name = "cipherballot-cli")]
#[command(author = "CipherBallot Team")]
#[command(version = "0.1.0")]
#[command(about = "CipherBallot CLI - confidential on-chain voting on Solana", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse proposals
    Proposals {
        #[command(subcommand)]
        action: ProposalCommands,
    },

    /// Create a new proposal and initialize its encrypted tally
    Create {
        /// Proposal title (max 128 bytes)
        #[arg(long)]
        title: String,

        /// Voting option, repeat 2 to 8 times
        #[arg(long = "option", required = true)]
        options: Vec<String>,

        /// Voting start: unix seconds, RFC 3339 or "YYYY-MM-DD HH:MM" UTC (defaults to now)
        #[arg(long)]
        start: Option<String>,

        /// Voting end, same formats as --start
        #[arg(long)]
        end: String,

        /// Restrict voting to these wallets (repeatable, max 64)
        #[arg(long, conflicts_with = "mint")]
        whitelist: Vec<String>,

        /// Restrict voting to holders of this token mint
        #[arg(long)]
        mint: Option<String>,

        /// Proposal id used as the address salt (defaults to the current unix time)
        #[arg(long)]
        salt: Option<u64>,

        /// Only create the proposal; initialize the tally later
        #[arg(long)]
        skip_tally: bool,
    },

    /// Initialize the encrypted tally of a proposal
    InitTally {
        /// Proposal account address
        proposal: String,
    },

    /// Cast an encrypted vote
    Vote {
        /// Proposal account address
        proposal: String,

        /// Zero-based option index
        #[arg(long)]
        option: u8,
    },

    /// Finalize and reveal the tally after voting ends
    Finalize {
        /// Proposal account address
        proposal: String,
    },

    /// Check whether a wallet has voted on a proposal
    HasVoted {
        /// Proposal account address
        proposal: String,

        /// Wallet to check (defaults to your wallet)
        #[arg(long)]
        voter: Option<String>,
    },

    /// Check whether the confidential compute network is ready
    Readiness,

    /// Wallet management commands
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    Create,

    /// Import wallet from keypair file
    Import {
        /// Path to keypair JSON file
        #[arg(long)]
        keypair: String,
    },

    /// Show wallet address
    Address,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set Solana cluster (devnet/mainnet-beta/localnet)
    SetCluster {
        /// Cluster name
        cluster: String,
    },

    /// Show current configuration
    Show,
}

impl Commands {
    fn prints_json(&self) -> bool {
        matches!(
            self,
            Commands::Proposals {
                action: ProposalCommands::List { json: true, .. } | ProposalCommands::Show { json: true, .. },
            }
        )
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.command.prints_json() {
        println!("{}", "╔════════════════════════════════════════════╗".bright_cyan());
        println!("{}", "║   CipherBallot CLI - Confidential Voting   ║".bright_cyan());
        println!("{}", "╚════════════════════════════════════════════╝".bright_cyan());
        println!();
    }

    match cli.command {
        Commands::Proposals { action } => {
            commands::proposals::execute(action).await?;
        }
        Commands::Create {
            title,
            options,
            start,
            end,
            whitelist,
            mint,
            salt,
            skip_tally,
        } => {
            commands::create::execute(CreateArgs {
                title,
                options,
                start,
                end,
                whitelist,
                mint,
                salt,
                skip_tally,
            })
            .await?;
        }
        Commands::InitTally { proposal } => {
            commands::init_tally::execute(proposal).await?;
        }
        Commands::Vote { proposal, option } => {
            commands::vote::execute(proposal, option).await?;
        }
        Commands::Finalize { proposal } => {
            commands::finalize::execute(proposal).await?;
        }
        Commands::HasVoted { proposal, voter } => {
            commands::has_voted::execute(proposal, voter).await?;
        }
        Commands::Readiness => {
            commands::readiness::execute().await?;
        }
        Commands::Wallet { action } => match action {
            WalletCommands::Create => wallet::create().await?,
            WalletCommands::Import { keypair } => wallet::import(&keypair).await?,
            WalletCommands::Address => wallet::show_address().await?,
        },
        Commands::Config { action } => match action {
            ConfigCommands::SetCluster { cluster } => config::set_cluster(&cluster)?,
            ConfigCommands::Show => config::show()?,
        },
    }

    Ok(())
}
