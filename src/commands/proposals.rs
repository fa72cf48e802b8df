use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use cipherballot_cli::accounts::decode_proposal_json;
use cipherballot_cli::config::Config;
use cipherballot_cli::view::{build_view, time_remaining, ProposalStatus, ProposalView, SortOrder, ViewFilter};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use solana_sdk::pubkey::Pubkey;

use super::{connect, explorer_url, format_timestamp, parse_pubkey};

#[derive(Subcommand)]
pub enum ProposalCommands {
    /// List proposals, newest first
    List {
        /// Show finalized proposals before the rest
        #[arg(long, conflicts_with = "ended_last")]
        finalized_first: bool,

        /// Show ended proposals after the rest
        #[arg(long)]
        ended_last: bool,

        /// Only show proposals in this state
        #[arg(long, value_enum, default_value_t = StatusFilter::All)]
        filter: StatusFilter,

        /// Only show whitelist proposals that include this wallet
        #[arg(long)]
        whitelisted_for: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a single proposal
    Show {
        /// Proposal account address
        address: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Follow proposal changes live
    Watch,

    /// Decode a proposal from its JSON rendering (e.g. `anchor account` output)
    Inspect {
        /// Path to the JSON file
        #[arg(long)]
        json: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    All,
    Upcoming,
    Active,
    Ended,
}

impl StatusFilter {
    fn to_view_filter(self) -> ViewFilter {
        match self {
            StatusFilter::All => ViewFilter::All,
            StatusFilter::Upcoming => ViewFilter::Status(ProposalStatus::Upcoming),
            StatusFilter::Active => ViewFilter::Status(ProposalStatus::Active),
            StatusFilter::Ended => ViewFilter::Status(ProposalStatus::Ended),
        }
    }
}

pub async fn execute(action: ProposalCommands) -> Result<()> {
    match action {
        ProposalCommands::List {
            finalized_first,
            ended_last,
            filter,
            whitelisted_for,
            json,
        } => {
            let order = sort_order(finalized_first, ended_last);
            let filters = match whitelisted_for {
                Some(key) => vec![filter.to_view_filter(), ViewFilter::WhitelistedFor(parse_pubkey(&key)?)],
                None => vec![filter.to_view_filter()],
            };
            list(order, &filters, json).await
        }
        ProposalCommands::Show { address, json } => show(&parse_pubkey(&address)?, json).await,
        ProposalCommands::Watch => watch().await,
        ProposalCommands::Inspect { json } => inspect(Path::new(&json)),
    }
}

fn sort_order(finalized_first: bool, ended_last: bool) -> SortOrder {
    if finalized_first {
        SortOrder::FinalizedFirst
    } else if ended_last {
        SortOrder::EndedLast
    } else {
        SortOrder::Newest
    }
}

async fn list(order: SortOrder, filters: &[ViewFilter], json: bool) -> Result<()> {
    let config = Config::load()?;
    let client = connect(&config)?;

    let views: Vec<ProposalView> = client
        .fetch_proposals(order)
        .await
        .context("Failed to fetch proposals")?
        .into_iter()
        .filter(|v| filters.iter().all(|f| f.matches(v)))
        .collect();

    if json {
        let rendered: Vec<_> = views.iter().map(ProposalView::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    println!("{}", "═══ Proposals ═══".bright_cyan());
    if views.is_empty() {
        println!("  {}", "No proposals found".dimmed());
        println!("  {}", "Use 'cipherballot-cli create' to create one".dimmed());
        return Ok(());
    }
    let now = Utc::now().timestamp();
    for view in &views {
        print_summary(view, now);
    }
    println!();
    println!("  {} proposal(s)", views.len());
    Ok(())
}

async fn show(address: &Pubkey, json: bool) -> Result<()> {
    let config = Config::load()?;
    let client = connect(&config)?;
    let view = client.fetch_proposal_by_address(address).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view.to_json())?);
        return Ok(());
    }
    print_details(&view, Utc::now().timestamp());
    println!();
    println!(
        "  Explorer: {}",
        explorer_url("address", &address.to_string(), &config.cluster).bright_blue()
    );
    Ok(())
}

async fn watch() -> Result<()> {
    let config = Config::load()?;
    let client = connect(&config)?;

    println!("{}", "Watching proposals (Ctrl+C to stop)...".bright_cyan());
    let mut subscription = client.subscribe_proposal_changes(SortOrder::Newest, |views| {
        let now = Utc::now().timestamp();
        println!();
        println!(
            "{}",
            format!("═══ {} proposal(s) at {} ═══", views.len(), format_timestamp(now)).bright_cyan()
        );
        for view in &views {
            print_summary(view, now);
        }
    });

    tokio::signal::ctrl_c().await?;
    subscription.unsubscribe();
    println!("{}", "Stopped.".dimmed());
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record = decode_proposal_json(&contents)
        .map_err(|reason| anyhow::anyhow!("Failed to decode proposal JSON: {}", reason))?;
    let view = build_view(Pubkey::default(), &record, Utc::now().timestamp());
    print_details(&view, Utc::now().timestamp());
    Ok(())
}

fn status_label(status: ProposalStatus) -> colored::ColoredString {
    match status {
        ProposalStatus::Upcoming => status.as_str().yellow(),
        ProposalStatus::Active => status.as_str().bright_green(),
        ProposalStatus::Ended => status.as_str().dimmed(),
    }
}

fn print_summary(view: &ProposalView, now: i64) {
    println!();
    println!("  {} [{}]", view.title.bold(), status_label(view.status));
    println!("    Address:  {}", view.address.to_string().bright_yellow());
    println!("    Options:  {}", view.options.join(" / "));
    match view.status {
        ProposalStatus::Upcoming => println!("    Starts:   {}", format_timestamp(view.start_ts)),
        ProposalStatus::Active => println!("    Closes:   {}", time_remaining(view.end_ts, now)),
        ProposalStatus::Ended if view.finalized => println!("    Result:   {}", "Finalized".bright_green()),
        ProposalStatus::Ended => println!("    Result:   {}", "Awaiting finalization".yellow()),
    }
}

fn print_details(view: &ProposalView, now: i64) {
    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    println!("  {}", view.title.bright_cyan().bold());
    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    println!("  Status:      {}", status_label(view.status));
    println!("  Creator:     {}", view.creator.to_string().bright_yellow());
    println!("  Starts:      {}", format_timestamp(view.start_ts));
    println!("  Ends:        {} ({})", format_timestamp(view.end_ts), time_remaining(view.end_ts, now));
    println!("  Eligibility: {}", view.eligibility.label());
    if let Some(mint) = view.required_mint() {
        println!("  Token mint:  {}", mint);
    }
    if !view.whitelist().is_empty() {
        println!("  Whitelist:   {} wallet(s)", view.whitelist().len());
    }
    println!(
        "  Tally:       {}",
        if view.tally_initialized { "Initialized".green() } else { "Not initialized".yellow() }
    );
    println!("  Votes cast:  {}", view.votes_cast);

    println!();
    if view.finalized {
        println!("{}", "═══ Results ═══".bright_cyan());
        let shares = view.percentages();
        for (i, option) in view.options.iter().enumerate() {
            let votes = view.final_tally.get(i).copied().unwrap_or(0);
            let share = shares.get(i).copied().unwrap_or(0.0);
            println!("  [{}] {:<24} {:>6} votes  {:>5.1}%", i, option, votes, share);
        }
    } else {
        println!("{}", "═══ Options ═══".bright_cyan());
        for (i, option) in view.options.iter().enumerate() {
            println!("  [{}] {}", i, option);
        }
        println!("  {}", "Results stay encrypted until the tally is finalized".dimmed());
    }
}
