//! Client for confidential on-chain voting on Solana.
//!
//! Proposals, encrypted tallies and voter records are accounts of the
//! `confidential_vote` program. Vote choices are encrypted against the
//! compute network's x25519 key before they leave this process.

pub mod accounts;
pub mod cipher;
pub mod client;
pub mod config;
pub mod errors;
pub mod instructions;
pub mod ledger;
pub mod pda;
pub mod readiness;
pub mod view;
pub mod wallet;
pub mod watch;

pub use client::{ClientSettings, CreateProposalParams, VoteClient, WriteOutcome, WriteStatus};
pub use errors::VoteError;
