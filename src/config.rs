use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anchor_client::Cluster;
use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::accounts::{DecodePolicy, DEFAULT_MIN_CURRENT_LEN};
use crate::errors::{CliError, VoteError};
use crate::readiness::{DEFAULT_KEY_RETRIES, DEFAULT_KEY_RETRY_DELAY};

/// Deployed `confidential_vote` program.
pub const DEFAULT_PROGRAM_ID: &str = "Bc7u1THDttJMjzbdhestYiXPqq8XxCJMpfeDzU54h66L";
/// Arcium program that owns MXE accounts.
pub const DEFAULT_ARCIUM_PROGRAM_ID: &str = "Arcj82pX7HxYKLR92qvgZUAd7vGS1k4hQvAFcPATFdEQ";
/// Offset of the x25519 key inside the MXE account data.
pub const DEFAULT_MXE_KEY_OFFSET: usize = 63;

pub const PROGRAM_ID_ENV: &str = "CIPHERBALLOT_PROGRAM_ID";

/// Configuration for the CipherBallot CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster: String,
    pub wallet_path: Option<PathBuf>,
    pub rpc_url: String,
    pub ws_url: String,
    pub program_id: Option<String>,
    pub arcium_program_id: String,
    pub mxe_key_offset: usize,
    pub key_retries: u32,
    pub key_retry_delay_ms: u64,
    pub poll_interval_secs: u64,
    pub min_current_len: usize,
    pub min_display_ts: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: "devnet".to_string(),
            wallet_path: None,
            rpc_url: Cluster::Devnet.url().to_string(),
            ws_url: Cluster::Devnet.ws_url().to_string(),
            program_id: None,
            arcium_program_id: DEFAULT_ARCIUM_PROGRAM_ID.to_string(),
            mxe_key_offset: DEFAULT_MXE_KEY_OFFSET,
            key_retries: DEFAULT_KEY_RETRIES,
            key_retry_delay_ms: DEFAULT_KEY_RETRY_DELAY.as_millis() as u64,
            poll_interval_secs: 5,
            min_current_len: DEFAULT_MIN_CURRENT_LEN,
            min_display_ts: 0,
        }
    }
}

impl Config {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find config directory"))?;
        Ok(config_dir.join("cipherballot-cli").join("config.toml"))
    }

    /// Load config from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        Ok(())
    }

    /// Update cluster configuration
    pub fn set_cluster(&mut self, cluster: &str) -> Result<()> {
        let resolved = match cluster {
            "devnet" => Cluster::Devnet,
            "mainnet-beta" => Cluster::Mainnet,
            "localnet" => Cluster::Localnet,
            _ => return Err(CliError::InvalidCluster(cluster.to_string()).into()),
        };

        self.cluster = cluster.to_string();
        self.rpc_url = resolved.url().to_string();
        self.ws_url = resolved.ws_url().to_string();
        self.save()?;

        Ok(())
    }

    /// Program id: environment override, then config file, then the default.
    pub fn program_id(&self) -> Result<Pubkey, VoteError> {
        let env = std::env::var(PROGRAM_ID_ENV).ok();
        resolve_program_id(env.as_deref(), self.program_id.as_deref())
    }

    pub fn arcium_program_id(&self) -> Result<Pubkey, VoteError> {
        Pubkey::from_str(self.arcium_program_id.trim()).map_err(|_| {
            VoteError::Config(format!("invalid Arcium program id '{}'", self.arcium_program_id))
        })
    }

    pub fn key_retry_delay(&self) -> Duration {
        Duration::from_millis(self.key_retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn decode_policy(&self) -> DecodePolicy {
        DecodePolicy {
            min_current_len: self.min_current_len,
            min_display_ts: self.min_display_ts,
        }
    }
}

/// A malformed environment override falls back with a warning; a malformed
/// configured id is fatal.
pub fn resolve_program_id(env_override: Option<&str>, configured: Option<&str>) -> Result<Pubkey, VoteError> {
    if let Some(value) = env_override.map(str::trim).filter(|v| !v.is_empty()) {
        match Pubkey::from_str(value) {
            Ok(key) => return Ok(key),
            Err(_) => warn!(
                "Invalid {} \"{}\". Falling back to configured program id.",
                PROGRAM_ID_ENV, value
            ),
        }
    }
    let value = configured
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_PROGRAM_ID);
    Pubkey::from_str(value).map_err(|_| VoteError::Config(format!("invalid program id '{}'", value)))
}

/// Set cluster configuration
pub fn set_cluster(cluster: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.set_cluster(cluster)?;

    println!("{}", format!("✓ Cluster set to: {}", cluster).green());
    println!("  RPC URL: {}", config.rpc_url);
    println!("  WS URL:  {}", config.ws_url);

    Ok(())
}

/// Show current configuration
pub fn show() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "CipherBallot CLI Configuration".bright_cyan().bold());
    println!("  Cluster:      {}", config.cluster.bright_yellow());
    println!("  RPC URL:      {}", config.rpc_url);
    println!("  WS URL:       {}", config.ws_url);
    println!("  Program ID:   {}",
        config.program_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|e| e.to_string().red().to_string())
    );
    println!("  Arcium ID:    {}", config.arcium_program_id);
    println!("  Wallet Path:  {}",
        config.wallet_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "Not set".to_string())
    );

    Ok(())
}
