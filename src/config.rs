//! Aggregator configuration

use std::path::Path;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::range::{ACTIVITY_LOOKBACK, MINT_LOOKBACK};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Deployed contract addresses; any may be unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// ERC-1155 ARC token and trophies
    #[serde(default)]
    pub arcade_token: Option<Address>,

    #[serde(default)]
    pub loot_box: Option<Address>,

    #[serde(default)]
    pub stake_badge: Option<Address>,

    #[serde(default)]
    pub trade_hub: Option<Address>,

    /// Governance council, also holds the treasury
    #[serde(default)]
    pub council: Option<Address>,

    /// Block the token was deployed at, bounds the mint scan
    #[serde(default)]
    pub deploy_block: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Blocks scanned for recent activity
    #[serde(default = "default_activity_lookback")]
    pub activity_lookback: u64,

    /// Blocks scanned for mints when no deploy block is known
    #[serde(default = "default_mint_lookback")]
    pub mint_lookback: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_treasury_interval")]
    pub treasury_interval_secs: u64,

    #[serde(default = "default_activity_interval")]
    pub activity_interval_secs: u64,

    #[serde(default = "default_governance_interval")]
    pub governance_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Connected account, shown as "You"
    #[serde(default)]
    pub viewer: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

// Defaults
fn default_activity_lookback() -> u64 { ACTIVITY_LOOKBACK }
fn default_mint_lookback() -> u64 { MINT_LOOKBACK }
fn default_treasury_interval() -> u64 { 15 }
fn default_activity_interval() -> u64 { 30 }
fn default_governance_interval() -> u64 { 15 }
fn default_recent_limit() -> usize { 20 }
fn default_leaderboard_limit() -> usize { 10 }
fn default_currency() -> String { "ARC".to_string() }
fn default_http_port() -> u16 { 8787 }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            activity_lookback: default_activity_lookback(),
            mint_lookback: default_mint_lookback(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            treasury_interval_secs: default_treasury_interval(),
            activity_interval_secs: default_activity_interval(),
            governance_interval_secs: default_governance_interval(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
            leaderboard_limit: default_leaderboard_limit(),
            currency: default_currency(),
            viewer: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }
}
