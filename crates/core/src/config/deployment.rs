//! Deployment configuration file structure.
//!
//! A deployment file lists the strategies and oracles of one protocol
//! deployment together with the thresholds they are checked against.
//! Numeric thresholds are decimal strings so they can be converted to
//! fixed point without going through `f64`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full deployment configuration (TOML-loadable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Keeper-wide settings
    pub keeper: KeeperSection,
    /// Key-value store service
    #[serde(default)]
    pub store: Option<ServiceSection>,
    /// Notification service
    #[serde(default)]
    pub notifications: Option<ServiceSection>,
    /// Monitored strategies
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    /// Monitored price oracles
    #[serde(default)]
    pub oracles: Vec<OracleConfig>,
}

/// Keeper-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperSection {
    /// Deployment name (for logging/identification)
    #[serde(default = "default_name")]
    pub name: String,
    /// RPC endpoint, `${VAR}` references are expanded
    pub rpc_url: String,
    /// Health factor alert threshold (decimal, e.g. "1.1")
    pub health_factor_threshold: String,
    /// Staleness threshold for oracles without their own
    #[serde(default = "default_staleness_secs")]
    pub default_staleness_secs: u64,
    /// Notification channel receiving alerts
    #[serde(default = "default_alert_channel")]
    pub alert_channel: String,
    /// L2 sequencer uptime feed
    #[serde(default)]
    pub sequencer: Option<SequencerSection>,
}

fn default_name() -> String {
    "default".to_string()
}
fn default_staleness_secs() -> u64 {
    3600
}
fn default_alert_channel() -> String {
    "seamless-alerts".to_string()
}

/// L2 sequencer uptime feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerSection {
    /// Uptime feed aggregator address
    pub feed: String,
    /// Seconds after recovery during which the sequencer is still reported down
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

fn default_grace_period_secs() -> u64 {
    3600
}

/// External HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    /// Base URL, `${VAR}` references are expanded
    pub url: String,
    /// Name of the env var holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Monitored strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Human-readable name (e.g., "3x wstETH/WETH")
    #[serde(default)]
    pub name: String,
    /// Strategy vault address
    pub address: String,
    /// Debt reserve the strategy borrows
    pub debt_token: String,
    /// Variable borrow rate alert threshold in percent (e.g., "3.0")
    pub borrow_rate_threshold_pct: String,
}

/// Monitored price oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Human-readable description (e.g., "ETH-USD")
    #[serde(default)]
    pub description: String,
    /// Aggregator address
    pub address: String,
    /// Maximum answer age before the oracle is considered out
    #[serde(default)]
    pub staleness_secs: Option<u64>,
    /// Strategies priced by this oracle
    #[serde(default)]
    pub strategies: Vec<String>,
}

impl DeploymentConfig {
    /// Load deployment config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: DeploymentConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
