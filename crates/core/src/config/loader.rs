//! Deployment loader: turns a [`DeploymentConfig`] into typed lookup tables.
//!
//! Addresses are parsed once here, so every later lookup is keyed by
//! [`Address`] and is insensitive to the checksum casing used in the file.

use super::{DeploymentConfig, ServiceSection};
use crate::u256_math::{parse_units, HEALTH_FACTOR_DECIMALS, PERCENT_RAY_DECIMALS};
use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use regex_lite::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Env var naming the deployment file.
pub const CONFIG_PATH_ENV: &str = "KEEPER_CONFIG";

/// Deployment file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/keeper.toml";

/// Fully resolved deployment configuration.
#[derive(Debug, Clone)]
pub struct ResolvedDeployment {
    /// Deployment name
    pub name: String,
    /// RPC URL with env vars expanded
    pub rpc_url: String,
    /// Health factor threshold, 8 decimals
    pub health_factor_threshold: U256,
    /// Staleness threshold for oracles without their own
    pub default_staleness_secs: u64,
    /// Notification channel receiving alerts
    pub alert_channel: String,
    /// L2 sequencer uptime feed
    pub sequencer: Option<SequencerFeed>,
    /// Strategies in declaration order
    pub strategies: Vec<ResolvedStrategy>,
    /// Oracles in declaration order
    pub oracles: Vec<ResolvedOracle>,
    /// Key-value store service
    pub store: Option<ResolvedService>,
    /// Notification service
    pub notifications: Option<ResolvedService>,
    /// Oracle -> strategies
    oracle_to_strategies: HashMap<Address, Vec<Address>>,
    /// Debt token -> strategies
    debt_token_to_strategies: HashMap<Address, Vec<Address>>,
    /// Strategy -> index into `strategies`
    strategy_index: HashMap<Address, usize>,
    /// Oracle -> index into `oracles`
    oracle_index: HashMap<Address, usize>,
}

/// L2 sequencer uptime feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerFeed {
    /// Uptime feed aggregator address
    pub feed: Address,
    /// Seconds after recovery during which the sequencer is still reported down
    pub grace_period_secs: u64,
}

/// Resolved strategy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStrategy {
    pub name: String,
    pub address: Address,
    pub debt_token: Address,
    /// Variable borrow rate threshold in RAY
    pub borrow_rate_threshold: U256,
}

/// Resolved oracle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOracle {
    pub description: String,
    pub address: Address,
    pub staleness_secs: u64,
    pub strategies: Vec<Address>,
}

/// Resolved HTTP service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub url: String,
    pub api_key: Option<String>,
}

impl ResolvedDeployment {
    /// Resolve and validate a parsed deployment file.
    pub fn resolve(config: DeploymentConfig) -> Result<Self> {
        let keeper = &config.keeper;

        let health_factor_threshold =
            parse_units(&keeper.health_factor_threshold, HEALTH_FACTOR_DECIMALS)
                .context("Invalid health_factor_threshold")?;

        let sequencer = keeper
            .sequencer
            .as_ref()
            .map(|s| -> Result<SequencerFeed> {
                Ok(SequencerFeed {
                    feed: parse_address(&s.feed, "sequencer feed")?,
                    grace_period_secs: s.grace_period_secs,
                })
            })
            .transpose()?;

        let mut strategies = Vec::with_capacity(config.strategies.len());
        let mut strategy_index = HashMap::new();
        let mut debt_token_to_strategies: HashMap<Address, Vec<Address>> = HashMap::new();

        for entry in &config.strategies {
            let address = parse_address(&entry.address, "strategy")?;
            let debt_token = parse_address(&entry.debt_token, "debt token")?;
            let borrow_rate_threshold =
                parse_units(&entry.borrow_rate_threshold_pct, PERCENT_RAY_DECIMALS)
                    .with_context(|| format!("Invalid borrow_rate_threshold_pct for {}", address))?;

            if strategy_index.insert(address, strategies.len()).is_some() {
                bail!("Strategy {} declared twice", address);
            }
            debt_token_to_strategies
                .entry(debt_token)
                .or_default()
                .push(address);

            strategies.push(ResolvedStrategy {
                name: entry.name.clone(),
                address,
                debt_token,
                borrow_rate_threshold,
            });
        }

        let mut oracles = Vec::with_capacity(config.oracles.len());
        let mut oracle_index = HashMap::new();
        let mut oracle_to_strategies = HashMap::new();

        for entry in &config.oracles {
            let address = parse_address(&entry.address, "oracle")?;
            let mut seen = HashSet::with_capacity(entry.strategies.len());
            let mapped = entry
                .strategies
                .iter()
                .map(|s| -> Result<Address> {
                    let strategy = parse_address(s, "oracle strategy")?;
                    if !strategy_index.contains_key(&strategy) {
                        bail!("Oracle {} references undeclared strategy {}", address, strategy);
                    }
                    if !seen.insert(strategy) {
                        bail!("Oracle {} lists strategy {} twice", address, strategy);
                    }
                    Ok(strategy)
                })
                .collect::<Result<Vec<_>>>()?;

            if oracle_index.insert(address, oracles.len()).is_some() {
                bail!("Oracle {} declared twice", address);
            }
            oracle_to_strategies.insert(address, mapped.clone());

            oracles.push(ResolvedOracle {
                description: entry.description.clone(),
                address,
                staleness_secs: entry.staleness_secs.unwrap_or(keeper.default_staleness_secs),
                strategies: mapped,
            });
        }

        Ok(Self {
            name: keeper.name.clone(),
            rpc_url: expand_env(&keeper.rpc_url),
            health_factor_threshold,
            default_staleness_secs: keeper.default_staleness_secs,
            alert_channel: keeper.alert_channel.clone(),
            sequencer,
            strategies,
            oracles,
            store: config.store.as_ref().map(resolve_service),
            notifications: config.notifications.as_ref().map(resolve_service),
            oracle_to_strategies,
            debt_token_to_strategies,
            strategy_index,
            oracle_index,
        })
    }

    /// Strategies priced by `oracle`. Unmapped oracles yield an empty slice.
    pub fn strategies_for_oracle(&self, oracle: &Address) -> &[Address] {
        self.oracle_to_strategies
            .get(oracle)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Strategies borrowing `debt_token`, or `None` if the reserve is not monitored.
    pub fn strategies_for_debt_token(&self, debt_token: &Address) -> Option<&[Address]> {
        self.debt_token_to_strategies
            .get(debt_token)
            .map(Vec::as_slice)
    }

    /// Strategy entry by address.
    pub fn strategy(&self, address: &Address) -> Option<&ResolvedStrategy> {
        self.strategy_index
            .get(address)
            .map(|&i| &self.strategies[i])
    }

    /// Oracle entry by address.
    pub fn oracle(&self, address: &Address) -> Option<&ResolvedOracle> {
        self.oracle_index.get(address).map(|&i| &self.oracles[i])
    }

    /// Borrow rate threshold (RAY) for a strategy.
    pub fn borrow_rate_threshold(&self, strategy: &Address) -> Option<U256> {
        self.strategy(strategy).map(|s| s.borrow_rate_threshold)
    }

    /// Staleness threshold for an oracle, falling back to the default.
    pub fn staleness_secs(&self, oracle: &Address) -> u64 {
        self.oracle(oracle)
            .map(|o| o.staleness_secs)
            .unwrap_or(self.default_staleness_secs)
    }

    /// Log a summary of the loaded deployment.
    pub fn log_summary(&self) {
        info!(
            deployment = %self.name,
            strategies = self.strategies.len(),
            oracles = self.oracles.len(),
            sequencer_feed = self.sequencer.map(|s| s.feed.to_string()).unwrap_or_default(),
            store = self.store.is_some(),
            notifications = self.notifications.is_some(),
            "Deployment configuration loaded"
        );
    }
}

fn parse_address(value: &str, what: &str) -> Result<Address> {
    let value = expand_env(value);
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {} address '{}': {}", what, value, e))
}

fn resolve_service(section: &ServiceSection) -> ResolvedService {
    let api_key = section.api_key_env.as_ref().and_then(|name| match std::env::var(name) {
        Ok(key) => Some(key),
        Err(_) => {
            warn!(env_var = %name, "API key env var not set, sending unauthenticated requests");
            None
        }
    });

    ResolvedService {
        url: expand_env(&section.url),
        api_key,
    }
}

fn env_ref_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

/// Expand `${VAR}` references. Unset variables are left as written.
pub fn expand_env(value: &str) -> String {
    let Some(re) = env_ref_pattern() else {
        return value.to_string();
    };
    re.replace_all(value, |caps: &Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

/// Load and resolve a deployment file.
pub fn load_deployment(path: impl AsRef<Path>) -> Result<ResolvedDeployment> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading deployment configuration");

    let config = DeploymentConfig::from_file(path)
        .with_context(|| format!("Failed to load deployment from {:?}", path))?;
    ResolvedDeployment::resolve(config)
}

/// Load the deployment named by `KEEPER_CONFIG` (default `config/keeper.toml`).
pub fn load_deployment_from_env() -> Result<ResolvedDeployment> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_deployment(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::pow10;

    const STRATEGY_A: &str = "0x258730e23cF2f25887Cb962d32Bd10b878ea8a4e";
    const STRATEGY_B: &str = "0x2FB1bEa0a63F77eFa77619B903B2830b52eE78f4";
    const WETH: &str = "0x4200000000000000000000000000000000000006";
    const USDC: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
    const ETH_USD: &str = "0x71041dddad3595F9CEd3DcCFBe3D1F4b0a16Bb70";

    fn config(extra: &str) -> DeploymentConfig {
        let toml_str = format!(
            r#"
            [keeper]
            rpc_url = "http://localhost:8545"
            health_factor_threshold = "1.1"
            default_staleness_secs = 1800

            [[strategies]]
            name = "3x wstETH/WETH"
            address = "{STRATEGY_A}"
            debt_token = "{WETH}"
            borrow_rate_threshold_pct = "3.0"

            [[strategies]]
            name = "1.5x WETH/USDC"
            address = "{STRATEGY_B}"
            debt_token = "{USDC}"
            borrow_rate_threshold_pct = "5"

            {extra}
            "#
        );
        toml::from_str(&toml_str).unwrap()
    }

    #[test]
    fn test_resolve_tables() {
        let extra = format!(
            r#"
            [[oracles]]
            description = "ETH-USD"
            address = "{}"
            strategies = ["{}", "{}"]
            "#,
            ETH_USD.to_lowercase(),
            STRATEGY_A,
            STRATEGY_B.to_lowercase()
        );
        let resolved = ResolvedDeployment::resolve(config(&extra)).unwrap();

        let a: Address = STRATEGY_A.parse().unwrap();
        let b: Address = STRATEGY_B.parse().unwrap();
        let oracle: Address = ETH_USD.parse().unwrap();
        let weth: Address = WETH.parse().unwrap();

        assert_eq!(resolved.health_factor_threshold, U256::from(110_000_000u64));
        assert_eq!(resolved.strategies_for_oracle(&oracle), &[a, b]);
        assert_eq!(resolved.strategies_for_debt_token(&weth), Some(&[a][..]));
        assert_eq!(resolved.borrow_rate_threshold(&a), Some(pow10(25) * U256::from(3u64)));
        assert_eq!(resolved.borrow_rate_threshold(&b), Some(pow10(25) * U256::from(5u64)));
        assert_eq!(resolved.staleness_secs(&oracle), 1800);
    }

    #[test]
    fn test_unmapped_lookups() {
        let resolved = ResolvedDeployment::resolve(config("")).unwrap();
        let unknown = Address::repeat_byte(0x11);

        assert!(resolved.strategies_for_oracle(&unknown).is_empty());
        assert!(resolved.strategies_for_debt_token(&unknown).is_none());
        assert!(resolved.borrow_rate_threshold(&unknown).is_none());
        assert_eq!(resolved.staleness_secs(&unknown), 1800);
    }

    #[test]
    fn test_undeclared_oracle_strategy_rejected() {
        let extra = format!(
            r#"
            [[oracles]]
            address = "{ETH_USD}"
            strategies = ["0x1111111111111111111111111111111111111111"]
            "#
        );
        let err = ResolvedDeployment::resolve(config(&extra)).unwrap_err();
        assert!(err.to_string().contains("undeclared strategy"));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut cfg = config("");
        cfg.keeper.health_factor_threshold = "1.1.1".to_string();
        assert!(ResolvedDeployment::resolve(cfg).is_err());

        let mut cfg = config("");
        cfg.strategies[0].borrow_rate_threshold_pct = "three".to_string();
        assert!(ResolvedDeployment::resolve(cfg).is_err());
    }

    #[test]
    fn test_duplicate_strategy_rejected() {
        let mut cfg = config("");
        let dup = cfg.strategies[0].clone();
        cfg.strategies.push(dup);
        let err = ResolvedDeployment::resolve(cfg).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_duplicate_oracle_strategy_rejected() {
        let cfg = config(&format!(
            r#"
            [[oracles]]
            address = "{ETH_USD}"
            strategies = ["{STRATEGY_A}", "{}"]
            "#,
            STRATEGY_A.to_lowercase()
        ));
        let err = ResolvedDeployment::resolve(cfg).unwrap_err();
        assert!(err.to_string().contains("lists strategy"));
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("KEEPER_TEST_RPC_HOST", "rpc.example");

        assert_eq!(expand_env("https://${KEEPER_TEST_RPC_HOST}/v1"), "https://rpc.example/v1");
        assert_eq!(expand_env("literal"), "literal");
        assert_eq!(expand_env("${KEEPER_TEST_NONEXISTENT}"), "${KEEPER_TEST_NONEXISTENT}");
        assert_eq!(expand_env("${unterminated"), "${unterminated");
        assert_eq!(
            expand_env("${KEEPER_TEST_RPC_HOST}:${KEEPER_TEST_NONEXISTENT}"),
            "rpc.example:${KEEPER_TEST_NONEXISTENT}"
        );

        std::env::remove_var("KEEPER_TEST_RPC_HOST");
    }

    #[test]
    fn test_load_sample_deployment() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/keeper.toml");
        let resolved = load_deployment(path).unwrap();

        assert_eq!(resolved.strategies.len(), 2);
        assert_eq!(resolved.oracles.len(), 3);
        assert!(resolved.sequencer.is_some());
    }
}
