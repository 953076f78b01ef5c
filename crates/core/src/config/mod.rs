//! Deployment configuration.
//!
//! This module provides:
//! - The TOML file structure (keeper settings, strategies, oracles, services)
//! - A loader resolving it into typed lookup tables (oracle → strategies,
//!   debt token → strategies, per-strategy borrow rate thresholds)

mod deployment;
mod loader;

pub use deployment::{
    DeploymentConfig, KeeperSection, OracleConfig, SequencerSection, ServiceSection,
    StrategyConfig,
};
pub use loader::{
    expand_env, load_deployment, load_deployment_from_env, ResolvedDeployment, ResolvedOracle,
    ResolvedService, ResolvedStrategy, SequencerFeed, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH,
};
