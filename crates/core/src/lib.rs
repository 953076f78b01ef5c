//! Loop strategy keeper core logic.
//!
//! This crate turns monitored on-chain events into findings:
//! - Vault deposits and withdrawals: health factor, exposure and
//!   equity-per-share checks on the strategy
//! - Oracle price updates: EPS refresh, rebalance needs, oracle staleness
//!   and L2 sequencer status
//! - Lending pool actions: variable borrow rate against per-strategy
//!   thresholds
//!
//! Thresholds and address mappings come from a deployment config file.

mod alerts;
pub mod checks;
pub mod config;
mod eps_store;
mod error;
mod evaluator;
mod handler;
mod state;
pub mod u256_math;

#[cfg(test)]
mod testing;

pub use alerts::Alerter;
pub use config::{load_deployment, load_deployment_from_env, ResolvedDeployment};
pub use eps_store::EpsStore;
pub use error::{KeeperError, KeeperResult};
pub use evaluator::{unix_now, Evaluator};
pub use handler::{
    ConditionRequest, ConditionRequestEnvelope, HandlerResponse, Keeper, MatchReason, MonitorEvent,
    Payload,
};
pub use state::{
    BorrowRateFinding, EpsState, ExposureState, Finding, Match, MatchMetadata, MatchType,
    OracleState, PriceUpdateFinding, RiskState, SequencerState,
};
