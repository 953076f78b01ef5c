//! Keeper chain interaction layer.
//!
//! This crate provides:
//! - Typed read clients for loop strategies, Chainlink aggregators and lending pools
//! - A contract factory binding those clients to a shared Alloy provider
//! - Classification of the event signatures reported by the monitoring platform
//!
//! Every client sits behind a trait so evaluation logic can run against
//! in-memory contracts in tests.

mod events;
pub mod oracle;
mod pool;
mod provider;
mod strategy;

pub use events::{EventSignature, PoolActionType};
pub use oracle::{AggregatorContract, PriceFeed, RoundData};
pub use pool::{LendingPool, PoolContract, ReserveRates};
pub use provider::{ContractFactory, ProviderManager};
pub use strategy::{CollateralRatioTargets, StrategyContract, StrategyReader};
