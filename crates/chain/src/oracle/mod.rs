//! Price feed abstraction for Chainlink-compatible aggregators.
//!
//! Two kinds of feeds are read by the keeper:
//!
//! - **Price oracles**: strategy collateral/debt prices (8 decimal answers)
//! - **Sequencer uptime feeds**: L2 sequencer status (answer `0` = up, `1` = down)
//!
//! Both expose the same aggregator interface, so a single [`PriceFeed`] trait
//! covers them.
//!
//! # Example
//!
//! ```rust,ignore
//! use keeper_chain::oracle::{AggregatorContract, PriceFeed};
//!
//! let oracle = AggregatorContract::new(address, provider);
//! let round = oracle.latest_round().await?;
//! if round.is_stale(3600, now) {
//!     warn!("Price is stale!");
//! }
//! ```

mod chainlink;

pub use chainlink::{AggregatorContract, IAggregator};

use alloy::primitives::{Address, I256};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Read interface for a Chainlink-compatible aggregator.
#[async_trait]
pub trait PriceFeed: Send + Sync + Debug {
    /// Aggregator contract address.
    fn address(&self) -> Address;

    /// Latest answer as reported by `latestAnswer()`.
    async fn latest_answer(&self) -> Result<I256>;

    /// Latest round data (answer, timestamps, round IDs).
    async fn latest_round(&self) -> Result<RoundData>;
}

/// Round data from an aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundData {
    /// Round ID
    pub round_id: u128,
    /// Signed answer
    pub answer: I256,
    /// Timestamp when round started
    pub started_at: u64,
    /// Timestamp when answer was computed
    pub updated_at: u64,
    /// Round ID for which answer was computed
    pub answered_in_round: u128,
}

impl RoundData {
    /// Check if this round's data is complete and positive.
    pub fn is_valid(&self) -> bool {
        self.answer.is_positive() && self.updated_at > 0 && self.answered_in_round >= self.round_id
    }

    /// Seconds elapsed since the answer was computed.
    pub fn age_secs(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.updated_at)
    }

    /// Check if the answer is older than `threshold_secs`.
    pub fn is_stale(&self, threshold_secs: u64, current_time: u64) -> bool {
        self.age_secs(current_time) > threshold_secs
    }
}
