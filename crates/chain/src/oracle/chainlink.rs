//! Chainlink aggregator client.

use super::{PriceFeed, RoundData};
use alloy::primitives::{Address, I256};
use alloy::providers::Provider;
use alloy::sol;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

// Chainlink aggregator interface
sol! {
    /// Chainlink-compatible oracle aggregator interface
    #[sol(rpc)]
    interface IAggregator {
        function latestAnswer() external view returns (int256);
        function latestRoundData() external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );

        event AnswerUpdated(int256 indexed current, uint256 indexed roundId, uint256 updatedAt);
    }
}

/// Typed client for a deployed aggregator.
#[derive(Clone)]
pub struct AggregatorContract<P> {
    /// Aggregator contract address
    address: Address,
    /// Provider for RPC calls
    provider: Arc<P>,
}

impl<P> std::fmt::Debug for AggregatorContract<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorContract")
            .field("address", &self.address)
            .finish()
    }
}

impl<P: Provider + Clone + 'static> AggregatorContract<P> {
    /// Create a client bound to `address`.
    pub fn new(address: Address, provider: Arc<P>) -> Self {
        Self { address, provider }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> PriceFeed for AggregatorContract<P> {
    fn address(&self) -> Address {
        self.address
    }

    async fn latest_answer(&self) -> Result<I256> {
        let contract = IAggregator::new(self.address, &*self.provider);
        let answer = contract.latestAnswer().call().await?;
        Ok(answer._0)
    }

    async fn latest_round(&self) -> Result<RoundData> {
        let contract = IAggregator::new(self.address, &*self.provider);
        let round = contract.latestRoundData().call().await?;

        Ok(RoundData {
            round_id: round.roundId.to::<u128>(),
            answer: round.answer,
            started_at: round.startedAt.saturating_to::<u64>(),
            updated_at: round.updatedAt.saturating_to::<u64>(),
            answered_in_round: round.answeredInRound.to::<u128>(),
        })
    }
}
