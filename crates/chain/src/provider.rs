//! Provider management and contract client construction.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::primitives::Address;
use alloy::providers::Provider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::oracle::{AggregatorContract, PriceFeed};
use crate::pool::{LendingPool, PoolContract};
use crate::strategy::{StrategyContract, StrategyReader};

/// Builds typed contract clients from an address.
///
/// Evaluators only see this trait, so tests can substitute in-memory
/// contracts for the RPC-backed ones.
pub trait ContractFactory: Send + Sync {
    /// Loop strategy client.
    fn strategy(&self, address: Address) -> Arc<dyn StrategyReader>;

    /// Aggregator (price or sequencer uptime feed) client.
    fn price_feed(&self, address: Address) -> Arc<dyn PriceFeed>;

    /// Lending pool client.
    fn pool(&self, address: Address) -> Arc<dyn LendingPool>;
}

/// Contract factory backed by a shared Alloy provider.
#[derive(Clone)]
pub struct ProviderManager<P> {
    /// Shared provider for every contract client
    provider: Arc<P>,
}

impl<P: Provider + Clone + Send + Sync + 'static> ProviderManager<P> {
    /// Wrap an already-built provider.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Verify the connection by fetching the chain ID and block number.
    pub async fn verify(&self) -> Result<u64> {
        let chain_id = self.provider.get_chain_id().await?;
        let block = self.provider.get_block_number().await?;
        info!(chain_id = chain_id, block = block, "Provider connection verified");
        Ok(chain_id)
    }
}

impl<P: Provider + Clone + Send + Sync + 'static> ContractFactory for ProviderManager<P> {
    fn strategy(&self, address: Address) -> Arc<dyn StrategyReader> {
        debug!(strategy = %address, "Binding strategy contract");
        Arc::new(StrategyContract::new(address, self.provider.clone()))
    }

    fn price_feed(&self, address: Address) -> Arc<dyn PriceFeed> {
        debug!(oracle = %address, "Binding aggregator contract");
        Arc::new(AggregatorContract::new(address, self.provider.clone()))
    }

    fn pool(&self, address: Address) -> Arc<dyn LendingPool> {
        debug!(pool = %address, "Binding pool contract");
        Arc::new(PoolContract::new(address, self.provider.clone()))
    }
}
