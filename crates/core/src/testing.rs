//! Test doubles for contract readers and log capture.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, I256, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use keeper_chain::{
    CollateralRatioTargets, ContractFactory, LendingPool, PriceFeed, ReserveRates, RoundData,
    StrategyReader,
};
use tracing_subscriber::fmt::MakeWriter;

pub fn now_secs() -> u64 {
    crate::evaluator::unix_now()
}

#[derive(Debug, Clone)]
pub struct MockStrategy {
    pub address: Address,
    pub rebalance_needed: bool,
    pub debt_usd: U256,
    pub collateral_usd: U256,
    pub current_ratio: U256,
    pub min_for_rebalance: U256,
    pub equity: U256,
    pub total_supply: U256,
    /// Method names that revert
    pub failing: Vec<&'static str>,
}

impl MockStrategy {
    /// Healthy strategy: HF 2.0, ratio above target, EPS 1.0.
    pub fn healthy(address: Address) -> Self {
        Self {
            address,
            rebalance_needed: false,
            debt_usd: U256::from(500u64),
            collateral_usd: U256::from(1000u64),
            current_ratio: U256::from(200_000_000u64),
            min_for_rebalance: U256::from(150_000_000u64),
            equity: U256::from(100u64),
            total_supply: U256::from(100u64),
            failing: Vec::new(),
        }
    }

    fn check(&self, method: &'static str) -> Result<()> {
        if self.failing.contains(&method) {
            bail!("{} reverted", method);
        }
        Ok(())
    }
}

#[async_trait]
impl StrategyReader for MockStrategy {
    fn address(&self) -> Address {
        self.address
    }

    async fn rebalance_needed(&self) -> Result<bool> {
        self.check("rebalanceNeeded")?;
        Ok(self.rebalance_needed)
    }

    async fn debt_usd(&self) -> Result<U256> {
        self.check("debtUSD")?;
        Ok(self.debt_usd)
    }

    async fn collateral_usd(&self) -> Result<U256> {
        self.check("collateralUSD")?;
        Ok(self.collateral_usd)
    }

    async fn current_collateral_ratio(&self) -> Result<U256> {
        self.check("currentCollateralRatio")?;
        Ok(self.current_ratio)
    }

    async fn collateral_ratio_targets(&self) -> Result<CollateralRatioTargets> {
        self.check("getCollateralRatioTargets")?;
        Ok(CollateralRatioTargets {
            target: self.min_for_rebalance + U256::from(10_000_000u64),
            min_for_rebalance: self.min_for_rebalance,
            max_for_rebalance: self.min_for_rebalance + U256::from(20_000_000u64),
            min_for_withdraw_rebalance: self.min_for_rebalance,
            max_for_deposit_rebalance: self.min_for_rebalance + U256::from(20_000_000u64),
        })
    }

    async fn equity(&self) -> Result<U256> {
        self.check("equity")?;
        Ok(self.equity)
    }

    async fn total_supply(&self) -> Result<U256> {
        self.check("totalSupply")?;
        Ok(self.total_supply)
    }
}

#[derive(Debug, Clone)]
pub struct MockFeed {
    pub address: Address,
    pub round: RoundData,
    pub failing: bool,
}

impl MockFeed {
    /// Feed whose latest round was updated `age_secs` ago.
    pub fn with_answer(address: Address, answer: i64, age_secs: u64) -> Self {
        let updated_at = now_secs().saturating_sub(age_secs);
        Self {
            address,
            round: RoundData {
                round_id: 10,
                answer: I256::try_from(answer).unwrap(),
                started_at: updated_at,
                updated_at,
                answered_in_round: 10,
            },
            failing: false,
        }
    }
}

#[async_trait]
impl PriceFeed for MockFeed {
    fn address(&self) -> Address {
        self.address
    }

    async fn latest_answer(&self) -> Result<I256> {
        if self.failing {
            bail!("latestAnswer reverted");
        }
        Ok(self.round.answer)
    }

    async fn latest_round(&self) -> Result<RoundData> {
        if self.failing {
            bail!("latestRoundData reverted");
        }
        Ok(self.round.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockPool {
    pub address: Address,
    pub borrow_rates: HashMap<Address, U256>,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LendingPool for MockPool {
    fn address(&self) -> Address {
        self.address
    }

    async fn reserve_rates(&self, asset: Address) -> Result<ReserveRates> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(rate) = self.borrow_rates.get(&asset) else {
            bail!("reserve {} not listed", asset);
        };
        Ok(ReserveRates {
            liquidity_index: U256::ZERO,
            current_liquidity_rate: U256::ZERO,
            variable_borrow_index: U256::ZERO,
            current_variable_borrow_rate: *rate,
            current_stable_borrow_rate: U256::ZERO,
            last_update_timestamp: 0,
        })
    }
}

/// Factory serving mocks by address. Unknown addresses get contracts
/// whose every call fails.
#[derive(Debug, Default, Clone)]
pub struct MockContracts {
    pub strategies: HashMap<Address, MockStrategy>,
    pub feeds: HashMap<Address, MockFeed>,
    pub pools: HashMap<Address, MockPool>,
}

impl MockContracts {
    pub fn with_strategy(mut self, strategy: MockStrategy) -> Self {
        self.strategies.insert(strategy.address, strategy);
        self
    }

    pub fn with_feed(mut self, feed: MockFeed) -> Self {
        self.feeds.insert(feed.address, feed);
        self
    }

    pub fn with_pool(mut self, pool: MockPool) -> Self {
        self.pools.insert(pool.address, pool);
        self
    }
}

const ALL_STRATEGY_METHODS: [&str; 7] = [
    "rebalanceNeeded",
    "debtUSD",
    "collateralUSD",
    "currentCollateralRatio",
    "getCollateralRatioTargets",
    "equity",
    "totalSupply",
];

impl ContractFactory for MockContracts {
    fn strategy(&self, address: Address) -> Arc<dyn StrategyReader> {
        let strategy = self.strategies.get(&address).cloned().unwrap_or_else(|| MockStrategy {
            failing: ALL_STRATEGY_METHODS.to_vec(),
            ..MockStrategy::healthy(address)
        });
        Arc::new(strategy)
    }

    fn price_feed(&self, address: Address) -> Arc<dyn PriceFeed> {
        let feed = self.feeds.get(&address).cloned().unwrap_or_else(|| MockFeed {
            failing: true,
            ..MockFeed::with_answer(address, 0, 0)
        });
        Arc::new(feed)
    }

    fn pool(&self, address: Address) -> Arc<dyn LendingPool> {
        let pool = self.pools.get(&address).cloned().unwrap_or_else(|| MockPool {
            address,
            ..MockPool::default()
        });
        Arc::new(pool)
    }
}

/// Shared buffer receiving formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's logs into a buffer until the guard drops.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
