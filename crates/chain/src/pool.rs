//! Aave V3 style lending pool client.
//!
//! Only the reserve-data read is needed: the keeper compares the live
//! variable borrow rate of a debt reserve against per-strategy thresholds.

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

sol! {
    #[derive(Debug)]
    struct ReserveConfigurationMap {
        uint256 data;
    }

    /// Reserve state as returned by `getReserveData`
    #[derive(Debug)]
    struct ReserveDataLegacy {
        ReserveConfigurationMap configuration;
        uint128 liquidityIndex;
        uint128 currentLiquidityRate;
        uint128 variableBorrowIndex;
        uint128 currentVariableBorrowRate;
        uint128 currentStableBorrowRate;
        uint40 lastUpdateTimestamp;
        uint16 id;
        address aTokenAddress;
        address stableDebtTokenAddress;
        address variableDebtTokenAddress;
        address interestRateStrategyAddress;
        uint128 accruedToTreasury;
        uint128 unbacked;
        uint128 isolationModeTotalDebt;
    }

    /// Lending pool read interface and the events the keeper reacts to
    #[sol(rpc)]
    interface IPool {
        function getReserveData(address asset) external view returns (ReserveDataLegacy memory);

        event Supply(address indexed reserve, address user, address indexed onBehalfOf, uint256 amount, uint16 indexed referralCode);
        event Withdraw(address indexed reserve, address indexed user, address indexed to, uint256 amount);
        event Borrow(address indexed reserve, address user, address indexed onBehalfOf, uint256 amount, uint8 interestRateMode, uint256 borrowRate, uint16 indexed referralCode);
        event Repay(address indexed reserve, address indexed user, address indexed repayer, uint256 amount, bool useATokens);
        event LiquidationCall(address indexed collateralAsset, address indexed debtAsset, address indexed user, uint256 debtToCover, uint256 liquidatedCollateralAmount, address liquidator, bool receiveAToken);
    }
}

/// Rates and indexes of a reserve, all in RAY (27 decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRates {
    pub liquidity_index: U256,
    pub current_liquidity_rate: U256,
    pub variable_borrow_index: U256,
    pub current_variable_borrow_rate: U256,
    pub current_stable_borrow_rate: U256,
    pub last_update_timestamp: u64,
}

impl From<ReserveDataLegacy> for ReserveRates {
    fn from(data: ReserveDataLegacy) -> Self {
        Self {
            liquidity_index: U256::from(data.liquidityIndex),
            current_liquidity_rate: U256::from(data.currentLiquidityRate),
            variable_borrow_index: U256::from(data.variableBorrowIndex),
            current_variable_borrow_rate: U256::from(data.currentVariableBorrowRate),
            current_stable_borrow_rate: U256::from(data.currentStableBorrowRate),
            last_update_timestamp: data.lastUpdateTimestamp.to::<u64>(),
        }
    }
}

/// Read interface for a lending pool.
#[async_trait]
pub trait LendingPool: Send + Sync + Debug {
    /// Pool contract address.
    fn address(&self) -> Address;

    /// Reserve rates for `asset`.
    async fn reserve_rates(&self, asset: Address) -> Result<ReserveRates>;
}

/// Typed client for a deployed lending pool.
#[derive(Clone)]
pub struct PoolContract<P> {
    address: Address,
    provider: Arc<P>,
}

impl<P> Debug for PoolContract<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolContract")
            .field("address", &self.address)
            .finish()
    }
}

impl<P: Provider + Clone + 'static> PoolContract<P> {
    /// Create a client bound to `address`.
    pub fn new(address: Address, provider: Arc<P>) -> Self {
        Self { address, provider }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> LendingPool for PoolContract<P> {
    fn address(&self) -> Address {
        self.address
    }

    async fn reserve_rates(&self, asset: Address) -> Result<ReserveRates> {
        let contract = IPool::new(self.address, &*self.provider);
        let data = contract.getReserveData(asset).call().await?;
        Ok(data._0.into())
    }
}
