//! Loop strategy vault client.
//!
//! A loop strategy is an ERC-4626 style vault that holds a leveraged
//! collateral/debt position in a lending pool and rebalances it around a
//! target collateral ratio.

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

sol! {
    /// Collateral ratio bounds configured on a strategy
    #[derive(Debug)]
    struct CollateralRatio {
        uint256 target;
        uint256 minForRebalance;
        uint256 maxForRebalance;
        uint256 minForWithdrawRebalance;
        uint256 maxForDepositRebalance;
    }

    /// Loop strategy read interface
    #[sol(rpc)]
    interface ILoopStrategy {
        function rebalanceNeeded() external view returns (bool);
        function debtUSD() external view returns (uint256);
        function collateralUSD() external view returns (uint256);
        function currentCollateralRatio() external view returns (uint256);
        function getCollateralRatioTargets() external view returns (CollateralRatio memory);
        function equity() external view returns (uint256);
        function totalSupply() external view returns (uint256);

        event Deposit(address indexed sender, address indexed owner, uint256 assets, uint256 shares);
        event Withdraw(
            address indexed sender,
            address indexed receiver,
            address indexed owner,
            uint256 assets,
            uint256 shares
        );
    }
}

/// Collateral ratio targets, in the order the contract returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralRatioTargets {
    pub target: U256,
    /// Lower bound; below it the strategy must rebalance
    pub min_for_rebalance: U256,
    pub max_for_rebalance: U256,
    pub min_for_withdraw_rebalance: U256,
    pub max_for_deposit_rebalance: U256,
}

impl From<CollateralRatio> for CollateralRatioTargets {
    fn from(ratio: CollateralRatio) -> Self {
        Self {
            target: ratio.target,
            min_for_rebalance: ratio.minForRebalance,
            max_for_rebalance: ratio.maxForRebalance,
            min_for_withdraw_rebalance: ratio.minForWithdrawRebalance,
            max_for_deposit_rebalance: ratio.maxForDepositRebalance,
        }
    }
}

/// Read interface for a loop strategy.
#[async_trait]
pub trait StrategyReader: Send + Sync + Debug {
    /// Strategy contract address.
    fn address(&self) -> Address;

    /// Whether the strategy's collateral ratio is out of bounds.
    async fn rebalance_needed(&self) -> Result<bool>;

    /// Total debt in USD (8 decimals).
    async fn debt_usd(&self) -> Result<U256>;

    /// Total collateral in USD (8 decimals).
    async fn collateral_usd(&self) -> Result<U256>;

    /// Live collateral ratio.
    async fn current_collateral_ratio(&self) -> Result<U256>;

    /// Configured collateral ratio bounds.
    async fn collateral_ratio_targets(&self) -> Result<CollateralRatioTargets>;

    /// Strategy equity in underlying units.
    async fn equity(&self) -> Result<U256>;

    /// Outstanding share supply.
    async fn total_supply(&self) -> Result<U256>;
}

/// Typed client for a deployed loop strategy.
#[derive(Clone)]
pub struct StrategyContract<P> {
    address: Address,
    provider: Arc<P>,
}

impl<P> Debug for StrategyContract<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyContract")
            .field("address", &self.address)
            .finish()
    }
}

impl<P: Provider + Clone + 'static> StrategyContract<P> {
    /// Create a client bound to `address`.
    pub fn new(address: Address, provider: Arc<P>) -> Self {
        Self { address, provider }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> StrategyReader for StrategyContract<P> {
    fn address(&self) -> Address {
        self.address
    }

    async fn rebalance_needed(&self) -> Result<bool> {
        let contract = ILoopStrategy::new(self.address, &*self.provider);
        Ok(contract.rebalanceNeeded().call().await?._0)
    }

    async fn debt_usd(&self) -> Result<U256> {
        let contract = ILoopStrategy::new(self.address, &*self.provider);
        Ok(contract.debtUSD().call().await?._0)
    }

    async fn collateral_usd(&self) -> Result<U256> {
        let contract = ILoopStrategy::new(self.address, &*self.provider);
        Ok(contract.collateralUSD().call().await?._0)
    }

    async fn current_collateral_ratio(&self) -> Result<U256> {
        let contract = ILoopStrategy::new(self.address, &*self.provider);
        Ok(contract.currentCollateralRatio().call().await?._0)
    }

    async fn collateral_ratio_targets(&self) -> Result<CollateralRatioTargets> {
        let contract = ILoopStrategy::new(self.address, &*self.provider);
        let targets = contract.getCollateralRatioTargets().call().await?;
        Ok(targets._0.into())
    }

    async fn equity(&self) -> Result<U256> {
        let contract = ILoopStrategy::new(self.address, &*self.provider);
        Ok(contract.equity().call().await?._0)
    }

    async fn total_supply(&self) -> Result<U256> {
        let contract = ILoopStrategy::new(self.address, &*self.provider);
        Ok(contract.totalSupply().call().await?._0)
    }
}
