//! Event signatures the keeper reacts to.
//!
//! The monitoring platform reports each matched log with its canonical
//! signature string (e.g. `"AnswerUpdated(int256,uint256,uint256)"`). This
//! module maps those strings to typed variants, using the signatures derived
//! from the `sol!` definitions so they cannot drift from the ABI.

use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::oracle::IAggregator;
use crate::pool::IPool;
use crate::strategy::ILoopStrategy;

/// Lending pool action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolActionType {
    /// User supplied assets
    Supply,
    /// User withdrew assets
    Withdraw,
    /// User borrowed assets
    Borrow,
    /// User repaid debt
    Repay,
    /// Liquidation occurred
    Liquidation,
}

impl PoolActionType {
    /// Index of the debt reserve in the event arguments.
    ///
    /// `LiquidationCall` lists the collateral asset first and the debt asset
    /// second; every other pool event starts with the reserve.
    pub fn reserve_arg_index(&self) -> usize {
        match self {
            Self::Liquidation => 1,
            _ => 0,
        }
    }
}

/// Classified event signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSignature {
    /// Strategy vault deposit
    Deposit,
    /// Strategy vault withdrawal
    Withdraw,
    /// Oracle answer update
    PriceUpdate,
    /// Lending pool action
    PoolAction(PoolActionType),
}

impl EventSignature {
    /// Every signature the keeper handles.
    pub const ALL: [EventSignature; 8] = [
        Self::Deposit,
        Self::Withdraw,
        Self::PriceUpdate,
        Self::PoolAction(PoolActionType::Supply),
        Self::PoolAction(PoolActionType::Withdraw),
        Self::PoolAction(PoolActionType::Borrow),
        Self::PoolAction(PoolActionType::Repay),
        Self::PoolAction(PoolActionType::Liquidation),
    ];

    /// Parse a canonical signature string. Unknown signatures yield `None`.
    pub fn from_signature(signature: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.signature() == signature)
    }

    /// Canonical signature string.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Deposit => ILoopStrategy::Deposit::SIGNATURE,
            Self::Withdraw => ILoopStrategy::Withdraw::SIGNATURE,
            Self::PriceUpdate => IAggregator::AnswerUpdated::SIGNATURE,
            Self::PoolAction(PoolActionType::Supply) => IPool::Supply::SIGNATURE,
            Self::PoolAction(PoolActionType::Withdraw) => IPool::Withdraw::SIGNATURE,
            Self::PoolAction(PoolActionType::Borrow) => IPool::Borrow::SIGNATURE,
            Self::PoolAction(PoolActionType::Repay) => IPool::Repay::SIGNATURE,
            Self::PoolAction(PoolActionType::Liquidation) => IPool::LiquidationCall::SIGNATURE,
        }
    }
}
