//! Check results and match records.
//!
//! Field names serialize in camelCase because the records are handed back
//! to the monitoring platform as JSON.

use alloy::primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

/// Health factor check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskState {
    pub is_at_risk: bool,
    /// `collateralUSD * 1e8 / debtUSD`
    pub health_factor: U256,
}

/// Collateral ratio check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureState {
    pub is_over_exposed: bool,
    /// Live collateral ratio
    pub current: U256,
    /// `minForRebalance` target
    pub min: U256,
}

/// Equity-per-share check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpsState {
    #[serde(rename = "hasEPSDecreased")]
    pub has_eps_decreased: bool,
    /// Last persisted value, `None` on first observation
    pub previous: Option<U256>,
    /// Freshly computed value (WAD), `None` while the supply is zero
    pub current: Option<U256>,
}

/// Oracle freshness check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleState {
    pub is_out: bool,
    pub round_id: u128,
    pub answer: I256,
    pub updated_at: u64,
    pub age_secs: u64,
    pub staleness_threshold_secs: u64,
}

/// L2 sequencer status from the uptime feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencerState {
    /// Feed reports the sequencer down
    pub is_down: bool,
    /// Sequencer is up but recovered less than a grace period ago
    pub is_recovering: bool,
    /// When the current status began
    pub started_at: u64,
}

impl SequencerState {
    /// Whether prices should be distrusted.
    pub fn is_out(&self) -> bool {
        self.is_down || self.is_recovering
    }
}

/// Kind of event a match was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    Withdraw,
    Deposit,
    PriceUpdate,
    BorrowRate,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Withdraw => write!(f, "withdraw"),
            Self::Deposit => write!(f, "deposit"),
            Self::PriceUpdate => write!(f, "priceUpdate"),
            Self::BorrowRate => write!(f, "borrowRate"),
        }
    }
}

/// Price update evaluation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdateFinding {
    pub oracle: Address,
    pub latest_answer: I256,
    pub strategies_to_rebalance: Vec<Address>,
    pub oracle_state: OracleState,
    /// `None` when no uptime feed is configured
    pub sequencer_state: Option<SequencerState>,
    pub is_sequencer_out: bool,
}

/// Borrow rate evaluation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRateFinding {
    pub reserve: Address,
    /// Live variable borrow rate (RAY)
    pub curr_borrow_rate: U256,
    pub affected_strategies: Vec<Address>,
}

/// One adverse finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Finding {
    Risk {
        strategy: Address,
        #[serde(rename = "riskState")]
        risk_state: RiskState,
    },
    Exposure {
        strategy: Address,
        #[serde(rename = "exposureState")]
        exposure_state: ExposureState,
    },
    Eps {
        strategy: Address,
        #[serde(rename = "EPSState")]
        eps_state: EpsState,
    },
    PriceUpdate(PriceUpdateFinding),
    BorrowRate(BorrowRateFinding),
}

/// Match metadata: the type tag plus the finding's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchMetadata {
    #[serde(rename = "type")]
    pub kind: MatchType,
    #[serde(flatten)]
    pub finding: Finding,
}

/// A finding tied to the event that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Triggering transaction hash
    pub hash: B256,
    pub metadata: MatchMetadata,
}

impl Match {
    /// Create a match record.
    pub fn new(hash: B256, kind: MatchType, finding: Finding) -> Self {
        Self {
            hash,
            metadata: MatchMetadata { kind, finding },
        }
    }

    /// Match type.
    pub fn kind(&self) -> MatchType {
        self.metadata.kind
    }

    /// Match finding.
    pub fn finding(&self) -> &Finding {
        &self.metadata.finding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_risk_match_json_shape() {
        let m = Match::new(
            B256::repeat_byte(0xab),
            MatchType::Withdraw,
            Finding::Risk {
                strategy: Address::repeat_byte(0x01),
                risk_state: RiskState {
                    is_at_risk: true,
                    health_factor: U256::from(100u64),
                },
            },
        );

        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["metadata"]["type"], json!("withdraw"));
        assert_eq!(value["metadata"]["riskState"]["isAtRisk"], json!(true));
        assert!(value["metadata"]["riskState"]["healthFactor"].is_string());
        assert!(value["metadata"]["strategy"].is_string());
        assert!(value["hash"].as_str().unwrap().starts_with("0xabab"));
    }

    #[test]
    fn test_eps_field_names() {
        let finding = Finding::Eps {
            strategy: Address::ZERO,
            eps_state: EpsState {
                has_eps_decreased: true,
                previous: Some(U256::from(2u64)),
                current: Some(U256::from(1u64)),
            },
        };
        let m = Match::new(B256::ZERO, MatchType::Deposit, finding);

        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["metadata"]["type"], json!("deposit"));
        assert_eq!(value["metadata"]["EPSState"]["hasEPSDecreased"], json!(true));
    }

    #[test]
    fn test_borrow_rate_match_json_shape() {
        let m = Match::new(
            B256::ZERO,
            MatchType::BorrowRate,
            Finding::BorrowRate(BorrowRateFinding {
                reserve: Address::repeat_byte(0x42),
                curr_borrow_rate: U256::from(4u64),
                affected_strategies: vec![Address::repeat_byte(0x01)],
            }),
        );

        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["metadata"]["type"], json!("borrowRate"));
        assert_eq!(value["metadata"]["affectedStrategies"].as_array().unwrap().len(), 1);
        assert!(value["metadata"]["currBorrowRate"].is_string());
    }

    #[test]
    fn test_sequencer_out() {
        let up = SequencerState {
            is_down: false,
            is_recovering: false,
            started_at: 0,
        };
        assert!(!up.is_out());
        assert!(SequencerState { is_recovering: true, ..up }.is_out());
        assert!(SequencerState { is_down: true, ..up }.is_out());
    }

    #[test]
    fn test_match_type_display() {
        assert_eq!(MatchType::PriceUpdate.to_string(), "priceUpdate");
        assert_eq!(
            serde_json::to_value(MatchType::PriceUpdate).unwrap(),
            json!("priceUpdate")
        );
    }
}
