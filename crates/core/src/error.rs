//! Keeper error type.

use alloy::primitives::Address;
use thiserror::Error;

/// Failure while evaluating a match reason.
///
/// Every variant carries enough context (check name, contract address) for
/// the log line emitted at the point of failure.
#[derive(Debug, Error)]
pub enum KeeperError {
    /// A read call against a contract failed.
    #[error("{check} check failed reading {contract}: {source}")]
    ContractRead {
        check: &'static str,
        contract: Address,
        #[source]
        source: anyhow::Error,
    },

    /// The key-value store could not be read or written.
    #[error("store access failed for key {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A persisted value could not be decoded.
    #[error("corrupt value {value:?} stored under {key}")]
    CorruptValue { key: String, value: String },

    /// The event payload is missing a required field.
    #[error("malformed event {event}: {reason}")]
    MalformedEvent { event: String, reason: String },
}

impl KeeperError {
    /// Wrap a contract read failure.
    pub fn contract_read(check: &'static str, contract: Address, source: anyhow::Error) -> Self {
        Self::ContractRead {
            check,
            contract,
            source,
        }
    }
}

/// Result alias for keeper evaluation.
pub type KeeperResult<T> = Result<T, KeeperError>;
