//! Persisted equity-per-share history.
//!
//! One value per strategy, stored under `eps:<address>` as a decimal string
//! so the record stays readable from the store's own tooling.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use keeper_api::KeyValueStore;
use tracing::debug;

use crate::error::{KeeperError, KeeperResult};

const KEY_PREFIX: &str = "eps:";

/// Equity-per-share store backed by a key-value service.
#[derive(Clone)]
pub struct EpsStore {
    store: Arc<dyn KeyValueStore>,
}

impl EpsStore {
    /// Wrap a key-value store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Store key for a strategy.
    pub fn key(strategy: &Address) -> String {
        format!("{}{}", KEY_PREFIX, strategy)
    }

    /// Last persisted EPS of a strategy, `None` if never recorded.
    pub async fn previous(&self, strategy: &Address) -> KeeperResult<Option<U256>> {
        let key = Self::key(strategy);
        let raw = self
            .store
            .get(&key)
            .await
            .map_err(|source| KeeperError::Store {
                key: key.clone(),
                source,
            })?;

        match raw {
            None => Ok(None),
            Some(value) => U256::from_str_radix(value.trim(), 10)
                .map(Some)
                .map_err(|_| KeeperError::CorruptValue { key, value }),
        }
    }

    /// Persist the latest EPS of a strategy.
    pub async fn update(&self, strategy: &Address, eps: U256) -> KeeperResult<()> {
        let key = Self::key(strategy);
        self.store
            .put(&key, &eps.to_string())
            .await
            .map_err(|source| KeeperError::Store {
                key: key.clone(),
                source,
            })?;
        debug!(strategy = %strategy, eps = %eps, "Persisted equity per share");
        Ok(())
    }
}

impl std::fmt::Debug for EpsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpsStore").finish_non_exhaustive()
    }
}
