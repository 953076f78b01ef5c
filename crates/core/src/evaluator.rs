//! Evaluators for the three event families.
//!
//! Evaluators turn one matched event into zero or more findings. They never
//! swallow errors: a failed read aborts the evaluation and is returned to
//! the dispatcher, which already has it logged by the failing check.

use std::sync::Arc;

use alloy::primitives::Address;
use futures::future::try_join_all;
use keeper_chain::{ContractFactory, PoolActionType};
use tracing::{debug, info};

use crate::checks;
use crate::config::ResolvedDeployment;
use crate::eps_store::EpsStore;
use crate::error::{KeeperError, KeeperResult};
use crate::state::{BorrowRateFinding, Finding, PriceUpdateFinding};
use crate::u256_math;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Shared evaluation context.
#[derive(Clone)]
pub struct Evaluator {
    config: Arc<ResolvedDeployment>,
    contracts: Arc<dyn ContractFactory>,
    eps_store: EpsStore,
}

impl Evaluator {
    /// Create an evaluator over a resolved deployment.
    pub fn new(
        config: Arc<ResolvedDeployment>,
        contracts: Arc<dyn ContractFactory>,
        eps_store: EpsStore,
    ) -> Self {
        Self {
            config,
            contracts,
            eps_store,
        }
    }

    /// Risk, exposure and EPS checks after a vault deposit or withdrawal.
    ///
    /// Findings come back in that order, one per failed check.
    pub async fn withdraw_or_deposit(&self, strategy: Address) -> KeeperResult<Vec<Finding>> {
        if self.config.strategy(&strategy).is_none() {
            debug!(strategy = %strategy, "Strategy not declared in deployment, checking anyway");
        }
        let reader = self.contracts.strategy(strategy);

        let (risk_state, exposure_state, eps_state) = tokio::try_join!(
            checks::is_strategy_at_risk(reader.as_ref(), self.config.health_factor_threshold),
            checks::is_strategy_overexposed(reader.as_ref()),
            checks::has_eps_decreased(&self.eps_store, reader.as_ref()),
        )?;

        let mut findings = Vec::new();
        if risk_state.is_at_risk {
            findings.push(Finding::Risk {
                strategy,
                risk_state,
            });
        }
        if exposure_state.is_over_exposed {
            findings.push(Finding::Exposure {
                strategy,
                exposure_state,
            });
        }
        if eps_state.has_eps_decreased {
            findings.push(Finding::Eps {
                strategy,
                eps_state,
            });
        }

        info!(
            strategy = %strategy,
            at_risk = risk_state.is_at_risk,
            over_exposed = exposure_state.is_over_exposed,
            eps_decreased = eps_state.has_eps_decreased,
            "Strategy checks complete"
        );
        Ok(findings)
    }

    /// Oracle update: refresh EPS of every strategy priced by the oracle,
    /// collect those needing a rebalance, and check oracle and sequencer
    /// health.
    ///
    /// Returns a finding only when something needs attention.
    pub async fn price_update(&self, oracle: Address, now: u64) -> KeeperResult<Option<Finding>> {
        let feed = self.contracts.price_feed(oracle);
        let latest_answer = checks::latest_answer(feed.as_ref()).await?;

        let strategies = self.config.strategies_for_oracle(&oracle);
        if strategies.is_empty() {
            debug!(oracle = %oracle, "No strategies mapped to oracle");
        }

        let strategy_checks = try_join_all(strategies.iter().map(|address| async move {
            let reader = self.contracts.strategy(*address);
            let (_, needs_rebalance) = tokio::try_join!(
                checks::update_eps(&self.eps_store, reader.as_ref()),
                checks::rebalance_needed(reader.as_ref()),
            )?;
            Ok::<_, KeeperError>((*address, needs_rebalance))
        }));

        let oracle_check =
            checks::is_oracle_out(feed.as_ref(), self.config.staleness_secs(&oracle), now);

        let sequencer_check = async {
            match &self.config.sequencer {
                Some(sequencer) => {
                    let uptime = self.contracts.price_feed(sequencer.feed);
                    checks::sequencer_state(uptime.as_ref(), sequencer.grace_period_secs, now)
                        .await
                        .map(Some)
                }
                None => Ok(None),
            }
        };

        let (rebalance, oracle_state, sequencer_state) =
            tokio::try_join!(strategy_checks, oracle_check, sequencer_check)?;

        let strategies_to_rebalance: Vec<Address> = rebalance
            .into_iter()
            .filter_map(|(address, needed)| needed.then_some(address))
            .collect();
        let is_sequencer_out = sequencer_state.is_some_and(|s| s.is_out());

        info!(
            oracle = %oracle,
            answer = %latest_answer,
            to_rebalance = strategies_to_rebalance.len(),
            oracle_out = oracle_state.is_out,
            sequencer_out = is_sequencer_out,
            "Price update checks complete"
        );

        if strategies_to_rebalance.is_empty() && !oracle_state.is_out && !is_sequencer_out {
            return Ok(None);
        }

        Ok(Some(Finding::PriceUpdate(PriceUpdateFinding {
            oracle,
            latest_answer,
            strategies_to_rebalance,
            oracle_state,
            sequencer_state,
            is_sequencer_out,
        })))
    }

    /// Lending pool action: compare the reserve's variable borrow rate with
    /// the thresholds of strategies borrowing it.
    ///
    /// Reserves no strategy borrows are skipped without a contract read.
    pub async fn pool_action(
        &self,
        action: PoolActionType,
        pool: Address,
        reserve: Address,
    ) -> KeeperResult<Option<Finding>> {
        let Some(strategies) = self.config.strategies_for_debt_token(&reserve) else {
            debug!(?action, reserve = %reserve, "Reserve not borrowed by any strategy");
            return Ok(None);
        };

        let rate = checks::variable_borrow_rate(self.contracts.pool(pool).as_ref(), reserve).await?;

        let affected_strategies: Vec<Address> = strategies
            .iter()
            .filter(|address| {
                self.config
                    .borrow_rate_threshold(address)
                    .is_some_and(|threshold| threshold < rate)
            })
            .copied()
            .collect();

        info!(
            ?action,
            reserve = %reserve,
            rate_pct = %u256_math::format_ray_percent(rate),
            affected = affected_strategies.len(),
            "Borrow rate checked"
        );

        if affected_strategies.is_empty() {
            return Ok(None);
        }
        Ok(Some(Finding::BorrowRate(BorrowRateFinding {
            reserve,
            curr_borrow_rate: rate,
            affected_strategies,
        })))
    }
}
