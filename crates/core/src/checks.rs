//! Individual strategy and oracle checks.
//!
//! Each check reads what it needs from chain, derives a state record and
//! logs any read failure with the check name and contract before handing
//! the error back to the evaluator.

use alloy::primitives::{Address, I256, U256};
use keeper_chain::{LendingPool, PriceFeed, StrategyReader};
use tracing::{debug, error};

use crate::eps_store::EpsStore;
use crate::error::{KeeperError, KeeperResult};
use crate::state::{EpsState, ExposureState, OracleState, RiskState, SequencerState};
use crate::u256_math;

const HEALTH_FACTOR_CHECK: &str = "health factor";
const COLLATERAL_RATIO_CHECK: &str = "collateral ratio";
const EQUITY_PER_SHARE_CHECK: &str = "equity per share";
const REBALANCE_CHECK: &str = "rebalance";
const ORACLE_CHECK: &str = "oracle staleness";
const SEQUENCER_CHECK: &str = "sequencer uptime";
const PRICE_CHECK: &str = "latest answer";
const BORROW_RATE_CHECK: &str = "borrow rate";

fn read_failed(check: &'static str, contract: Address, source: anyhow::Error) -> KeeperError {
    error!(
        contract = %contract,
        error = %source,
        "An error has occurred during {} check",
        check
    );
    KeeperError::contract_read(check, contract, source)
}

fn store_failed(check: &'static str, contract: Address, err: KeeperError) -> KeeperError {
    error!(
        contract = %contract,
        error = %err,
        "An error has occurred during {} check",
        check
    );
    err
}

/// Health factor check: at risk when `collateral * 1e8 / debt` is below
/// `threshold` (8 decimals).
pub async fn is_strategy_at_risk(
    strategy: &dyn StrategyReader,
    threshold: U256,
) -> KeeperResult<RiskState> {
    let (debt, collateral) = tokio::try_join!(strategy.debt_usd(), strategy.collateral_usd())
        .map_err(|e| read_failed(HEALTH_FACTOR_CHECK, strategy.address(), e))?;

    let health_factor = u256_math::health_factor(collateral, debt);
    let state = RiskState {
        is_at_risk: health_factor < threshold,
        health_factor,
    };
    debug!(
        strategy = %strategy.address(),
        health_factor = %u256_math::format_units(health_factor, u256_math::HEALTH_FACTOR_DECIMALS),
        at_risk = state.is_at_risk,
        "Health factor checked"
    );
    Ok(state)
}

/// Exposure check: over-exposed when the live collateral ratio is below
/// the strategy's `minForRebalance` target.
pub async fn is_strategy_overexposed(strategy: &dyn StrategyReader) -> KeeperResult<ExposureState> {
    let (current, targets) = tokio::try_join!(
        strategy.current_collateral_ratio(),
        strategy.collateral_ratio_targets()
    )
    .map_err(|e| read_failed(COLLATERAL_RATIO_CHECK, strategy.address(), e))?;

    let state = ExposureState {
        is_over_exposed: current < targets.min_for_rebalance,
        current,
        min: targets.min_for_rebalance,
    };
    debug!(
        strategy = %strategy.address(),
        current = %current,
        min = %state.min,
        over_exposed = state.is_over_exposed,
        "Collateral ratio checked"
    );
    Ok(state)
}

/// Live equity per share (WAD), `None` while no shares are outstanding.
pub async fn equity_per_share(strategy: &dyn StrategyReader) -> KeeperResult<Option<U256>> {
    let (equity, supply) = tokio::try_join!(strategy.equity(), strategy.total_supply())
        .map_err(|e| read_failed(EQUITY_PER_SHARE_CHECK, strategy.address(), e))?;
    Ok(u256_math::equity_per_share(equity, supply))
}

/// EPS check: decreased when the live value is strictly below the last
/// persisted one.
///
/// A strategy without history gets its current value recorded and is never
/// reported on that first observation. Existing history is left untouched;
/// price updates are what advance it. With no shares outstanding there is
/// nothing to compare and nothing is recorded.
pub async fn has_eps_decreased(
    store: &EpsStore,
    strategy: &dyn StrategyReader,
) -> KeeperResult<EpsState> {
    let address = strategy.address();
    let (current, previous) = tokio::try_join!(equity_per_share(strategy), async {
        store
            .previous(&address)
            .await
            .map_err(|e| store_failed(EQUITY_PER_SHARE_CHECK, address, e))
    })?;

    if let (None, Some(eps)) = (previous, current) {
        store
            .update(&address, eps)
            .await
            .map_err(|e| store_failed(EQUITY_PER_SHARE_CHECK, address, e))?;
    }

    let state = EpsState {
        has_eps_decreased: matches!((previous, current), (Some(p), Some(c)) if c < p),
        previous,
        current,
    };
    debug!(
        strategy = %address,
        current = ?current.map(|c| u256_math::format_units(c, u256_math::EPS_DECIMALS)),
        decreased = state.has_eps_decreased,
        "Equity per share checked"
    );
    Ok(state)
}

/// Recompute and persist a strategy's EPS. Skipped while no shares are
/// outstanding, leaving the last recorded value in place.
pub async fn update_eps(
    store: &EpsStore,
    strategy: &dyn StrategyReader,
) -> KeeperResult<Option<U256>> {
    let address = strategy.address();
    let Some(eps) = equity_per_share(strategy).await? else {
        debug!(strategy = %address, "No shares outstanding, equity per share not recorded");
        return Ok(None);
    };
    store
        .update(&address, eps)
        .await
        .map_err(|e| store_failed(EQUITY_PER_SHARE_CHECK, address, e))?;
    Ok(Some(eps))
}

/// Whether the strategy reports that it needs a rebalance.
pub async fn rebalance_needed(strategy: &dyn StrategyReader) -> KeeperResult<bool> {
    strategy
        .rebalance_needed()
        .await
        .map_err(|e| read_failed(REBALANCE_CHECK, strategy.address(), e))
}

/// Oracle check: out when the latest round is older than
/// `staleness_secs`, carries a non-positive answer, or was answered in an
/// earlier round.
pub async fn is_oracle_out(
    oracle: &dyn PriceFeed,
    staleness_secs: u64,
    now: u64,
) -> KeeperResult<OracleState> {
    let round = oracle
        .latest_round()
        .await
        .map_err(|e| read_failed(ORACLE_CHECK, oracle.address(), e))?;

    let state = OracleState {
        is_out: round.is_stale(staleness_secs, now) || !round.is_valid(),
        round_id: round.round_id,
        answer: round.answer,
        updated_at: round.updated_at,
        age_secs: round.age_secs(now),
        staleness_threshold_secs: staleness_secs,
    };
    debug!(
        oracle = %oracle.address(),
        age_secs = state.age_secs,
        out = state.is_out,
        "Oracle freshness checked"
    );
    Ok(state)
}

/// Latest answer reported by a price feed.
pub async fn latest_answer(oracle: &dyn PriceFeed) -> KeeperResult<I256> {
    oracle
        .latest_answer()
        .await
        .map_err(|e| read_failed(PRICE_CHECK, oracle.address(), e))
}

/// Live variable borrow rate (RAY) of a pool reserve.
pub async fn variable_borrow_rate(pool: &dyn LendingPool, reserve: Address) -> KeeperResult<U256> {
    let rates = pool
        .reserve_rates(reserve)
        .await
        .map_err(|e| read_failed(BORROW_RATE_CHECK, pool.address(), e))?;
    debug!(
        pool = %pool.address(),
        reserve = %reserve,
        rate_pct = %u256_math::format_ray_percent(rates.current_variable_borrow_rate),
        "Borrow rate read"
    );
    Ok(rates.current_variable_borrow_rate)
}

/// Sequencer check against an uptime feed.
///
/// A non-zero answer means the sequencer is down. After it comes back the
/// sequencer keeps being reported out until `grace_period_secs` have passed
/// since the status change.
pub async fn sequencer_state(
    feed: &dyn PriceFeed,
    grace_period_secs: u64,
    now: u64,
) -> KeeperResult<SequencerState> {
    let round = feed
        .latest_round()
        .await
        .map_err(|e| read_failed(SEQUENCER_CHECK, feed.address(), e))?;

    let is_down = !round.answer.is_zero();
    let state = SequencerState {
        is_down,
        is_recovering: !is_down && now.saturating_sub(round.started_at) < grace_period_secs,
        started_at: round.started_at,
    };
    debug!(
        feed = %feed.address(),
        down = state.is_down,
        recovering = state.is_recovering,
        "Sequencer status checked"
    );
    Ok(state)
}
