//! Human-readable alerts for matches.
//!
//! Each match renders into one or more notifications on the deployment's
//! alert channel. Delivery failures are logged and skipped; the match
//! itself has already been recorded by then.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::Result;
use keeper_api::{Notification, NotificationClient};
use tracing::{error, info, warn};

use crate::config::ResolvedDeployment;
use crate::state::{
    BorrowRateFinding, EpsState, ExposureState, Finding, Match, OracleState, PriceUpdateFinding,
    RiskState, SequencerState,
};
use crate::u256_math::{self, EPS_DECIMALS, HEALTH_FACTOR_DECIMALS};

/// Sends match alerts to a notification channel.
#[derive(Clone)]
pub struct Alerter {
    client: Arc<dyn NotificationClient>,
    config: Arc<ResolvedDeployment>,
}

impl Alerter {
    pub fn new(client: Arc<dyn NotificationClient>, config: Arc<ResolvedDeployment>) -> Self {
        Self { client, config }
    }

    /// Channel alerts are sent to.
    pub fn channel(&self) -> &str {
        &self.config.alert_channel
    }

    /// Whether the alert channel is configured on the notification service.
    ///
    /// Logs `No alert notification channels exist.` when it is not.
    pub async fn check_alert_channels_exist(&self) -> Result<bool> {
        let channels = self.client.list_channels().await?;
        let exists = channels.iter().any(|c| c.name == self.channel());
        if !exists {
            error!(channel = %self.channel(), "No alert notification channels exist.");
        }
        Ok(exists)
    }

    /// Send every alert a match calls for.
    pub async fn notify(&self, m: &Match) {
        for notification in self.render(m) {
            match self.client.send(&notification).await {
                Ok(()) => info!(subject = %notification.subject, hash = %m.hash, "Alert sent"),
                Err(e) => warn!(
                    subject = %notification.subject,
                    hash = %m.hash,
                    error = %e,
                    "Failed to send alert"
                ),
            }
        }
    }

    /// Notifications for a match.
    pub fn render(&self, m: &Match) -> Vec<Notification> {
        match m.finding() {
            Finding::Risk {
                strategy,
                risk_state,
            } => vec![self.health_factor_alert(strategy, risk_state)],
            Finding::Exposure {
                strategy,
                exposure_state,
            } => vec![self.exposure_alert(strategy, exposure_state)],
            Finding::Eps {
                strategy,
                eps_state,
            } => vec![self.eps_alert(strategy, eps_state)],
            Finding::PriceUpdate(finding) => self.price_update_alerts(finding),
            Finding::BorrowRate(finding) => vec![self.borrow_rate_alert(finding)],
        }
    }

    fn strategy_label(&self, strategy: &Address) -> String {
        match self.config.strategy(strategy) {
            Some(s) if !s.name.is_empty() => format!("{} ({})", s.name, strategy),
            _ => strategy.to_string(),
        }
    }

    fn oracle_label(&self, oracle: &Address) -> String {
        match self.config.oracle(oracle) {
            Some(o) if !o.description.is_empty() => format!("{} ({})", o.description, oracle),
            _ => oracle.to_string(),
        }
    }

    fn alert(&self, subject: impl Into<String>, message: impl Into<String>) -> Notification {
        Notification::new(self.channel(), subject, message)
    }

    fn health_factor_alert(&self, strategy: &Address, state: &RiskState) -> Notification {
        self.alert(
            "Strategy health factor below threshold",
            format!(
                "Health factor of {} is {}, below the {} threshold.",
                self.strategy_label(strategy),
                u256_math::format_units(state.health_factor, HEALTH_FACTOR_DECIMALS),
                u256_math::format_units(self.config.health_factor_threshold, HEALTH_FACTOR_DECIMALS),
            ),
        )
    }

    fn exposure_alert(&self, strategy: &Address, state: &ExposureState) -> Notification {
        self.alert(
            "Strategy over-exposed",
            format!(
                "Collateral ratio of {} is {}, below its minimum of {}.",
                self.strategy_label(strategy),
                state.current,
                state.min,
            ),
        )
    }

    fn eps_alert(&self, strategy: &Address, state: &EpsState) -> Notification {
        let format = |eps: Option<U256>| {
            eps.map(|v| u256_math::format_units(v, EPS_DECIMALS))
                .unwrap_or_else(|| "none".to_string())
        };
        self.alert(
            "Strategy equity per share decreased",
            format!(
                "Equity per share of {} dropped from {} to {}.",
                self.strategy_label(strategy),
                format(state.previous),
                format(state.current),
            ),
        )
    }

    fn price_update_alerts(&self, finding: &PriceUpdateFinding) -> Vec<Notification> {
        let mut alerts = Vec::new();
        if finding.oracle_state.is_out {
            alerts.push(self.oracle_outage_alert(&finding.oracle, &finding.oracle_state));
        }
        if let Some(state) = finding.sequencer_state.filter(|s| s.is_out()) {
            alerts.push(self.sequencer_outage_alert(&state));
        }
        if !finding.strategies_to_rebalance.is_empty() {
            let strategies: Vec<String> = finding
                .strategies_to_rebalance
                .iter()
                .map(|s| self.strategy_label(s))
                .collect();
            alerts.push(self.alert(
                "Strategies need rebalance",
                format!(
                    "Price update on {} left strategies out of bounds: {}.",
                    self.oracle_label(&finding.oracle),
                    strategies.join(", "),
                ),
            ));
        }
        alerts
    }

    fn oracle_outage_alert(&self, oracle: &Address, state: &OracleState) -> Notification {
        self.alert(
            "Oracle outage",
            format!(
                "{} last updated {}s ago in round {} (threshold {}s, answer {}).",
                self.oracle_label(oracle),
                state.age_secs,
                state.round_id,
                state.staleness_threshold_secs,
                state.answer,
            ),
        )
    }

    fn sequencer_outage_alert(&self, state: &SequencerState) -> Notification {
        let status = if state.is_down {
            "is down"
        } else {
            "recovered within the grace period"
        };
        self.alert(
            "Sequencer outage",
            format!("L2 sequencer {} (status since {}).", status, state.started_at),
        )
    }

    fn borrow_rate_alert(&self, finding: &BorrowRateFinding) -> Notification {
        let strategies: Vec<String> = finding
            .affected_strategies
            .iter()
            .map(|s| self.strategy_label(s))
            .collect();
        self.alert(
            "Borrow rate above threshold",
            format!(
                "Variable borrow rate of reserve {} is {}%, above the threshold of: {}.",
                finding.reserve,
                u256_math::format_ray_percent(finding.curr_borrow_rate),
                strategies.join(", "),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::state::MatchType;
    use crate::testing::capture_logs;
    use alloy::primitives::{B256, I256};
    use keeper_api::RecordingNotificationClient;

    const STRATEGY: &str = "0x1111111111111111111111111111111111111111";

    fn deployment(channel: &str) -> Arc<ResolvedDeployment> {
        let toml_str = format!(
            r#"
            [keeper]
            rpc_url = "http://localhost:8545"
            health_factor_threshold = "1.1"
            alert_channel = "{channel}"

            [[strategies]]
            name = "3x wstETH/WETH"
            address = "{STRATEGY}"
            debt_token = "0x4444444444444444444444444444444444444444"
            borrow_rate_threshold_pct = "3.0"
        "#
        );
        let config: DeploymentConfig = toml::from_str(&toml_str).unwrap();
        Arc::new(ResolvedDeployment::resolve(config).unwrap())
    }

    #[tokio::test]
    async fn test_missing_channel_is_logged() {
        let (logs, _guard) = capture_logs();
        let client = Arc::new(RecordingNotificationClient::with_channels(["not-seamless-alerts"]));
        let alerter = Alerter::new(client, deployment("seamless-alerts"));

        assert!(!alerter.check_alert_channels_exist().await.unwrap());
        assert!(logs.contents().contains("No alert notification channels exist."));
    }

    #[tokio::test]
    async fn test_no_channels_is_logged() {
        let (logs, _guard) = capture_logs();
        let client = Arc::new(RecordingNotificationClient::with_channels(Vec::<String>::new()));
        let alerter = Alerter::new(client, deployment("seamless-alerts"));

        assert!(!alerter.check_alert_channels_exist().await.unwrap());
        assert!(logs.contents().contains("No alert notification channels exist."));
    }

    #[tokio::test]
    async fn test_existing_channel_is_quiet() {
        let (logs, _guard) = capture_logs();
        let client = Arc::new(RecordingNotificationClient::with_channels(["seamless-alerts"]));
        let alerter = Alerter::new(client, deployment("seamless-alerts"));

        assert!(alerter.check_alert_channels_exist().await.unwrap());
        assert!(!logs.contents().contains("No alert notification channels exist."));
    }

    #[tokio::test]
    async fn test_health_factor_alert_is_sent() {
        let client = Arc::new(RecordingNotificationClient::with_channels(["ops"]));
        let alerter = Alerter::new(client.clone(), deployment("ops"));
        let m = Match::new(
            B256::ZERO,
            MatchType::Deposit,
            Finding::Risk {
                strategy: STRATEGY.parse().unwrap(),
                risk_state: RiskState {
                    is_at_risk: true,
                    health_factor: U256::from(105_000_000u64),
                },
            },
        );

        alerter.notify(&m).await;

        let sent = client.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "ops");
        assert!(sent[0].message.contains("3x wstETH/WETH"));
        assert!(sent[0].message.contains("is 1.05, below the 1.1 threshold"));
    }

    #[test]
    fn test_price_update_renders_one_alert_per_condition() {
        let client = Arc::new(RecordingNotificationClient::default());
        let alerter = Alerter::new(client, deployment("ops"));
        let m = Match::new(
            B256::ZERO,
            MatchType::PriceUpdate,
            Finding::PriceUpdate(PriceUpdateFinding {
                oracle: Address::repeat_byte(0x33),
                latest_answer: I256::ZERO,
                strategies_to_rebalance: vec![STRATEGY.parse().unwrap()],
                oracle_state: OracleState {
                    is_out: true,
                    round_id: 7,
                    answer: I256::ZERO,
                    updated_at: 0,
                    age_secs: 90_000,
                    staleness_threshold_secs: 86_400,
                },
                sequencer_state: Some(SequencerState {
                    is_down: true,
                    is_recovering: false,
                    started_at: 1_700_000_000,
                }),
                is_sequencer_out: true,
            }),
        );

        let alerts = alerter.render(&m);
        let subjects: Vec<&str> = alerts.iter().map(|n| n.subject.as_str()).collect();
        assert_eq!(
            subjects,
            vec!["Oracle outage", "Sequencer outage", "Strategies need rebalance"]
        );
    }

    #[test]
    fn test_borrow_rate_alert_formats_percent() {
        let client = Arc::new(RecordingNotificationClient::default());
        let alerter = Alerter::new(client, deployment("ops"));
        let m = Match::new(
            B256::ZERO,
            MatchType::BorrowRate,
            Finding::BorrowRate(BorrowRateFinding {
                reserve: Address::repeat_byte(0x44),
                curr_borrow_rate: u256_math::pow10(25) * U256::from(45u64) / U256::from(10u64),
                affected_strategies: vec![STRATEGY.parse().unwrap()],
            }),
        );

        let alerts = alerter.render(&m);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("is 4.5%"));
    }
}
