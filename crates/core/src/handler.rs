//! Event dispatch.
//!
//! The monitoring platform calls the keeper with a batch of matched
//! transactions. Every match reason is routed by its event signature to an
//! evaluator and the findings are collected, in event order, into the
//! response.

use std::collections::HashMap;

use alloy::primitives::{Address, B256};
use keeper_chain::{EventSignature, PoolActionType};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::alerts::Alerter;
use crate::error::{KeeperError, KeeperResult};
use crate::evaluator::{unix_now, Evaluator};
use crate::state::{Finding, Match, MatchType};

/// Keeper invocation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Payload {
    pub request: ConditionRequestEnvelope,
    /// Secrets forwarded by the runtime (e.g. store credentials)
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionRequestEnvelope {
    pub body: ConditionRequest,
}

/// Batch of matched transactions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionRequest {
    #[serde(default)]
    pub events: Vec<MonitorEvent>,
}

/// One matched transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorEvent {
    pub hash: B256,
    #[serde(default)]
    pub match_reasons: Vec<MatchReason>,
}

/// One matched log inside a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchReason {
    /// Canonical event signature
    pub signature: String,
    /// Emitting contract
    pub address: Address,
    /// Decoded event arguments, in ABI order
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl MatchReason {
    /// Address-typed argument at `index`.
    pub fn address_arg(&self, index: usize) -> KeeperResult<Address> {
        let malformed = |reason: String| KeeperError::MalformedEvent {
            event: self.signature.clone(),
            reason,
        };
        let value = self
            .args
            .get(index)
            .ok_or_else(|| malformed(format!("missing argument {}", index)))?;
        value
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| malformed(format!("argument {} is not an address: {}", index, value)))
    }
}

/// Keeper response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HandlerResponse {
    pub matches: Vec<Match>,
}

/// Event flow a match reason is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    WithdrawOrDeposit(MatchType),
    PriceUpdate,
    PoolAction(PoolActionType),
}

impl Flow {
    fn classify(signature: &str) -> Option<Self> {
        match EventSignature::from_signature(signature)? {
            EventSignature::Deposit => Some(Self::WithdrawOrDeposit(MatchType::Deposit)),
            EventSignature::Withdraw => Some(Self::WithdrawOrDeposit(MatchType::Withdraw)),
            EventSignature::PriceUpdate => Some(Self::PriceUpdate),
            EventSignature::PoolAction(action) => Some(Self::PoolAction(action)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::WithdrawOrDeposit(_) => "withdraw or deposit",
            Self::PriceUpdate => "priceUpdate",
            Self::PoolAction(_) => "pool action",
        }
    }
}

/// Event dispatcher.
#[derive(Clone)]
pub struct Keeper {
    evaluator: Evaluator,
    alerter: Option<Alerter>,
}

impl Keeper {
    pub fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
            alerter: None,
        }
    }

    /// Send alerts for every match of a batch that evaluates successfully.
    pub fn with_alerter(mut self, alerter: Alerter) -> Self {
        self.alerter = Some(alerter);
        self
    }

    /// Handle a full invocation payload.
    pub async fn handle(&self, payload: &Payload) -> KeeperResult<HandlerResponse> {
        self.handle_request(&payload.request.body).await
    }

    /// Evaluate every match reason of every event.
    ///
    /// The first failing evaluation aborts the batch. Alerts go out only once
    /// the whole batch has been evaluated, so an aborted batch sends none.
    #[instrument(skip_all, fields(events = request.events.len()))]
    pub async fn handle_request(&self, request: &ConditionRequest) -> KeeperResult<HandlerResponse> {
        let mut matches = Vec::new();

        for event in &request.events {
            for reason in &event.match_reasons {
                let Some(flow) = Flow::classify(&reason.signature) else {
                    debug!(signature = %reason.signature, hash = %event.hash, "Ignoring unknown signature");
                    continue;
                };

                let produced = match self.evaluate(flow, event.hash, reason).await {
                    Ok(produced) => produced,
                    Err(e) => {
                        error!(
                            hash = %event.hash,
                            address = %reason.address,
                            error = %e,
                            "There was an error during {} check flow.",
                            flow.name()
                        );
                        return Err(e);
                    }
                };

                matches.extend(produced);
            }
        }

        info!(matches = matches.len(), "Batch evaluated");
        if let Some(alerter) = &self.alerter {
            for m in &matches {
                alerter.notify(m).await;
            }
        }
        Ok(HandlerResponse { matches })
    }

    async fn evaluate(&self, flow: Flow, hash: B256, reason: &MatchReason) -> KeeperResult<Vec<Match>> {
        match flow {
            Flow::WithdrawOrDeposit(kind) => Ok(self
                .evaluator
                .withdraw_or_deposit(reason.address)
                .await?
                .into_iter()
                .map(|finding| Match::new(hash, kind, finding))
                .collect()),
            Flow::PriceUpdate => {
                let finding = self.evaluator.price_update(reason.address, unix_now()).await?;
                Ok(single(hash, MatchType::PriceUpdate, finding))
            }
            Flow::PoolAction(action) => {
                let reserve = reason.address_arg(action.reserve_arg_index())?;
                let finding = self
                    .evaluator
                    .pool_action(action, reason.address, reserve)
                    .await?;
                Ok(single(hash, MatchType::BorrowRate, finding))
            }
        }
    }
}

fn single(hash: B256, kind: MatchType, finding: Option<Finding>) -> Vec<Match> {
    finding
        .map(|finding| vec![Match::new(hash, kind, finding)])
        .unwrap_or_default()
}
