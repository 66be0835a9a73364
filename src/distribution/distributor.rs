use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use super::{ExecutionResponse, Executor, RetryPolicy};
use crate::core::config::DistributionConfig;
use crate::core::DeliveryError;
use crate::trading::TradeSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryOutcome {
    Pending,
    Executed,
    Rejected,
    Error,
}

/// One delivery attempt's lifecycle for one (signal, executor) pair.
/// `Pending → {Executed | Rejected | Error}`; `Executed` and `Rejected` are
/// terminal, `Error` only lands after the retry budget is spent.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionRecord {
    pub signal_id: Uuid,
    pub executor_id: String,
    pub attempted_at: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
    pub order_id: Option<String>,
    pub reason: Option<String>,
    pub attempts: u32,
}

impl DistributionRecord {
    fn pending(signal_id: Uuid, executor_id: &str) -> Self {
        Self {
            signal_id,
            executor_id: executor_id.to_string(),
            attempted_at: Utc::now(),
            outcome: DeliveryOutcome::Pending,
            order_id: None,
            reason: None,
            attempts: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome != DeliveryOutcome::Pending
    }
}

/// Fans an accepted signal out to every executor whose confidence override
/// is satisfied, one concurrent delivery each, and records the per-executor
/// outcome. Records are keyed by (signal_id, executor_id) and written
/// append-only; a repeated delivery for an already-terminal pair is a no-op
/// that echoes the stored record.
pub struct Distributor {
    executors: Vec<Arc<dyn Executor>>,
    records: DashMap<(Uuid, String), DistributionRecord>,
    retry: RetryPolicy,
    delivery_timeout: Duration,
}

impl Distributor {
    pub fn new(executors: Vec<Arc<dyn Executor>>, config: &DistributionConfig) -> Self {
        Self {
            executors,
            records: DashMap::new(),
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.base_backoff_ms),
            ),
            delivery_timeout: Duration::from_millis(config.delivery_timeout_ms),
        }
    }

    pub async fn distribute(&self, signal: &TradeSignal) -> Vec<DistributionRecord> {
        let mut eligible = Vec::new();
        for executor in &self.executors {
            if signal.confidence >= executor.min_confidence() {
                eligible.push(executor.clone());
            } else {
                tracing::debug!(
                    "Executor '{}' skipped: override {:.0}% above signal {:.2}%",
                    executor.executor_id(),
                    executor.min_confidence(),
                    signal.confidence
                );
            }
        }

        if eligible.is_empty() {
            tracing::info!(
                "No executor accepts {} at {:.2}% confidence",
                signal.symbol,
                signal.confidence
            );
            return Vec::new();
        }

        let deliveries = eligible
            .into_iter()
            .map(|executor| self.deliver(executor, signal));
        let records = join_all(deliveries).await;

        let executed = records
            .iter()
            .filter(|r| r.outcome == DeliveryOutcome::Executed)
            .count();
        tracing::info!(
            "Signal {} for {} distributed: {}/{} executed",
            signal.signal_id,
            signal.symbol,
            executed,
            records.len()
        );

        records
    }

    /// Point-in-time copy of every record for one signal.
    pub fn records_for(&self, signal_id: Uuid) -> Vec<DistributionRecord> {
        self.records
            .iter()
            .filter(|entry| entry.key().0 == signal_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn deliver(
        &self,
        executor: Arc<dyn Executor>,
        signal: &TradeSignal,
    ) -> DistributionRecord {
        let executor_id = executor.executor_id().to_string();
        let key = (signal.signal_id, executor_id.clone());

        // At-least-once delivery upstream means the same signal can arrive
        // here twice; a terminal record ends the second pass immediately and
        // an Executed one echoes its original order id.
        if let Some(existing) = self.records.get(&key) {
            if existing.is_terminal() {
                if existing.outcome == DeliveryOutcome::Executed {
                    tracing::info!(
                        "Signal {} already executed by '{}' (order {:?}), echoing",
                        signal.signal_id,
                        executor_id,
                        existing.order_id
                    );
                }
                return existing.clone();
            }
        }

        let mut record = DistributionRecord::pending(signal.signal_id, &executor_id);
        self.records.insert(key.clone(), record.clone());

        let delivery_timeout = self.delivery_timeout;
        let (result, attempts) = self
            .retry
            .run(&format!("deliver {} to {}", signal.signal_id, executor_id), || {
                let executor = executor.clone();
                let signal = signal.clone();
                async move {
                    match timeout(delivery_timeout, executor.execute(&signal)).await {
                        Ok(result) => result,
                        Err(_) => Err(DeliveryError::Timeout(delivery_timeout)),
                    }
                }
            })
            .await;

        record.attempts = attempts;
        match result {
            Ok(ExecutionResponse {
                success: true,
                order_id,
                ..
            }) => {
                record.outcome = DeliveryOutcome::Executed;
                record.order_id = order_id;
                tracing::info!(
                    "Executor '{}' executed {} (order {:?})",
                    executor_id,
                    signal.signal_id,
                    record.order_id
                );
            }
            Ok(ExecutionResponse { error, .. }) => {
                record.outcome = DeliveryOutcome::Rejected;
                record.reason = error;
                tracing::info!(
                    "Executor '{}' declined {}: {:?}",
                    executor_id,
                    signal.signal_id,
                    record.reason
                );
            }
            Err(e) => {
                record.outcome = DeliveryOutcome::Error;
                record.reason = Some(e.to_string());
                tracing::error!(
                    "Delivery of {} to '{}' failed terminally after {} attempt(s): {}",
                    signal.signal_id,
                    executor_id,
                    attempts,
                    e
                );
            }
        }

        self.records.insert(key, record.clone());
        record
    }
}
