pub mod distributor;
pub mod http_executor;
pub mod retry;

pub use distributor::{DeliveryOutcome, DistributionRecord, Distributor};
pub use http_executor::HttpExecutor;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::DeliveryError;
use crate::trading::TradeSignal;

/// What an executor answers for one delivery. `success: false` with a
/// well-formed body is a business decline (risk limits, market hours,
/// capital), a normal terminal outcome; transport problems surface as
/// `DeliveryError` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub success: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// An autonomous, risk-isolated trade-execution service. The executor is
/// the sole authority on whether an order is placed; delivery is
/// at-least-once, so implementations must treat `signal_id` as an
/// idempotency key.
#[async_trait]
pub trait Executor: Send + Sync {
    fn executor_id(&self) -> &str;

    /// Per-executor confidence override, possibly stricter than the gate.
    fn min_confidence(&self) -> f64;

    async fn execute(&self, signal: &TradeSignal) -> Result<ExecutionResponse, DeliveryError>;
}
