use async_trait::async_trait;
use reqwest::Client;

use super::{ExecutionResponse, Executor};
use crate::core::config::ExecutorSpec;
use crate::core::DeliveryError;
use crate::trading::TradeSignal;

/// HTTP delivery client for one registered executor service.
///
/// Contract: `POST {base_url}/execute` with the signal payload. A 2xx answer
/// carries an `ExecutionResponse` covering both "executed" and a well-formed
/// business decline. Any other status, and any unparsable body, is
/// transport-class and eligible for retry.
pub struct HttpExecutor {
    id: String,
    base_url: String,
    min_confidence: f64,
    client: Client,
}

impl HttpExecutor {
    pub fn from_spec(spec: &ExecutorSpec, client: Client) -> Self {
        Self {
            id: spec.id.clone(),
            base_url: spec.url.trim_end_matches('/').to_string(),
            min_confidence: spec.min_confidence,
            client,
        }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    fn executor_id(&self) -> &str {
        &self.id
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    async fn execute(&self, signal: &TradeSignal) -> Result<ExecutionResponse, DeliveryError> {
        let url = format!("{}/execute", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(signal)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Transport(format!(
                "{} answered {}",
                self.id, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("malformed response: {}", e)))
    }
}
