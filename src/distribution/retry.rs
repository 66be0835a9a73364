use std::future::Future;
use std::time::Duration;

use crate::core::DeliveryError;

/// One bounded retry-with-backoff policy for every delivery call site.
/// Only transport-class failures reach this layer as errors; business
/// declines ride in-band on a successful response and are therefore never
/// retried here.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Runs `op` until it succeeds or the attempt budget is spent, doubling
    /// the backoff between attempts. Returns the final result and how many
    /// attempts were made.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> (Result<T, DeliveryError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeliveryError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!(
                        "{}: attempt {}/{} failed, giving up: {}",
                        what,
                        attempt,
                        self.max_attempts,
                        e
                    );
                    return (Err(e), attempt);
                }
                Err(e) => {
                    let backoff = self.base_backoff * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        what,
                        attempt,
                        self.max_attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
