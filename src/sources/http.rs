use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{Direction, PriceFeed, RawSignal, SourceAdapter, SourceKind};
use crate::core::config::SourceSpec;
use crate::core::SourceError;

/// Wire format every HTTP signal provider answers with. Provider-specific
/// parsing beyond this shape lives outside this crate.
#[derive(Debug, Deserialize)]
struct SignalPayload {
    direction: Direction,
    confidence: f64,
    #[serde(default)]
    generated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_ttl_secs")]
    ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
struct PricePayload {
    price: f64,
}

/// Uniform REST adapter: `GET {base_url}/signal?symbol=...` with an optional
/// bearer key, answering the shared `SignalPayload` shape.
pub struct HttpSourceAdapter {
    id: String,
    kind: SourceKind,
    weight: f64,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSourceAdapter {
    pub fn from_spec(spec: &SourceSpec, client: Client) -> Self {
        Self {
            id: spec.id.clone(),
            kind: spec.kind,
            weight: spec.weight,
            base_url: spec.url.trim_end_matches('/').to_string(),
            api_key: spec.api_key.clone(),
            client,
        }
    }
}

#[async_trait]
impl SourceAdapter for HttpSourceAdapter {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, symbol: &str) -> Result<RawSignal, SourceError> {
        let url = format!("{}/signal", self.base_url);

        let mut request = self.client.get(&url).query(&[("symbol", symbol)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SourceError::AuthInvalid(format!(
                    "{} answered {}",
                    self.id,
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(SourceError::Unavailable(format!(
                    "{} answered {}",
                    self.id, status
                )));
            }
            _ => {}
        }

        let payload: SignalPayload = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        if !(0.0..=100.0).contains(&payload.confidence) {
            return Err(SourceError::Malformed(format!(
                "confidence {} outside [0, 100]",
                payload.confidence
            )));
        }

        Ok(RawSignal {
            source_id: self.id.clone(),
            symbol: symbol.to_string(),
            direction: payload.direction,
            confidence: payload.confidence,
            weight: self.weight,
            generated_at: payload.generated_at.unwrap_or_else(Utc::now),
            ttl_secs: payload.ttl_secs,
        })
    }
}

/// Ticker collaborator: `GET {base_url}/price?symbol=...`.
pub struct HttpPriceFeed {
    base_url: String,
    client: Client,
}

impl HttpPriceFeed {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn last_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .with_context(|| format!("price feed request for {}", symbol))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("price feed answered {} for {}", status, symbol);
        }

        let payload: PricePayload = response
            .json()
            .await
            .context("failed to parse price feed response")?;

        Ok(payload.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_payload_accepts_minimal_body() {
        let payload: SignalPayload =
            serde_json::from_str(r#"{"direction":"LONG","confidence":85.0}"#).unwrap();
        assert_eq!(payload.direction, Direction::Long);
        assert_eq!(payload.ttl_secs, 60);
        assert!(payload.generated_at.is_none());
    }

    #[test]
    fn signal_payload_rejects_unknown_direction() {
        let result: Result<SignalPayload, _> =
            serde_json::from_str(r#"{"direction":"SIDEWAYS","confidence":50.0}"#);
        assert!(result.is_err());
    }
}
