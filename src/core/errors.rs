use std::time::Duration;
use thiserror::Error;

/// Failures a source adapter can report for one fetch.
///
/// Every variant is contained at the orchestrator boundary: a failed source
/// is simply absent from the cycle's signal set, nothing propagates further
/// downstream.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication rejected: {0}")]
    AuthInvalid(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Structural failures disable the source until explicitly reset;
    /// transient ones only exclude it from the current cycle.
    pub fn is_structural(&self) -> bool {
        matches!(self, SourceError::AuthInvalid(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("no sources contributed to this cycle")]
    InsufficientSources,
}

/// Transport-class delivery failures. Business declines are not errors:
/// they ride in-band on a well-formed executor response.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}
