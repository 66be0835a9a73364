use anyhow::Result;
use async_trait::async_trait;

use crate::consensus::ConsensusResult;
use crate::distribution::DistributionRecord;

/// Persistence collaborator for audit/analytics. Called fire-and-forget
/// after every distributed cycle; the engine has no dependency on whatever
/// schema sits behind an implementation, and a failing sink never affects
/// signal flow.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        result: &ConsensusResult,
        records: &[DistributionRecord],
    ) -> Result<()>;
}

/// Default sink: one structured line per cycle result.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(
        &self,
        result: &ConsensusResult,
        records: &[DistributionRecord],
    ) -> Result<()> {
        tracing::info!(
            "AUDIT {} {} {:.2}% agreement {:.2} sources {:?} deliveries {}",
            result.symbol,
            result.direction,
            result.confidence,
            result.agreement_score,
            result.contributing_sources,
            serde_json::to_string(records).unwrap_or_else(|_| "[]".to_string())
        );
        Ok(())
    }
}
