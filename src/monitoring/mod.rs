pub mod audit;

pub use audit::{AuditSink, LogAuditSink};
