pub mod config;
pub mod errors;
pub mod health;
pub mod logging;

pub use config::Config;
pub use errors::{ConsensusError, DeliveryError, SourceError};
pub use health::HealthChecker;
