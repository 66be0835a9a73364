pub mod pipeline;
pub mod signals;

pub use pipeline::{CycleOutcome, SignalPipeline};
pub use signals::TradeSignal;
