pub mod aggregator;
pub mod performance;

pub use aggregator::{CancelToken, ScanFailure, ScanReport, SignalAggregator};
pub use performance::StrategyPerformanceTracker;
