pub mod candle;
pub mod market;
pub mod performance;
pub mod rebalancing;
pub mod signal;

pub use candle::{Candle, CandleSeries};
pub use market::*;
pub use performance::{PerformanceMap, StrategyPerformance};
pub use rebalancing::*;
pub use signal::*;
