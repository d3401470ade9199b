pub mod cache;
pub mod historical;

pub use historical::HistoricalProvider;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CandleSeries, MarketQuote};

/// Source of per-symbol bar history and live quotes.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Up to `limit` most recent bars, oldest first.
    async fn history(&mut self, symbol: &str, limit: usize) -> Result<CandleSeries>;
    async fn snapshot(&mut self, symbols: &[String]) -> Result<Vec<MarketQuote>>;
}
