use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::core::indicators::mean;
use crate::market_data::MarketDataProvider;
use crate::models::{Candle, CandleSeries, MarketQuote};

/// Bars averaged to estimate a symbol's typical volume in snapshots.
const AVG_VOLUME_WINDOW: usize = 20;

/// A provider that replays pre-loaded bars. When a cursor is set, only bars
/// with timestamp <= cursor are visible, simulating a forward walk.
pub struct HistoricalProvider {
    data: HashMap<String, Vec<Candle>>,
    now: Option<DateTime<Utc>>,
}

impl Default for HistoricalProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoricalProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            now: None,
        }
    }

    /// Load bars for a symbol. Bars must be sorted oldest-first.
    pub fn load(&mut self, symbol: &str, series: CandleSeries) {
        self.data.insert(symbol.to_string(), series.into_iter().collect());
    }

    /// Advance the replay cursor.
    pub fn set_time(&mut self, t: DateTime<Utc>) {
        self.now = Some(t);
    }

    fn visible(&self, symbol: &str, limit: usize) -> Option<CandleSeries> {
        let all = self.data.get(symbol)?;
        let end = match self.now {
            Some(now) => all.partition_point(|c| c.timestamp <= now),
            None => all.len(),
        };
        let start = end.saturating_sub(limit);
        Some(CandleSeries::new(all[start..end].to_vec()))
    }

    fn quote(&self, symbol: &str) -> Option<MarketQuote> {
        let bars = self.visible(symbol, AVG_VOLUME_WINDOW)?;
        let last = bars.from_back(1)?;
        let change = match bars.from_back(2) {
            Some(prev) if prev.close != 0.0 => (last.close - prev.close) / prev.close,
            _ => 0.0,
        };
        Some(MarketQuote {
            symbol: symbol.to_string(),
            price: last.close,
            volume: last.volume,
            change,
            avg_volume: Some(mean(&bars.volumes())),
        })
    }
}

#[async_trait]
impl MarketDataProvider for HistoricalProvider {
    async fn history(&mut self, symbol: &str, limit: usize) -> Result<CandleSeries> {
        self.visible(symbol, limit)
            .with_context(|| format!("No history loaded for {}", symbol))
    }

    async fn snapshot(&mut self, symbols: &[String]) -> Result<Vec<MarketQuote>> {
        Ok(symbols.iter().filter_map(|s| self.quote(s)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_series;

    fn provider() -> HistoricalProvider {
        let mut p = HistoricalProvider::new();
        p.load("AAA", make_series(&[100.0, 102.0, 99.0], &[10.0, 20.0, 30.0]));
        p
    }

    #[tokio::test]
    async fn history_respects_limit_and_cursor() {
        let mut p = provider();
        assert_eq!(p.history("AAA", 2).await.unwrap().len(), 2);

        let second_bar = p.history("AAA", 10).await.unwrap()[1].timestamp;
        p.set_time(second_bar);
        let visible = p.history("AAA", 10).await.unwrap();
        assert_eq!(visible.len(), 2);
        assert!((visible.last().unwrap().close - 102.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn unknown_symbol_is_an_error() {
        let mut p = provider();
        assert!(p.history("ZZZ", 5).await.is_err());
    }

    #[tokio::test]
    async fn snapshot_derives_change_from_last_two_bars() {
        let mut p = provider();
        let quotes = p
            .snapshot(&["AAA".to_string(), "ZZZ".to_string()])
            .await
            .unwrap();
        assert_eq!(quotes.len(), 1);
        let q = &quotes[0];
        assert!((q.price - 99.0).abs() < 1e-12);
        assert!((q.change - (99.0 - 102.0) / 102.0).abs() < 1e-12);
        assert!((q.avg_volume.unwrap() - 20.0).abs() < 1e-12);
    }
}
