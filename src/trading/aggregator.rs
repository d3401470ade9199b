use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::PerformanceError;
use crate::market_data::MarketDataProvider;
use crate::models::{CandleSeries, SignalType, StrategyType, TradingSignal};
use crate::persistence::PersistenceGateway;
use crate::strategies::pairs::pair_symbol;
use crate::strategies::StrategyLibrary;
use crate::trading::performance::StrategyPerformanceTracker;

/// Cooperative cancellation flag shared between a scan and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One strategy call that could not evaluate its input.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFailure {
    pub symbol: String,
    /// `None` when the failure happened before any strategy ran (data fetch).
    pub strategy: Option<StrategyType>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub signals: Vec<TradingSignal>,
    pub failures: Vec<ScanFailure>,
    /// Symbols left out for lack of history.
    pub skipped: Vec<String>,
    pub cancelled: bool,
}

/// Fans the strategy library out over a symbol universe and keeps the
/// resulting signals as the active list until they are closed or expire.
pub struct SignalAggregator {
    library: StrategyLibrary,
    min_history_bars: usize,
    active: Vec<TradingSignal>,
    store: Arc<dyn PersistenceGateway>,
}

impl SignalAggregator {
    pub fn new(cfg: &Config, store: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            library: StrategyLibrary::new(cfg.strategies.clone()),
            min_history_bars: cfg.min_history_bars,
            active: Vec::new(),
            store,
        }
    }

    /// Stamp signals with a fixed clock instead of the wall clock.
    pub fn with_sim_time(mut self, t: DateTime<Utc>) -> Self {
        self.library.sim_time = Some(t);
        self
    }

    pub fn set_sim_time(&mut self, t: DateTime<Utc>) {
        self.library.sim_time = Some(t);
    }

    /// Replace the active list with whatever was persisted last.
    pub fn load_active(&mut self) -> usize {
        match self.store.load_signals() {
            Ok(signals) => {
                self.active = signals;
                info!("Restored {} active signals", self.active.len());
            }
            Err(e) => warn!("Could not load active signals: {}", e),
        }
        self.active.len()
    }

    /// Run every single-symbol strategy on each symbol with enough history,
    /// then pairs trading on every unordered pair of those symbols.
    ///
    /// A strategy error is recorded in the report and the scan moves on.
    /// Cancellation is checked between symbols and between pairs; signals
    /// gathered before it are still kept.
    pub fn scan(
        &mut self,
        universe: &BTreeMap<String, CandleSeries>,
        cancel: &CancelToken,
    ) -> ScanReport {
        let mut report = ScanReport::default();

        let mut eligible: Vec<(&String, &CandleSeries)> = Vec::new();
        for (symbol, series) in universe {
            if series.len() >= self.min_history_bars {
                eligible.push((symbol, series));
            } else {
                debug!(
                    "{}: {} bars, need {}, skipping",
                    symbol,
                    series.len(),
                    self.min_history_bars
                );
                report.skipped.push(symbol.clone());
            }
        }

        'symbols: for (symbol, series) in &eligible {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break 'symbols;
            }
            for strategy in StrategyType::SINGLE_SYMBOL {
                match self.library.run(strategy, symbol, series) {
                    Ok(signals) => report.signals.extend(signals),
                    Err(e) => {
                        warn!("{} on {} failed: {}", strategy, symbol, e);
                        report.failures.push(ScanFailure {
                            symbol: symbol.to_string(),
                            strategy: Some(strategy),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if !report.cancelled {
            'pairs: for (i, (sym1, s1)) in eligible.iter().enumerate() {
                for (sym2, s2) in &eligible[i + 1..] {
                    if cancel.is_cancelled() {
                        report.cancelled = true;
                        break 'pairs;
                    }
                    match self.library.pairs(sym1, s1, sym2, s2) {
                        Ok(Some(signal)) => report.signals.push(signal),
                        Ok(None) => {}
                        Err(e) => {
                            warn!("pairs trading on {}/{} failed: {}", sym1, sym2, e);
                            report.failures.push(ScanFailure {
                                symbol: pair_symbol(sym1, sym2),
                                strategy: Some(StrategyType::PairsTrading),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        report.signals.retain(|s| s.signal_type != SignalType::Hold);

        if report.cancelled {
            warn!(
                "Scan cancelled after {} signals; keeping partial results",
                report.signals.len()
            );
        }
        info!(
            "Scan: {} symbols, {} signals, {} failures, {} skipped",
            eligible.len(),
            report.signals.len(),
            report.failures.len(),
            report.skipped.len()
        );

        if !report.signals.is_empty() {
            self.active.extend(report.signals.iter().cloned());
            self.persist();
        }
        report
    }

    /// Fetch `limit` bars per symbol from `provider`, then `scan` them.
    /// A symbol whose history cannot be fetched is reported as a failure.
    pub async fn scan_provider(
        &mut self,
        provider: &mut dyn MarketDataProvider,
        symbols: &[String],
        limit: usize,
        cancel: &CancelToken,
    ) -> ScanReport {
        let mut universe = BTreeMap::new();
        let mut fetch_failures = Vec::new();
        for symbol in symbols {
            if cancel.is_cancelled() {
                break;
            }
            match provider.history(symbol, limit).await {
                Ok(series) => {
                    universe.insert(symbol.clone(), series);
                }
                Err(e) => {
                    warn!("Failed to fetch history for {}: {:#}", symbol, e);
                    fetch_failures.push(ScanFailure {
                        symbol: symbol.clone(),
                        strategy: None,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        let mut report = self.scan(&universe, cancel);
        fetch_failures.append(&mut report.failures);
        report.failures = fetch_failures;
        report
    }

    fn persist(&self) {
        if let Err(e) = self.store.save_signals(&self.active) {
            error!(
                "Failed to persist {} active signals: {}",
                self.active.len(),
                e
            );
        }
    }

    pub fn active_signals(&self) -> &[TradingSignal] {
        &self.active
    }

    /// Active signals on `symbol`, including pair signals where it is a leg.
    pub fn signals_for_symbol(&self, symbol: &str) -> Vec<&TradingSignal> {
        self.active
            .iter()
            .filter(|s| s.symbol == symbol || s.symbol.split('/').any(|leg| leg == symbol))
            .collect()
    }

    /// The `n` most confident active signals.
    pub fn top_signals(&self, n: usize) -> Vec<&TradingSignal> {
        let mut ranked: Vec<&TradingSignal> = self.active.iter().collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked.truncate(n);
        ranked
    }

    /// Drop expired signals and return how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.active.len();
        self.active.retain(|s| !s.is_expired(now));
        let removed = before - self.active.len();
        if removed > 0 {
            info!("Pruned {} expired signals", removed);
            self.persist();
        }
        removed
    }

    /// Close the active signal at `index` with its realized exit and feed
    /// the outcome to `tracker`. The signal leaves the active list only if
    /// the tracker accepted it, so each signal is scored at most once.
    pub fn close_signal(
        &mut self,
        index: usize,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        tracker: &mut StrategyPerformanceTracker,
    ) -> Result<f64, PerformanceError> {
        let signal = self
            .active
            .get(index)
            .ok_or(PerformanceError::UnknownSignal(index))?;
        let return_pct = tracker.update(signal, exit_price, exit_time)?;
        let closed = self.active.remove(index);
        info!(
            "Closed {} {} ({}) at {:.4}: {:+.2}%",
            closed.signal_type,
            closed.symbol,
            closed.strategy,
            exit_price,
            return_pct * 100.0
        );
        self.persist();
        Ok(return_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::HistoricalProvider;
    use crate::models::SignalStrength;
    use crate::persistence::MemoryStore;
    use crate::test_helpers::{
        default_test_config, fixed_time, make_flat_series, series_from_returns, FailingStore,
    };
    use chrono::Duration;

    fn aggregator(store: Arc<dyn PersistenceGateway>) -> SignalAggregator {
        SignalAggregator::new(&default_test_config("agg"), store).with_sim_time(fixed_time())
    }

    fn universe(entries: Vec<(&str, CandleSeries)>) -> BTreeMap<String, CandleSeries> {
        entries
            .into_iter()
            .map(|(s, series)| (s.to_string(), series))
            .collect()
    }

    /// Two tightly correlated legs whose second leg drops hard on the last bar.
    fn pair_legs() -> (CandleSeries, CandleSeries) {
        let base: Vec<f64> = (0..70)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.008 })
            .collect();
        let mut other: Vec<f64> = base.iter().map(|r| r * 1.1).collect();
        let last = other.len() - 1;
        other[last] = -0.03;
        (series_from_returns(100.0, &base), series_from_returns(50.0, &other))
    }

    #[test]
    fn scan_flattens_grid_signals_and_skips_short_history() {
        let store = Arc::new(MemoryStore::new());
        let mut agg = aggregator(store.clone());
        let u = universe(vec![
            ("AAA", make_flat_series(80, 100.0, 1000.0)),
            ("BBB", make_flat_series(80, 20.0, 500.0)),
            ("TINY", make_flat_series(5, 10.0, 10.0)),
        ]);

        let report = agg.scan(&u, &CancelToken::new());
        assert_eq!(report.skipped, vec!["TINY".to_string()]);
        assert!(report.failures.is_empty());
        // flat markets only produce grid levels, and flat returns never correlate
        assert_eq!(report.signals.len(), 8);
        assert!(report
            .signals
            .iter()
            .all(|s| s.strategy == StrategyType::GridTrading));
        assert_eq!(agg.active_signals().len(), 8);
        assert_eq!(store.load_signals().unwrap().len(), 8);
    }

    #[test]
    fn one_bad_symbol_does_not_abort_the_batch() {
        let mut agg = aggregator(Arc::new(MemoryStore::new()));
        let u = universe(vec![
            ("AAA", make_flat_series(80, 100.0, 1000.0)),
            ("BAD", make_flat_series(80, 0.0, 1000.0)),
        ]);

        let report = agg.scan(&u, &CancelToken::new());
        assert_eq!(report.signals.len(), 4);
        assert!(!report.failures.is_empty());
        assert!(report.failures.iter().all(|f| f.symbol.contains("BAD")));
        assert!(report
            .failures
            .iter()
            .any(|f| f.strategy == Some(StrategyType::GridTrading)));
    }

    #[test]
    fn pairs_run_on_unordered_pairs() {
        let mut agg = aggregator(Arc::new(MemoryStore::new()));
        let (a, b) = pair_legs();
        let u = universe(vec![("AAA", a), ("BBB", b)]);

        let report = agg.scan(&u, &CancelToken::new());
        let pairs: Vec<&TradingSignal> = report
            .signals
            .iter()
            .filter(|s| s.strategy == StrategyType::PairsTrading)
            .collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol, "AAA/BBB");
        assert!(agg
            .signals_for_symbol("BBB")
            .iter()
            .any(|s| s.symbol == "AAA/BBB"));
    }

    #[test]
    fn cancelled_scan_stops_early() {
        let mut agg = aggregator(Arc::new(MemoryStore::new()));
        let u = universe(vec![("AAA", make_flat_series(80, 100.0, 1000.0))]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = agg.scan(&u, &cancel);
        assert!(report.cancelled);
        assert!(report.signals.is_empty());
        assert!(agg.active_signals().is_empty());
    }

    #[test]
    fn persistence_failure_keeps_signals_in_memory() {
        let mut agg = aggregator(Arc::new(FailingStore));
        let u = universe(vec![("AAA", make_flat_series(80, 100.0, 1000.0))]);
        let report = agg.scan(&u, &CancelToken::new());
        assert_eq!(report.signals.len(), 4);
        assert_eq!(agg.active_signals().len(), 4);
        // and a failed load leaves the list untouched
        assert_eq!(agg.load_active(), 4);
    }

    #[test]
    fn top_signals_rank_by_confidence() {
        let mut agg = aggregator(Arc::new(MemoryStore::new()));
        let u = universe(vec![("AAA", make_flat_series(80, 100.0, 1000.0))]);
        agg.scan(&u, &CancelToken::new());

        let top = agg.top_signals(2);
        assert_eq!(top.len(), 2);
        assert!(top[0].confidence >= top[1].confidence);
        let min_active = agg
            .active_signals()
            .iter()
            .map(|s| s.confidence)
            .fold(f64::INFINITY, f64::min);
        assert!(top[1].confidence >= min_active);
    }

    #[test]
    fn prune_drops_signals_past_expiration() {
        let store = Arc::new(MemoryStore::new());
        let mut agg = aggregator(store.clone());
        let u = universe(vec![("AAA", make_flat_series(80, 100.0, 1000.0))]);
        agg.scan(&u, &CancelToken::new());

        assert_eq!(agg.prune_expired(fixed_time() + Duration::hours(1)), 0);
        assert_eq!(agg.prune_expired(fixed_time() + Duration::hours(25)), 4);
        assert!(store.load_signals().unwrap().is_empty());
    }

    #[test]
    fn close_signal_scores_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let mut agg = aggregator(store.clone());
        let mut tracker = StrategyPerformanceTracker::new(store.clone());
        let u = universe(vec![("AAA", make_flat_series(80, 100.0, 1000.0))]);
        agg.scan(&u, &CancelToken::new());

        let entry = agg.active_signals()[0].clone();
        let exit = entry.price * 1.01;
        let r = agg.close_signal(0, exit, fixed_time(), &mut tracker).unwrap();
        let expected = if entry.is_buy() { 0.01 } else { -0.01 };
        assert!((r - expected).abs() < 1e-9);
        assert_eq!(agg.active_signals().len(), 3);
        assert_eq!(
            tracker
                .performance(StrategyType::GridTrading)
                .unwrap()
                .total_signals,
            1
        );
        assert_eq!(
            agg.close_signal(10, exit, fixed_time(), &mut tracker),
            Err(PerformanceError::UnknownSignal(10))
        );
    }

    #[test]
    fn rejected_close_keeps_the_signal() {
        let store = Arc::new(MemoryStore::new());
        let hold = TradingSignal::new(
            "AAA",
            SignalType::Hold,
            SignalStrength::Weak,
            0.5,
            100.0,
            100.0,
            100.0,
            StrategyType::Momentum,
            "restored",
            fixed_time(),
        );
        store.save_signals(&[hold]).unwrap();
        let mut agg = aggregator(store.clone());
        assert_eq!(agg.load_active(), 1);

        let mut tracker = StrategyPerformanceTracker::new(store);
        assert_eq!(
            agg.close_signal(0, 101.0, fixed_time(), &mut tracker),
            Err(PerformanceError::HoldSignal)
        );
        assert_eq!(agg.active_signals().len(), 1);
    }

    #[tokio::test]
    async fn scan_provider_reports_missing_history() {
        let mut agg = aggregator(Arc::new(MemoryStore::new()));
        let mut provider = HistoricalProvider::new();
        provider.load("AAA", make_flat_series(80, 100.0, 1000.0));

        let symbols = vec!["AAA".to_string(), "MISSING".to_string()];
        let report = agg
            .scan_provider(&mut provider, &symbols, 200, &CancelToken::new())
            .await;
        assert_eq!(report.signals.len(), 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "MISSING");
        assert_eq!(report.failures[0].strategy, None);
    }
}
