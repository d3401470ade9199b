use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::indicators::{mean, std_dev};
use crate::error::PerformanceError;
use crate::models::{PerformanceMap, StrategyPerformance, StrategyType, TradingSignal};
use crate::persistence::PersistenceGateway;

/// Closes the feedback loop: folds realized signal outcomes into running
/// per-strategy statistics and persists them after every update.
pub struct StrategyPerformanceTracker {
    metrics: PerformanceMap,
    store: Arc<dyn PersistenceGateway>,
}

impl StrategyPerformanceTracker {
    pub fn new(store: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            metrics: PerformanceMap::new(),
            store,
        }
    }

    /// Restore metrics persisted by an earlier run. A load failure is logged
    /// and leaves the tracker empty.
    pub fn load(store: Arc<dyn PersistenceGateway>) -> Self {
        let metrics = match store.load_performance() {
            Ok(m) => {
                info!("Loaded performance history for {} strategies", m.len());
                m
            }
            Err(e) => {
                warn!("Could not load strategy performance, starting fresh: {}", e);
                PerformanceMap::new()
            }
        };
        Self { metrics, store }
    }

    /// Record the realized outcome of `signal` and return its return.
    pub fn update(
        &mut self,
        signal: &TradingSignal,
        exit_price: f64,
        exit_time: DateTime<Utc>,
    ) -> Result<f64, PerformanceError> {
        let entry = signal.price;
        if !(entry > 0.0 && entry.is_finite()) {
            return Err(PerformanceError::InvalidEntryPrice(entry));
        }
        if !exit_price.is_finite() {
            return Err(PerformanceError::InvalidExitPrice(exit_price));
        }
        let return_pct = if signal.is_buy() {
            (exit_price - entry) / entry
        } else if signal.is_sell() {
            (entry - exit_price) / entry
        } else {
            return Err(PerformanceError::HoldSignal);
        };

        let perf = self
            .metrics
            .entry(signal.strategy)
            .or_insert_with(|| StrategyPerformance::new(signal.strategy, exit_time));

        perf.total_signals += 1;
        if return_pct > 0.0 {
            perf.successful_signals += 1;
        }
        let n = perf.total_signals as f64;
        perf.win_rate = perf.successful_signals as f64 / n;
        perf.avg_return = (perf.avg_return * (n - 1.0) + return_pct) / n;
        perf.total_pnl += return_pct;
        perf.max_drawdown = perf.max_drawdown.min(return_pct);
        perf.returns.push(return_pct);
        perf.sharpe_ratio = sharpe(&perf.returns);
        perf.last_updated = exit_time;

        debug!(
            "[PERF] {} {} {}: return {:+.4}, win rate {:.2}",
            signal.strategy, signal.symbol, signal.signal_type, return_pct, perf.win_rate
        );

        self.persist();
        Ok(return_pct)
    }

    fn persist(&self) {
        if let Err(e) = self.store.save_performance(&self.metrics) {
            error!("Failed to persist strategy performance: {}", e);
        }
    }

    pub fn performance(&self, strategy: StrategyType) -> Option<&StrategyPerformance> {
        self.metrics.get(&strategy)
    }

    pub fn all(&self) -> &PerformanceMap {
        &self.metrics
    }

    /// Highest win rate among strategies with at least `min_trades` outcomes;
    /// ties go to the higher average return.
    pub fn best_strategy(&self, min_trades: u64) -> Option<&StrategyPerformance> {
        self.metrics
            .values()
            .filter(|p| p.total_signals >= min_trades.max(1))
            .max_by(|a, b| {
                a.win_rate
                    .total_cmp(&b.win_rate)
                    .then(a.avg_return.total_cmp(&b.avg_return))
            })
    }
}

/// Mean over standard deviation of per-trade returns; zero when undefined.
fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let sd = std_dev(returns);
    if sd == 0.0 {
        0.0
    } else {
        mean(returns) / sd
    }
}
