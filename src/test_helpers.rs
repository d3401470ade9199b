use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::error::PersistenceError;
use crate::models::{Candle, CandleSeries, PerformanceMap, RebalancingPlan, TradingSignal};
use crate::persistence::PersistenceGateway;

/// Fixed reference instant so signal timestamps are deterministic.
pub fn fixed_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T21:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn bar_time(i: usize) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2023-09-01T21:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::days(i as i64)
}

/// Create candles from (open, high, low, close) tuples with daily timestamps.
pub fn make_candles(data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    data.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Candle {
            timestamp: bar_time(i),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        })
        .collect()
}

/// Create candles from (open, high, low, close, volume) tuples.
pub fn make_ohlcv(data: &[(f64, f64, f64, f64, f64)]) -> CandleSeries {
    data.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c, v))| Candle {
            timestamp: bar_time(i),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        })
        .collect()
}

/// Bars whose open is the previous close and whose range spans open..close.
pub fn make_series(closes: &[f64], volumes: &[f64]) -> CandleSeries {
    assert_eq!(closes.len(), volumes.len());
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: bar_time(i),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
            }
        })
        .collect()
}

pub fn make_flat_series(n: usize, price: f64, volume: f64) -> CandleSeries {
    make_series(&vec![price; n], &vec![volume; n])
}

/// Compound `returns` from `start`; yields `returns.len() + 1` bars.
pub fn series_from_returns(start: f64, returns: &[f64]) -> CandleSeries {
    let mut closes = Vec::with_capacity(returns.len() + 1);
    closes.push(start);
    for r in returns {
        let prev = closes[closes.len() - 1];
        closes.push(prev * (1.0 + r));
    }
    let volumes = vec![1000.0; closes.len()];
    make_series(&closes, &volumes)
}

/// A Config suitable for testing: fast execution, state under a unique temp dir.
pub fn default_test_config(tag: &str) -> Config {
    let mut cfg = Config::default();
    cfg.rebalancing.execution_delay_ms = 1;
    cfg.rebalancing.execution_timeout_secs = 5;
    cfg.state_dir = std::env::temp_dir()
        .join(format!("qse_test_{}_{}", tag, std::process::id()))
        .to_string_lossy()
        .to_string();
    cfg.log_level = "ERROR".to_string();
    cfg
}

/// A store whose every operation fails, for exercising non-fatal persistence paths.
pub struct FailingStore;

fn broken() -> PersistenceError {
    PersistenceError::io(
        "/unwritable",
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
    )
}

impl PersistenceGateway for FailingStore {
    fn save_signals(&self, _: &[TradingSignal]) -> Result<(), PersistenceError> {
        Err(broken())
    }

    fn load_signals(&self) -> Result<Vec<TradingSignal>, PersistenceError> {
        Err(broken())
    }

    fn save_performance(&self, _: &PerformanceMap) -> Result<(), PersistenceError> {
        Err(broken())
    }

    fn load_performance(&self) -> Result<PerformanceMap, PersistenceError> {
        Err(broken())
    }

    fn save_plan(&self, _: &RebalancingPlan) -> Result<(), PersistenceError> {
        Err(broken())
    }

    fn load_plan(&self, _: &str) -> Result<Option<RebalancingPlan>, PersistenceError> {
        Err(broken())
    }

    fn load_plans(&self) -> Result<Vec<RebalancingPlan>, PersistenceError> {
        Err(broken())
    }
}
