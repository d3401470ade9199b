use chrono::{DateTime, Duration, Utc};
use quant_signal_engine::config::Config;
use quant_signal_engine::models::{Candle, CandleSeries};

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T21:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Daily bars ending the day before `fixed_time()`; open is the previous close.
pub fn make_series(closes: &[f64], volumes: &[f64]) -> CandleSeries {
    let n = closes.len();
    let candles: Vec<Candle> = closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: fixed_time() - Duration::days((n - i) as i64),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
            }
        })
        .collect();

    CandleSeries::new(candles)
}

pub fn make_flat_series(n: usize, price: f64) -> CandleSeries {
    make_series(&vec![price; n], &vec![1000.0; n])
}

/// 40 bars: flat at 100, a run-up to 110, then a balanced chop, with the last
/// bar trading three times the usual volume. Momentum reads this as a strong buy.
pub fn make_momentum_breakout() -> CandleSeries {
    let mut closes = vec![100.0; 21];
    closes.extend([102.0, 104.0, 106.0, 108.0, 110.0]);
    for i in 0..14 {
        closes.push(if i % 2 == 0 { 111.0 } else { 110.0 });
    }
    let mut volumes = vec![1700.0; 40];
    volumes[39] = 5700.0;
    make_series(&closes, &volumes)
}

/// Default config with fast execution and state kept under `state_dir`.
pub fn test_config(state_dir: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.state_dir = state_dir.to_string_lossy().to_string();
    cfg.rebalancing.execution_delay_ms = 1;
    cfg.rebalancing.execution_timeout_secs = 5;
    cfg
}
