use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::PairsConfig;
use crate::core::indicators::{correlation, mean, pct_returns, std_dev};
use crate::error::StrategyError;
use crate::models::{CandleSeries, SignalStrength, SignalType, StrategyType, TradingSignal};
use crate::strategies::{ensure_finite, latest_price, StrategyResult};

/// Composite symbol used for pair signals.
pub fn pair_symbol(symbol1: &str, symbol2: &str) -> String {
    format!("{}/{}", symbol1, symbol2)
}

/// Statistical arbitrage on the return spread of two correlated symbols.
///
/// The signal is expressed on `symbol1`: SELL means short the first leg and
/// buy the second, BUY the reverse. Price, target and stop refer to the first
/// leg.
pub fn evaluate(
    symbol1: &str,
    series1: &CandleSeries,
    symbol2: &str,
    series2: &CandleSeries,
    cfg: &PairsConfig,
    now: DateTime<Utc>,
) -> StrategyResult {
    if cfg.lookback_period < 2 {
        return Err(StrategyError::InvalidParameter(
            "pairs lookback_period must be at least 2".to_string(),
        ));
    }
    let required = cfg.min_history.max(cfg.lookback_period + 1);
    if series1.len() < required || series2.len() < required {
        return Ok(None);
    }
    ensure_finite(symbol1, series1)?;
    ensure_finite(symbol2, series2)?;
    let price1 = latest_price(symbol1, series1)?;
    latest_price(symbol2, series2)?;

    // align both legs on their most recent bars
    let bars = cfg.lookback_period + 1;
    let returns1 = pct_returns(&series1.tail(bars).closes());
    let returns2 = pct_returns(&series2.tail(bars).closes());

    let corr = correlation(&returns1, &returns2);
    if corr.abs() < cfg.correlation_threshold {
        debug!(
            "[PAIRS] {}/{} correlation {:.3} below {:.2}, skipping",
            symbol1, symbol2, corr, cfg.correlation_threshold
        );
        return Ok(None);
    }

    let spread: Vec<f64> = returns1.iter().zip(&returns2).map(|(a, b)| a - b).collect();
    let spread_mean = mean(&spread);
    let spread_std = std_dev(&spread);
    if spread_std == 0.0 {
        return Ok(None);
    }
    let latest = spread[spread.len() - 1];
    let z_score = (latest - spread_mean) / spread_std;

    let signal_type = if z_score > cfg.z_threshold {
        SignalType::Sell
    } else if z_score < -cfg.z_threshold {
        SignalType::Buy
    } else {
        return Ok(None);
    };

    // Expect the first leg to give back (or recover) its excess return.
    let deviation = latest - spread_mean;
    let target_price = price1 * (1.0 - deviation);
    let stop_loss = price1 * (1.0 + deviation);

    let strength = if z_score.abs() > cfg.z_threshold * 1.5 {
        SignalStrength::Strong
    } else {
        SignalStrength::Moderate
    };
    let confidence = corr.abs().min(0.9);

    let (short_leg, long_leg) = if signal_type.is_sell() {
        (symbol1, symbol2)
    } else {
        (symbol2, symbol1)
    };
    let reasoning = format!(
        "Spread z-score {:+.2} with correlation {:.2}: short {}, long {}",
        z_score, corr, short_leg, long_leg
    );
    let symbol = pair_symbol(symbol1, symbol2);
    debug!("[PAIRS] {} {} ({})", symbol, signal_type, reasoning);

    Ok(Some(TradingSignal::new(
        symbol,
        signal_type,
        strength,
        confidence,
        price1,
        target_price,
        stop_loss,
        StrategyType::PairsTrading,
        reasoning,
        now,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fixed_time, series_from_returns};

    fn alternating(n: usize) -> Vec<f64> {
        (0..n).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect()
    }

    #[test]
    fn weakly_correlated_pair_never_signals() {
        // r2 = 0.5 * a + sqrt(0.75) * b with a, b orthogonal: correlation 0.5
        let a = alternating(60);
        let b: Vec<f64> = (0..60).map(|i| if i % 4 < 2 { 0.01 } else { -0.01 }).collect();
        let r2: Vec<f64> = a
            .iter()
            .zip(&b)
            .map(|(x, y)| 0.5 * x + 0.75f64.sqrt() * y)
            .collect();
        let s1 = series_from_returns(100.0, &a);
        let s2 = series_from_returns(50.0, &r2);

        let corr = correlation(&pct_returns(&s1.closes()), &pct_returns(&s2.closes()));
        assert!((corr - 0.5).abs() < 1e-6, "corr = {corr}");

        let out = evaluate("AAA", &s1, "BBB", &s2, &PairsConfig::default(), fixed_time()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn diverging_leg_sells_the_outperformer() {
        let a = alternating(60);
        let mut r2 = a.clone();
        r2[59] -= 0.005;
        let s1 = series_from_returns(100.0, &a);
        let s2 = series_from_returns(50.0, &r2);

        let signal = evaluate("AAA", &s1, "BBB", &s2, &PairsConfig::default(), fixed_time())
            .unwrap()
            .expect("expected a signal");
        assert_eq!(signal.symbol, "AAA/BBB");
        assert_eq!(signal.signal_type, SignalType::Sell);
        assert_eq!(signal.strength, SignalStrength::Strong);
        assert!(signal.target_price < signal.price);
        assert!(signal.stop_loss > signal.price);
        assert!((signal.price - s1.last().unwrap().close).abs() < 1e-12);
    }

    #[test]
    fn reversed_pair_buys() {
        let a = alternating(60);
        let mut r2 = a.clone();
        r2[59] -= 0.005;
        let s1 = series_from_returns(100.0, &a);
        let s2 = series_from_returns(50.0, &r2);

        let signal = evaluate("BBB", &s2, "AAA", &s1, &PairsConfig::default(), fixed_time())
            .unwrap()
            .expect("expected a signal");
        assert_eq!(signal.symbol, "BBB/AAA");
        assert_eq!(signal.signal_type, SignalType::Buy);
        assert!(signal.target_price > signal.price);
    }

    #[test]
    fn identical_legs_have_no_spread() {
        let a = alternating(60);
        let s1 = series_from_returns(100.0, &a);
        let s2 = series_from_returns(100.0, &a);
        assert!(evaluate("AAA", &s1, "BBB", &s2, &PairsConfig::default(), fixed_time())
            .unwrap()
            .is_none());
    }

    #[test]
    fn short_history_is_no_signal() {
        let a = alternating(30);
        let s1 = series_from_returns(100.0, &a);
        assert!(evaluate("AAA", &s1, "BBB", &s1, &PairsConfig::default(), fixed_time())
            .unwrap()
            .is_none());
    }
}
