use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::GridConfig;
use crate::error::StrategyError;
use crate::models::{CandleSeries, SignalStrength, SignalType, StrategyType, TradingSignal};
use crate::strategies::{ensure_finite, latest_price};

/// Evenly spaced resting levels around the current price: buy below, sell
/// above. A level that lands exactly on the current price is skipped.
pub fn evaluate(
    symbol: &str,
    series: &CandleSeries,
    cfg: &GridConfig,
    now: DateTime<Utc>,
) -> Result<Vec<TradingSignal>, StrategyError> {
    if cfg.grid_levels < 2 {
        return Err(StrategyError::InvalidParameter(
            "grid_levels must be at least 2".to_string(),
        ));
    }
    if !(cfg.price_range_pct > 0.0 && cfg.price_range_pct < 2.0) {
        return Err(StrategyError::InvalidParameter(format!(
            "price_range_pct {} out of range",
            cfg.price_range_pct
        )));
    }
    if series.len() < cfg.min_history.max(1) {
        return Ok(Vec::new());
    }
    ensure_finite(symbol, series)?;
    let price = latest_price(symbol, series)?;

    let half_range = price * cfg.price_range_pct / 2.0;
    let lower = price - half_range;
    let step = (2.0 * half_range) / (cfg.grid_levels - 1) as f64;

    let mut signals = Vec::with_capacity(cfg.grid_levels);
    for i in 0..cfg.grid_levels {
        let level = lower + step * i as f64;
        let distance = (level - price).abs();
        if distance < step * 1e-9 {
            continue;
        }

        // Linear decay from the max confidence at the price to zero at the edge.
        let confidence = (cfg.max_confidence * (1.0 - distance / half_range))
            .clamp(cfg.min_confidence, cfg.max_confidence);

        let (signal_type, target_price, stop_loss) = if level < price {
            (SignalType::Buy, level + step, level - step)
        } else {
            (SignalType::Sell, level - step, level + step)
        };

        signals.push(TradingSignal::new(
            symbol,
            signal_type,
            SignalStrength::Weak,
            confidence,
            level,
            target_price,
            stop_loss,
            StrategyType::GridTrading,
            format!(
                "Grid level {}/{} at {:.2} ({:+.2}% from {:.2})",
                i + 1,
                cfg.grid_levels,
                level,
                (level - price) / price * 100.0,
                price
            ),
            now,
        ));
    }

    debug!("[GRID] {} {} levels around {:.2}", symbol, signals.len(), price);
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fixed_time, make_flat_series};

    #[test]
    fn five_levels_skip_the_centre() {
        let series = make_flat_series(5, 100.0, 1000.0);
        let signals = evaluate("GRD", &series, &GridConfig::default(), fixed_time()).unwrap();
        assert_eq!(signals.len(), 4);

        let levels: Vec<f64> = signals.iter().map(|s| s.price).collect();
        let expected = [95.0, 97.5, 102.5, 105.0];
        for (got, want) in levels.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }

        assert_eq!(signals[0].signal_type, SignalType::Buy);
        assert_eq!(signals[3].signal_type, SignalType::Sell);
        assert!(signals.iter().all(|s| s.signal_type != SignalType::Hold));
    }

    #[test]
    fn exits_are_one_step_either_side() {
        let series = make_flat_series(5, 100.0, 1000.0);
        let signals = evaluate("GRD", &series, &GridConfig::default(), fixed_time()).unwrap();
        let buy = &signals[1]; // 97.5
        assert!((buy.target_price - 100.0).abs() < 1e-9);
        assert!((buy.stop_loss - 95.0).abs() < 1e-9);
        let sell = &signals[2]; // 102.5
        assert!((sell.target_price - 100.0).abs() < 1e-9);
        assert!((sell.stop_loss - 105.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_decays_and_is_clamped() {
        let series = make_flat_series(5, 100.0, 1000.0);
        let signals = evaluate("GRD", &series, &GridConfig::default(), fixed_time()).unwrap();
        // inner levels: 0.7 * 0.5 = 0.35; outer levels: 0 clamped to 0.3
        assert!((signals[1].confidence - 0.35).abs() < 1e-9);
        assert!((signals[0].confidence - 0.3).abs() < 1e-9);
        assert!(signals
            .iter()
            .all(|s| s.confidence >= 0.3 && s.confidence <= 0.7));
    }

    #[test]
    fn even_level_count_uses_every_level() {
        let cfg = GridConfig {
            grid_levels: 4,
            ..GridConfig::default()
        };
        let series = make_flat_series(5, 100.0, 1000.0);
        let signals = evaluate("GRD", &series, &cfg, fixed_time()).unwrap();
        assert_eq!(signals.len(), 4);
        assert_eq!(
            signals.iter().filter(|s| s.signal_type == SignalType::Buy).count(),
            2
        );
    }

    #[test]
    fn empty_series_has_no_levels() {
        let series = CandleSeries::default();
        assert!(evaluate("GRD", &series, &GridConfig::default(), fixed_time())
            .unwrap()
            .is_empty());
    }
}
