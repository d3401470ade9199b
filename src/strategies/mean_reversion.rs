use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::MeanReversionConfig;
use crate::core::indicators::{mean, std_dev};
use crate::error::StrategyError;
use crate::models::{CandleSeries, SignalStrength, SignalType, StrategyType, TradingSignal};
use crate::strategies::{ensure_finite, latest_price, StrategyResult};

/// Bollinger-style fade of moves that stretch too far from the rolling mean.
pub fn evaluate(
    symbol: &str,
    series: &CandleSeries,
    cfg: &MeanReversionConfig,
    now: DateTime<Utc>,
) -> StrategyResult {
    let lookback = cfg.lookback_period;
    if lookback < 2 {
        return Err(StrategyError::InvalidParameter(
            "mean reversion lookback_period must be at least 2".to_string(),
        ));
    }
    if series.len() < cfg.min_history.max(lookback) {
        return Ok(None);
    }
    ensure_finite(symbol, series)?;
    let price = latest_price(symbol, series)?;

    let closes = series.closes();
    let window = &closes[closes.len() - lookback..];
    let sma = mean(window);
    let std = std_dev(window);
    if std == 0.0 {
        return Ok(None);
    }

    let k = cfg.std_dev_threshold;
    let upper = sma + k * std;
    let lower = sma - k * std;
    let z_score = (price - sma) / std;

    let (signal_type, strength, confidence) = if z_score > k {
        if z_score > cfg.strong_threshold {
            (SignalType::StrongSell, SignalStrength::Strong, cfg.strong_confidence)
        } else {
            (SignalType::Sell, SignalStrength::Moderate, cfg.base_confidence)
        }
    } else if z_score < -k {
        if z_score < -cfg.strong_threshold {
            (SignalType::StrongBuy, SignalStrength::Strong, cfg.strong_confidence)
        } else {
            (SignalType::Buy, SignalStrength::Moderate, cfg.base_confidence)
        }
    } else {
        return Ok(None);
    };

    let stop_distance = z_score.abs() * cfg.reversion_strength;
    let stop_loss = if signal_type.is_sell() {
        price * (1.0 + stop_distance)
    } else {
        price * (1.0 - stop_distance)
    };

    let reasoning = format!(
        "Price {:.2} is {:+.2} sd from the {}-bar mean {:.2} (band {:.2}..{:.2})",
        price, z_score, lookback, sma, lower, upper
    );
    debug!("[MEAN_REVERSION] {} {} ({})", symbol, signal_type, reasoning);

    Ok(Some(TradingSignal::new(
        symbol,
        signal_type,
        strength,
        confidence,
        price,
        sma,
        stop_loss,
        StrategyType::MeanReversion,
        reasoning,
        now,
    )))
}
