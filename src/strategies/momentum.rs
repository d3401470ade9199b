use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::MomentumConfig;
use crate::core::indicators::{last_rsi, mean, ratio};
use crate::error::StrategyError;
use crate::models::{CandleSeries, SignalStrength, SignalType, StrategyType, TradingSignal};
use crate::strategies::{ensure_finite, ensure_positive, latest_price, StrategyResult};

/// Price momentum confirmed by volume, filtered by RSI so that already
/// overextended moves are not chased.
pub fn evaluate(
    symbol: &str,
    series: &CandleSeries,
    cfg: &MomentumConfig,
    now: DateTime<Utc>,
) -> StrategyResult {
    let lookback = cfg.lookback_period;
    if lookback == 0 {
        return Err(StrategyError::InvalidParameter(
            "momentum lookback_period must be positive".to_string(),
        ));
    }
    if series.len() < cfg.min_history.max(lookback + 1) {
        return Ok(None);
    }
    ensure_finite(symbol, series)?;
    let price = latest_price(symbol, series)?;

    let closes = series.closes();
    let volumes = series.volumes();
    let n = closes.len();

    let reference = ensure_positive(symbol, closes[n - lookback])?;
    let momentum = (price - reference) / reference;
    let volume_ratio = ratio(volumes[n - 1], mean(&volumes[n - lookback..])).unwrap_or(0.0);
    let rsi = last_rsi(&closes, cfg.rsi_period);

    let bullish = momentum > cfg.momentum_threshold
        && volume_ratio > cfg.volume_threshold
        && rsi < cfg.rsi_upper;
    let bearish = momentum < -cfg.momentum_threshold
        && volume_ratio > cfg.volume_threshold
        && rsi > cfg.rsi_lower;

    if !bullish && !bearish {
        return Ok(None);
    }

    let strong = momentum.abs() > cfg.strong_momentum && volume_ratio > cfg.strong_volume;
    let (signal_type, strength, confidence) = match (bullish, strong) {
        (true, true) => (SignalType::StrongBuy, SignalStrength::Strong, cfg.strong_confidence),
        (true, false) => (SignalType::Buy, SignalStrength::Moderate, cfg.base_confidence),
        (false, true) => (SignalType::StrongSell, SignalStrength::Strong, cfg.strong_confidence),
        (false, false) => (SignalType::Sell, SignalStrength::Moderate, cfg.base_confidence),
    };

    // Target extends half the observed move; the stop sits against the move.
    let target_price = price * (1.0 + momentum * 0.5);
    let stop_distance = momentum.abs() * 0.3;
    let stop_loss = if bullish {
        price * (1.0 - stop_distance)
    } else {
        price * (1.0 + stop_distance)
    };

    let reasoning = format!(
        "Momentum {:+.2}% over {} bars, volume {:.1}x average, RSI {:.1}",
        momentum * 100.0,
        lookback,
        volume_ratio,
        rsi
    );
    debug!("[MOMENTUM] {} {} ({})", symbol, signal_type, reasoning);

    Ok(Some(TradingSignal::new(
        symbol,
        signal_type,
        strength,
        confidence,
        price,
        target_price,
        stop_loss,
        StrategyType::Momentum,
        reasoning,
        now,
    )))
}
