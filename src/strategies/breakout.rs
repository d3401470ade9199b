use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::BreakoutConfig;
use crate::core::indicators::{mean, ratio};
use crate::error::StrategyError;
use crate::models::{CandleSeries, SignalStrength, SignalType, StrategyType, TradingSignal};
use crate::strategies::{ensure_finite, latest_price, StrategyResult};

/// Close beyond the prior N-bar range on expanding volume.
///
/// The range is measured up to the previous bar so the current bar never
/// serves as its own reference level.
pub fn evaluate(
    symbol: &str,
    series: &CandleSeries,
    cfg: &BreakoutConfig,
    now: DateTime<Utc>,
) -> StrategyResult {
    let period = cfg.breakout_period;
    if period == 0 {
        return Err(StrategyError::InvalidParameter(
            "breakout_period must be positive".to_string(),
        ));
    }
    if series.len() < cfg.min_history.max(period + 1) {
        return Ok(None);
    }
    ensure_finite(symbol, series)?;
    let price = latest_price(symbol, series)?;

    let n = series.len();
    let prior = series.slice(n - 1 - period, n - 1);
    let resistance = prior.highs_max();
    let support = prior.lows_min();

    let volumes = series.volumes();
    let volume_ratio = ratio(volumes[n - 1], mean(&volumes[n - period..])).unwrap_or(0.0);
    if volume_ratio <= cfg.volume_multiplier {
        return Ok(None);
    }

    let (signal_type, target_price, stop_loss, level) =
        if price > resistance * (1.0 + cfg.buffer) {
            (
                SignalType::Buy,
                price * (1.0 + cfg.target_multiplier),
                resistance,
                resistance,
            )
        } else if price < support * (1.0 - cfg.buffer) {
            (
                SignalType::Sell,
                price * (1.0 - cfg.target_multiplier),
                support,
                support,
            )
        } else {
            return Ok(None);
        };

    // Twice the required volume marks a high-conviction break.
    let (strength, confidence) = if volume_ratio > cfg.volume_multiplier * 2.0 {
        (SignalStrength::VeryStrong, cfg.strong_confidence)
    } else {
        (SignalStrength::Strong, cfg.base_confidence)
    };

    let reasoning = format!(
        "{} breakout through {}-bar {} {:.2} on {:.1}x volume",
        if signal_type.is_buy() { "Upside" } else { "Downside" },
        period,
        if signal_type.is_buy() { "high" } else { "low" },
        level,
        volume_ratio
    );
    debug!("[BREAKOUT] {} {} ({})", symbol, signal_type, reasoning);

    Ok(Some(TradingSignal::new(
        symbol,
        signal_type,
        strength,
        confidence,
        price,
        target_price,
        stop_loss,
        StrategyType::Breakout,
        reasoning,
        now,
    )))
}
