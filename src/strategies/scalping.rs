use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ScalpingConfig;
use crate::core::indicators::sma;
use crate::error::StrategyError;
use crate::models::{CandleSeries, SignalStrength, SignalType, StrategyType, TradingSignal};
use crate::strategies::{ensure_finite, latest_price, StrategyResult};

/// Short-horizon trend following with tight, fixed exits.
pub fn evaluate(
    symbol: &str,
    series: &CandleSeries,
    cfg: &ScalpingConfig,
    now: DateTime<Utc>,
) -> StrategyResult {
    if cfg.sma_short == 0 || cfg.sma_long < cfg.sma_short {
        return Err(StrategyError::InvalidParameter(format!(
            "scalping windows must satisfy 0 < sma_short ({}) <= sma_long ({})",
            cfg.sma_short, cfg.sma_long
        )));
    }
    if series.len() < cfg.min_history.max(cfg.sma_long) {
        return Ok(None);
    }
    ensure_finite(symbol, series)?;
    let price = latest_price(symbol, series)?;

    let closes = series.closes();
    let (Some(short_ma), Some(long_ma)) = (sma(&closes, cfg.sma_short), sma(&closes, cfg.sma_long))
    else {
        return Ok(None);
    };
    if short_ma <= 0.0 || long_ma <= 0.0 {
        return Ok(None);
    }

    let short_spread = (price - short_ma) / short_ma;
    let long_spread = (price - long_ma) / long_ma;

    let recent = series.tail(cfg.sma_short);
    let volatility = (recent.highs_max() - recent.lows_min()) / price;
    if volatility <= cfg.volatility_threshold {
        return Ok(None);
    }

    let long_min = cfg.min_spread * 2.0;
    let signal_type = if short_spread > cfg.min_spread && long_spread > long_min {
        SignalType::Buy
    } else if short_spread < -cfg.min_spread && long_spread < -long_min {
        SignalType::Sell
    } else {
        return Ok(None);
    };

    let (target_price, stop_loss) = if signal_type.is_buy() {
        (
            price * (1.0 + cfg.profit_target),
            price * (1.0 - cfg.stop_loss_pct),
        )
    } else {
        (
            price * (1.0 - cfg.profit_target),
            price * (1.0 + cfg.stop_loss_pct),
        )
    };

    let reasoning = format!(
        "Spread vs SMA{} {:+.3}%, vs SMA{} {:+.3}%, range {:.2}%",
        cfg.sma_short,
        short_spread * 100.0,
        cfg.sma_long,
        long_spread * 100.0,
        volatility * 100.0
    );
    debug!("[SCALPING] {} {} ({})", symbol, signal_type, reasoning);

    Ok(Some(TradingSignal::new(
        symbol,
        signal_type,
        SignalStrength::Weak,
        cfg.confidence,
        price,
        target_price,
        stop_loss,
        StrategyType::Scalping,
        reasoning,
        now,
    )))
}
