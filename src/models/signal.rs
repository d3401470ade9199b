use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signals expire this long after creation unless a strategy says otherwise.
pub const DEFAULT_SIGNAL_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
    StrongBuy,
    StrongSell,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Hold => "HOLD",
            SignalType::StrongBuy => "STRONG_BUY",
            SignalType::StrongSell => "STRONG_SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, SignalType::Buy | SignalType::StrongBuy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, SignalType::Sell | SignalType::StrongSell)
    }

    /// +1 for long-side signals, -1 for short-side, 0 for HOLD.
    pub fn direction_sign(&self) -> f64 {
        if self.is_buy() {
            1.0
        } else if self.is_sell() {
            -1.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStrength::Weak => write!(f, "WEAK"),
            SignalStrength::Moderate => write!(f, "MODERATE"),
            SignalStrength::Strong => write!(f, "STRONG"),
            SignalStrength::VeryStrong => write!(f, "VERY_STRONG"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Momentum,
    MeanReversion,
    Breakout,
    Scalping,
    PairsTrading,
    GridTrading,
}

impl StrategyType {
    /// Strategies that evaluate one symbol at a time.
    pub const SINGLE_SYMBOL: [StrategyType; 5] = [
        StrategyType::Momentum,
        StrategyType::MeanReversion,
        StrategyType::Breakout,
        StrategyType::Scalping,
        StrategyType::GridTrading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Momentum => "momentum",
            StrategyType::MeanReversion => "mean_reversion",
            StrategyType::Breakout => "breakout",
            StrategyType::Scalping => "scalping",
            StrategyType::PairsTrading => "pairs_trading",
            StrategyType::GridTrading => "grid_trading",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One strategy's recommendation for one symbol, or for a pair as `"A/B"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub signal_type: SignalType,
    pub strength: SignalStrength,
    pub confidence: f64,
    pub price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub strategy: StrategyType,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
}

impl TradingSignal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        signal_type: SignalType,
        strength: SignalStrength,
        confidence: f64,
        price: f64,
        target_price: f64,
        stop_loss: f64,
        strategy: StrategyType,
        reasoning: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            signal_type,
            strength,
            confidence: confidence.clamp(0.0, 1.0),
            price,
            target_price,
            stop_loss,
            strategy,
            reasoning: reasoning.into(),
            timestamp,
            expiration: timestamp + Duration::hours(DEFAULT_SIGNAL_TTL_HOURS),
        }
    }

    pub fn is_buy(&self) -> bool {
        self.signal_type.is_buy()
    }

    pub fn is_sell(&self) -> bool {
        self.signal_type.is_sell()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TradingSignal {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T14:30:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        TradingSignal::new(
            "AAPL",
            SignalType::StrongBuy,
            SignalStrength::Strong,
            0.8,
            187.25,
            196.61,
            181.63,
            StrategyType::Momentum,
            "momentum 10.00%, volume 3.0x",
            ts,
        )
    }

    #[test]
    fn expiration_defaults_to_one_day() {
        let s = sample();
        assert_eq!(s.expiration - s.timestamp, Duration::hours(24));
        assert!(!s.is_expired(s.timestamp));
        assert!(s.is_expired(s.timestamp + Duration::hours(24)));
    }

    #[test]
    fn confidence_is_clamped() {
        let mut s = sample();
        s = TradingSignal::new(
            s.symbol, s.signal_type, s.strength, 1.7, s.price, s.target_price,
            s.stop_loss, s.strategy, s.reasoning, s.timestamp,
        );
        assert!((s.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn serde_round_trip_preserves_every_field() {
        let s = sample();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"STRONG_BUY\""));
        assert!(json.contains("\"STRONG\""));
        assert!(json.contains("\"momentum\""));
        assert!(json.contains("2024-03-01T14:30:00.123456789Z"));
        let back: TradingSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn direction_signs() {
        assert_eq!(SignalType::StrongBuy.direction_sign(), 1.0);
        assert_eq!(SignalType::Sell.direction_sign(), -1.0);
        assert_eq!(SignalType::Hold.direction_sign(), 0.0);
    }
}
