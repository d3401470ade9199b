use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSentiment {
    Optimistic,
    Neutral,
    Pessimistic,
}

/// Shared by liquidity and correlation classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    High,
    Medium,
    Low,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::High => write!(f, "HIGH"),
            Level::Medium => write!(f, "MEDIUM"),
            Level::Low => write!(f, "LOW"),
        }
    }
}

/// Live quote for one symbol as reported by the market data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    /// Fractional change since the previous close (0.012 = +1.2%).
    pub change: f64,
    /// Typical volume for the symbol, when the provider knows it.
    #[serde(default)]
    pub avg_volume: Option<f64>,
}

/// Point-in-time classification of the whole market. Replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    pub volatility_regime: VolatilityRegime,
    pub trend_direction: TrendDirection,
    pub market_sentiment: MarketSentiment,
    pub liquidity_condition: Level,
    pub correlation_regime: Level,
    pub timestamp: DateTime<Utc>,
}

impl MarketCondition {
    /// Classification used when there is nothing to classify.
    pub fn neutral(timestamp: DateTime<Utc>) -> Self {
        Self {
            volatility_regime: VolatilityRegime::Medium,
            trend_direction: TrendDirection::Sideways,
            market_sentiment: MarketSentiment::Neutral,
            liquidity_condition: Level::Medium,
            correlation_regime: Level::Medium,
            timestamp,
        }
    }
}

impl fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "volatility={:?} trend={:?} sentiment={:?} liquidity={} correlation={}",
            self.volatility_regime,
            self.trend_direction,
            self.market_sentiment,
            self.liquidity_condition,
            self.correlation_regime
        )
    }
}
