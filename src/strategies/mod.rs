pub mod breakout;
pub mod grid;
pub mod mean_reversion;
pub mod momentum;
pub mod pairs;
pub mod scalping;

use chrono::{DateTime, Utc};

use crate::config::StrategyConfig;
use crate::error::StrategyError;
use crate::models::{CandleSeries, StrategyType, TradingSignal};

/// `Ok(None)` means the strategy had nothing to say; `Err` means it could not
/// evaluate the input at all.
pub type StrategyResult = Result<Option<TradingSignal>, StrategyError>;

/// Stateless dispatcher over the individual strategy functions.
#[derive(Debug, Clone, Default)]
pub struct StrategyLibrary {
    pub config: StrategyConfig,
    /// When set, used instead of Utc::now() to stamp signals (replay and tests)
    pub sim_time: Option<DateTime<Utc>>,
}

impl StrategyLibrary {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            sim_time: None,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.sim_time.unwrap_or_else(Utc::now)
    }

    /// Run one single-symbol strategy. Grid trading may return several signals.
    pub fn run(
        &self,
        strategy: StrategyType,
        symbol: &str,
        series: &CandleSeries,
    ) -> Result<Vec<TradingSignal>, StrategyError> {
        let now = self.now();
        let single = match strategy {
            StrategyType::Momentum => {
                momentum::evaluate(symbol, series, &self.config.momentum, now)?
            }
            StrategyType::MeanReversion => {
                mean_reversion::evaluate(symbol, series, &self.config.mean_reversion, now)?
            }
            StrategyType::Breakout => {
                breakout::evaluate(symbol, series, &self.config.breakout, now)?
            }
            StrategyType::Scalping => {
                scalping::evaluate(symbol, series, &self.config.scalping, now)?
            }
            StrategyType::GridTrading => {
                return grid::evaluate(symbol, series, &self.config.grid, now);
            }
            StrategyType::PairsTrading => {
                return Err(StrategyError::InvalidParameter(
                    "pairs trading needs two series; use StrategyLibrary::pairs".to_string(),
                ))
            }
        };
        Ok(single.into_iter().collect())
    }

    pub fn pairs(
        &self,
        symbol1: &str,
        series1: &CandleSeries,
        symbol2: &str,
        series2: &CandleSeries,
    ) -> StrategyResult {
        pairs::evaluate(
            symbol1,
            series1,
            symbol2,
            series2,
            &self.config.pairs,
            self.now(),
        )
    }
}

/// Rejects series containing NaN or infinite values.
pub(crate) fn ensure_finite(symbol: &str, series: &CandleSeries) -> Result<(), StrategyError> {
    if series.all_finite() {
        Ok(())
    } else {
        Err(StrategyError::NonFiniteInput {
            symbol: symbol.to_string(),
            field: "ohlcv",
        })
    }
}

/// Latest close, which must be strictly positive.
pub(crate) fn latest_price(symbol: &str, series: &CandleSeries) -> Result<f64, StrategyError> {
    let price = series.last().map(|c| c.close).unwrap_or(0.0);
    ensure_positive(symbol, price)
}

pub(crate) fn ensure_positive(symbol: &str, price: f64) -> Result<f64, StrategyError> {
    if price > 0.0 && price.is_finite() {
        Ok(price)
    } else {
        Err(StrategyError::InvalidPrice {
            symbol: symbol.to_string(),
            price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fixed_time, make_flat_series};

    #[test]
    fn run_rejects_pairs_without_second_series() {
        let lib = StrategyLibrary::default();
        let series = make_flat_series(80, 100.0, 1000.0);
        let err = lib.run(StrategyType::PairsTrading, "AAA", &series);
        assert!(matches!(err, Err(StrategyError::InvalidParameter(_))));
    }

    #[test]
    fn flat_market_yields_only_grid_levels() {
        let mut lib = StrategyLibrary::default();
        lib.sim_time = Some(fixed_time());
        let series = make_flat_series(80, 100.0, 1000.0);
        for strategy in StrategyType::SINGLE_SYMBOL {
            let signals = lib.run(strategy, "AAA", &series).unwrap();
            if strategy == StrategyType::GridTrading {
                assert_eq!(signals.len(), 4);
            } else {
                assert!(signals.is_empty(), "{strategy} fired on a flat market");
            }
        }
    }

    #[test]
    fn signals_are_stamped_with_sim_time() {
        let mut lib = StrategyLibrary::default();
        lib.sim_time = Some(fixed_time());
        let series = make_flat_series(10, 50.0, 10.0);
        let signals = lib.run(StrategyType::GridTrading, "AAA", &series).unwrap();
        assert!(signals.iter().all(|s| s.timestamp == fixed_time()));
    }

    #[test]
    fn zero_price_is_an_error_not_a_signal() {
        let lib = StrategyLibrary::default();
        let series = make_flat_series(80, 0.0, 1000.0);
        assert!(matches!(
            lib.run(StrategyType::Momentum, "ZERO", &series),
            Err(StrategyError::InvalidPrice { .. })
        ));
    }
}
