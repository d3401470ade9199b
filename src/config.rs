use crate::models::RebalanceFrequency;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    pub lookback_period: usize,
    pub momentum_threshold: f64,
    pub volume_threshold: f64,
    pub strong_momentum: f64,
    pub strong_volume: f64,
    pub rsi_period: usize,
    pub rsi_upper: f64,
    pub rsi_lower: f64,
    pub base_confidence: f64,
    pub strong_confidence: f64,
    pub min_history: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        let lookback_period = 20;
        Self {
            lookback_period,
            momentum_threshold: 0.02,
            volume_threshold: 1.5,
            strong_momentum: 0.05,
            strong_volume: 2.0,
            rsi_period: 14,
            rsi_upper: 70.0,
            rsi_lower: 30.0,
            base_confidence: 0.6,
            strong_confidence: 0.8,
            min_history: lookback_period + 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanReversionConfig {
    pub lookback_period: usize,
    pub std_dev_threshold: f64,
    pub strong_threshold: f64,
    pub reversion_strength: f64,
    pub base_confidence: f64,
    pub strong_confidence: f64,
    pub min_history: usize,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        let lookback_period = 50;
        Self {
            lookback_period,
            std_dev_threshold: 2.0,
            strong_threshold: 3.0,
            reversion_strength: 0.01,
            base_confidence: 0.6,
            strong_confidence: 0.8,
            min_history: lookback_period + 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutConfig {
    pub breakout_period: usize,
    pub buffer: f64,
    pub volume_multiplier: f64,
    pub target_multiplier: f64,
    pub base_confidence: f64,
    pub strong_confidence: f64,
    pub min_history: usize,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        let breakout_period = 20;
        Self {
            breakout_period,
            buffer: 0.005,
            volume_multiplier: 1.5,
            target_multiplier: 0.05,
            base_confidence: 0.65,
            strong_confidence: 0.8,
            min_history: breakout_period + 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalpingConfig {
    pub sma_short: usize,
    pub sma_long: usize,
    pub min_spread: f64,
    pub volatility_threshold: f64,
    pub profit_target: f64,
    pub stop_loss_pct: f64,
    pub confidence: f64,
    pub min_history: usize,
}

impl Default for ScalpingConfig {
    fn default() -> Self {
        let sma_long = 10;
        Self {
            sma_short: 5,
            sma_long,
            min_spread: 0.001,
            volatility_threshold: 0.005,
            profit_target: 0.003,
            stop_loss_pct: 0.002,
            confidence: 0.55,
            min_history: sma_long + 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairsConfig {
    /// Number of aligned returns used for correlation and spread statistics.
    pub lookback_period: usize,
    pub correlation_threshold: f64,
    pub z_threshold: f64,
    pub min_history: usize,
}

impl Default for PairsConfig {
    fn default() -> Self {
        let lookback_period = 60;
        Self {
            lookback_period,
            correlation_threshold: 0.7,
            z_threshold: 2.0,
            min_history: lookback_period + 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub grid_levels: usize,
    pub price_range_pct: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub min_history: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_levels: 5,
            price_range_pct: 0.10,
            min_confidence: 0.3,
            max_confidence: 0.7,
            min_history: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub momentum: MomentumConfig,
    pub mean_reversion: MeanReversionConfig,
    pub breakout: BreakoutConfig,
    pub scalping: ScalpingConfig,
    pub pairs: PairsConfig,
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancingConfig {
    pub threshold: f64,
    pub max_trades_per_rebalance: usize,
    pub min_trade_size: f64,
    pub max_single_trade: f64,
    /// Plan cost as a fraction of the notional proxy above which a warning is logged.
    pub cost_threshold: f64,
    pub volatility_threshold: f64,
    pub correlation_threshold: f64,
    pub performance_threshold: f64,
    pub base_cost_rate: f64,
    pub frequency: RebalanceFrequency,
    pub execution_delay_ms: u64,
    pub execution_timeout_secs: u64,
}

impl Default for RebalancingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            max_trades_per_rebalance: 10,
            min_trade_size: 0.01,
            max_single_trade: 0.25,
            cost_threshold: 0.005,
            volatility_threshold: 0.25,
            correlation_threshold: 0.8,
            performance_threshold: -0.10,
            base_cost_rate: 0.001,
            frequency: RebalanceFrequency::Monthly,
            execution_delay_ms: 100,
            execution_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Universe
    pub symbols: Vec<String>,
    /// Bars a symbol needs before the aggregator runs strategies on it.
    pub min_history_bars: usize,

    pub strategies: StrategyConfig,
    pub rebalancing: RebalancingConfig,

    // Storage
    pub data_dir: String,
    pub state_dir: String,

    // Logging
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            min_history_bars: 30,
            strategies: StrategyConfig::default(),
            rebalancing: RebalancingConfig::default(),
            data_dir: "data".to_string(),
            state_dir: "state".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let defaults = Config::default();
        let mut rebalancing = defaults.rebalancing.clone();
        rebalancing.threshold = env("REBALANCE_THRESHOLD", "0.05")
            .parse()
            .unwrap_or(rebalancing.threshold);
        rebalancing.max_trades_per_rebalance = env("MAX_TRADES_PER_REBALANCE", "10")
            .parse()
            .unwrap_or(rebalancing.max_trades_per_rebalance);
        rebalancing.frequency = RebalanceFrequency::parse(&env("REBALANCE_FREQUENCY", "MONTHLY"))
            .unwrap_or(rebalancing.frequency);
        rebalancing.execution_delay_ms = env("EXECUTION_DELAY_MS", "100")
            .parse()
            .unwrap_or(rebalancing.execution_delay_ms);
        rebalancing.execution_timeout_secs = env("EXECUTION_TIMEOUT_SECS", "30")
            .parse()
            .unwrap_or(rebalancing.execution_timeout_secs);

        let symbols = env("SYMBOLS", "")
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            symbols,
            min_history_bars: env("MIN_HISTORY_BARS", "30")
                .parse()
                .unwrap_or(defaults.min_history_bars),
            strategies: StrategyConfig::default(),
            rebalancing,
            data_dir: env("DATA_DIR", "data"),
            state_dir: env("STATE_DIR", "state"),
            log_level: env("LOG_LEVEL", "INFO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_history_follows_lookbacks() {
        let s = StrategyConfig::default();
        assert_eq!(s.momentum.min_history, 30);
        assert_eq!(s.mean_reversion.min_history, 60);
        assert_eq!(s.breakout.min_history, 25);
        assert_eq!(s.pairs.min_history, 61);
    }

    #[test]
    fn rebalancing_defaults() {
        let r = RebalancingConfig::default();
        assert!((r.threshold - 0.05).abs() < 1e-12);
        assert_eq!(r.max_trades_per_rebalance, 10);
        assert_eq!(r.frequency, RebalanceFrequency::Monthly);
    }

    // One test owns these variables; parallel tests must not race on them.
    #[test]
    fn env_overrides_parse_or_fall_back() {
        std::env::set_var("REBALANCE_THRESHOLD", "0.08");
        std::env::set_var("REBALANCE_FREQUENCY", "quarterly");
        std::env::set_var("SYMBOLS", " aaa, bbb ,,");
        let cfg = Config::from_env();
        assert!((cfg.rebalancing.threshold - 0.08).abs() < 1e-12);
        assert_eq!(cfg.rebalancing.frequency, RebalanceFrequency::Quarterly);
        assert_eq!(cfg.symbols, vec!["AAA".to_string(), "BBB".to_string()]);

        std::env::set_var("REBALANCE_THRESHOLD", "abc");
        std::env::set_var("REBALANCE_FREQUENCY", "HOURLY");
        let cfg = Config::from_env();
        assert!((cfg.rebalancing.threshold - 0.05).abs() < 1e-12);
        assert_eq!(cfg.rebalancing.frequency, RebalanceFrequency::Monthly);

        std::env::remove_var("REBALANCE_THRESHOLD");
        std::env::remove_var("REBALANCE_FREQUENCY");
        std::env::remove_var("SYMBOLS");
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.strategies.grid.grid_levels, 5);
        assert_eq!(back.state_dir, "state");
    }
}
