use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::StrategyType;

/// Running realized-trade statistics for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub strategy: StrategyType,
    pub total_signals: u64,
    pub successful_signals: u64,
    pub win_rate: f64,
    pub avg_return: f64,
    /// Most negative single-trade return seen so far.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub total_pnl: f64,
    pub last_updated: DateTime<Utc>,
    /// Per-trade returns in arrival order; the Sharpe ratio is derived from these.
    #[serde(default)]
    pub returns: Vec<f64>,
}

impl StrategyPerformance {
    pub fn new(strategy: StrategyType, now: DateTime<Utc>) -> Self {
        Self {
            strategy,
            total_signals: 0,
            successful_signals: 0,
            win_rate: 0.0,
            avg_return: 0.0,
            max_drawdown: 0.0,
            sharpe_ratio: 0.0,
            total_pnl: 0.0,
            last_updated: now,
            returns: Vec::new(),
        }
    }
}

pub type PerformanceMap = BTreeMap<StrategyType, StrategyPerformance>;
