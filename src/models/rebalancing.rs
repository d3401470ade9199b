use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Symbol -> portfolio weight.
pub type Weights = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn score(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Failed)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "PENDING"),
            PlanStatus::Executing => write!(f, "EXECUTING"),
            PlanStatus::Completed => write!(f, "COMPLETED"),
            PlanStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
}

impl RebalanceFrequency {
    pub fn days(&self) -> i64 {
        match self {
            RebalanceFrequency::Daily => 1,
            RebalanceFrequency::Weekly => 7,
            RebalanceFrequency::Monthly => 30,
            RebalanceFrequency::Quarterly => 90,
            RebalanceFrequency::SemiAnnually => 180,
            RebalanceFrequency::Annually => 365,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DAILY" => Some(RebalanceFrequency::Daily),
            "WEEKLY" => Some(RebalanceFrequency::Weekly),
            "MONTHLY" => Some(RebalanceFrequency::Monthly),
            "QUARTERLY" => Some(RebalanceFrequency::Quarterly),
            "SEMI_ANNUALLY" => Some(RebalanceFrequency::SemiAnnually),
            "ANNUALLY" => Some(RebalanceFrequency::Annually),
            _ => None,
        }
    }
}

/// One corrective trade inside a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingSignal {
    pub symbol: String,
    pub current_weight: f64,
    pub target_weight: f64,
    pub weight_difference: f64,
    pub action: TradeAction,
    pub priority: Priority,
    pub reason: String,
    pub estimated_cost: f64,
    pub market_impact: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingPlan {
    pub plan_id: String,
    pub timestamp: DateTime<Utc>,
    pub current_weights: Weights,
    pub target_weights: Weights,
    pub signals: Vec<RebalancingSignal>,
    pub total_cost: f64,
    pub estimated_impact: f64,
    pub priority: Priority,
    pub status: PlanStatus,
    #[serde(default)]
    pub execution_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
}

impl RebalancingPlan {
    pub fn format_id(ts: DateTime<Utc>) -> String {
        format!("REBAL_{}", ts.format("%Y%m%d_%H%M%S"))
    }
}
