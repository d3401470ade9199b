use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::config::RebalancingConfig;
use crate::models::{PlanStatus, RebalancingSignal};

/// Places the trades of a rebalancing plan.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn submit(&self, plan_id: &str, signal: &RebalancingSignal) -> Result<()>;
}

/// What `execute_plan` did with a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed,
    /// Execution started but did not finish; the plan is now FAILED.
    Failed(String),
    /// The plan was not PENDING and was left untouched.
    Rejected(PlanStatus),
    NotFound,
}

/// Stand-in broker: waits a fixed latency per trade and records what it was
/// sent. Can be told to reject one symbol.
#[derive(Debug)]
pub struct SimulatedBroker {
    latency: Duration,
    reject_symbol: Option<String>,
    submitted: Mutex<Vec<String>>,
}

impl SimulatedBroker {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            reject_symbol: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(cfg: &RebalancingConfig) -> Self {
        Self::new(Duration::from_millis(cfg.execution_delay_ms))
    }

    pub fn rejecting(mut self, symbol: &str) -> Self {
        self.reject_symbol = Some(symbol.to_string());
        self
    }

    /// Symbols accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl ExecutionGateway for SimulatedBroker {
    async fn submit(&self, plan_id: &str, signal: &RebalancingSignal) -> Result<()> {
        tokio::time::sleep(self.latency).await;
        if self.reject_symbol.as_deref() == Some(signal.symbol.as_str()) {
            bail!("broker rejected {} {}", signal.action, signal.symbol);
        }
        info!(
            "[{}] {} {} weight {:.4} -> {:.4}",
            plan_id, signal.action, signal.symbol, signal.current_weight, signal.target_weight
        );
        self.submitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(signal.symbol.clone());
        Ok(())
    }
}
