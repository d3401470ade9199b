use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::RebalancingConfig;
use crate::models::{
    PlanStatus, Priority, RebalanceFrequency, RebalancingPlan, RebalancingSignal, TradeAction,
    Weights,
};
use crate::persistence::PersistenceGateway;
use crate::rebalancing::execution::{ExecutionGateway, ExecutionOutcome};

/// Assumed portfolio value used to turn weight changes into trade values.
/// Cost estimates scale with it; they are not fill-cost predictions.
pub const NOTIONAL_PROXY: f64 = 1_000_000.0;

const HIGH_PRIORITY_DIFF: f64 = 0.10;
const MEDIUM_PRIORITY_DIFF: f64 = 0.05;
const IMPACT_PER_POINT: f64 = 0.001;
const MAX_MARKET_IMPACT: f64 = 0.01;

pub const TIME_BASED_REASON: &str = "Time-based rebalancing due";
pub const NO_REBALANCE_REASON: &str = "No rebalancing needed";

/// Turns weight drift into prioritized plans and drives them through
/// PENDING -> EXECUTING -> COMPLETED | FAILED.
pub struct RebalancingEngine {
    cfg: RebalancingConfig,
    store: Arc<dyn PersistenceGateway>,
    plans: BTreeMap<String, RebalancingPlan>,
    /// Plan ids in creation order
    history: Vec<String>,
    last_rebalance_date: Option<DateTime<Utc>>,
    execution_timeout: Duration,
    sim_time: Option<DateTime<Utc>>,
}

impl RebalancingEngine {
    pub fn new(cfg: RebalancingConfig, store: Arc<dyn PersistenceGateway>) -> Self {
        let execution_timeout = Duration::from_secs(cfg.execution_timeout_secs);
        Self {
            cfg,
            store,
            plans: BTreeMap::new(),
            history: Vec::new(),
            last_rebalance_date: None,
            execution_timeout,
            sim_time: None,
        }
    }

    pub fn with_sim_time(mut self, t: DateTime<Utc>) -> Self {
        self.sim_time = Some(t);
        self
    }

    pub fn set_sim_time(&mut self, t: DateTime<Utc>) {
        self.sim_time = Some(t);
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.sim_time.unwrap_or_else(Utc::now)
    }

    pub fn config(&self) -> &RebalancingConfig {
        &self.cfg
    }

    pub fn last_rebalance_date(&self) -> Option<DateTime<Utc>> {
        self.last_rebalance_date
    }

    pub fn set_last_rebalance_date(&mut self, date: Option<DateTime<Utc>>) {
        self.last_rebalance_date = date;
    }

    // --- Signal generation ---

    /// One corrective trade per symbol whose drift exceeds the threshold,
    /// highest priority and largest drift first, capped at
    /// `max_trades_per_rebalance`.
    pub fn generate_rebalancing_signals(
        &self,
        current: &Weights,
        target: &Weights,
    ) -> Vec<RebalancingSignal> {
        let now = self.now();
        let symbols: BTreeSet<&String> = current.keys().chain(target.keys()).collect();

        let mut signals = Vec::new();
        for symbol in symbols {
            let current_weight = current.get(symbol).copied().unwrap_or(0.0);
            let target_weight = target.get(symbol).copied().unwrap_or(0.0);
            if !current_weight.is_finite() || !target_weight.is_finite() {
                warn!("{}: non-finite weight, skipping", symbol);
                continue;
            }

            let diff = target_weight - current_weight;
            let magnitude = diff.abs();
            if magnitude <= self.cfg.threshold || magnitude < self.cfg.min_trade_size {
                continue;
            }
            if magnitude > self.cfg.max_single_trade {
                warn!(
                    "{}: weight change {:.2}% exceeds single-trade limit {:.2}%",
                    symbol,
                    magnitude * 100.0,
                    self.cfg.max_single_trade * 100.0
                );
            }

            let action = if diff > 0.0 {
                TradeAction::Buy
            } else {
                TradeAction::Sell
            };
            let priority = priority_for(magnitude);
            let trade_value = magnitude * NOTIONAL_PROXY;

            signals.push(RebalancingSignal {
                symbol: symbol.clone(),
                current_weight,
                target_weight,
                weight_difference: diff,
                action,
                priority,
                reason: format!(
                    "Weight drift {:+.2}% ({:.2}% -> {:.2}%)",
                    diff * 100.0,
                    current_weight * 100.0,
                    target_weight * 100.0
                ),
                estimated_cost: trade_value * self.cfg.base_cost_rate,
                market_impact: (IMPACT_PER_POINT * magnitude * 100.0).min(MAX_MARKET_IMPACT),
                timestamp: now,
            });
        }

        signals.sort_by(|a, b| {
            b.priority
                .score()
                .cmp(&a.priority.score())
                .then(b.weight_difference.abs().total_cmp(&a.weight_difference.abs()))
        });
        if signals.len() > self.cfg.max_trades_per_rebalance {
            debug!(
                "Truncating {} rebalancing signals to {}",
                signals.len(),
                self.cfg.max_trades_per_rebalance
            );
            signals.truncate(self.cfg.max_trades_per_rebalance);
        }
        signals
    }

    // --- Plans ---

    /// Build, register and persist a PENDING plan. `None` when nothing
    /// needs to trade.
    pub fn create_plan(&mut self, current: &Weights, target: &Weights) -> Option<RebalancingPlan> {
        let signals = self.generate_rebalancing_signals(current, target);
        if signals.is_empty() {
            info!("Portfolio within tolerance, no plan created");
            return None;
        }

        let now = self.now();
        let total_cost: f64 = signals.iter().map(|s| s.estimated_cost).sum();
        let estimated_impact: f64 = signals.iter().map(|s| s.market_impact).sum();
        let high = signals
            .iter()
            .filter(|s| s.priority == Priority::High)
            .count();
        let priority = if high >= 3 {
            Priority::High
        } else if high >= 1 {
            Priority::Medium
        } else {
            Priority::Low
        };

        let cost_fraction = total_cost / NOTIONAL_PROXY;
        if cost_fraction > self.cfg.cost_threshold {
            warn!(
                "Estimated plan cost {:.3}% of portfolio exceeds {:.3}%",
                cost_fraction * 100.0,
                self.cfg.cost_threshold * 100.0
            );
        }

        let plan = RebalancingPlan {
            plan_id: self.unique_plan_id(now),
            timestamp: now,
            current_weights: current.clone(),
            target_weights: target.clone(),
            signals,
            total_cost,
            estimated_impact,
            priority,
            status: PlanStatus::Pending,
            execution_date: None,
            completion_date: None,
        };

        info!(
            "Created plan {}: {} trades, cost {:.2}, impact {:.4}, priority {}",
            plan.plan_id,
            plan.signals.len(),
            plan.total_cost,
            plan.estimated_impact,
            plan.priority
        );
        persist_plan(self.store.as_ref(), &plan);
        self.history.push(plan.plan_id.clone());
        self.plans.insert(plan.plan_id.clone(), plan.clone());
        Some(plan)
    }

    /// Ids have one-second resolution; later plans in the same second get `_1`, `_2`, ...
    fn unique_plan_id(&self, now: DateTime<Utc>) -> String {
        let base = RebalancingPlan::format_id(now);
        if !self.plans.contains_key(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|id| !self.plans.contains_key(id))
            .unwrap_or(base)
    }

    pub fn get_plan(&self, plan_id: &str) -> Option<&RebalancingPlan> {
        self.plans.get(plan_id)
    }

    pub fn plans(&self) -> impl Iterator<Item = &RebalancingPlan> {
        self.plans.values()
    }

    /// Plans in the order they were created or loaded.
    pub fn history(&self) -> Vec<&RebalancingPlan> {
        self.history
            .iter()
            .filter_map(|id| self.plans.get(id))
            .collect()
    }

    /// Pull a persisted plan into the registry.
    pub fn load_plan(&mut self, plan_id: &str) -> Option<&RebalancingPlan> {
        if !self.plans.contains_key(plan_id) {
            match self.store.load_plan(plan_id) {
                Ok(Some(plan)) => {
                    self.history.push(plan.plan_id.clone());
                    self.plans.insert(plan.plan_id.clone(), plan);
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("Could not load plan {}: {}", plan_id, e);
                    return None;
                }
            }
        }
        self.plans.get(plan_id)
    }

    /// Reload every persisted plan and resume the schedule from the most
    /// recent COMPLETED one. Returns how many plans were added.
    pub fn restore(&mut self) -> usize {
        let stored = match self.store.load_plans() {
            Ok(plans) => plans,
            Err(e) => {
                warn!("Could not restore rebalancing plans: {}", e);
                return 0;
            }
        };

        let mut added = 0;
        for plan in stored {
            if plan.status == PlanStatus::Completed {
                self.last_rebalance_date = self.last_rebalance_date.max(plan.completion_date);
            }
            if !self.plans.contains_key(&plan.plan_id) {
                self.history.push(plan.plan_id.clone());
                self.plans.insert(plan.plan_id.clone(), plan);
                added += 1;
            }
        }
        info!(
            "Restored {} rebalancing plans, last rebalance {:?}",
            added, self.last_rebalance_date
        );
        added
    }

    // --- Triggers ---

    /// First matching trigger, checked in order: schedule, weight drift,
    /// then market triggers.
    pub fn check_rebalancing_needed(
        &self,
        current: &Weights,
        target: &Weights,
        last_rebalance_date: Option<DateTime<Utc>>,
        frequency: RebalanceFrequency,
    ) -> (bool, String) {
        let due = match last_rebalance_date {
            None => true,
            Some(last) => (self.now() - last).num_days() >= frequency.days(),
        };
        if due {
            return (true, TIME_BASED_REASON.to_string());
        }

        let symbols: BTreeSet<&String> = current.keys().chain(target.keys()).collect();
        for symbol in symbols {
            let drift = target.get(symbol).copied().unwrap_or(0.0)
                - current.get(symbol).copied().unwrap_or(0.0);
            if drift.abs() > self.cfg.threshold {
                return (
                    true,
                    format!(
                        "Threshold exceeded: {} drifted {:+.2}% (limit {:.2}%)",
                        symbol,
                        drift * 100.0,
                        self.cfg.threshold * 100.0
                    ),
                );
            }
        }

        if self.volatility_trigger() {
            return (true, "Volatility trigger".to_string());
        }
        if self.correlation_trigger() {
            return (true, "Correlation trigger".to_string());
        }
        (false, NO_REBALANCE_REASON.to_string())
    }

    /// Same check using the engine's own last rebalance and configured frequency.
    pub fn rebalancing_due(&self, current: &Weights, target: &Weights) -> (bool, String) {
        self.check_rebalancing_needed(current, target, self.last_rebalance_date, self.cfg.frequency)
    }

    /// Not implemented: never fires. `volatility_threshold` is carried in
    /// config but nothing measures realized volatility yet.
    fn volatility_trigger(&self) -> bool {
        false
    }

    /// Not implemented: never fires, as with `volatility_trigger`.
    fn correlation_trigger(&self) -> bool {
        false
    }

    // --- Execution ---

    /// Run a PENDING plan's trades through `gateway` in order.
    ///
    /// Any other status is rejected without touching the plan. A gateway
    /// error or running past the execution timeout leaves the plan FAILED.
    /// Every transition is persisted.
    pub async fn execute_plan(
        &mut self,
        plan_id: &str,
        gateway: &dyn ExecutionGateway,
    ) -> ExecutionOutcome {
        let started = self.now();
        let timeout = self.execution_timeout;
        let store = Arc::clone(&self.store);

        let Some(plan) = self.plans.get_mut(plan_id) else {
            warn!("Plan {} not found", plan_id);
            return ExecutionOutcome::NotFound;
        };
        if plan.status != PlanStatus::Pending {
            warn!("Plan {} is {}, refusing to execute", plan_id, plan.status);
            return ExecutionOutcome::Rejected(plan.status);
        }

        plan.status = PlanStatus::Executing;
        plan.execution_date = Some(started);
        persist_plan(store.as_ref(), plan);
        info!("Executing plan {} ({} trades)", plan_id, plan.signals.len());

        let trades = plan.signals.clone();
        let run = async {
            for signal in &trades {
                gateway
                    .submit(plan_id, signal)
                    .await
                    .with_context(|| format!("{} {}", signal.action, signal.symbol))?;
            }
            Ok::<(), anyhow::Error>(())
        };

        let result = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(_) => Err(format!("timed out after {:?}", timeout)),
        };

        let outcome = match result {
            Ok(()) => {
                let finished = self.sim_time.unwrap_or_else(Utc::now);
                plan.status = PlanStatus::Completed;
                plan.completion_date = Some(finished);
                info!("Plan {} completed", plan_id);
                self.last_rebalance_date = Some(finished);
                ExecutionOutcome::Completed
            }
            Err(reason) => {
                plan.status = PlanStatus::Failed;
                error!("Plan {} failed: {}", plan_id, reason);
                ExecutionOutcome::Failed(reason)
            }
        };
        persist_plan(store.as_ref(), plan);
        outcome
    }
}

fn priority_for(magnitude: f64) -> Priority {
    if magnitude > HIGH_PRIORITY_DIFF {
        Priority::High
    } else if magnitude > MEDIUM_PRIORITY_DIFF {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Persistence failures are logged; the in-memory plan stays authoritative.
fn persist_plan(store: &dyn PersistenceGateway, plan: &RebalancingPlan) {
    if let Err(e) = store.save_plan(plan) {
        error!(
            "Failed to persist plan {} ({}): {}",
            plan.plan_id, plan.status, e
        );
    }
}
