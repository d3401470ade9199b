//! Durable JSON storage for signals, strategy performance and plans.
//!
//! Every write goes to a sibling `*.tmp` file which is flushed, synced and
//! then renamed over the target, so a crash mid-write leaves the previous
//! file intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::models::{PerformanceMap, RebalancingPlan, TradingSignal};

pub trait PersistenceGateway: Send + Sync {
    fn save_signals(&self, signals: &[TradingSignal]) -> Result<(), PersistenceError>;
    fn load_signals(&self) -> Result<Vec<TradingSignal>, PersistenceError>;
    fn save_performance(&self, metrics: &PerformanceMap) -> Result<(), PersistenceError>;
    fn load_performance(&self) -> Result<PerformanceMap, PersistenceError>;
    fn save_plan(&self, plan: &RebalancingPlan) -> Result<(), PersistenceError>;
    fn load_plan(&self, plan_id: &str) -> Result<Option<RebalancingPlan>, PersistenceError>;
    /// Every stored plan, oldest first.
    fn load_plans(&self) -> Result<Vec<RebalancingPlan>, PersistenceError>;
}

const SIGNALS_FILE: &str = "trading_signals.json";
const PERFORMANCE_FILE: &str = "strategy_performance.json";
const PLANS_DIR: &str = "rebalancing_plans";

/// File-backed store rooted at one directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn signals_path(&self) -> PathBuf {
        self.root.join(SIGNALS_FILE)
    }

    pub fn performance_path(&self) -> PathBuf {
        self.root.join(PERFORMANCE_FILE)
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root.join(PLANS_DIR)
    }

    pub fn plan_path(&self, plan_id: &str) -> PathBuf {
        self.plans_dir().join(format!("{}.json", plan_id))
    }
}

impl PersistenceGateway for JsonFileStore {
    fn save_signals(&self, signals: &[TradingSignal]) -> Result<(), PersistenceError> {
        write_json_atomic(&self.signals_path(), &signals)
    }

    fn load_signals(&self) -> Result<Vec<TradingSignal>, PersistenceError> {
        Ok(read_json(&self.signals_path())?.unwrap_or_default())
    }

    fn save_performance(&self, metrics: &PerformanceMap) -> Result<(), PersistenceError> {
        write_json_atomic(&self.performance_path(), metrics)
    }

    fn load_performance(&self) -> Result<PerformanceMap, PersistenceError> {
        Ok(read_json(&self.performance_path())?.unwrap_or_default())
    }

    fn save_plan(&self, plan: &RebalancingPlan) -> Result<(), PersistenceError> {
        write_json_atomic(&self.plan_path(&plan.plan_id), plan)
    }

    fn load_plan(&self, plan_id: &str) -> Result<Option<RebalancingPlan>, PersistenceError> {
        read_json(&self.plan_path(plan_id))
    }

    fn load_plans(&self) -> Result<Vec<RebalancingPlan>, PersistenceError> {
        let dir = self.plans_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&dir, e)),
        };

        let mut plans = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PersistenceError::io(&dir, e))?.path();
            // skips *.json.tmp leftovers too
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(plan) = read_json::<RebalancingPlan>(&path)? {
                plans.push(plan);
            }
        }
        sort_plans(&mut plans);
        Ok(plans)
    }
}

fn sort_plans(plans: &mut [RebalancingPlan]) {
    plans.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.plan_id.cmp(&b.plan_id))
    });
}

/// Serialize `value` to `path` via write-to-temp-then-rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    }

    let tmp = path.with_extension("json.tmp");
    let result = write_and_sync(&tmp, value).and_then(|_| {
        fs::rename(&tmp, path).map_err(|e| PersistenceError::io(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_and_sync<T: Serialize + ?Sized>(tmp: &Path, value: &T) -> Result<(), PersistenceError> {
    let file = File::create(tmp).map_err(|e| PersistenceError::io(tmp, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| PersistenceError::io(tmp, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| PersistenceError::io(tmp, e.into_error()))?;
    file.sync_all().map_err(|e| PersistenceError::io(tmp, e))
}

/// `Ok(None)` when the file does not exist yet.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// In-process store, for callers that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    signals: Mutex<Vec<TradingSignal>>,
    performance: Mutex<PerformanceMap>,
    plans: Mutex<HashMap<String, RebalancingPlan>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan_count(&self) -> usize {
        self.plans.lock().map(|p| p.len()).unwrap_or(0)
    }
}

// A poisoned lock only means another writer panicked; the data is still usable.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PersistenceGateway for MemoryStore {
    fn save_signals(&self, signals: &[TradingSignal]) -> Result<(), PersistenceError> {
        *lock(&self.signals) = signals.to_vec();
        Ok(())
    }

    fn load_signals(&self) -> Result<Vec<TradingSignal>, PersistenceError> {
        Ok(lock(&self.signals).clone())
    }

    fn save_performance(&self, metrics: &PerformanceMap) -> Result<(), PersistenceError> {
        *lock(&self.performance) = metrics.clone();
        Ok(())
    }

    fn load_performance(&self) -> Result<PerformanceMap, PersistenceError> {
        Ok(lock(&self.performance).clone())
    }

    fn save_plan(&self, plan: &RebalancingPlan) -> Result<(), PersistenceError> {
        lock(&self.plans).insert(plan.plan_id.clone(), plan.clone());
        Ok(())
    }

    fn load_plan(&self, plan_id: &str) -> Result<Option<RebalancingPlan>, PersistenceError> {
        Ok(lock(&self.plans).get(plan_id).cloned())
    }

    fn load_plans(&self) -> Result<Vec<RebalancingPlan>, PersistenceError> {
        let mut plans: Vec<RebalancingPlan> = lock(&self.plans).values().cloned().collect();
        sort_plans(&mut plans);
        Ok(plans)
    }
}
