use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use quant_signal_engine::analysis::MarketConditionAnalyzer;
use quant_signal_engine::config::Config;
use quant_signal_engine::market_data::{cache, HistoricalProvider, MarketDataProvider};
use quant_signal_engine::models::Weights;
use quant_signal_engine::persistence::{JsonFileStore, PersistenceGateway};
use quant_signal_engine::rebalancing::{RebalancingEngine, SimulatedBroker};
use quant_signal_engine::trading::{CancelToken, SignalAggregator};

/// Bars requested per symbol; covers the longest strategy lookback.
const HISTORY_BARS: usize = 250;
const TOP_SIGNALS: usize = 10;

const USAGE: &str = "usage: quant-signal-engine [scan | rebalance <current.json> <target.json>]";

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.to_lowercase()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("scan") => run_scan(&cfg).await,
        Some("rebalance") => {
            let current = args.get(2).context(USAGE)?;
            let target = args.get(3).context(USAGE)?;
            run_rebalance(&cfg, current, target).await
        }
        Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

async fn run_scan(cfg: &Config) -> Result<()> {
    let symbols = if cfg.symbols.is_empty() {
        cache::cached_symbols(&cfg.data_dir)?
    } else {
        cfg.symbols.clone()
    };
    if symbols.is_empty() {
        println!("No symbols configured and no cached data in {}", cfg.data_dir);
        return Ok(());
    }

    let mut provider = HistoricalProvider::new();
    for symbol in &symbols {
        match cache::load_series(&cfg.data_dir, symbol) {
            Ok(series) => provider.load(symbol, series),
            Err(e) => warn!("{}: {:#}", symbol, e),
        }
    }

    let quotes = provider.snapshot(&symbols).await?;
    let mut analyzer = MarketConditionAnalyzer::new();
    let condition = analyzer.analyze(&quotes);
    println!("Market: {}", condition);
    println!();

    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(&cfg.state_dir));
    let mut aggregator = SignalAggregator::new(cfg, store);
    aggregator.load_active();
    aggregator.prune_expired(Utc::now());

    let cancel = CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let report = aggregator
        .scan_provider(&mut provider, &symbols, HISTORY_BARS, &cancel)
        .await;

    println!(
        "Scanned {} symbols: {} new signals, {} failures, {} skipped{}",
        symbols.len(),
        report.signals.len(),
        report.failures.len(),
        report.skipped.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for failure in &report.failures {
        println!("  failed: {} {}", failure.symbol, failure.reason);
    }
    println!();

    println!("Top signals:");
    for s in aggregator.top_signals(TOP_SIGNALS) {
        println!(
            "  {:<12} {:<11} {:<14} conf {:.2}  price {:.4}  target {:.4}  stop {:.4}",
            s.symbol,
            s.signal_type,
            s.strategy,
            s.confidence,
            s.price,
            s.target_price,
            s.stop_loss
        );
    }
    Ok(())
}

fn read_weights(path: &str) -> Result<Weights> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading weights from {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing weights in {}", path))
}

async fn run_rebalance(cfg: &Config, current_path: &str, target_path: &str) -> Result<()> {
    let current = read_weights(current_path)?;
    let target = read_weights(target_path)?;

    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(&cfg.state_dir));
    let mut engine = RebalancingEngine::new(cfg.rebalancing.clone(), store);
    engine.restore();

    let (needed, reason) = engine.rebalancing_due(&current, &target);
    println!("Rebalance needed: {} ({})", needed, reason);
    if !needed {
        return Ok(());
    }

    let Some(plan) = engine.create_plan(&current, &target) else {
        println!("All weights within tolerance; nothing to trade");
        return Ok(());
    };
    println!(
        "Plan {}: {} trades, est. cost {:.2}, impact {:.4}, priority {}",
        plan.plan_id,
        plan.signals.len(),
        plan.total_cost,
        plan.estimated_impact,
        plan.priority
    );
    for s in &plan.signals {
        println!(
            "  {:<4} {:<10} {:+.2}%  [{}]",
            s.action,
            s.symbol,
            s.weight_difference * 100.0,
            s.priority
        );
    }

    let broker = SimulatedBroker::from_config(&cfg.rebalancing);
    let outcome = engine.execute_plan(&plan.plan_id, &broker).await;
    info!("Plan {} finished: {:?}", plan.plan_id, outcome);
    println!("Outcome: {:?}", outcome);
    Ok(())
}
