use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::models::{Candle, CandleSeries};

/// Read `<dir>/<SYMBOL>.json`, a JSON array of bars.
pub fn load_series(dir: &str, symbol: &str) -> Result<CandleSeries> {
    let path = Path::new(dir).join(format!("{}.json", symbol));
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut candles: Vec<Candle> = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;

    // Deduplicate by timestamp and sort
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    debug!("Loaded {} bars for {} from {}", candles.len(), symbol, path.display());

    Ok(CandleSeries::new(candles))
}

pub fn save_series(dir: &str, symbol: &str, series: &CandleSeries) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = Path::new(dir).join(format!("{}.json", symbol));
    let json = serde_json::to_string(series.as_slice())?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    info!("Cached {} bars for {} to {}", series.len(), symbol, path.display());
    Ok(())
}

/// Symbols with a cached file in `dir`, sorted.
pub fn cached_symbols(dir: &str) -> Result<Vec<String>> {
    let mut symbols = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }
    }
    symbols.sort();
    Ok(symbols)
}
