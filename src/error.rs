use std::path::PathBuf;

use thiserror::Error;

/// A strategy could not evaluate its input. Distinct from "no signal",
/// which strategies report as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("{symbol}: invalid price {price}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("{symbol}: non-finite value in {field}")]
    NonFiniteInput { symbol: String, field: &'static str },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PerformanceError {
    #[error("HOLD signals carry no position and are never tracked")]
    HoldSignal,

    #[error("entry price must be positive, got {0}")]
    InvalidEntryPrice(f64),

    #[error("exit price must be finite, got {0}")]
    InvalidExitPrice(f64),

    #[error("no active signal at index {0}")]
    UnknownSignal(usize),
}
