pub mod analysis;
pub mod config;
pub mod core;
pub mod error;
pub mod market_data;
pub mod models;
pub mod persistence;
pub mod rebalancing;
pub mod strategies;
#[cfg(test)]
pub mod test_helpers;
pub mod trading;
