pub mod market_condition;

pub use market_condition::MarketConditionAnalyzer;
