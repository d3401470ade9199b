pub mod engine;
pub mod execution;

pub use engine::RebalancingEngine;
pub use execution::{ExecutionGateway, ExecutionOutcome, SimulatedBroker};
