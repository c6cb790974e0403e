mod batch_runner;
mod gateway;
mod settlement_engine;
#[cfg(test)]
mod tests;

pub use batch_runner::{AccountSummary, BatchRunner};
pub use gateway::Gateway;
pub use settlement_engine::SettlementEngine;
