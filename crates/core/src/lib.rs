//! Liquidator core logic.
//!
//! This crate provides the liquidation pipeline:
//! - Market registry refreshed from the position index
//! - Risk scanner finding underwater borrowers per market
//! - Bounded candidate queue between discovery and execution
//! - Executor sizing repay amounts and picking collateral
//! - Configuration loading and cooperative shutdown

pub mod config;
mod candidate;
mod engine;
mod executor;
mod queue;
mod registry;
mod scanner;
mod shutdown;
pub mod u256_math;

#[cfg(test)]
mod testing;

pub use candidate::{LiquidationPlan, RiskCandidate};
pub use config::{load_config, load_config_from_env, AppConfig, ConfigError, LogConfig, LogFormat};
pub use engine::{approve_markets, ApprovalSummary, Engine, EngineConfig};
pub use executor::{ExecutionOutcome, Executor, ExecutorConfig, ExecutorStats};
pub use queue::{candidate_queue, CandidateReceiver, CandidateSender, QueueClosed, DEFAULT_QUEUE_CAPACITY};
pub use registry::MarketRegistry;
pub use scanner::{InFlightGuard, RiskScanner, ScanReport, ScannerConfig};
pub use shutdown::{Shutdown, ShutdownTrigger};
