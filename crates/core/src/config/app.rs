//! Process configuration.
//!
//! Every section has defaults except the endpoints, the Comptroller address
//! and the wallet key.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;
use crate::executor::ExecutorConfig;
use crate::scanner::ScannerConfig;

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chain endpoint and transaction settings
    pub chain: ChainSettings,

    /// Position index endpoint
    pub index: IndexSettings,

    /// Signing credential
    pub wallet: WalletSettings,

    /// Scan and registry cadence
    #[serde(default)]
    pub scanner: ScannerTimingConfig,

    /// Candidate queue sizing
    #[serde(default)]
    pub queue: QueueConfig,

    /// Liquidation planning bounds
    #[serde(default)]
    pub liquidation: LiquidationConfig,

    /// Log level and destination
    #[serde(default)]
    pub log: LogConfig,
}

/// Chain endpoint and transaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    /// JSON-RPC HTTP endpoint
    pub rpc_url: String,

    /// Expected chain id; checked against the endpoint at startup
    pub chain_id: u64,

    /// Comptroller contract
    pub comptroller: Address,

    /// Gas limit for every transaction
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Cap on the node-suggested gas price (gwei)
    #[serde(default)]
    pub max_gas_price_gwei: Option<f64>,

    /// Deadline for each RPC call (milliseconds)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Wait for the receipt after broadcasting a transaction
    #[serde(default)]
    pub wait_for_receipt: bool,
}

fn default_gas_limit() -> u64 {
    3_000_000
}
fn default_call_timeout() -> u64 {
    10_000
}

impl ChainSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Gas price cap in wei.
    pub fn max_gas_price_wei(&self) -> Option<u128> {
        self.max_gas_price_gwei.map(|gwei| (gwei * 1e9) as u128)
    }
}

/// Position index endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// GraphQL endpoint
    pub url: String,

    /// Positions per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Request timeout (milliseconds)
    #[serde(default = "default_index_timeout")]
    pub timeout_ms: u64,
}

fn default_page_size() -> usize {
    1000
}
fn default_index_timeout() -> u64 {
    15_000
}

impl IndexSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Signing credential.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Hex private key, with or without `0x`
    pub private_key: String,
}

impl std::fmt::Debug for WalletSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSettings")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Scan and registry cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerTimingConfig {
    /// Per-market scan period (seconds)
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Market registry refresh period (seconds)
    #[serde(default = "default_market_refresh")]
    pub market_refresh_secs: u64,

    /// Upper bound on concurrently running market scans
    #[serde(default = "default_max_concurrent_scans")]
    pub max_concurrent_scans: usize,
}

fn default_scan_interval() -> u64 {
    30
}
fn default_market_refresh() -> u64 {
    60
}
fn default_max_concurrent_scans() -> usize {
    16
}

impl Default for ScannerTimingConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            market_refresh_secs: default_market_refresh(),
            max_concurrent_scans: default_max_concurrent_scans(),
        }
    }
}

impl ScannerTimingConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
    pub fn market_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.market_refresh_secs)
    }
}

/// Candidate queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

fn default_queue_capacity() -> usize {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

/// Liquidation planning bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationConfig {
    /// Collateral search passes before a candidate is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_collateral_attempts: u32,

    /// Smallest repay amount worth trying (raw underlying units)
    #[serde(default = "default_min_repay")]
    pub min_repay_amount: u64,
}

fn default_max_attempts() -> u32 {
    8
}
fn default_min_repay() -> u64 {
    1
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            max_collateral_attempts: default_max_attempts(),
            min_repay_amount: default_min_repay(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Log level and destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Directory for the log file; stdout when unset
    #[serde(default)]
    pub file_dir: Option<String>,

    #[serde(default = "default_log_file")]
    pub file_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> String {
    "liquidator.log".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file_dir: None,
            file_name: default_log_file(),
        }
    }
}

impl LogConfig {
    /// Full log file path, when logging to a file.
    pub fn file_path(&self) -> Option<std::path::PathBuf> {
        self.file_dir
            .as_ref()
            .map(|dir| std::path::Path::new(dir).join(&self.file_name))
    }
}

impl AppConfig {
    /// Parse and validate a TOML document (placeholders already expanded).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.chain.rpc_url.trim().is_empty() {
            return invalid("chain.rpc_url is empty");
        }
        if self.chain.comptroller.is_zero() {
            return invalid("chain.comptroller is the zero address");
        }
        if self.chain.call_timeout_ms == 0 {
            return invalid("chain.call_timeout_ms must be positive");
        }
        if let Some(gwei) = self.chain.max_gas_price_gwei {
            if !gwei.is_finite() || gwei <= 0.0 || self.chain.max_gas_price_wei() == Some(0) {
                return invalid("chain.max_gas_price_gwei must be a positive number");
            }
        }
        if self.index.url.trim().is_empty() {
            return invalid("index.url is empty");
        }
        if self.index.page_size == 0 || self.index.page_size > liquidator_index::MAX_PAGE_SIZE {
            return invalid("index.page_size must be between 1 and 1000");
        }
        if self.wallet.private_key.trim().is_empty() {
            return invalid("wallet.private_key is empty");
        }
        if self.scanner.scan_interval_secs == 0 || self.scanner.market_refresh_secs == 0 {
            return invalid("scanner intervals must be positive");
        }
        if self.scanner.max_concurrent_scans == 0 {
            return invalid("scanner.max_concurrent_scans must be positive");
        }
        if self.queue.capacity == 0 {
            return invalid("queue.capacity must be positive");
        }
        if self.liquidation.max_collateral_attempts == 0 {
            return invalid("liquidation.max_collateral_attempts must be positive");
        }
        if self.liquidation.min_repay_amount == 0 {
            return invalid("liquidation.min_repay_amount must be positive");
        }
        Ok(())
    }

    /// Scanner settings derived from this file.
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            page_size: self.index.page_size,
            scan_interval: self.scanner.scan_interval(),
            max_concurrent_scans: self.scanner.max_concurrent_scans,
        }
    }

    /// Executor settings derived from this file.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_collateral_attempts: self.liquidation.max_collateral_attempts,
            min_repay_amount: U256::from(self.liquidation.min_repay_amount),
        }
    }

    /// Log the effective configuration. The wallet key is never printed.
    pub fn log_config(&self) {
        tracing::info!(
            rpc_url = %self.chain.rpc_url,
            chain_id = self.chain.chain_id,
            comptroller = %self.chain.comptroller,
            gas_limit = self.chain.gas_limit,
            call_timeout_ms = self.chain.call_timeout_ms,
            "Chain settings"
        );
        tracing::info!(
            index_url = %self.index.url,
            page_size = self.index.page_size,
            timeout_ms = self.index.timeout_ms,
            "Index settings"
        );
        tracing::info!(
            scan_interval_secs = self.scanner.scan_interval_secs,
            market_refresh_secs = self.scanner.market_refresh_secs,
            max_concurrent_scans = self.scanner.max_concurrent_scans,
            queue_capacity = self.queue.capacity,
            "Pipeline cadence"
        );
        tracing::info!(
            max_collateral_attempts = self.liquidation.max_collateral_attempts,
            min_repay_amount = self.liquidation.min_repay_amount,
            "Liquidation bounds"
        );
    }
}
