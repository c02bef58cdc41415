//! Configuration for the liquidation pipeline.
//!
//! This module provides:
//! - Typed settings for the chain, index, wallet, cadence, queue and logging
//! - TOML loading with `${VAR}` environment expansion
//! - Validation performed before anything connects

mod app;
mod loader;

use thiserror::Error;

pub use app::{
    AppConfig, ChainSettings, IndexSettings, LiquidationConfig, LogConfig, LogFormat, QueueConfig,
    ScannerTimingConfig, WalletSettings,
};
pub use loader::{expand_env, load_config, load_config_from_env, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};

/// Configuration could not be loaded. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {0} referenced by config is not set")]
    MissingEnv(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
