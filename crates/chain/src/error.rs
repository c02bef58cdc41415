//! Error type shared by every Chain Gateway call.

use alloy::primitives::{B256, U256};
use std::fmt::Display;
use std::future::IntoFuture;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the chain.
///
/// Every variant is transient from the caller's point of view except
/// [`ChainError::Config`], which is only produced while connecting.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The call did not complete within the configured timeout.
    #[error("{call} timed out after {timeout:?}")]
    Timeout { call: &'static str, timeout: Duration },

    /// Transport, decoding or node-side failure.
    #[error("{call} failed: {message}")]
    Rpc { call: &'static str, message: String },

    /// The Comptroller answered with a non-zero error code.
    #[error("{call} returned comptroller error code {code}")]
    Comptroller { call: &'static str, code: U256 },

    /// A transaction was mined but reverted.
    #[error("transaction {0} reverted")]
    Reverted(B256),

    /// Bad endpoint, key or chain id.
    #[error("invalid chain configuration: {0}")]
    Config(String),
}

impl ChainError {
    pub(crate) fn rpc(call: &'static str, err: impl Display) -> Self {
        Self::Rpc {
            call,
            message: err.to_string(),
        }
    }

    /// Whether the error came from the configuration rather than the network.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Await `fut` with a deadline, mapping both failure modes into [`ChainError`].
pub(crate) async fn bounded<T, E, F>(
    call: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, ChainError>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ChainError::rpc(call, e)),
        Err(_) => Err(ChainError::Timeout { call, timeout }),
    }
}
