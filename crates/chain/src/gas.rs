//! Legacy gas pricing.
//!
//! The price is read from the node immediately before each submission; there
//! is no caching and no bidding logic.

use alloy::network::TransactionBuilder;
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use std::time::Duration;

use crate::error::{bounded, ChainError};

/// Gas pricing policy for submitted transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyGasPricing {
    /// Upper bound in wei; `None` takes the node's suggestion as-is.
    pub max_gas_price: Option<u128>,
}

impl LegacyGasPricing {
    /// Take whatever the node suggests.
    pub fn node_suggested() -> Self {
        Self { max_gas_price: None }
    }

    /// Cap the node's suggestion at `max_gas_price` wei.
    pub fn capped(max_gas_price: u128) -> Self {
        Self {
            max_gas_price: Some(max_gas_price),
        }
    }

    /// Apply the cap to a suggested price.
    pub fn clamp(&self, suggested: u128) -> u128 {
        match self.max_gas_price {
            Some(max) => suggested.min(max),
            None => suggested,
        }
    }

    /// Fetch the current gas price from `provider`.
    pub async fn fetch<P: Provider>(&self, provider: &P, timeout: Duration) -> Result<u128, ChainError> {
        let suggested = bounded("gasPrice", timeout, provider.get_gas_price()).await?;
        Ok(self.clamp(suggested))
    }

    /// Set the legacy `gasPrice` field.
    pub fn apply(&self, tx: &mut TransactionRequest, gas_price: u128) {
        tx.set_gas_price(gas_price);
    }
}

impl Default for LegacyGasPricing {
    fn default() -> Self {
        Self::node_suggested()
    }
}
