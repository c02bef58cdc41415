//! Chain Gateway for a Compound-style lending protocol.
//!
//! This crate provides:
//! - Contract interfaces for the Comptroller, pToken markets and ERC20 underlyings
//! - [`ChainReader`]: read-only account liquidity, balances and seize computations
//! - [`TxSubmitter`]: signed approval and `liquidateBorrow` submission
//! - Alloy-backed implementations with per-call timeouts
//!
//! Gateway failures are returned as [`ChainError`], never folded into zero values.

pub mod contracts;
mod error;
pub mod gas;
mod gateway;
mod provider;
mod signer;

pub use error::ChainError;
pub use gas::LegacyGasPricing;
pub use gateway::{AccountLiquidity, ChainReader, TxSubmitter};
pub use provider::{RpcGateway, DEFAULT_CALL_TIMEOUT};
pub use signer::{Wallet, WalletBuilder};
