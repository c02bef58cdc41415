//! Signing wallet used for approvals and liquidations.
//!
//! The nonce and gas price are fetched fresh for every transaction, so the
//! wallet keeps no nonce state of its own. Correct nonce sequencing relies on
//! a single owner sending one transaction at a time, which the `&mut self`
//! receivers of [`TxSubmitter`] enforce.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use reqwest::Url;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::contracts::{encode_approve, encode_liquidate_borrow, IERC20, IPToken, DEFAULT_GAS_LIMIT};
use crate::error::{bounded, ChainError};
use crate::gas::LegacyGasPricing;
use crate::gateway::TxSubmitter;
use crate::provider::DEFAULT_CALL_TIMEOUT;

/// Receipts get this many call timeouts before giving up.
const RECEIPT_TIMEOUT_FACTOR: u32 = 6;

/// Builder for [`Wallet`].
pub struct WalletBuilder {
    rpc_url: String,
    chain_id: u64,
    gas_limit: u64,
    gas_pricing: LegacyGasPricing,
    call_timeout: Duration,
    wait_for_receipt: bool,
}

impl WalletBuilder {
    /// Start a builder for `chain_id` at `rpc_url`.
    pub fn new(rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_pricing: LegacyGasPricing::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            wait_for_receipt: false,
        }
    }

    /// Fixed gas limit for every transaction.
    pub fn gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = limit;
        self
    }

    /// Gas pricing policy.
    pub fn gas_pricing(mut self, pricing: LegacyGasPricing) -> Self {
        self.gas_pricing = pricing;
        self
    }

    /// Deadline for each RPC round trip.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Block on the receipt after broadcasting.
    pub fn wait_for_receipt(mut self, wait: bool) -> Self {
        self.wait_for_receipt = wait;
        self
    }

    /// Parse the key, check the endpoint's chain id and build the wallet.
    pub async fn build(self, private_key: &str) -> Result<Wallet, ChainError> {
        let key_str = private_key.trim().trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str
            .parse()
            .map_err(|e| ChainError::Config(format!("invalid wallet key: {e}")))?;
        let address = signer.address();

        let rpc_url: Url = self
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Config(format!("invalid rpc url '{}': {e}", self.rpc_url)))?;

        let provider = ProviderBuilder::new().on_http(rpc_url.clone());
        let remote_chain_id = bounded("chainId", self.call_timeout, provider.get_chain_id()).await?;
        if remote_chain_id != self.chain_id {
            return Err(ChainError::Config(format!(
                "endpoint reports chain id {remote_chain_id}, configured {}",
                self.chain_id
            )));
        }

        info!(
            address = %address,
            chain_id = self.chain_id,
            gas_limit = self.gas_limit,
            wait_for_receipt = self.wait_for_receipt,
            "Wallet initialized"
        );

        Ok(Wallet {
            rpc_url,
            wallet: EthereumWallet::from(signer),
            address,
            chain_id: self.chain_id,
            gas_limit: self.gas_limit,
            gas_pricing: self.gas_pricing,
            call_timeout: self.call_timeout,
            wait_for_receipt: self.wait_for_receipt,
            sent: 0,
        })
    }
}

/// Liquidator wallet. Owned by exactly one consumer.
pub struct Wallet {
    rpc_url: Url,
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
    gas_limit: u64,
    gas_pricing: LegacyGasPricing,
    call_timeout: Duration,
    wait_for_receipt: bool,
    /// Transactions broadcast by this instance
    sent: u64,
}

impl Wallet {
    /// Connect with default gas settings.
    pub async fn connect(private_key: &str, rpc_url: &str, chain_id: u64) -> Result<Self, ChainError> {
        WalletBuilder::new(rpc_url, chain_id).build(private_key).await
    }

    /// Number of transactions broadcast so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Sign and broadcast a call to `to`.
    async fn send(&mut self, call: &'static str, to: Address, calldata: Bytes) -> Result<B256, ChainError> {
        let started = Instant::now();
        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.clone());

        let nonce = bounded(
            "pendingNonce",
            self.call_timeout,
            provider.get_transaction_count(self.address).pending(),
        )
        .await?;
        let gas_price = self.gas_pricing.fetch(&provider, self.call_timeout).await?;

        let mut tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(calldata)
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_gas_limit(self.gas_limit)
            .with_chain_id(self.chain_id);
        self.gas_pricing.apply(&mut tx, gas_price);

        debug!(
            call = call,
            to = %to,
            nonce = nonce,
            gas_price_gwei = gas_price / 1_000_000_000,
            "Sending transaction"
        );

        let pending = bounded(call, self.call_timeout, provider.send_transaction(tx)).await?;
        let tx_hash = *pending.tx_hash();
        self.sent += 1;

        if self.wait_for_receipt {
            let receipt =
                bounded("getReceipt", self.call_timeout * RECEIPT_TIMEOUT_FACTOR, pending.get_receipt())
                    .await?;
            if !receipt.status() {
                warn!(tx_hash = %tx_hash, call = call, "Transaction reverted");
                return Err(ChainError::Reverted(tx_hash));
            }
        }

        info!(
            call = call,
            tx_hash = %tx_hash,
            nonce = nonce,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transaction submitted"
        );
        Ok(tx_hash)
    }
}

#[async_trait]
impl TxSubmitter for Wallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn liquidate_borrow(
        &mut self,
        debt_market: Address,
        borrower: Address,
        repay_amount: U256,
        collateral_market: Address,
    ) -> Result<B256, ChainError> {
        let calldata = encode_liquidate_borrow(borrower, repay_amount, collateral_market);
        self.send("liquidateBorrow", debt_market, calldata).await
    }

    async fn approve_market(&mut self, market: Address) -> Result<B256, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());

        let ptoken = IPToken::new(market, &provider);
        let underlying_call = ptoken.underlying();
        let underlying = bounded("underlying", self.call_timeout, underlying_call.call())
            .await?
            .asset;

        let token = IERC20::new(underlying, &provider);
        let supply_call = token.totalSupply();
        let supply = bounded("totalSupply", self.call_timeout, supply_call.call())
            .await?
            .supply;

        debug!(market = %market, underlying = %underlying, amount = %supply, "Approving market");
        self.send("approve", underlying, encode_approve(market, supply)).await
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url.as_str())
            .field("gas_limit", &self.gas_limit)
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}
