//! Alloy-backed [`ChainReader`].
//!
//! Every call builds a short-lived HTTP provider and runs under
//! `call_timeout`. Underlying token addresses never change for a market, so
//! they are cached after the first lookup.

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

use crate::contracts::{IComptroller, IERC20, IPToken};
use crate::error::{bounded, ChainError};
use crate::gateway::{AccountLiquidity, ChainReader};

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Read access to the Comptroller and its markets over JSON-RPC.
#[derive(Debug)]
pub struct RpcGateway {
    /// Parsed RPC endpoint
    rpc_url: Url,
    /// Comptroller address
    comptroller: Address,
    /// Deadline applied to every call
    call_timeout: Duration,
    /// market -> underlying ERC20
    underlying_cache: DashMap<Address, Address>,
}

impl RpcGateway {
    /// Create a gateway without touching the network.
    pub fn new(rpc_url: &str, comptroller: Address) -> Result<Self, ChainError> {
        let rpc_url = rpc_url
            .parse()
            .map_err(|e| ChainError::Config(format!("invalid rpc url '{rpc_url}': {e}")))?;

        Ok(Self {
            rpc_url,
            comptroller,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            underlying_cache: DashMap::new(),
        })
    }

    /// Override the per-call timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Create a gateway and verify the endpoint answers.
    pub async fn connect(
        rpc_url: &str,
        comptroller: Address,
        call_timeout: Duration,
    ) -> Result<Self, ChainError> {
        let gateway = Self::new(rpc_url, comptroller)?.with_call_timeout(call_timeout);
        let block = gateway.block_number().await?;
        info!(
            comptroller = %comptroller,
            block = block,
            timeout_ms = call_timeout.as_millis() as u64,
            "Chain gateway connected"
        );
        Ok(gateway)
    }

    /// Comptroller address.
    pub fn comptroller(&self) -> Address {
        self.comptroller
    }

    fn provider(&self) -> impl Provider {
        ProviderBuilder::new().on_http(self.rpc_url.clone())
    }
}

#[async_trait]
impl ChainReader for RpcGateway {
    async fn account_liquidity(&self, account: Address) -> Result<AccountLiquidity, ChainError> {
        let provider = self.provider();
        let comptroller = IComptroller::new(self.comptroller, &provider);
        let call = comptroller.getAccountLiquidity(account);
        let result = bounded("getAccountLiquidity", self.call_timeout, call.call()).await?;

        if !result.errorCode.is_zero() {
            return Err(ChainError::Comptroller {
                call: "getAccountLiquidity",
                code: result.errorCode,
            });
        }

        Ok(AccountLiquidity {
            liquidity: result.liquidity,
            shortfall: result.shortfall,
        })
    }

    async fn borrow_balance_stored(
        &self,
        market: Address,
        borrower: Address,
    ) -> Result<U256, ChainError> {
        let provider = self.provider();
        let ptoken = IPToken::new(market, &provider);
        let call = ptoken.borrowBalanceStored(borrower);
        let result = bounded("borrowBalanceStored", self.call_timeout, call.call()).await?;
        Ok(result.balance)
    }

    async fn close_factor_mantissa(&self) -> Result<U256, ChainError> {
        let provider = self.provider();
        let comptroller = IComptroller::new(self.comptroller, &provider);
        let call = comptroller.closeFactorMantissa();
        let result = bounded("closeFactorMantissa", self.call_timeout, call.call()).await?;
        Ok(result.mantissa)
    }

    async fn assets_in(&self, account: Address) -> Result<Vec<Address>, ChainError> {
        let provider = self.provider();
        let comptroller = IComptroller::new(self.comptroller, &provider);
        let call = comptroller.getAssetsIn(account);
        let result = bounded("getAssetsIn", self.call_timeout, call.call()).await?;
        Ok(result.assets)
    }

    async fn seize_tokens(
        &self,
        debt_market: Address,
        collateral_market: Address,
        repay_amount: U256,
    ) -> Result<U256, ChainError> {
        let provider = self.provider();
        let comptroller = IComptroller::new(self.comptroller, &provider);
        let call = comptroller.liquidateCalculateSeizeTokens(debt_market, collateral_market, repay_amount);
        let result =
            bounded("liquidateCalculateSeizeTokens", self.call_timeout, call.call()).await?;

        if !result.errorCode.is_zero() {
            return Err(ChainError::Comptroller {
                call: "liquidateCalculateSeizeTokens",
                code: result.errorCode,
            });
        }
        Ok(result.seizeTokens)
    }

    async fn asset_balance(&self, market: Address, account: Address) -> Result<U256, ChainError> {
        let provider = self.provider();
        let ptoken = IPToken::new(market, &provider);
        let call = ptoken.balanceOf(account);
        let result = bounded("balanceOf", self.call_timeout, call.call()).await?;
        Ok(result.balance)
    }

    async fn underlying(&self, market: Address) -> Result<Address, ChainError> {
        if let Some(cached) = self.underlying_cache.get(&market) {
            return Ok(*cached);
        }

        let provider = self.provider();
        let ptoken = IPToken::new(market, &provider);
        let call = ptoken.underlying();
        let asset = bounded("underlying", self.call_timeout, call.call()).await?.asset;

        debug!(market = %market, underlying = %asset, "Cached market underlying");
        self.underlying_cache.insert(market, asset);
        Ok(asset)
    }

    async fn underlying_balance(&self, market: Address, owner: Address) -> Result<U256, ChainError> {
        let asset = self.underlying(market).await?;

        let provider = self.provider();
        let token = IERC20::new(asset, &provider);
        let call = token.balanceOf(owner);
        let result = bounded("erc20.balanceOf", self.call_timeout, call.call()).await?;
        Ok(result.balance)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let provider = self.provider();
        bounded("blockNumber", self.call_timeout, provider.get_block_number()).await
    }
}
