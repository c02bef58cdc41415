//! In-memory gateways for unit tests.
//!
//! Every fake records the calls it receives so tests can assert ordering as
//! well as results.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use liquidator_chain::{AccountLiquidity, ChainError, ChainReader, TxSubmitter};
use liquidator_index::{Account, IndexError, Market, MarketRef, Position, PositionIndex};

/// Market fixture.
pub fn market(symbol: &str, id: Address, accrual_block_number: u64) -> Market {
    Market {
        id,
        name: format!("Protocol {symbol}"),
        symbol: symbol.to_string(),
        underlying_address: Some(Address::repeat_byte(0xEE)),
        underlying_name: String::new(),
        underlying_symbol: symbol.trim_start_matches('p').to_string(),
        accrual_block_number,
        block_timestamp: 0,
    }
}

/// Position fixture with outstanding debt.
pub fn position(borrower: Address, market: Address, accrual_block_number: u64) -> Position {
    Position {
        id: format!("{market}-{borrower}"),
        symbol: "pTEST".to_string(),
        ptoken_balance: "0".to_string(),
        accrual_block_number,
        stored_borrow_balance: "1".to_string(),
        market: MarketRef {
            id: market,
            underlying_address: None,
            underlying_symbol: "TEST".to_string(),
        },
        account: Account { id: borrower },
    }
}

fn injected(call: &'static str) -> ChainError {
    ChainError::Rpc {
        call,
        message: "injected failure".to_string(),
    }
}

/// One recorded [`ChainReader`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    AccountLiquidity(Address),
    BorrowBalance { market: Address, borrower: Address },
    CloseFactor,
    AssetsIn(Address),
    SeizeTokens { collateral: Address, repay: U256 },
    AssetBalance { market: Address, account: Address },
    Underlying(Address),
    UnderlyingBalance { market: Address, owner: Address },
    BlockNumber,
}

impl ChainCall {
    /// Name of the call, matching the keys used by [`FakeChain::failing`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountLiquidity(_) => "getAccountLiquidity",
            Self::BorrowBalance { .. } => "borrowBalanceStored",
            Self::CloseFactor => "closeFactorMantissa",
            Self::AssetsIn(_) => "getAssetsIn",
            Self::SeizeTokens { .. } => "liquidateCalculateSeizeTokens",
            Self::AssetBalance { .. } => "balanceOf",
            Self::Underlying(_) => "underlying",
            Self::UnderlyingBalance { .. } => "underlyingBalanceOf",
            Self::BlockNumber => "blockNumber",
        }
    }
}

#[derive(Default)]
struct ChainState {
    shortfalls: HashMap<Address, U256>,
    debts: HashMap<(Address, Address), U256>,
    close_factor: U256,
    assets_in: HashMap<Address, Vec<Address>>,
    // collateral -> (numerator, denominator) applied to the repay amount
    seize_rates: HashMap<Address, (u64, u64)>,
    balances: HashMap<(Address, Address), U256>,
    wallet_balances: HashMap<(Address, Address), U256>,
    failing: HashSet<&'static str>,
    failing_accounts: HashSet<Address>,
}

/// Scriptable [`ChainReader`].
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
    calls: Mutex<Vec<ChainCall>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_close_factor(self, mantissa: U256) -> Self {
        self.state.lock().close_factor = mantissa;
        self
    }

    pub fn with_shortfall(self, account: Address, shortfall: u64) -> Self {
        self.state.lock().shortfalls.insert(account, U256::from(shortfall));
        self
    }

    pub fn with_debt(self, market: Address, borrower: Address, debt: u64) -> Self {
        self.state.lock().debts.insert((market, borrower), U256::from(debt));
        self
    }

    pub fn with_assets_in(self, borrower: Address, markets: Vec<Address>) -> Self {
        self.state.lock().assets_in.insert(borrower, markets);
        self
    }

    /// Seize `repay * numerator / denominator` pTokens from `collateral`.
    pub fn with_seize_rate(self, collateral: Address, numerator: u64, denominator: u64) -> Self {
        self.state
            .lock()
            .seize_rates
            .insert(collateral, (numerator, denominator));
        self
    }

    /// pToken balance of `account` in `market`.
    pub fn with_balance(self, market: Address, account: Address, balance: u64) -> Self {
        self.state
            .lock()
            .balances
            .insert((market, account), U256::from(balance));
        self
    }

    /// Underlying balance of `owner` for `market`'s underlying.
    pub fn with_wallet_balance(self, market: Address, owner: Address, balance: u64) -> Self {
        self.state
            .lock()
            .wallet_balances
            .insert((market, owner), U256::from(balance));
        self
    }

    /// Make every call named `call` fail.
    pub fn failing(self, call: &'static str) -> Self {
        self.state.lock().failing.insert(call);
        self
    }

    /// Make the liquidity check fail for `account` only.
    pub fn failing_liquidity_for(self, account: Address) -> Self {
        self.state.lock().failing_accounts.insert(account);
        self
    }

    pub fn set_shortfall(&self, account: Address, shortfall: u64) {
        self.state.lock().shortfalls.insert(account, U256::from(shortfall));
    }

    pub fn calls(&self) -> Vec<ChainCall> {
        self.calls.lock().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(ChainCall::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.name() == name).count()
    }

    fn record(&self, call: ChainCall) -> Result<(), ChainError> {
        let name = call.name();
        self.calls.lock().push(call);
        if self.state.lock().failing.contains(name) {
            return Err(injected(name));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn account_liquidity(&self, account: Address) -> Result<AccountLiquidity, ChainError> {
        self.record(ChainCall::AccountLiquidity(account))?;
        let state = self.state.lock();
        if state.failing_accounts.contains(&account) {
            return Err(injected("getAccountLiquidity"));
        }
        Ok(AccountLiquidity {
            liquidity: U256::ZERO,
            shortfall: state.shortfalls.get(&account).copied().unwrap_or_default(),
        })
    }

    async fn borrow_balance_stored(
        &self,
        market: Address,
        borrower: Address,
    ) -> Result<U256, ChainError> {
        self.record(ChainCall::BorrowBalance { market, borrower })?;
        Ok(self
            .state
            .lock()
            .debts
            .get(&(market, borrower))
            .copied()
            .unwrap_or_default())
    }

    async fn close_factor_mantissa(&self) -> Result<U256, ChainError> {
        self.record(ChainCall::CloseFactor)?;
        Ok(self.state.lock().close_factor)
    }

    async fn assets_in(&self, account: Address) -> Result<Vec<Address>, ChainError> {
        self.record(ChainCall::AssetsIn(account))?;
        Ok(self
            .state
            .lock()
            .assets_in
            .get(&account)
            .cloned()
            .unwrap_or_default())
    }

    async fn seize_tokens(
        &self,
        _debt_market: Address,
        collateral_market: Address,
        repay_amount: U256,
    ) -> Result<U256, ChainError> {
        self.record(ChainCall::SeizeTokens {
            collateral: collateral_market,
            repay: repay_amount,
        })?;
        let (num, den) = self
            .state
            .lock()
            .seize_rates
            .get(&collateral_market)
            .copied()
            .unwrap_or((1, 1));
        Ok(repay_amount * U256::from(num) / U256::from(den))
    }

    async fn asset_balance(&self, market: Address, account: Address) -> Result<U256, ChainError> {
        self.record(ChainCall::AssetBalance { market, account })?;
        Ok(self
            .state
            .lock()
            .balances
            .get(&(market, account))
            .copied()
            .unwrap_or_default())
    }

    async fn underlying(&self, market: Address) -> Result<Address, ChainError> {
        self.record(ChainCall::Underlying(market))?;
        Ok(Address::repeat_byte(0xEE))
    }

    async fn underlying_balance(&self, market: Address, owner: Address) -> Result<U256, ChainError> {
        self.record(ChainCall::UnderlyingBalance { market, owner })?;
        Ok(self
            .state
            .lock()
            .wallet_balances
            .get(&(market, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.record(ChainCall::BlockNumber)?;
        Ok(1)
    }
}

/// A `liquidateBorrow` the fake submitter accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentLiquidation {
    pub debt_market: Address,
    pub borrower: Address,
    pub repay_amount: U256,
    pub collateral_market: Address,
}

/// Recording [`TxSubmitter`].
#[derive(Debug, Default)]
pub struct FakeSubmitter {
    pub address: Address,
    pub liquidations: Vec<SentLiquidation>,
    pub approvals: Vec<Address>,
    pub fail_liquidations: bool,
    pub failing_approvals: HashSet<Address>,
}

impl FakeSubmitter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TxSubmitter for FakeSubmitter {
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
        if self.fail_liquidations {
            return Err(injected("sendTransaction"));
        }
        self.liquidations.push(SentLiquidation {
            debt_market,
            borrower,
            repay_amount,
            collateral_market,
        });
        Ok(B256::with_last_byte(self.liquidations.len() as u8))
    }

    async fn approve_market(&mut self, market: Address) -> Result<B256, ChainError> {
        if self.failing_approvals.contains(&market) {
            return Err(injected("approve"));
        }
        self.approvals.push(market);
        Ok(B256::with_last_byte(0xAA))
    }
}

/// Scriptable [`PositionIndex`].
#[derive(Default)]
pub struct FakeIndex {
    markets: Mutex<Vec<Market>>,
    positions: Mutex<HashMap<String, Vec<Position>>>,
    fail_markets: Mutex<bool>,
    failing_symbols: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
    market_calls: AtomicUsize,
    position_requests: Mutex<Vec<(String, u64, usize)>>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_markets(&self, markets: Vec<Market>) {
        *self.markets.lock() = markets;
    }

    pub fn set_fail_markets(&self, fail: bool) {
        *self.fail_markets.lock() = fail;
    }

    /// Positions served for `symbol`; sorted by accrual block like the real index.
    pub fn set_positions(&self, symbol: &str, mut positions: Vec<Position>) {
        positions.sort_by_key(|p| p.accrual_block_number);
        self.positions.lock().insert(symbol.to_string(), positions);
    }

    pub fn fail_positions_for(&self, symbol: &str) {
        self.failing_symbols.lock().insert(symbol.to_string());
    }

    /// Delay every position request.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn market_calls(&self) -> usize {
        self.market_calls.load(Ordering::SeqCst)
    }

    /// `(symbol, after_block, page_size)` per request, in order.
    pub fn position_requests(&self) -> Vec<(String, u64, usize)> {
        self.position_requests.lock().clone()
    }
}

#[async_trait]
impl PositionIndex for FakeIndex {
    async fn markets(&self) -> Result<Vec<Market>, IndexError> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_markets.lock() {
            return Err(IndexError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.markets.lock().clone())
    }

    async fn positions(
        &self,
        symbol: &str,
        after_block: u64,
        page_size: usize,
    ) -> Result<Vec<Position>, IndexError> {
        self.position_requests
            .lock()
            .push((symbol.to_string(), after_block, page_size));

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing_symbols.lock().contains(symbol) {
            return Err(IndexError::GraphQl(vec!["indexing_error".to_string()]));
        }

        Ok(self
            .positions
            .lock()
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|p| p.accrual_block_number > after_block)
                    .take(page_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
