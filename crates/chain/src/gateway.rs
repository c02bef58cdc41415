//! Chain Gateway seams.
//!
//! Reads go through [`ChainReader`], which is shared (`Arc<dyn ChainReader>`)
//! between the scanner tasks and the executor. Writes go through
//! [`TxSubmitter`], whose methods take `&mut self`: whoever owns the submitter
//! is the only code that can consume a nonce.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::error::ChainError;

/// Result of `Comptroller.getAccountLiquidity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountLiquidity {
    /// Excess collateral value.
    pub liquidity: U256,
    /// Missing collateral value.
    pub shortfall: U256,
}

impl AccountLiquidity {
    /// Positive shortfall means the account can be liquidated.
    pub fn is_underwater(&self) -> bool {
        !self.shortfall.is_zero()
    }
}

/// Read-only view of the lending protocol.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Account liquidity / shortfall check.
    async fn account_liquidity(&self, account: Address) -> Result<AccountLiquidity, ChainError>;

    /// Borrower's debt in `market` as of the last accrual.
    async fn borrow_balance_stored(
        &self,
        market: Address,
        borrower: Address,
    ) -> Result<U256, ChainError>;

    /// Close factor as a 1e18 mantissa.
    async fn close_factor_mantissa(&self) -> Result<U256, ChainError>;

    /// Markets the account has entered, in protocol order.
    async fn assets_in(&self, account: Address) -> Result<Vec<Address>, ChainError>;

    /// pTokens seized from `collateral_market` for repaying `repay_amount` in `debt_market`.
    async fn seize_tokens(
        &self,
        debt_market: Address,
        collateral_market: Address,
        repay_amount: U256,
    ) -> Result<U256, ChainError>;

    /// pToken balance of `account` in `market`.
    async fn asset_balance(&self, market: Address, account: Address) -> Result<U256, ChainError>;

    /// Underlying ERC20 of `market`.
    async fn underlying(&self, market: Address) -> Result<Address, ChainError>;

    /// Balance of `market`'s underlying token held by `owner`.
    async fn underlying_balance(&self, market: Address, owner: Address) -> Result<U256, ChainError>;

    /// Latest block number. Used as a connectivity check.
    async fn block_number(&self) -> Result<u64, ChainError>;
}

/// Signing side of the gateway.
#[async_trait]
pub trait TxSubmitter: Send {
    /// Address transactions are sent from.
    fn address(&self) -> Address;

    /// Send `debtMarket.liquidateBorrow(borrower, repayAmount, collateralMarket)`.
    async fn liquidate_borrow(
        &mut self,
        debt_market: Address,
        borrower: Address,
        repay_amount: U256,
        collateral_market: Address,
    ) -> Result<B256, ChainError>;

    /// Let `market` pull its underlying token from the wallet.
    async fn approve_market(&mut self, market: Address) -> Result<B256, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underwater_requires_positive_shortfall() {
        let healthy = AccountLiquidity {
            liquidity: U256::from(10u64),
            shortfall: U256::ZERO,
        };
        assert!(!healthy.is_underwater());

        let underwater = AccountLiquidity {
            liquidity: U256::ZERO,
            shortfall: U256::from(1u64),
        };
        assert!(underwater.is_underwater());
    }
}
