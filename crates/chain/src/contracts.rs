//! Contract interfaces for the Comptroller, pToken markets and ERC20 underlyings.
//!
//! Only the functions the liquidator touches are declared. Return values are
//! named so call results read as fields instead of `_0`/`_1`.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Comptroller: risk engine of the lending protocol.
    #[sol(rpc)]
    interface IComptroller {
        function getAccountLiquidity(address account)
            external view returns (uint256 errorCode, uint256 liquidity, uint256 shortfall);

        function closeFactorMantissa() external view returns (uint256 mantissa);

        function getAssetsIn(address account) external view returns (address[] memory assets);

        function liquidateCalculateSeizeTokens(
            address pTokenBorrowed,
            address pTokenCollateral,
            uint256 actualRepayAmount
        ) external view returns (uint256 errorCode, uint256 seizeTokens);
    }
}

sol! {
    /// Interest-bearing market token.
    #[sol(rpc)]
    interface IPToken {
        function borrowBalanceStored(address account) external view returns (uint256 balance);

        function balanceOf(address owner) external view returns (uint256 balance);

        function underlying() external view returns (address asset);

        function liquidateBorrow(
            address borrower,
            uint256 repayAmount,
            address pTokenCollateral
        ) external returns (uint256 errorCode);
    }
}

sol! {
    /// Underlying ERC20 (subset).
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256 balance);
        function totalSupply() external view returns (uint256 supply);
        function approve(address spender, uint256 amount) external returns (bool ok);
    }
}

/// Gas limit for every transaction.
pub const DEFAULT_GAS_LIMIT: u64 = 3_000_000;

/// Calldata for `pToken.liquidateBorrow(borrower, repayAmount, collateral)`.
pub fn encode_liquidate_borrow(borrower: Address, repay_amount: U256, collateral: Address) -> Bytes {
    IPToken::liquidateBorrowCall {
        borrower,
        repayAmount: repay_amount,
        pTokenCollateral: collateral,
    }
    .abi_encode()
    .into()
}

/// Calldata for `erc20.approve(spender, amount)`.
pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}
