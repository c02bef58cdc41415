//! Values passed between the scanner and the executor.

use alloy::primitives::{Address, U256};
use liquidator_index::Position;
use std::time::{Duration, Instant};

/// A position the chain reported underwater when it was scanned.
///
/// The shortfall is only a snapshot. The executor re-verifies before acting.
#[derive(Debug, Clone)]
pub struct RiskCandidate {
    pub position: Position,
    /// Shortfall observed at discovery
    pub shortfall: U256,
    pub discovered_at: Instant,
}

impl RiskCandidate {
    pub fn new(position: Position, shortfall: U256) -> Self {
        Self {
            position,
            shortfall,
            discovered_at: Instant::now(),
        }
    }

    pub fn borrower(&self) -> Address {
        self.position.borrower()
    }

    /// Market the debt is repaid in.
    pub fn debt_market(&self) -> Address {
        self.position.market_id()
    }

    pub fn symbol(&self) -> &str {
        &self.position.symbol
    }

    /// Time spent between discovery and now.
    pub fn age(&self) -> Duration {
        self.discovered_at.elapsed()
    }
}

/// A fully sized liquidation, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationPlan {
    pub borrower: Address,
    pub debt_market: Address,
    /// Underlying units repaid, always > 0 and <= stored debt
    pub repay_amount: U256,
    pub collateral_market: Address,
    /// pTokens seized for `repay_amount`, <= the borrower's balance there
    pub seize_amount: U256,
    /// Collateral search passes used, starting at 1
    pub attempts: u32,
}
