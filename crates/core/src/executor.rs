//! Liquidation executor.
//!
//! Single consumer of the candidate queue. Each candidate is re-verified,
//! sized, matched to a collateral market and submitted, in that order. The
//! executor owns the [`TxSubmitter`], so only one transaction is ever in the
//! making.

use alloy::primitives::{Address, B256, U256};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::candidate::{LiquidationPlan, RiskCandidate};
use crate::queue::CandidateReceiver;
use crate::shutdown::Shutdown;
use crate::u256_math::{apply_mantissa, halve_above, wad_to_f64};
use liquidator_chain::{ChainError, ChainReader, TxSubmitter};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Collateral search passes before giving up on a candidate
    pub max_collateral_attempts: u32,
    /// Halving stops before the repay amount drops below this
    pub min_repay_amount: U256,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_collateral_attempts: 8,
            min_repay_amount: U256::from(1u64),
        }
    }
}

/// Where a candidate stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Re-verification found no shortfall.
    NotAtRisk,
    /// Re-verification failed; nothing else was attempted.
    RiskUnknown,
    /// No stored debt in the candidate's market.
    NoDebt,
    /// No collateral could absorb the seizure within the allowed passes.
    Exhausted { attempts: u32, last_repay: U256 },
    /// A chain read failed after re-verification.
    GatewayUnavailable { step: &'static str },
    /// The wallet cannot cover the repay amount.
    InsufficientLiquidity { balance: U256, required: U256 },
    /// Transaction broadcast.
    Submitted { tx: B256, plan: LiquidationPlan },
    /// Broadcast failed; the candidate is dropped.
    SubmissionFailed { plan: LiquidationPlan },
}

impl ExecutionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotAtRisk => "not_at_risk",
            Self::RiskUnknown => "risk_unknown",
            Self::NoDebt => "no_debt",
            Self::Exhausted { .. } => "exhausted",
            Self::GatewayUnavailable { .. } => "gateway_unavailable",
            Self::InsufficientLiquidity { .. } => "insufficient_liquidity",
            Self::Submitted { .. } => "submitted",
            Self::SubmissionFailed { .. } => "submission_failed",
        }
    }
}

/// Outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    pub processed: u64,
    pub not_at_risk: u64,
    pub risk_unknown: u64,
    pub no_debt: u64,
    pub exhausted: u64,
    pub gateway_unavailable: u64,
    pub insufficient_liquidity: u64,
    pub submitted: u64,
    pub submission_failed: u64,
}

impl ExecutorStats {
    fn record(&mut self, outcome: &ExecutionOutcome) {
        self.processed += 1;
        let counter = match outcome {
            ExecutionOutcome::NotAtRisk => &mut self.not_at_risk,
            ExecutionOutcome::RiskUnknown => &mut self.risk_unknown,
            ExecutionOutcome::NoDebt => &mut self.no_debt,
            ExecutionOutcome::Exhausted { .. } => &mut self.exhausted,
            ExecutionOutcome::GatewayUnavailable { .. } => &mut self.gateway_unavailable,
            ExecutionOutcome::InsufficientLiquidity { .. } => &mut self.insufficient_liquidity,
            ExecutionOutcome::Submitted { .. } => &mut self.submitted,
            ExecutionOutcome::SubmissionFailed { .. } => &mut self.submission_failed,
        };
        *counter += 1;
    }
}

/// Result of the collateral search.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CollateralSearch {
    Found {
        collateral: Address,
        repay: U256,
        seize: U256,
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        last_repay: U256,
    },
}

/// Tag a chain failure with the step it interrupted.
fn at_step<T>(step: &'static str, result: Result<T, ChainError>) -> Result<T, ExecutionOutcome> {
    result.map_err(|e| {
        warn!(step, error = %e, "Chain read failed, dropping candidate");
        ExecutionOutcome::GatewayUnavailable { step }
    })
}

/// First entered market whose balance covers the seizure, halving the
/// repay amount after every pass that finds none.
async fn find_collateral(
    chain: &dyn ChainReader,
    config: &ExecutorConfig,
    borrower: Address,
    debt_market: Address,
    repay: U256,
) -> Result<CollateralSearch, ExecutionOutcome> {
    let markets: SmallVec<[Address; 8]> =
        at_step("assets_in", chain.assets_in(borrower).await)?
            .into_iter()
            .collect();
    if markets.is_empty() {
        return Ok(CollateralSearch::Exhausted {
            attempts: 0,
            last_repay: repay,
        });
    }

    let max_attempts = config.max_collateral_attempts.max(1);
    let mut repay = repay;
    let mut attempts = 0;

    loop {
        attempts += 1;
        for &collateral in &markets {
            let seize = at_step(
                "seize_tokens",
                chain.seize_tokens(debt_market, collateral, repay).await,
            )?;
            let balance = at_step(
                "collateral_balance",
                chain.asset_balance(collateral, borrower).await,
            )?;
            if balance >= seize {
                return Ok(CollateralSearch::Found {
                    collateral,
                    repay,
                    seize,
                    attempts,
                });
            }
        }

        if attempts >= max_attempts {
            break;
        }
        match halve_above(repay, config.min_repay_amount) {
            Some(next) => {
                debug!(attempts, repay = %next, "No collateral fits, halving repay amount");
                repay = next;
            }
            None => break,
        }
    }

    Ok(CollateralSearch::Exhausted {
        attempts,
        last_repay: repay,
    })
}

/// Liquidation executor.
pub struct Executor<S> {
    chain: Arc<dyn ChainReader>,
    submitter: S,
    close_factor: U256,
    config: ExecutorConfig,
    stats: ExecutorStats,
}

impl<S: TxSubmitter> Executor<S> {
    /// `close_factor` is the Comptroller mantissa read at startup.
    pub fn new(
        chain: Arc<dyn ChainReader>,
        submitter: S,
        close_factor: U256,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            chain,
            submitter,
            close_factor,
            config,
            stats: ExecutorStats::default(),
        }
    }

    pub fn stats(&self) -> &ExecutorStats {
        &self.stats
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn close_factor(&self) -> U256 {
        self.close_factor
    }

    /// Take one candidate to a terminal outcome.
    #[instrument(skip(self, candidate), fields(borrower = %candidate.borrower(), market = %candidate.symbol()))]
    pub async fn process(&mut self, candidate: &RiskCandidate) -> ExecutionOutcome {
        let outcome = match self.execute(candidate).await {
            Ok(outcome) | Err(outcome) => outcome,
        };
        self.stats.record(&outcome);

        match &outcome {
            ExecutionOutcome::Submitted { tx, plan } => info!(
                %tx,
                repay = %plan.repay_amount,
                collateral = %plan.collateral_market,
                seize = %plan.seize_amount,
                attempts = plan.attempts,
                "Liquidation submitted"
            ),
            ExecutionOutcome::NotAtRisk | ExecutionOutcome::NoDebt => {
                debug!(outcome = outcome.label(), "Candidate discarded")
            }
            other => info!(outcome = other.label(), age_ms = candidate.age().as_millis() as u64, "Candidate skipped"),
        }
        outcome
    }

    async fn execute(&mut self, candidate: &RiskCandidate) -> Result<ExecutionOutcome, ExecutionOutcome> {
        let borrower = candidate.borrower();
        let debt_market = candidate.debt_market();

        // The queued shortfall may be stale.
        match self.chain.account_liquidity(borrower).await {
            Ok(liquidity) if liquidity.is_underwater() => {}
            Ok(_) => return Ok(ExecutionOutcome::NotAtRisk),
            Err(e) => {
                warn!(error = %e, "Re-verification failed, risk unknown");
                return Ok(ExecutionOutcome::RiskUnknown);
            }
        }

        let debt = at_step(
            "borrow_balance",
            self.chain.borrow_balance_stored(debt_market, borrower).await,
        )?;
        let repay = apply_mantissa(debt, self.close_factor);
        if repay.is_zero() {
            return Ok(ExecutionOutcome::NoDebt);
        }

        let (collateral, repay, seize, attempts) =
            match find_collateral(self.chain.as_ref(), &self.config, borrower, debt_market, repay)
                .await?
            {
                CollateralSearch::Found {
                    collateral,
                    repay,
                    seize,
                    attempts,
                } => (collateral, repay, seize, attempts),
                CollateralSearch::Exhausted {
                    attempts,
                    last_repay,
                } => {
                    return Ok(ExecutionOutcome::Exhausted {
                        attempts,
                        last_repay,
                    })
                }
            };

        let balance = at_step(
            "wallet_balance",
            self.chain
                .underlying_balance(debt_market, self.submitter.address())
                .await,
        )?;
        if balance < repay {
            return Ok(ExecutionOutcome::InsufficientLiquidity {
                balance,
                required: repay,
            });
        }

        let plan = LiquidationPlan {
            borrower,
            debt_market,
            repay_amount: repay,
            collateral_market: collateral,
            seize_amount: seize,
            attempts,
        };

        match self
            .submitter
            .liquidate_borrow(debt_market, borrower, repay, collateral)
            .await
        {
            Ok(tx) => Ok(ExecutionOutcome::Submitted { tx, plan }),
            Err(e) => {
                warn!(error = %e, repay = %repay, "Liquidation submission failed");
                Ok(ExecutionOutcome::SubmissionFailed { plan })
            }
        }
    }

    /// Drain the queue until shutdown or until every producer is gone.
    /// The candidate in hand is always finished.
    pub async fn run(mut self, mut queue: CandidateReceiver, mut shutdown: Shutdown) -> ExecutorStats {
        info!(
            close_factor = wad_to_f64(self.close_factor),
            max_attempts = self.config.max_collateral_attempts,
            wallet = %self.submitter.address(),
            "Executor started"
        );

        loop {
            let candidate = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                next = queue.pop() => match next {
                    Some(candidate) => candidate,
                    None => break,
                },
            };
            self.process(&candidate).await;
        }

        let stats = self.stats;
        info!(
            processed = stats.processed,
            submitted = stats.submitted,
            not_at_risk = stats.not_at_risk,
            exhausted = stats.exhausted,
            insufficient_liquidity = stats.insufficient_liquidity,
            failures = stats.risk_unknown + stats.gateway_unavailable + stats.submission_failed,
            pending = queue.len(),
            "Executor stopped"
        );
        stats
    }
}
