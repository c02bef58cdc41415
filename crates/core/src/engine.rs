//! Pipeline assembly: startup checks, market approvals and the three loops.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::executor::{Executor, ExecutorConfig, ExecutorStats};
use crate::queue::{candidate_queue, CandidateReceiver};
use crate::registry::MarketRegistry;
use crate::scanner::{RiskScanner, ScannerConfig};
use crate::shutdown::Shutdown;
use crate::u256_math::{wad_to_f64, WAD};
use liquidator_chain::{ChainReader, TxSubmitter};
use liquidator_index::{Market, PositionIndex};

/// Settings the engine needs beyond its components.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scanner: ScannerConfig,
    pub executor: ExecutorConfig,
    pub queue_capacity: usize,
    pub market_refresh_interval: Duration,
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            scanner: config.scanner_config(),
            executor: config.executor_config(),
            queue_capacity: config.queue.capacity,
            market_refresh_interval: config.scanner.market_refresh_interval(),
        }
    }
}

/// Approvals attempted at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalSummary {
    pub approved: usize,
    pub failed: usize,
    /// Markets without an ERC20 underlying
    pub skipped: usize,
}

/// Let every market pull its underlying from the wallet.
///
/// A failed approval is logged and does not stop the others.
pub async fn approve_markets<S: TxSubmitter>(submitter: &mut S, markets: &[Market]) -> ApprovalSummary {
    let mut summary = ApprovalSummary::default();
    for market in markets {
        if market.underlying_address.is_none() {
            debug!(market = %market.symbol, "Native market, no approval needed");
            summary.skipped += 1;
            continue;
        }
        match submitter.approve_market(market.id).await {
            Ok(tx) => {
                info!(market = %market.symbol, %tx, "Underlying approved");
                summary.approved += 1;
            }
            Err(e) => {
                warn!(market = %market.symbol, error = %e, "Approval failed");
                summary.failed += 1;
            }
        }
    }
    summary
}

/// The assembled pipeline, ready to run.
pub struct Engine<S> {
    registry: Arc<MarketRegistry>,
    scanner: Arc<RiskScanner>,
    executor: Executor<S>,
    queue: CandidateReceiver,
    market_refresh_interval: Duration,
}

impl<S: TxSubmitter + 'static> Engine<S> {
    /// Startup sequence. Any error here is fatal.
    ///
    /// 1. Probe the chain endpoint
    /// 2. Load the market list
    /// 3. Read the close factor
    /// 4. Approve every market's underlying
    pub async fn bootstrap(
        config: EngineConfig,
        index: Arc<dyn PositionIndex>,
        chain: Arc<dyn ChainReader>,
        mut submitter: S,
    ) -> Result<Self> {
        let block = chain
            .block_number()
            .await
            .context("chain endpoint unreachable")?;
        info!(block, wallet = %submitter.address(), "Chain reachable");

        let registry = Arc::new(MarketRegistry::new(index.clone()));
        let markets = registry
            .refresh()
            .await
            .context("initial market list unavailable")?;
        info!(markets, "Markets loaded");

        let close_factor = chain
            .close_factor_mantissa()
            .await
            .context("close factor unavailable")?;
        if close_factor.is_zero() || close_factor > WAD {
            anyhow::bail!("close factor mantissa {close_factor} is outside (0, 1e18]");
        }
        info!(close_factor = wad_to_f64(close_factor), "Close factor loaded");

        let summary = approve_markets(&mut submitter, &registry.snapshot()).await;
        info!(
            approved = summary.approved,
            failed = summary.failed,
            skipped = summary.skipped,
            "Market approvals sent"
        );

        let (sender, queue) = candidate_queue(config.queue_capacity);
        let scanner = Arc::new(RiskScanner::new(index, chain.clone(), sender, config.scanner));
        let executor = Executor::new(chain, submitter, close_factor, config.executor);

        Ok(Self {
            registry,
            scanner,
            executor,
            queue,
            market_refresh_interval: config.market_refresh_interval,
        })
    }

    pub fn registry(&self) -> &Arc<MarketRegistry> {
        &self.registry
    }

    /// Run until `shutdown` fires. Returns once every loop has stopped.
    pub async fn run(self, shutdown: Shutdown) -> Result<ExecutorStats> {
        let refresh = tokio::spawn(
            self.registry
                .clone()
                .run(self.market_refresh_interval, shutdown.clone()),
        );
        let scan = tokio::spawn(self.scanner.run(self.registry, shutdown.clone()));
        let execute = tokio::spawn(self.executor.run(self.queue, shutdown));

        let (refresh, scan, execute) = futures::join!(refresh, scan, execute);
        for (name, result) in [("registry", refresh), ("scanner", scan)] {
            if let Err(e) = result {
                error!(task = name, error = %e, "Task ended abnormally");
            }
        }
        let stats = execute.context("executor task ended abnormally")?;

        info!(processed = stats.processed, submitted = stats.submitted, "Pipeline stopped");
        Ok(stats)
    }
}
