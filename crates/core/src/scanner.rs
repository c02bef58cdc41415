//! Risk Scanner.
//!
//! Every scan tick starts one task per market in the registry snapshot. A task
//! pages through the market's borrowers, asks the chain whether each one is
//! underwater, and pushes the ones that are onto the candidate queue.

use alloy::primitives::Address;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::candidate::RiskCandidate;
use crate::queue::CandidateSender;
use crate::registry::MarketRegistry;
use crate::shutdown::Shutdown;
use liquidator_chain::ChainReader;
use liquidator_index::{IndexError, Market, Position, PositionIndex, MAX_PAGE_SIZE};

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Positions requested per index page
    pub page_size: usize,
    /// Time between scan ticks
    pub scan_interval: Duration,
    /// Market scans allowed to run at once
    pub max_concurrent_scans: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            scan_interval: Duration::from_secs(30),
            max_concurrent_scans: 16,
        }
    }
}

/// What one market scan saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub pages: usize,
    pub positions: usize,
    pub candidates: usize,
    /// Positions whose liquidity check failed
    pub unknown: usize,
}

/// Marks a market as being scanned; cleared on drop.
pub struct InFlightGuard {
    markets: Arc<DashSet<Address>>,
    market: Address,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.markets.remove(&self.market);
    }
}

/// Periodic discovery of underwater positions.
pub struct RiskScanner {
    index: Arc<dyn PositionIndex>,
    chain: Arc<dyn ChainReader>,
    queue: CandidateSender,
    config: ScannerConfig,
    permits: Arc<Semaphore>,
    in_flight: Arc<DashSet<Address>>,
}

impl RiskScanner {
    pub fn new(
        index: Arc<dyn PositionIndex>,
        chain: Arc<dyn ChainReader>,
        queue: CandidateSender,
        config: ScannerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_scans.max(1)));
        Self {
            index,
            chain,
            queue,
            config,
            permits,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Claim `market` for scanning. `None` if a scan of it is still running.
    pub fn try_begin(&self, market: Address) -> Option<InFlightGuard> {
        self.in_flight.insert(market).then(|| InFlightGuard {
            markets: self.in_flight.clone(),
            market,
        })
    }

    /// Number of market scans currently running or waiting for a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Every position with outstanding debt in `market`, oldest accrual first.
    ///
    /// A full page means there may be more, so the next request starts after
    /// the last row's accrual block. Returns the positions and the page count.
    pub async fn fetch_positions(&self, market: &Market) -> Result<(Vec<Position>, usize), IndexError> {
        let page_size = self.config.page_size.clamp(1, MAX_PAGE_SIZE);
        let mut cursor = 0u64;
        let mut pages = 0usize;
        let mut positions = Vec::new();

        loop {
            let page = self.index.positions(&market.symbol, cursor, page_size).await?;
            pages += 1;

            let full = page.len() >= page_size;
            let last = page.last().map(|p| p.accrual_block_number);
            positions.extend(page);

            match last {
                Some(last) if full => {
                    if last <= cursor {
                        warn!(
                            market = %market.symbol,
                            cursor,
                            "Pagination cursor did not advance, stopping early"
                        );
                        break;
                    }
                    cursor = last;
                }
                _ => break,
            }
        }

        Ok((positions, pages))
    }

    /// Scan one market and enqueue every position the chain reports underwater.
    #[instrument(skip(self, market), fields(market = %market.symbol))]
    pub async fn scan_market(&self, market: &Market) -> Result<ScanReport, IndexError> {
        let (positions, pages) = self.fetch_positions(market).await?;
        let mut report = ScanReport {
            pages,
            positions: positions.len(),
            ..ScanReport::default()
        };

        for position in positions {
            let borrower = position.borrower();
            match self.chain.account_liquidity(borrower).await {
                Ok(liquidity) if liquidity.is_underwater() => {
                    debug!(%borrower, shortfall = %liquidity.shortfall, "Underwater position found");
                    let candidate = RiskCandidate::new(position, liquidity.shortfall);
                    if self.queue.push(candidate).await.is_err() {
                        warn!("Candidate queue closed, ending scan");
                        break;
                    }
                    report.candidates += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(%borrower, error = %e, "Risk unknown, skipping position this cycle");
                    report.unknown += 1;
                }
            }
        }

        Ok(report)
    }

    /// Scan every registered market each tick until shutdown.
    pub async fn run(self: Arc<Self>, registry: Arc<MarketRegistry>, mut shutdown: Shutdown) {
        let mut ticker = interval(self.config.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();

        info!(
            interval_secs = self.config.scan_interval.as_secs(),
            max_concurrent = self.config.max_concurrent_scans,
            "Risk scanner started"
        );

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    while tasks.try_join_next().is_some() {}

                    let markets = registry.snapshot();
                    debug!(markets = markets.len(), "Scan tick");

                    for market in markets.iter() {
                        let Some(guard) = self.try_begin(market.id) else {
                            info!(market = %market.symbol, "Previous scan still running, skipping");
                            continue;
                        };
                        tasks.spawn(self.clone().scan_task(market.clone(), guard));
                    }
                }
            }
        }

        // abort scans still in progress
        tasks.shutdown().await;
        info!("Risk scanner stopped");
    }

    async fn scan_task(self: Arc<Self>, market: Market, _guard: InFlightGuard) {
        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            return;
        };

        match self.scan_market(&market).await {
            Ok(report) => info!(
                market = %market.symbol,
                pages = report.pages,
                positions = report.positions,
                candidates = report.candidates,
                unknown = report.unknown,
                "Market scanned"
            ),
            Err(e) => warn!(market = %market.symbol, error = %e, "Index query failed, market skipped this cycle"),
        }
    }
}
