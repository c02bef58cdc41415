//! Market Registry.
//!
//! Holds the latest market list from the index. Each refresh swaps in a new
//! `Arc<[Market]>`, so readers see either the old list or the new one.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::shutdown::Shutdown;
use liquidator_index::{IndexError, Market, PositionIndex};

/// Current set of lending markets.
pub struct MarketRegistry {
    index: Arc<dyn PositionIndex>,
    markets: RwLock<Arc<[Market]>>,
    refreshed_at: RwLock<Option<DateTime<Utc>>>,
}

impl MarketRegistry {
    /// Empty registry; call [`refresh`](Self::refresh) before scanning.
    pub fn new(index: Arc<dyn PositionIndex>) -> Self {
        Self {
            index,
            markets: RwLock::new(Arc::from(Vec::new())),
            refreshed_at: RwLock::new(None),
        }
    }

    /// Fetch the market list and replace the current one.
    ///
    /// On failure the previous list stays in place.
    pub async fn refresh(&self) -> Result<usize, IndexError> {
        let markets = match self.index.markets().await {
            Ok(markets) => markets,
            Err(e) => {
                warn!(error = %e, kept = self.len(), "Market refresh failed, keeping previous list");
                return Err(e);
            }
        };

        let count = markets.len();
        if count == 0 {
            warn!("Index returned no markets");
        }

        *self.markets.write() = Arc::from(markets);
        *self.refreshed_at.write() = Some(Utc::now());
        debug!(count, "Market registry refreshed");
        Ok(count)
    }

    /// The current list. Never partially refreshed.
    pub fn snapshot(&self) -> Arc<[Market]> {
        self.markets.read().clone()
    }

    pub fn len(&self) -> usize {
        self.markets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time of the last successful refresh.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.refreshed_at.read()
    }

    /// Refresh every `period` until shutdown. The first refresh happens one
    /// period after start, since startup performs its own.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: Shutdown) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = period.as_secs(), "Market refresh loop started");
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    // failures are logged inside refresh and retried next period
                    let _ = self.refresh().await;
                }
            }
        }
        info!("Market refresh loop stopped");
    }
}
