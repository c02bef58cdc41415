//! Position Index Gateway.
//!
//! This crate provides a GraphQL client for the protocol subgraph:
//! - Market listing, most recently accrued first
//! - Paginated borrower positions with outstanding debt, per market

mod error;
mod subgraph;
mod types;

pub use error::IndexError;
pub use subgraph::{PositionIndex, SubgraphClient, DEFAULT_TIMEOUT, MAX_PAGE_SIZE};
pub use types::{Account, Market, MarketRef, Position};
