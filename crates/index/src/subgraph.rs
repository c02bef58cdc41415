//! GraphQL client for the protocol subgraph.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::IndexError;
use crate::types::{Market, Position};

/// Largest page the subgraph serves.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const MARKETS_QUERY: &str = r#"
query {
    markets(orderBy: accrualBlockNumber, orderDirection: desc) {
        id
        name
        symbol
        underlyingAddress
        underlyingName
        underlyingSymbol
        accrualBlockNumber
        blockTimestamp
    }
}
"#;

const POSITIONS_QUERY: &str = r#"
query ($symbol: String!, $lastBlockNumber: BigInt, $first: Int!) {
    accountPTokens(
        first: $first,
        orderBy: accrualBlockNumber,
        orderDirection: asc,
        where: { accrualBlockNumber_gt: $lastBlockNumber, storedBorrowBalance_gt: 0, symbol: $symbol }
    ) {
        id
        symbol
        pTokenBalance
        accrualBlockNumber
        storedBorrowBalance
        market {
            id
            underlyingAddress
            underlyingSymbol
        }
        account {
            id
        }
    }
}
"#;

/// Source of indexed market and position snapshots.
#[async_trait]
pub trait PositionIndex: Send + Sync {
    /// Every market, most recently accrued first.
    async fn markets(&self) -> Result<Vec<Market>, IndexError>;

    /// One page of positions with outstanding debt in the market `symbol`,
    /// accrued strictly after `after_block`, oldest first.
    async fn positions(
        &self,
        symbol: &str,
        after_block: u64,
        page_size: usize,
    ) -> Result<Vec<Position>, IndexError>;
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MarketsData {
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionsData {
    account_p_tokens: Vec<Position>,
}

/// Subgraph HTTP client.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: reqwest::Client,
    url: String,
}

impl SubgraphClient {
    /// Create a client with the default timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, IndexError> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests fail after `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn run<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, IndexError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        decode_response(&body)
    }
}

/// Decode a GraphQL envelope, turning reported errors into [`IndexError::GraphQl`].
fn decode_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, IndexError> {
    let envelope: GraphQlResponse<T> = serde_json::from_slice(body)?;
    if !envelope.errors.is_empty() {
        return Err(IndexError::GraphQl(
            envelope.errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    envelope.data.ok_or(IndexError::EmptyResponse)
}

#[async_trait]
impl PositionIndex for SubgraphClient {
    #[instrument(skip(self))]
    async fn markets(&self) -> Result<Vec<Market>, IndexError> {
        let data: MarketsData = self.run(MARKETS_QUERY, json!({})).await?;
        debug!(count = data.markets.len(), "Fetched markets");
        Ok(data.markets)
    }

    #[instrument(skip(self))]
    async fn positions(
        &self,
        symbol: &str,
        after_block: u64,
        page_size: usize,
    ) -> Result<Vec<Position>, IndexError> {
        let variables = json!({
            "symbol": symbol,
            "lastBlockNumber": after_block.to_string(),
            "first": page_size.min(MAX_PAGE_SIZE),
        });
        let data: PositionsData = self.run(POSITIONS_QUERY, variables).await?;
        debug!(count = data.account_p_tokens.len(), "Fetched position page");
        Ok(data.account_p_tokens)
    }
}
