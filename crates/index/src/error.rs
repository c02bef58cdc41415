use thiserror::Error;

/// Failure talking to the position index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Connection, TLS or timeout failure.
    #[error("index request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error("index returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The GraphQL layer reported errors.
    #[error("index query rejected: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// The response body did not match the expected shape.
    #[error("unexpected index response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A `data` object was missing from an otherwise successful response.
    #[error("index response carried no data")]
    EmptyResponse,
}

impl IndexError {
    /// Whether the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}
