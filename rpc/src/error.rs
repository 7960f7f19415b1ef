//! RPC error types.

use hummingbird_types::Height;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("node unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("node rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("node returned HTTP {0}")]
    Http(u16),

    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("no block at height {0}")]
    BlockNotFound(Height),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Everything except bad credentials is treated as transient: a node
    /// that is still syncing or restarting answers these errors for a while.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RpcError::Timeout
        } else if e.is_connect() || e.is_request() {
            RpcError::Unreachable(e.to_string())
        } else {
            RpcError::InvalidResponse(e.to_string())
        }
    }
}
