use thiserror::Error;

use hummingbird_peer::PeerError;
use hummingbird_rpc::RpcError;
use hummingbird_tape::TapeError;
use hummingbird_types::{DecodeError, Height};

/// Failure reported by a [`Hooks`](crate::Hooks) implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure reported by a [`Balancer`](crate::Balancer).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct BalancerError(pub String);

impl BalancerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// The node or the peer could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    /// A block response was missing, for the wrong height, or undecodable.
    #[error("fetch error at height {height}: {reason}")]
    Fetch { height: Height, reason: String },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] TapeError),

    #[error("hook `{hook}` failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: HookError,
    },

    #[error("balancer `{name}` failed: {source}")]
    Balancer {
        name: String,
        #[source]
        source: BalancerError,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl SyncError {
    /// Errors that stop the session's loop instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Checkpoint(_))
    }
}
