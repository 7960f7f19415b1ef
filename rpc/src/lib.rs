//! Node RPC access.
//!
//! [`ChainRpc`] is the narrow interface the sync engine needs from a full
//! node: a block by height and the current chain height. [`BitcoindClient`]
//! implements it over bitcoind-style JSON-RPC 1.0 with HTTP basic auth, and
//! also exposes the mempool calls used by the polling peer.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

use hummingbird_types::{Height, RawBlock};

pub use client::{endpoint_url, BitcoindClient, DEFAULT_RPC_PORT};
pub use error::RpcError;
pub use types::{VerboseBlock, VerboseTx};

/// What the sync engine consumes from the node's RPC interface.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// The block at `height` on the node's best chain, transactions still
    /// serialized.
    async fn block_by_height(&self, height: Height) -> Result<RawBlock, RpcError>;

    /// Height of the node's best chain tip.
    async fn chain_height(&self) -> Result<Height, RpcError>;
}
