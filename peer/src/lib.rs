//! Peer access for the live phase.
//!
//! A [`Peer`] pushes newly mined blocks and freshly seen mempool
//! transactions to the engine and answers on-demand mempool snapshots. The
//! wire protocol behind it is not this crate's concern: [`PollingPeer`]
//! produces the same event stream by watching a node's RPC interface.

pub mod error;
pub mod polling;
pub mod seen;

use async_trait::async_trait;
use tokio::sync::mpsc;

use hummingbird_types::RawBlock;

pub use error::PeerError;
pub use polling::{NodeSource, PollingPeer, DEFAULT_POLL_INTERVAL};
pub use seen::{SeenSet, DEFAULT_SEEN_CAPACITY};

/// Capacity of the event channel handed out by [`Peer::subscribe`].
pub const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Something the peer observed on the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    /// A newly connected block.
    Block(RawBlock),
    /// A serialized transaction that just entered the mempool.
    Tx(Vec<u8>),
}

#[async_trait]
pub trait Peer: Send + Sync {
    /// Open the session. Returning `Ok` is the handshake completing.
    async fn connect(&self) -> Result<(), PeerError>;

    /// Close the session and stop any event delivery. Idempotent.
    async fn disconnect(&self);

    /// Start delivering [`PeerEvent`]s. The returned channel closes when the
    /// session ends.
    async fn subscribe(&self) -> Result<mpsc::Receiver<PeerEvent>, PeerError>;

    /// Serialized transactions currently in the node's mempool.
    async fn request_mempool(&self) -> Result<Vec<Vec<u8>>, PeerError>;
}
