//! Nullable peer: events are pushed by the test.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use hummingbird_peer::{Peer, PeerError, PeerEvent, EVENT_CHANNEL_CAPACITY};
use hummingbird_types::{RawBlock, TxHash};

use crate::chain::raw_tx;

#[derive(Default)]
struct Session {
    connected: bool,
    events: Option<mpsc::Sender<PeerEvent>>,
    mempool: Vec<Vec<u8>>,
}

/// A peer that never touches the network.
///
/// Connection attempts succeed unless [`set_reachable(false)`](Self::set_reachable).
/// Blocks and transactions reach the engine only when a test pushes them.
pub struct NullPeer {
    reachable: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    mempool_requests: AtomicUsize,
    session: Mutex<Session>,
}

impl Default for NullPeer {
    fn default() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            mempool_requests: AtomicUsize::new(0),
            session: Mutex::new(Session::default()),
        }
    }
}

impl NullPeer {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of `connect` attempts, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn mempool_requests(&self) -> usize {
        self.mempool_requests.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.session().connected
    }

    /// Whether someone holds the event stream.
    pub fn is_subscribed(&self) -> bool {
        self.session()
            .events
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn push(&self, event: PeerEvent) -> bool {
        match &self.session().events {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Announce a block. Returns whether a subscriber received it.
    pub fn push_block(&self, block: RawBlock) -> bool {
        self.push(PeerEvent::Block(block))
    }

    /// Announce a serialized transaction.
    pub fn push_tx(&self, raw: Vec<u8>) -> bool {
        self.push(PeerEvent::Tx(raw))
    }

    /// Drop the event stream as a peer hanging up would.
    pub fn hang_up(&self) {
        self.session().events = None;
    }

    /// Set the contents answered by `request_mempool`.
    pub fn set_mempool(&self, txs: &[TxHash]) {
        self.session().mempool = txs.iter().map(raw_tx).collect();
    }

    /// Add an arbitrary payload to the mempool answer.
    pub fn add_mempool_raw(&self, raw: Vec<u8>) {
        self.session().mempool.push(raw);
    }
}

#[async_trait]
impl Peer for NullPeer {
    async fn connect(&self) -> Result<(), PeerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(PeerError::ConnectionFailed("null peer unreachable".into()));
        }
        self.session().connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let mut session = self.session();
        session.connected = false;
        session.events = None;
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<PeerEvent>, PeerError> {
        let mut session = self.session();
        if !session.connected {
            return Err(PeerError::NotConnected);
        }
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        session.events = Some(tx);
        Ok(rx)
    }

    async fn request_mempool(&self) -> Result<Vec<Vec<u8>>, PeerError> {
        self.mempool_requests.fetch_add(1, Ordering::SeqCst);
        let session = self.session();
        if !session.connected {
            return Err(PeerError::NotConnected);
        }
        Ok(session.mempool.clone())
    }
}
