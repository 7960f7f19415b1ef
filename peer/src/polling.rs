//! A peer that watches the node through its RPC interface.
//!
//! Every poll interval the tip height is compared with the last announced
//! height (each missing block is fetched and pushed in order) and the
//! mempool listing is diffed against a [`SeenSet`] (each new transaction is
//! fetched and pushed once).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use hummingbird_rpc::{BitcoindClient, ChainRpc, RpcError};
use hummingbird_types::{Height, TxHash};

use crate::{Peer, PeerError, PeerEvent, SeenSet, EVENT_CHANNEL_CAPACITY};

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Node error code for "No such mempool or blockchain transaction".
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// RPC calls the polling peer needs on top of [`ChainRpc`].
#[async_trait]
pub trait NodeSource: ChainRpc {
    async fn mempool_txids(&self) -> Result<Vec<TxHash>, RpcError>;
    async fn raw_transaction(&self, txid: &TxHash) -> Result<Vec<u8>, RpcError>;
}

#[async_trait]
impl NodeSource for BitcoindClient {
    async fn mempool_txids(&self) -> Result<Vec<TxHash>, RpcError> {
        self.get_raw_mempool().await
    }

    async fn raw_transaction(&self, txid: &TxHash) -> Result<Vec<u8>, RpcError> {
        self.get_raw_transaction(txid).await
    }
}

#[derive(Default)]
struct Session {
    connected: bool,
    tip: Height,
    task: Option<JoinHandle<()>>,
}

pub struct PollingPeer<S> {
    source: Arc<S>,
    interval: Duration,
    session: Mutex<Session>,
}

impl<S: NodeSource + 'static> PollingPeer<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self::with_shared(Arc::new(source), interval)
    }

    /// Build on a source shared with other components (e.g. the RPC seam).
    pub fn with_shared(source: Arc<S>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            session: Mutex::new(Session::default()),
        }
    }

    fn session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetch each id, skipping transactions that left the mempool in between.
async fn fetch_transactions<S: NodeSource + ?Sized>(
    source: &S,
    ids: &[TxHash],
) -> Result<Vec<(TxHash, Vec<u8>)>, RpcError> {
    let mut txs = Vec::with_capacity(ids.len());
    for id in ids {
        match source.raw_transaction(id).await {
            Ok(raw) => txs.push((*id, raw)),
            Err(RpcError::Node { code, .. }) if code == RPC_INVALID_ADDRESS_OR_KEY => {
                tracing::debug!(txid = %id, "transaction left the mempool before fetch");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(txs)
}

enum PollStop {
    Closed,
    Rpc(RpcError),
}

impl From<RpcError> for PollStop {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

async fn poll_once<S: NodeSource + ?Sized>(
    source: &S,
    tip: &mut Height,
    seen: &mut SeenSet,
    events: &mpsc::Sender<PeerEvent>,
) -> Result<(), PollStop> {
    let height = source.chain_height().await?;
    while *tip < height {
        let next = *tip + 1;
        let block = source.block_by_height(next).await?;
        events
            .send(PeerEvent::Block(block))
            .await
            .map_err(|_| PollStop::Closed)?;
        *tip = next;
    }

    let fresh: Vec<TxHash> = source
        .mempool_txids()
        .await?
        .into_iter()
        .filter(|id| !seen.contains(id))
        .collect();
    for (id, raw) in fetch_transactions(source, &fresh).await? {
        seen.insert(id);
        events
            .send(PeerEvent::Tx(raw))
            .await
            .map_err(|_| PollStop::Closed)?;
    }
    Ok(())
}

async fn poll_loop<S: NodeSource + ?Sized>(
    source: Arc<S>,
    interval: Duration,
    mut tip: Height,
    mut seen: SeenSet,
    events: mpsc::Sender<PeerEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match poll_once(&*source, &mut tip, &mut seen, &events).await {
            Ok(()) => {}
            Err(PollStop::Closed) => {
                tracing::debug!("peer event receiver dropped, stopping poll loop");
                break;
            }
            Err(PollStop::Rpc(e)) => {
                tracing::warn!(error = %e, "peer poll failed, retrying next interval");
            }
        }
    }
}

#[async_trait]
impl<S: NodeSource + 'static> Peer for PollingPeer<S> {
    async fn connect(&self) -> Result<(), PeerError> {
        let tip = self
            .source
            .chain_height()
            .await
            .map_err(|e| PeerError::ConnectionFailed(e.to_string()))?;
        let mut session = self.session();
        session.connected = true;
        session.tip = tip;
        tracing::debug!(tip, "polling peer connected");
        Ok(())
    }

    async fn disconnect(&self) {
        let mut session = self.session();
        if let Some(task) = session.task.take() {
            task.abort();
        }
        session.connected = false;
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<PeerEvent>, PeerError> {
        if !self.session().connected {
            return Err(PeerError::NotConnected);
        }

        // Only transactions that arrive after subscribing are announced;
        // the current mempool is available through `request_mempool`.
        let mut seen = SeenSet::default();
        match self.source.mempool_txids().await {
            Ok(ids) => ids.into_iter().for_each(|id| {
                seen.insert(id);
            }),
            Err(e) => tracing::warn!(error = %e, "could not seed mempool snapshot"),
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut session = self.session();
        if !session.connected {
            return Err(PeerError::NotConnected);
        }
        if let Some(previous) = session.task.take() {
            previous.abort();
        }
        let source = Arc::clone(&self.source);
        session.task = Some(tokio::spawn(poll_loop(
            source,
            self.interval,
            session.tip,
            seen,
            tx,
        )));
        Ok(rx)
    }

    async fn request_mempool(&self) -> Result<Vec<Vec<u8>>, PeerError> {
        if !self.session().connected {
            return Err(PeerError::NotConnected);
        }
        let ids = self.source.mempool_txids().await?;
        let txs = fetch_transactions(&*self.source, &ids).await?;
        Ok(txs.into_iter().map(|(_, raw)| raw).collect())
    }
}

impl<S> Drop for PollingPeer<S> {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = session.task.take() {
            task.abort();
        }
    }
}
