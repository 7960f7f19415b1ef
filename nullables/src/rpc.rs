//! Nullable node RPC: an in-memory chain.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use hummingbird_peer::NodeSource;
use hummingbird_rpc::{ChainRpc, RpcError};
use hummingbird_types::{Height, RawBlock, TxHash};

use crate::chain::{raw_tx, synthetic_block};

#[derive(Default)]
struct ChainState {
    blocks: BTreeMap<Height, RawBlock>,
    /// Reported tip; when unset the highest stored block is the tip.
    tip: Option<Height>,
    mempool: Vec<(TxHash, Vec<u8>)>,
    fetched: Vec<Height>,
    height_calls: usize,
}

/// A node whose chain lives in memory.
///
/// Heights without a stored block answer [`RpcError::BlockNotFound`]. While
/// [`set_offline`](Self::set_offline) is on, every call fails with
/// [`RpcError::Unreachable`].
#[derive(Default)]
pub struct NullRpc {
    state: Mutex<ChainState>,
    offline: AtomicBool,
}

impl NullRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// A node serving synthetic blocks `from..=to`, each carrying one
    /// transaction whose number equals the block height.
    pub fn with_chain(from: Height, to: Height) -> Self {
        let rpc = Self::new();
        rpc.extend_to(from, to);
        rpc
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store synthetic blocks `from..=to` (one transaction each).
    pub fn extend_to(&self, from: Height, to: Height) {
        let mut state = self.state();
        for height in from..=to {
            state
                .blocks
                .insert(height, synthetic_block(height, &[crate::tx_hash(height)]));
        }
    }

    /// Store (or replace) a block.
    pub fn insert_block(&self, block: RawBlock) {
        self.state().blocks.insert(block.header.height, block);
    }

    /// Report `height` as the tip regardless of stored blocks.
    pub fn set_height(&self, height: Height) {
        self.state().tip = Some(height);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Put a synthetic transaction into the mempool.
    pub fn add_mempool_tx(&self, hash: TxHash) {
        self.state().mempool.push((hash, raw_tx(&hash)));
    }

    /// Every height passed to `block_by_height`, in call order.
    pub fn fetched_heights(&self) -> Vec<Height> {
        self.state().fetched.clone()
    }

    /// Number of `chain_height` calls.
    pub fn height_calls(&self) -> usize {
        self.state().height_calls
    }

    fn check_online(&self) -> Result<(), RpcError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RpcError::Unreachable("null node is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainRpc for NullRpc {
    async fn block_by_height(&self, height: Height) -> Result<RawBlock, RpcError> {
        self.check_online()?;
        let mut state = self.state();
        state.fetched.push(height);
        state
            .blocks
            .get(&height)
            .cloned()
            .ok_or(RpcError::BlockNotFound(height))
    }

    async fn chain_height(&self) -> Result<Height, RpcError> {
        self.check_online()?;
        let mut state = self.state();
        state.height_calls += 1;
        Ok(state
            .tip
            .or_else(|| state.blocks.keys().next_back().copied())
            .unwrap_or(0))
    }
}

#[async_trait]
impl NodeSource for NullRpc {
    async fn mempool_txids(&self) -> Result<Vec<TxHash>, RpcError> {
        self.check_online()?;
        Ok(self.state().mempool.iter().map(|(id, _)| *id).collect())
    }

    async fn raw_transaction(&self, txid: &TxHash) -> Result<Vec<u8>, RpcError> {
        self.check_online()?;
        self.state()
            .mempool
            .iter()
            .find(|(id, _)| id == txid)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| RpcError::Node {
                code: -5,
                message: "No such mempool or blockchain transaction".into(),
            })
    }
}
