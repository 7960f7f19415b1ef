//! Live delivery once caught up: pushed blocks, mempool transactions and
//! on-demand mempool snapshots.

use tokio::sync::mpsc;
use tracing::Instrument;

use hummingbird_peer::PeerEvent;
use hummingbird_types::{Block, RawBlock, TxEnvelope};

use crate::shutdown::ShutdownSignal;
use crate::tracing_spans::relay_block_span;
use crate::{Hummingbird, SyncError};

impl Hummingbird {
    /// Relay a block announced by the peer.
    ///
    /// Blocks at or below the checkpoint are skipped. Heights missing
    /// between the checkpoint and `raw` are fetched and relayed first. Each
    /// block's transactions are dispatched in order, then the block is
    /// checkpointed and `on_block` fires.
    pub async fn onblock(&self, raw: RawBlock) -> Result<(), SyncError> {
        let generation = self.current_generation();
        self.relay_block(generation, raw).await
    }

    /// Relay one serialized mempool transaction: decode, dispatch, then
    /// `on_mempool`. Decode failures are reported and returned.
    pub async fn onmempool(&self, raw: &[u8]) -> Result<TxEnvelope, SyncError> {
        let tx = match self.inner.decoder.decode(raw) {
            Ok(tx) => TxEnvelope::unconfirmed(tx),
            Err(e) => {
                tracing::debug!(error = %e, len = raw.len(), "skipping undecodable mempool transaction");
                self.report(SyncError::Decode(e.clone())).await;
                return Err(SyncError::Decode(e));
            }
        };
        self.ontransaction(&tx).await;
        self.inner.metrics.mempool_txs.inc();
        let result = self.inner.hooks.on_mempool(self, &tx).await;
        self.check_hook("on_mempool", result).await;
        Ok(tx)
    }

    /// Request the node's current mempool from the peer and replay every
    /// transaction through [`onmempool`](Self::onmempool). Returns how many
    /// were delivered; undecodable entries are reported and skipped.
    pub async fn fetchmempool(&self) -> Result<usize, SyncError> {
        let raws = self.inner.peer.request_mempool().await?;
        let total = raws.len();
        let mut delivered = 0;
        for raw in &raws {
            if self.onmempool(raw).await.is_ok() {
                delivered += 1;
            }
        }
        tracing::info!(delivered, total, "mempool replayed");
        Ok(delivered)
    }

    /// Consume peer events until the session ends.
    pub(crate) async fn listen(
        &self,
        generation: u64,
        mut events: mpsc::Receiver<PeerEvent>,
        cancel: &mut ShutdownSignal,
    ) {
        tracing::info!(checkpoint = ?self.checkpoint_height(), "listening");

        loop {
            let event = tokio::select! {
                _ = cancel.recv() => return,
                event = events.recv() => event,
            };
            if !self.is_current(generation) {
                return;
            }
            match event {
                Some(PeerEvent::Block(raw)) => {
                    if let Err(e) = self.relay_block(generation, raw).await {
                        let fatal = e.is_fatal();
                        self.report(e).await;
                        if fatal {
                            tracing::error!("checkpoint write failed, relay stopped");
                            return;
                        }
                    }
                }
                Some(PeerEvent::Tx(raw)) => {
                    let _ = self.onmempool(&raw).await;
                }
                None => {
                    self.report(SyncError::Connection("peer event stream closed".into()))
                        .await;
                    self.disconnect_session(generation).await;
                    return;
                }
            }
        }
    }

    async fn relay_block(&self, generation: u64, raw: RawBlock) -> Result<(), SyncError> {
        let height = raw.header.height;
        let next = self.next_height();
        if height < next {
            tracing::debug!(height, next, "block already checkpointed, skipping");
            return Ok(());
        }

        async {
            for missing in next..height {
                tracing::info!(missing, "filling gap before pushed block");
                let block = self.fetch(missing).await?;
                if !self.deliver_block(generation, block).await? {
                    return Ok(());
                }
            }
            let block = self.decode_block(raw)?;
            self.deliver_block(generation, block).await.map(|_| ())
        }
        .instrument(relay_block_span(height))
        .await
    }

    /// Dispatch, checkpoint, then fire `on_block`. `Ok(false)` means the
    /// session went stale and the block was dropped.
    async fn deliver_block(&self, generation: u64, block: Block) -> Result<bool, SyncError> {
        if !self.is_current(generation) {
            return Ok(false);
        }
        for tx in &block.txs {
            self.ontransaction(tx).await;
        }
        if !self.commit(generation, &block.header)? {
            return Ok(false);
        }
        self.inner.metrics.blocks_relayed.inc();
        tracing::debug!(height = block.height(), txs = block.txs.len(), "block relayed");

        let result = self.inner.hooks.on_block(self, &block).await;
        self.check_hook("on_block", result).await;
        Ok(true)
    }
}
