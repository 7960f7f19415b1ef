//! Historical catch-up: one block at a time from the checkpoint to the tip.

use std::time::Instant;

use tracing::Instrument;

use hummingbird_types::{Block, Height, RawBlock, TxEnvelope};

use crate::shutdown::ShutdownSignal;
use crate::tracing_spans::crawl_block_span;
use crate::{Hummingbird, SyncError};

impl Hummingbird {
    /// Fetch and decode the block at `height`.
    ///
    /// Every transaction carries the block's `blk` context. A response for a
    /// different height, or one with an undecodable transaction, is a
    /// [`SyncError::Fetch`].
    pub async fn fetch(&self, height: Height) -> Result<Block, SyncError> {
        let raw = self.inner.rpc.block_by_height(height).await?;
        if raw.header.height != height {
            return Err(SyncError::Fetch {
                height,
                reason: format!("node returned block at height {}", raw.header.height),
            });
        }
        self.decode_block(raw)
    }

    /// Whether every block up to the node's tip has been checkpointed.
    pub async fn is_up_to_date(&self) -> Result<bool, SyncError> {
        let tip = self.inner.rpc.chain_height().await?;
        Ok(self.next_height() > tip)
    }

    pub(crate) fn decode_block(&self, raw: RawBlock) -> Result<Block, SyncError> {
        let height = raw.header.height;
        let blk = raw.header.block_ref();
        let txs = raw
            .txs
            .iter()
            .enumerate()
            .map(|(index, bytes)| {
                self.inner
                    .decoder
                    .decode(bytes)
                    .map(|tx| TxEnvelope::confirmed(tx, blk))
                    .map_err(|e| SyncError::Fetch {
                        height,
                        reason: format!("transaction {index}: {e}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Block {
            header: raw.header,
            txs,
        })
    }

    /// Crawl until up to date. Returns `true` when caught up, `false` when
    /// the session was cancelled or a checkpoint could not be written.
    pub(crate) async fn crawl(&self, generation: u64, cancel: &mut ShutdownSignal) -> bool {
        tracing::info!(from = self.next_height(), "crawl started");
        loop {
            if !self.is_current(generation) {
                return false;
            }
            match self.is_up_to_date().await {
                Ok(true) => {
                    tracing::info!(checkpoint = ?self.checkpoint_height(), "crawl caught up");
                    return true;
                }
                Ok(false) => {
                    let height = self.next_height();
                    match self
                        .crawl_block(generation, height)
                        .instrument(crawl_block_span(height))
                        .await
                    {
                        Ok(_) => {}
                        Err(e) if e.is_fatal() => {
                            tracing::error!(height, error = %e, "checkpoint write failed, crawl stopped");
                            self.report(e).await;
                            return false;
                        }
                        Err(e) => self.report(e).await,
                    }
                }
                Err(e) => self.report(e).await,
            }
            if !self.pause(cancel, self.poll_interval()).await {
                return false;
            }
        }
    }

    /// Fetch, process, dispatch and checkpoint one height. `Ok(false)` means
    /// the session went stale and the result was discarded.
    async fn crawl_block(&self, generation: u64, height: Height) -> Result<bool, SyncError> {
        let started = Instant::now();
        let block = self.fetch(height).await?;
        if !self.is_current(generation) {
            tracing::debug!("session ended during fetch, discarding block");
            return Ok(false);
        }

        self.inner
            .hooks
            .process(self, &block)
            .await
            .map_err(|source| SyncError::Hook {
                hook: "process",
                source,
            })?;
        if !self.is_current(generation) {
            return Ok(false);
        }

        for tx in &block.txs {
            self.ontransaction(tx).await;
        }
        if !self.commit(generation, &block.header)? {
            return Ok(false);
        }

        self.inner.metrics.blocks_crawled.inc();
        self.inner
            .metrics
            .crawl_block_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(txs = block.txs.len(), hash = %block.hash(), "block crawled");
        Ok(true)
    }
}
