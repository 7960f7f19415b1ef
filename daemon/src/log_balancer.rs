//! The daemon's built-in consumer: one structured log line per transaction,
//! plus the hooks that keep the operator informed.

use async_trait::async_trait;

use hummingbird_node::{Balancer, BalancerError, HookError, Hooks, Hummingbird, SyncError};
use hummingbird_types::{Block, TxEnvelope};

#[derive(Debug, Default)]
pub struct LogBalancer;

#[async_trait]
impl Balancer for LogBalancer {
    fn name(&self) -> &str {
        "log"
    }

    async fn ontransaction(&self, tx: &TxEnvelope) -> Result<(), BalancerError> {
        let value: u64 = tx.tx.outputs.iter().map(|o| o.value).sum();
        match &tx.blk {
            Some(blk) => tracing::info!(
                tx = %tx.hash(),
                height = blk.height,
                block = %blk.hash,
                inputs = tx.tx.inputs.len(),
                outputs = tx.tx.outputs.len(),
                value,
                "confirmed transaction"
            ),
            None => tracing::info!(
                tx = %tx.hash(),
                inputs = tx.tx.inputs.len(),
                outputs = tx.tx.outputs.len(),
                value,
                "mempool transaction"
            ),
        }
        Ok(())
    }
}

/// Logs lifecycle milestones and replays the mempool once caught up.
#[derive(Debug, Default)]
pub struct DaemonHooks;

#[async_trait]
impl Hooks for DaemonHooks {
    async fn on_connect(&self, hb: &Hummingbird) -> Result<(), HookError> {
        tracing::info!(checkpoint = ?hb.checkpoint_height(), "node and peer sessions open");
        Ok(())
    }

    async fn on_block(&self, _hb: &Hummingbird, block: &Block) -> Result<(), HookError> {
        tracing::info!(height = block.height(), hash = %block.hash(), txs = block.txs.len(), "new block");
        Ok(())
    }

    async fn ready(&self, hb: &Hummingbird) -> Result<(), HookError> {
        let replayed = hb
            .fetchmempool()
            .await
            .map_err(|e| HookError::new(format!("mempool replay failed: {e}")))?;
        tracing::info!(checkpoint = ?hb.checkpoint_height(), replayed, "caught up, listening");
        Ok(())
    }

    async fn on_error(&self, hb: &Hummingbird, error: &SyncError) {
        tracing::warn!(state = %hb.state(), %error, "sync error");
    }
}
