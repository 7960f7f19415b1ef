//! Extension points fired by the engine.
//!
//! Every hook receives the instance it belongs to, so an implementation can
//! read `state()`, call `fetch_mempool()`, or `disconnect()` from inside a
//! hook. Hooks observe transitions; they cannot veto them. A returned error
//! is reported through [`Hooks::on_error`] and otherwise ignored, except for
//! [`Hooks::process`], whose failure keeps the block from being checkpointed
//! so it is retried.

use async_trait::async_trait;

use hummingbird_types::{Block, TxEnvelope};

use crate::{HookError, Hummingbird, SyncError};

#[async_trait]
pub trait Hooks: Send + Sync {
    /// RPC and peer sessions are open; fires before the crawl/listen decision.
    async fn on_connect(&self, _hb: &Hummingbird) -> Result<(), HookError> {
        Ok(())
    }

    /// Teardown finished.
    async fn on_disconnect(&self, _hb: &Hummingbird) -> Result<(), HookError> {
        Ok(())
    }

    /// A live block was dispatched and checkpointed.
    async fn on_block(&self, _hb: &Hummingbird, _block: &Block) -> Result<(), HookError> {
        Ok(())
    }

    /// A mempool transaction was dispatched.
    async fn on_mempool(&self, _hb: &Hummingbird, _tx: &TxEnvelope) -> Result<(), HookError> {
        Ok(())
    }

    /// The instance entered LISTENING. Fires once per session.
    async fn ready(&self, _hb: &Hummingbird) -> Result<(), HookError> {
        Ok(())
    }

    /// Called for every crawled block before its transactions are dispatched.
    ///
    /// Replays are possible after a crash, so implementations must be
    /// idempotent per height.
    async fn process(&self, _hb: &Hummingbird, _block: &Block) -> Result<(), HookError> {
        Ok(())
    }

    /// Receives every error the engine reports.
    async fn on_error(&self, _hb: &Hummingbird, error: &SyncError) {
        tracing::warn!(%error, "sync error");
    }
}

/// Hooks that do nothing beyond the default error logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Hooks for NoHooks {}
