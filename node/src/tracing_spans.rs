//! Pre-built [`tracing::Span`] constructors for the engine's hot paths.
//!
//! Consistent span names and field sets make crawl and relay activity easy
//! to filter and correlate in any tracing backend.

use tracing::{debug_span, info_span, Span};

use hummingbird_types::{Height, TxHash};

/// Span covering fetch, processing and checkpointing of one crawled block.
pub fn crawl_block_span(height: Height) -> Span {
    info_span!("crawl_block", height)
}

/// Span covering delivery of one block pushed by the peer.
pub fn relay_block_span(height: Height) -> Span {
    info_span!("relay_block", height)
}

/// Span covering fan-out of one transaction to every balancer.
pub fn dispatch_span(tx: &TxHash, balancers: usize) -> Span {
    debug_span!("dispatch", tx = %tx, balancers)
}
