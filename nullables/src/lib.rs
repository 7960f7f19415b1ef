//! Nullable collaborators for deterministic testing.
//!
//! Everything the engine talks to (node RPC, peer, transaction decoder) is
//! abstracted behind a trait. This crate provides test-friendly
//! implementations that:
//! - Serve a synthetic chain built from heights and transaction hashes
//! - Can be controlled programmatically (outages, pushed events)
//! - Count calls so tests can assert on traffic
//! - Never touch the network
//!
//! Usage: hand these to the engine in place of the real collaborators.

pub mod chain;
pub mod decoder;
pub mod peer;
pub mod rpc;

pub use chain::{block_hash, raw_tx, synthetic_block, tx_hash, GENESIS_TIME};
pub use decoder::NullDecoder;
pub use peer::NullPeer;
pub use rpc::NullRpc;
