//! Fundamental types for the Hummingbird sync engine.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace: hashes, block headers, decoded transactions and their
//! envelopes, checkpoint records, the lifecycle state enum, and the
//! decoder seam that turns raw transaction bytes into structured values.

pub mod block;
pub mod checkpoint;
pub mod decoder;
pub mod error;
pub mod hash;
mod serde_hex;
pub mod state;
pub mod time;
pub mod transaction;

pub use block::{Block, BlockHeader, BlockRef, Height, RawBlock};
pub use checkpoint::CheckpointRecord;
pub use decoder::TxDecoder;
pub use error::{DecodeError, TypesError};
pub use hash::{BlockHash, TxHash};
pub use state::State;
pub use time::Timestamp;
pub use transaction::{OutPoint, Transaction, TxEnvelope, TxInput, TxOutput};
