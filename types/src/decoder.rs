//! The seam between raw transaction bytes and the structured data model.

use crate::{DecodeError, Transaction};

/// Turns a serialized transaction into a [`Transaction`] carrying its hash.
pub trait TxDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<Transaction, DecodeError>;
}
