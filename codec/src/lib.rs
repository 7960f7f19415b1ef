//! Raw transaction decoding for UTXO chains.
//!
//! [`RawTxDecoder`] implements [`hummingbird_types::TxDecoder`] for the
//! classic transaction serialization, with or without the segregated-witness
//! marker. The transaction id is the double SHA-256 of the witness-stripped
//! serialization, displayed byte-reversed.

mod reader;
mod tx;

pub use tx::{decode_hex, decode_transaction, txid, RawTxDecoder};
