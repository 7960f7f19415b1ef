//! Error types shared across crates.

use thiserror::Error;

/// Errors raised while parsing the textual forms of the data model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hash {0:?}: expected 64 hex characters")]
    InvalidHash(String),

    #[error("invalid checkpoint record {0:?}")]
    InvalidRecord(String),
}

/// Errors raised by a [`TxDecoder`](crate::TxDecoder).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}")]
    UnexpectedEof { needed: usize, offset: usize },

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("length prefix {0} exceeds remaining input")]
    LengthOverflow(u64),

    #[error("malformed transaction: {0}")]
    Malformed(String),
}
