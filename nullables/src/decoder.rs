//! Nullable transaction decoder.

use std::sync::atomic::{AtomicUsize, Ordering};

use hummingbird_types::{DecodeError, Transaction, TxDecoder, TxHash};

/// Decodes the synthetic format produced by [`raw_tx`](crate::raw_tx):
/// exactly 32 bytes, which become the transaction hash. Anything else is
/// rejected, which is how tests inject undecodable payloads.
#[derive(Debug, Default)]
pub struct NullDecoder {
    calls: AtomicUsize,
}

impl NullDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of decode attempts so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TxDecoder for NullDecoder {
    fn decode(&self, raw: &[u8]) -> Result<Transaction, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| DecodeError::Malformed(format!("expected 32 bytes, got {}", raw.len())))?;
        Ok(Transaction {
            hash: TxHash::new(bytes),
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        })
    }
}
