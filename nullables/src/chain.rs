//! Synthetic chain fixtures.
//!
//! Raw transactions are the 32 bytes of their own hash, which is exactly
//! what [`NullDecoder`](crate::NullDecoder) accepts.

use hummingbird_types::{BlockHash, BlockHeader, Height, RawBlock, Timestamp, TxHash};

/// Timestamp of the synthetic block at height 0. Each block adds ten minutes.
pub const GENESIS_TIME: u64 = 1_231_006_505;

/// Deterministic hash of the synthetic block at `height`.
pub fn block_hash(height: Height) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xb1;
    bytes[24..].copy_from_slice(&height.to_be_bytes());
    BlockHash::new(bytes)
}

/// Deterministic transaction hash number `n`.
pub fn tx_hash(n: u64) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x7a;
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    TxHash::new(bytes)
}

/// The serialized form of a synthetic transaction.
pub fn raw_tx(hash: &TxHash) -> Vec<u8> {
    hash.as_bytes().to_vec()
}

/// A block at `height` linked to the synthetic block below it.
pub fn synthetic_block(height: Height, txs: &[TxHash]) -> RawBlock {
    let prev_hash = match height {
        0 => BlockHash::ZERO,
        h => block_hash(h - 1),
    };
    RawBlock {
        header: BlockHeader {
            height,
            hash: block_hash(height),
            prev_hash,
            time: Timestamp::new(GENESIS_TIME + height * 600),
        },
        txs: txs.iter().map(raw_tx).collect(),
    }
}
