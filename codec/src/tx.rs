//! Transaction decoding.

use sha2::{Digest, Sha256};

use hummingbird_types::{
    DecodeError, OutPoint, Transaction, TxDecoder, TxHash, TxInput, TxOutput,
};

use crate::reader::Reader;

/// Smallest possible serialized input: outpoint + empty script + sequence.
const MIN_INPUT_LEN: usize = 32 + 4 + 1 + 4;
/// Smallest possible serialized output: value + empty script.
const MIN_OUTPUT_LEN: usize = 8 + 1;

/// Stateless decoder for the node's raw transaction serialization.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawTxDecoder;

impl TxDecoder for RawTxDecoder {
    fn decode(&self, raw: &[u8]) -> Result<Transaction, DecodeError> {
        decode_transaction(raw)
    }
}

/// Double SHA-256 of `bytes`, as a display-order transaction id.
pub fn txid(bytes: &[u8]) -> TxHash {
    let digest = Sha256::digest(Sha256::digest(bytes));
    let mut wire = [0u8; 32];
    wire.copy_from_slice(&digest);
    TxHash::from_wire_bytes(wire)
}

/// Decode a hex-encoded transaction (as returned by `getrawtransaction`).
pub fn decode_hex(s: &str) -> Result<Transaction, DecodeError> {
    let raw = hex::decode(s.trim()).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    decode_transaction(&raw)
}

/// Decode one serialized transaction. The whole slice must be consumed.
pub fn decode_transaction(raw: &[u8]) -> Result<Transaction, DecodeError> {
    let mut r = Reader::new(raw);
    let version = r.i32_le()?;

    let segwit = r.peek(0) == Some(0x00) && r.peek(1) == Some(0x01);
    if segwit {
        r.skip(2)?;
    }
    let body_start = r.position();

    let input_count = r.count(MIN_INPUT_LEN)?;
    if segwit && input_count == 0 {
        return Err(DecodeError::Malformed(
            "witness serialization without inputs".into(),
        ));
    }
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let txid = TxHash::from_wire_bytes(r.array32()?);
        let vout = r.u32_le()?;
        let script = r.var_bytes()?;
        let sequence = r.u32_le()?;
        inputs.push(TxInput {
            prev: OutPoint { txid, vout },
            script,
            sequence,
            witness: Vec::new(),
        });
    }

    let output_count = r.count(MIN_OUTPUT_LEN)?;
    let mut outputs = Vec::with_capacity(output_count);
    for index in 0..output_count {
        let value = r.u64_le()?;
        let script = r.var_bytes()?;
        outputs.push(TxOutput {
            index: index as u32,
            value,
            script,
        });
    }
    let body_end = r.position();

    if segwit {
        for input in &mut inputs {
            let items = r.count(1)?;
            let mut witness = Vec::with_capacity(items);
            for _ in 0..items {
                witness.push(r.var_bytes()?);
            }
            input.witness = witness;
        }
    }

    let lock_time = r.u32_le()?;
    if r.remaining() != 0 {
        return Err(DecodeError::TrailingBytes(r.remaining()));
    }

    let hash = if segwit {
        let mut stripped = Vec::with_capacity(8 + body_end - body_start);
        stripped.extend_from_slice(&raw[..4]);
        stripped.extend_from_slice(&raw[body_start..body_end]);
        stripped.extend_from_slice(&raw[raw.len() - 4..]);
        txid(&stripped)
    } else {
        txid(raw)
    };

    Ok(Transaction {
        hash,
        version,
        inputs,
        outputs,
        lock_time,
    })
}
