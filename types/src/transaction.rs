//! Decoded transactions and the envelope that travels through the engine.

use serde::{Deserialize, Serialize};

use crate::{BlockRef, TxHash};

/// Reference to the output an input spends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    #[serde(rename = "h")]
    pub txid: TxHash,
    #[serde(rename = "i")]
    pub vout: u32,
}

impl OutPoint {
    /// Coinbase inputs spend the null outpoint.
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(rename = "e")]
    pub prev: OutPoint,
    #[serde(rename = "s", with = "crate::serde_hex")]
    pub script: Vec<u8>,
    #[serde(rename = "seq")]
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "crate::serde_hex::vec")]
    pub witness: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(rename = "i")]
    pub index: u32,
    /// Value in the chain's smallest unit.
    #[serde(rename = "v")]
    pub value: u64,
    #[serde(rename = "s", with = "crate::serde_hex")]
    pub script: Vec<u8>,
}

/// A decoded transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "h")]
    pub hash: TxHash,
    pub version: i32,
    #[serde(rename = "in")]
    pub inputs: Vec<TxInput>,
    #[serde(rename = "out")]
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev.is_null()
    }
}

/// A transaction plus, when confirmed, the block it was mined in.
///
/// Crawled and live-block transactions carry `blk`; mempool transactions do
/// not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEnvelope {
    pub tx: Transaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blk: Option<BlockRef>,
}

impl TxEnvelope {
    pub fn confirmed(tx: Transaction, blk: BlockRef) -> Self {
        Self { tx, blk: Some(blk) }
    }

    pub fn unconfirmed(tx: Transaction) -> Self {
        Self { tx, blk: None }
    }

    pub fn hash(&self) -> &TxHash {
        &self.tx.hash
    }

    pub fn is_confirmed(&self) -> bool {
        self.blk.is_some()
    }
}
