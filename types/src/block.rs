//! Block headers, raw blocks as delivered by collaborators, and decoded
//! blocks as handed to hooks.

use serde::{Deserialize, Serialize};

use crate::{BlockHash, Timestamp, TxEnvelope};

/// Block height on the best chain. Genesis is height 0.
pub type Height = u64;

/// The subset of a block header the engine needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: Height,
    pub hash: BlockHash,
    /// Hash of the parent block; all zeros for genesis.
    pub prev_hash: BlockHash,
    pub time: Timestamp,
}

impl BlockHeader {
    /// The originating-block context attached to every confirmed transaction.
    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            height: self.height,
            hash: self.hash,
            time: self.time,
        }
    }
}

/// Originating-block context of a confirmed transaction (`blk`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    #[serde(rename = "i")]
    pub height: Height,
    #[serde(rename = "h")]
    pub hash: BlockHash,
    #[serde(rename = "t")]
    pub time: Timestamp,
}

/// A block whose transactions have not been decoded yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub header: BlockHeader,
    /// Serialized transactions, in block order.
    #[serde(with = "crate::serde_hex::vec")]
    pub txs: Vec<Vec<u8>>,
}

/// A fully decoded block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<TxEnvelope>,
}

impl Block {
    pub fn height(&self) -> Height {
        self.header.height
    }

    pub fn hash(&self) -> &BlockHash {
        &self.header.hash
    }
}
