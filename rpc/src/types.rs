//! Wire shapes of the JSON-RPC responses the client understands.

use serde::Deserialize;

use hummingbird_types::{BlockHash, BlockHeader, Height, RawBlock, Timestamp, TxHash};

use crate::RpcError;

/// JSON-RPC 1.0 response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<NodeErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeErrorBody {
    pub code: i64,
    pub message: String,
}

/// `getblock <hash> 2` — header fields plus every transaction's raw hex.
#[derive(Debug, Deserialize)]
pub struct VerboseBlock {
    pub hash: BlockHash,
    pub height: Height,
    pub time: u64,
    /// Absent for genesis.
    #[serde(default)]
    pub previousblockhash: Option<BlockHash>,
    pub tx: Vec<VerboseTx>,
}

#[derive(Debug, Deserialize)]
pub struct VerboseTx {
    pub txid: TxHash,
    pub hex: String,
}

impl VerboseBlock {
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            height: self.height,
            hash: self.hash,
            prev_hash: self.previousblockhash.unwrap_or(BlockHash::ZERO),
            time: Timestamp::new(self.time),
        }
    }

    pub fn into_raw(self) -> Result<RawBlock, RpcError> {
        let header = self.header();
        let txs = self
            .tx
            .into_iter()
            .map(|tx| {
                hex::decode(&tx.hex).map_err(|e| {
                    RpcError::InvalidResponse(format!("tx {} hex: {e}", tx.txid))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RawBlock { header, txs })
    }
}
