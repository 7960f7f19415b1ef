//! bitcoind-compatible JSON-RPC client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use hummingbird_types::{BlockHash, Height, RawBlock, TxHash};

use crate::types::{Envelope, VerboseBlock};
use crate::{ChainRpc, RpcError};

/// Port assumed when the configured host does not name one.
pub const DEFAULT_RPC_PORT: u16 = 8332;

/// Default connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Node error code for "Block height out of range".
const RPC_INVALID_PARAMETER: i64 = -8;

/// Turn a configured host (`127.0.0.1`, `node:18332`, `https://…`) into a
/// full endpoint URL.
pub fn endpoint_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let (scheme, rest) = match host.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", host),
    };
    let has_port = rest
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()));
    if has_port {
        format!("{scheme}://{rest}")
    } else {
        format!("{scheme}://{rest}:{DEFAULT_RPC_PORT}")
    }
}

/// HTTP client for a node's JSON-RPC interface.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct BitcoindClient {
    http: reqwest::Client,
    url: String,
    user: Option<String>,
    pass: Option<String>,
    next_id: std::sync::Arc<AtomicU64>,
}

impl std::fmt::Debug for BitcoindClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitcoindClient")
            .field("url", &self.url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl BitcoindClient {
    /// Create a client for `host` authenticating with `user`/`pass`.
    pub fn new(
        host: &str,
        user: Option<String>,
        pass: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| RpcError::Unreachable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: endpoint_url(host),
            user,
            pass,
            next_id: std::sync::Arc::new(AtomicU64::new(1)),
        })
    }

    /// The resolved endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC call and deserialize its `result`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.pass.as_ref());
        }

        tracing::trace!(method, id, "rpc call");
        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RpcError::Unauthorized(status.as_u16()));
        }

        // The node reports method errors as HTTP 500 with a JSON body, so the
        // body is inspected before the status.
        let bytes = response.bytes().await?;
        let envelope: Envelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(RpcError::Http(status.as_u16())),
            Err(e) => return Err(RpcError::InvalidResponse(e.to_string())),
        };
        if let Some(err) = envelope.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }
        let result = envelope.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))
    }

    pub async fn get_block_count(&self) -> Result<Height, RpcError> {
        self.call("getblockcount", json!([])).await
    }

    pub async fn get_block_hash(&self, height: Height) -> Result<BlockHash, RpcError> {
        match self.call("getblockhash", json!([height])).await {
            Err(RpcError::Node { code, .. }) if code == RPC_INVALID_PARAMETER => {
                Err(RpcError::BlockNotFound(height))
            }
            other => other,
        }
    }

    /// `getblock` at verbosity 2: header plus raw hex of every transaction.
    pub async fn get_block(&self, hash: &BlockHash) -> Result<VerboseBlock, RpcError> {
        self.call("getblock", json!([hash.to_string(), 2])).await
    }

    pub async fn get_raw_mempool(&self) -> Result<Vec<TxHash>, RpcError> {
        self.call("getrawmempool", json!([])).await
    }

    /// Serialized bytes of a transaction the node knows about.
    pub async fn get_raw_transaction(&self, txid: &TxHash) -> Result<Vec<u8>, RpcError> {
        let hex_tx: String = self
            .call("getrawtransaction", json!([txid.to_string()]))
            .await?;
        hex::decode(hex_tx).map_err(|e| RpcError::InvalidResponse(format!("tx {txid} hex: {e}")))
    }
}

#[async_trait]
impl ChainRpc for BitcoindClient {
    async fn block_by_height(&self, height: Height) -> Result<RawBlock, RpcError> {
        let hash = self.get_block_hash(height).await?;
        let block = self.get_block(&hash).await?;
        if block.height != height {
            return Err(RpcError::InvalidResponse(format!(
                "asked for height {height}, node returned {}",
                block.height
            )));
        }
        block.into_raw()
    }

    async fn chain_height(&self) -> Result<Height, RpcError> {
        self.get_block_count().await
    }
}
