//! Exercises the JSON-RPC client against a canned local HTTP responder.

use std::time::Duration;

use hummingbird_rpc::{BitcoindClient, ChainRpc, RpcError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serve each `(status, body)` pair to one connection, in order, and return
/// the raw requests that were received.
async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut stream).await);
            let reply = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
        seen
    });
    (addr.to_string(), handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(idx) = text.find("\r\n\r\n") {
            let content_length = text[..idx]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= idx + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn client(addr: &str) -> BitcoindClient {
    BitcoindClient::new(
        addr,
        Some("root".into()),
        Some("bitcoin".into()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn ok(result: serde_json::Value) -> (u16, String) {
    (
        200,
        serde_json::json!({ "result": result, "error": null, "id": 1 }).to_string(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chain_height_uses_getblockcount_with_basic_auth() {
    let (addr, server) = serve(vec![ok(serde_json::json!(608811))]).await;
    let height = client(&addr).chain_height().await.unwrap();
    assert_eq!(height, 608811);

    let requests = server.await.unwrap();
    let req = requests[0].to_lowercase();
    assert!(req.starts_with("post "));
    assert!(req.contains("authorization: basic"));
    assert!(req.contains("\"getblockcount\""));
}

#[tokio::test]
async fn block_by_height_resolves_hash_then_block() {
    let hash = "0000000000000000034a9d2b738eecce3e9afd8a07bc89ca03023c99f366708f";
    let block = serde_json::json!({
        "hash": hash,
        "height": 608811,
        "time": 1573765073,
        "previousblockhash": "00".repeat(32),
        "tx": [
            { "txid": "11".repeat(32), "hex": "0102" },
            { "txid": "22".repeat(32), "hex": "0304" }
        ]
    });
    let (addr, server) = serve(vec![ok(serde_json::json!(hash)), ok(block)]).await;

    let raw = client(&addr).block_by_height(608811).await.unwrap();
    assert_eq!(raw.header.height, 608811);
    assert_eq!(raw.header.hash.to_string(), hash);
    assert_eq!(raw.header.time.as_secs(), 1573765073);
    assert_eq!(raw.txs, vec![vec![1, 2], vec![3, 4]]);

    let requests = server.await.unwrap();
    assert!(requests[0].contains("\"getblockhash\""));
    assert!(requests[1].contains("\"getblock\""));
}

#[tokio::test]
async fn height_out_of_range_maps_to_block_not_found() {
    let body = serde_json::json!({
        "result": null,
        "error": { "code": -8, "message": "Block height out of range" },
        "id": 1
    })
    .to_string();
    let (addr, _server) = serve(vec![(500, body)]).await;

    let err = client(&addr).block_by_height(999_999_999).await.unwrap_err();
    assert!(matches!(err, RpcError::BlockNotFound(999_999_999)));
}

#[tokio::test]
async fn unauthorized_is_not_transient() {
    let (addr, _server) = serve(vec![(401, String::new())]).await;
    let err = client(&addr).chain_height().await.unwrap_err();
    assert!(matches!(err, RpcError::Unauthorized(401)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unreachable_node_is_transient() {
    // Bind then drop to get a port nothing is listening on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = client(&addr).chain_height().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn mempool_listing_and_raw_transaction() {
    let (addr, _server) = serve(vec![
        ok(serde_json::json!(["aa".repeat(32)])),
        ok(serde_json::json!("deadbeef")),
    ])
    .await;
    let c = client(&addr);
    let ids = c.get_raw_mempool().await.unwrap();
    assert_eq!(ids.len(), 1);
    let raw = c.get_raw_transaction(&ids[0]).await.unwrap();
    assert_eq!(raw, vec![0xde, 0xad, 0xbe, 0xef]);
}
