use hummingbird_rpc::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer connection failed: {0}")]
    ConnectionFailed(String),

    #[error("peer not connected")]
    NotConnected,

    #[error("peer rpc error: {0}")]
    Rpc(#[from] RpcError),
}
