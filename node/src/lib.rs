//! Hummingbird sync engine.
//!
//! A [`Hummingbird`] instance follows a UTXO chain through a full node:
//! - Connects to the node's RPC and peer interfaces
//! - Crawls historical blocks from the last checkpoint up to the tip
//! - Checkpoints every processed block in an append-only tape file
//! - Relays pushed blocks and mempool transactions once caught up
//! - Fans every transaction out to the registered [`Balancer`]s
//!
//! Progress is observable through [`Hummingbird::state`], which walks the
//! DISCONNECTED → CONNECTING → (CRAWLING →) LISTENING lifecycle.

pub mod balancer;
pub mod config;
mod crawler;
pub mod error;
pub mod hooks;
pub mod hummingbird;
pub mod logging;
pub mod metrics;
mod relay;
pub mod shutdown;
pub mod tracing_spans;

pub use balancer::{Balancer, BalancerFailure, DispatchReport, Dispatcher};
pub use config::{PeerConfig, RpcConfig, SyncConfig};
pub use error::{BalancerError, HookError, SyncError};
pub use hooks::{Hooks, NoHooks};
pub use hummingbird::{Hummingbird, HummingbirdBuilder};
pub use logging::{init_logging, LogFormat};
pub use metrics::SyncMetrics;
pub use shutdown::{ShutdownController, ShutdownSignal};

pub use hummingbird_types::State;
