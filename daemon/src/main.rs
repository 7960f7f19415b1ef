//! Hummingbird daemon: entry point for syncing from a node.

mod log_balancer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use hummingbird_codec::RawTxDecoder;
use hummingbird_node::{init_logging, Hummingbird, LogFormat, ShutdownController, SyncConfig};
use hummingbird_peer::PollingPeer;
use hummingbird_rpc::BitcoindClient;

use crate::log_balancer::{DaemonHooks, LogBalancer};

#[derive(Parser, Debug)]
#[command(name = "hummingbird-daemon", about = "UTXO chain sync and transaction relay daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "HUMMINGBIRD_CONFIG")]
    config: Option<PathBuf>,

    /// Node RPC endpoint, `host[:port]` or URL.
    #[arg(long, env = "HUMMINGBIRD_RPC_HOST")]
    rpc_host: Option<String>,

    #[arg(long, env = "HUMMINGBIRD_RPC_USER")]
    rpc_user: Option<String>,

    #[arg(long, env = "HUMMINGBIRD_RPC_PASS", hide_env_values = true)]
    rpc_pass: Option<String>,

    /// Endpoint the polling peer watches (defaults to the RPC host).
    #[arg(long, env = "HUMMINGBIRD_PEER_HOST")]
    peer_host: Option<String>,

    /// Checkpoint file.
    #[arg(long, env = "HUMMINGBIRD_TAPE")]
    tape: Option<PathBuf>,

    /// First height to crawl when the checkpoint file is empty.
    #[arg(long, env = "HUMMINGBIRD_START_HEIGHT")]
    start_height: Option<u64>,

    /// Reconnect whenever the session drops.
    #[arg(long, env = "HUMMINGBIRD_RECONNECT")]
    reconnect: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "HUMMINGBIRD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "HUMMINGBIRD_LOG_FORMAT")]
    log_format: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Crawl to the tip, then relay blocks and mempool transactions until
    /// interrupted.
    Run,
}

/// File settings (or defaults) with CLI flags and env vars layered on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            SyncConfig::from_toml_file(&path)
                .with_context(|| format!("loading config from {path}"))?
        }
        None => SyncConfig::default(),
    };

    if let Some(host) = &cli.rpc_host {
        config.rpc.host = host.clone();
        if cli.peer_host.is_none() {
            config.peer.host = host.clone();
        }
    }
    if let Some(user) = &cli.rpc_user {
        config.rpc.user = Some(user.clone());
    }
    if let Some(pass) = &cli.rpc_pass {
        config.rpc.pass = Some(pass.clone());
    }
    if let Some(host) = &cli.peer_host {
        config.peer.host = host.clone();
    }
    if let Some(tape) = &cli.tape {
        config.tape = tape.clone();
    }
    if let Some(height) = cli.start_height {
        config.start_height = height;
    }
    config.reconnect |= cli.reconnect;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    Ok(config)
}

async fn run(config: SyncConfig) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(config.rpc.timeout_secs);
    let rpc = BitcoindClient::new(
        &config.rpc.host,
        config.rpc.user.clone(),
        config.rpc.pass.clone(),
        timeout,
    )?;
    // The peer watches its own endpoint with the same credentials.
    let peer_client = BitcoindClient::new(
        &config.peer.host,
        config.rpc.user.clone(),
        config.rpc.pass.clone(),
        timeout,
    )?;
    let peer = PollingPeer::new(
        peer_client,
        Duration::from_millis(config.peer.poll_interval_ms),
    );

    tracing::info!(
        rpc = rpc.url(),
        tape = %config.tape.display(),
        reconnect = config.reconnect,
        "starting hummingbird"
    );

    let hb = Hummingbird::builder(config, Arc::new(rpc), Arc::new(peer), Arc::new(RawTxDecoder))
        .hooks(DaemonHooks)
        .balancer(Arc::new(LogBalancer))
        .build()?;
    hb.connect();

    ShutdownController::new().wait_for_signal().await;

    tracing::info!("shutdown signal received, disconnecting");
    hb.set_reconnect(false);
    hb.disconnect().await;

    tracing::info!(checkpoint = ?hb.checkpoint_height(), "hummingbird daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;

    match cli.command {
        Command::Run => run(config).await,
    }
}
