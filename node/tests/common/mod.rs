//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hummingbird_node::{
    Balancer, BalancerError, HookError, Hooks, Hummingbird, State, SyncConfig, SyncError,
};
use hummingbird_nullables::{NullDecoder, NullPeer, NullRpc};
use hummingbird_types::{Block, Height, TxEnvelope, TxHash};

pub const WAIT: Duration = Duration::from_secs(5);

/// Config with fast timers pointing at a tape inside `dir`.
pub fn fast_config(dir: &Path) -> SyncConfig {
    SyncConfig {
        tape: dir.join("tape.txt"),
        poll_interval_ms: 5,
        connect_retry_ms: 10,
        ..SyncConfig::default()
    }
}

/// Balancer that records every transaction it sees.
#[derive(Default)]
pub struct RecordingBalancer {
    pub name: String,
    pub seen: Mutex<Vec<TxEnvelope>>,
    pub fail: bool,
}

impl RecordingBalancer {
    pub fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: true,
            ..Self::default()
        })
    }

    pub fn hashes(&self) -> Vec<TxHash> {
        self.seen.lock().unwrap().iter().map(|tx| *tx.hash()).collect()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Balancer for RecordingBalancer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ontransaction(&self, tx: &TxEnvelope) -> Result<(), BalancerError> {
        self.seen.lock().unwrap().push(tx.clone());
        if self.fail {
            return Err(BalancerError::new(format!("{} refused", self.name)));
        }
        Ok(())
    }
}

/// Hooks that record what fired, plus a few switches.
#[derive(Default)]
pub struct RecordingHooks {
    pub events: Mutex<Vec<String>>,
    /// State observed from inside `process`, per processed height.
    pub processed: Mutex<Vec<(Height, State)>>,
    pub blocks: Mutex<Vec<Block>>,
    pub mempool: Mutex<Vec<TxEnvelope>>,
    pub errors: Mutex<Vec<String>>,
    /// `process` fails this many times before succeeding.
    pub process_failures: Mutex<usize>,
    /// `process` disconnects the instance at this height.
    pub disconnect_at: Mutex<Option<Height>>,
    /// Observer hooks that record their event and then return an error.
    pub failing: Mutex<Vec<&'static str>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    pub fn processed_heights(&self) -> Vec<Height> {
        self.processed.lock().unwrap().iter().map(|(h, _)| *h).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    /// Make the named observer hook fail from now on.
    pub fn fail(&self, hook: &'static str) {
        self.failing.lock().unwrap().push(hook);
    }

    fn push(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }

    fn outcome(&self, hook: &str) -> Result<(), HookError> {
        if self.failing.lock().unwrap().iter().any(|h| *h == hook) {
            return Err(HookError::new(format!("{hook} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl Hooks for RecordingHooks {
    async fn on_connect(&self, _hb: &Hummingbird) -> Result<(), HookError> {
        self.push("connect");
        self.outcome("on_connect")
    }

    async fn on_disconnect(&self, _hb: &Hummingbird) -> Result<(), HookError> {
        self.push("disconnect");
        self.outcome("on_disconnect")
    }

    async fn on_block(&self, _hb: &Hummingbird, block: &Block) -> Result<(), HookError> {
        self.push("block");
        self.blocks.lock().unwrap().push(block.clone());
        self.outcome("on_block")
    }

    async fn on_mempool(&self, _hb: &Hummingbird, tx: &TxEnvelope) -> Result<(), HookError> {
        self.push("mempool");
        self.mempool.lock().unwrap().push(tx.clone());
        self.outcome("on_mempool")
    }

    async fn ready(&self, _hb: &Hummingbird) -> Result<(), HookError> {
        self.push("ready");
        self.outcome("ready")
    }

    async fn process(&self, hb: &Hummingbird, block: &Block) -> Result<(), HookError> {
        {
            let mut failures = self.process_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(HookError::new("not yet"));
            }
        }
        self.processed
            .lock()
            .unwrap()
            .push((block.height(), hb.state()));
        let disconnect_at = *self.disconnect_at.lock().unwrap();
        if disconnect_at == Some(block.height()) {
            hb.disconnect().await;
        }
        Ok(())
    }

    async fn on_error(&self, _hb: &Hummingbird, error: &SyncError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

/// Everything a test needs to drive one instance.
pub struct Harness {
    pub hb: Hummingbird,
    pub rpc: Arc<NullRpc>,
    pub peer: Arc<NullPeer>,
    pub decoder: Arc<NullDecoder>,
    pub hooks: Arc<RecordingHooks>,
    pub balancer: Arc<RecordingBalancer>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(rpc: NullRpc) -> Self {
        Self::with_config(rpc, |_| {})
    }

    pub fn with_config(rpc: NullRpc, tweak: impl FnOnce(&mut SyncConfig)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = fast_config(dir.path());
        tweak(&mut config);
        Self::build(dir, config, Arc::new(rpc))
    }

    pub fn build(dir: tempfile::TempDir, config: SyncConfig, rpc: Arc<NullRpc>) -> Self {
        let peer = Arc::new(NullPeer::new());
        let decoder = Arc::new(NullDecoder::new());
        let hooks = Arc::new(RecordingHooks::default());
        let balancer = RecordingBalancer::named("recorder");
        let hb = Hummingbird::builder(config, rpc.clone(), peer.clone(), decoder.clone())
            .shared_hooks(hooks.clone())
            .balancer(balancer.clone())
            .build()
            .expect("build instance");
        Self {
            hb,
            rpc,
            peer,
            decoder,
            hooks,
            balancer,
            dir,
        }
    }

    pub fn tape_path(&self) -> std::path::PathBuf {
        self.dir.path().join("tape.txt")
    }

    pub async fn wait_for_state(&self, state: State) {
        wait_for_state(&self.hb, state).await;
    }

    pub async fn wait_until(&self, what: &str, check: impl Fn(&Self) -> bool) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !check(self) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

pub async fn wait_for_state(hb: &Hummingbird, state: State) {
    let mut rx = hb.subscribe_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}, still {}", hb.state()))
        .expect("state channel open");
}
