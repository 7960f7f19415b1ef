//! The sync instance and its connection lifecycle.
//!
//! `connect()` opens a session: a single tokio task that connects the
//! collaborators, crawls if behind, then relays peer events until the
//! session ends. Each session has a generation number; `disconnect()` bumps
//! it and cancels the session's timers, so any work that completes for an
//! older generation is dropped before it can touch state, checkpoints or
//! balancers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use hummingbird_peer::Peer;
use hummingbird_rpc::ChainRpc;
use hummingbird_tape::Tape;
use hummingbird_types::{BlockHeader, CheckpointRecord, Height, State, TxDecoder, TxEnvelope};

use crate::balancer::{Balancer, DispatchReport, Dispatcher};
use crate::hooks::{Hooks, NoHooks};
use crate::metrics::SyncMetrics;
use crate::shutdown::{ShutdownController, ShutdownSignal};
use crate::{HookError, SyncConfig, SyncError};

struct Session {
    generation: u64,
    cancel: ShutdownController,
}

pub(crate) struct Inner {
    pub(crate) config: SyncConfig,
    pub(crate) rpc: Arc<dyn ChainRpc>,
    pub(crate) peer: Arc<dyn Peer>,
    pub(crate) decoder: Arc<dyn TxDecoder>,
    pub(crate) hooks: Arc<dyn Hooks>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) tape: Tape,
    pub(crate) metrics: Arc<SyncMetrics>,
    reconnect: AtomicBool,
    state: watch::Sender<State>,
    session: Mutex<Session>,
    /// Held by the running session task; a new session waits for the
    /// previous loop to exit.
    loop_lock: tokio::sync::Mutex<()>,
}

/// A sync instance. Cheap to clone; clones share the same instance.
#[derive(Clone)]
pub struct Hummingbird {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for Hummingbird {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hummingbird")
            .field("state", &self.state())
            .field("checkpoint", &self.checkpoint_height())
            .field("tape", &self.inner.tape.path())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Hummingbird`] from its collaborators.
pub struct HummingbirdBuilder {
    config: SyncConfig,
    rpc: Arc<dyn ChainRpc>,
    peer: Arc<dyn Peer>,
    decoder: Arc<dyn TxDecoder>,
    hooks: Arc<dyn Hooks>,
    balancers: Vec<Arc<dyn Balancer>>,
    metrics: Option<Arc<SyncMetrics>>,
}

impl HummingbirdBuilder {
    pub fn hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn shared_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Register a balancer. Dispatch order is registration order.
    pub fn balancer(mut self, balancer: Arc<dyn Balancer>) -> Self {
        self.balancers.push(balancer);
        self
    }

    pub fn metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Open the checkpoint file and build the instance in DISCONNECTED.
    pub fn build(self) -> Result<Hummingbird, SyncError> {
        let tape = Tape::open(&self.config.tape)?;
        let metrics = self.metrics.unwrap_or_default();
        metrics
            .checkpoint_height
            .set(tape.height().map_or(-1, |h| h as i64));
        metrics.state.set(State::Disconnected.code());

        let (state, _) = watch::channel(State::Disconnected);
        tracing::debug!(
            tape = %tape.path().display(),
            checkpoint = ?tape.height(),
            balancers = self.balancers.len(),
            "sync instance created"
        );
        Ok(Hummingbird {
            inner: Arc::new(Inner {
                reconnect: AtomicBool::new(self.config.reconnect),
                config: self.config,
                rpc: self.rpc,
                peer: self.peer,
                decoder: self.decoder,
                hooks: self.hooks,
                dispatcher: Dispatcher::new(self.balancers),
                tape,
                metrics,
                state,
                session: Mutex::new(Session {
                    generation: 0,
                    cancel: ShutdownController::new(),
                }),
                loop_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

impl Hummingbird {
    pub fn builder(
        config: SyncConfig,
        rpc: Arc<dyn ChainRpc>,
        peer: Arc<dyn Peer>,
        decoder: Arc<dyn TxDecoder>,
    ) -> HummingbirdBuilder {
        HummingbirdBuilder {
            config,
            rpc,
            peer,
            decoder,
            hooks: Arc::new(NoHooks),
            balancers: Vec::new(),
            metrics: None,
        }
    }

    // ── Observation ─────────────────────────────────────────────────────

    pub fn state(&self) -> State {
        *self.inner.state.borrow()
    }

    /// A receiver that observes every state change from now on.
    pub fn subscribe_state(&self) -> watch::Receiver<State> {
        self.inner.state.subscribe()
    }

    /// Height of the latest checkpoint, `None` before the first one.
    pub fn checkpoint_height(&self) -> Option<Height> {
        self.inner.tape.height()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.inner.metrics
    }

    pub fn reconnect(&self) -> bool {
        self.inner.reconnect.load(Ordering::SeqCst)
    }

    /// Reconnect policy, evaluated when `disconnect()` runs.
    pub fn set_reconnect(&self, reconnect: bool) {
        self.inner.reconnect.store(reconnect, Ordering::SeqCst);
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Start a session: DISCONNECTED → CONNECTING, synchronously.
    ///
    /// The rest of the session runs on a spawned task, so this must be
    /// called from within a tokio runtime. Returns `false` (and does
    /// nothing) when the instance is not DISCONNECTED.
    pub fn connect(&self) -> bool {
        let (generation, cancel) = {
            let mut session = self.session();
            if self.state() != State::Disconnected {
                tracing::debug!(state = %self.state(), "connect ignored, session already open");
                return false;
            }
            session.generation += 1;
            session.cancel = ShutdownController::new();
            self.set_state(State::Connecting);
            (session.generation, session.cancel.subscribe())
        };

        tracing::info!(generation, "connecting");
        let hb = self.clone();
        tokio::spawn(async move { hb.run_session(generation, cancel).await });
        true
    }

    /// End the current session: any state → DISCONNECTED.
    ///
    /// Cancels the session's timers, closes the peer session and fires
    /// `on_disconnect`. With the reconnect flag set, a new session is
    /// started right after. Calling this while already DISCONNECTED does
    /// nothing.
    pub async fn disconnect(&self) {
        self.teardown(None).await;
    }

    /// Disconnect only if `generation` is still the live session.
    pub(crate) async fn disconnect_session(&self, generation: u64) {
        self.teardown(Some(generation)).await;
    }

    async fn teardown(&self, generation: Option<u64>) -> bool {
        let reconnect = {
            let mut session = self.session();
            if generation.is_some_and(|g| g != session.generation) {
                return false;
            }
            if self.state() == State::Disconnected {
                return false;
            }
            session.generation += 1;
            session.cancel.shutdown();
            self.set_state(State::Disconnected);
            self.reconnect()
        };

        self.inner.peer.disconnect().await;
        let result = self.inner.hooks.on_disconnect(self).await;
        self.check_hook("on_disconnect", result).await;

        if reconnect {
            tracing::info!("reconnect enabled, starting a new session");
            self.connect();
        } else {
            tracing::info!("disconnected");
        }
        true
    }

    async fn run_session(self, generation: u64, mut cancel: ShutdownSignal) {
        let _loop = tokio::select! {
            guard = self.inner.loop_lock.lock() => guard,
            _ = cancel.recv() => return,
        };
        if !self.is_current(generation) {
            return;
        }

        if !self.open_sessions(generation, &mut cancel).await {
            return;
        }
        let result = self.inner.hooks.on_connect(&self).await;
        self.check_hook("on_connect", result).await;

        let up_to_date = loop {
            if !self.is_current(generation) {
                return;
            }
            match self.is_up_to_date().await {
                Ok(done) => break done,
                Err(e) => {
                    self.report(e).await;
                    if !self.pause(&mut cancel, self.connect_retry()).await {
                        return;
                    }
                }
            }
        };

        if !up_to_date {
            if !self.transition(generation, State::Crawling) {
                return;
            }
            if !self.crawl(generation, &mut cancel).await {
                return;
            }
        }

        // Subscribe before `ready` so anything that reaches the mempool
        // while the hook runs is still announced.
        let events = match self.inner.peer.subscribe().await {
            Ok(events) => events,
            Err(e) => {
                self.report(SyncError::Connection(format!("peer subscription failed: {e}")))
                    .await;
                self.disconnect_session(generation).await;
                return;
            }
        };
        if !self.transition(generation, State::Listening) {
            return;
        }
        let result = self.inner.hooks.ready(&self).await;
        self.check_hook("ready", result).await;

        self.listen(generation, events, &mut cancel).await;
    }

    /// Retry until both the node RPC and the peer accept us. Stays
    /// CONNECTING meanwhile.
    async fn open_sessions(&self, generation: u64, cancel: &mut ShutdownSignal) -> bool {
        loop {
            if !self.is_current(generation) {
                return false;
            }
            match self.try_open().await {
                Ok(tip) => {
                    if !self.is_current(generation) {
                        // Torn down while the handshake was in flight.
                        self.inner.peer.disconnect().await;
                        return false;
                    }
                    tracing::info!(tip, checkpoint = ?self.checkpoint_height(), "connected");
                    return true;
                }
                Err(e) => {
                    self.report(e).await;
                    if !self.pause(cancel, self.connect_retry()).await {
                        return false;
                    }
                }
            }
        }
    }

    async fn try_open(&self) -> Result<Height, SyncError> {
        let tip = self
            .inner
            .rpc
            .chain_height()
            .await
            .map_err(|e| SyncError::Connection(format!("rpc: {e}")))?;
        self.inner
            .peer
            .connect()
            .await
            .map_err(|e| SyncError::Connection(format!("peer: {e}")))?;
        Ok(tip)
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Deliver one transaction to every balancer, in registration order.
    ///
    /// Balancer failures are reported individually and listed in the
    /// returned report; they never stop delivery to the other balancers.
    pub async fn ontransaction(&self, tx: &TxEnvelope) -> DispatchReport {
        let report = self.inner.dispatcher.dispatch(tx).await;
        self.inner.metrics.transactions_dispatched.inc();
        for failure in &report.failures {
            self.inner.metrics.balancer_failures.inc();
            self.report(SyncError::Balancer {
                name: failure.name.clone(),
                source: failure.error.clone(),
            })
            .await;
        }
        report
    }

    // ── Session helpers ─────────────────────────────────────────────────

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.session().generation
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.session().generation == generation
    }

    /// Apply `to` if `generation` is still live and the edge is legal.
    pub(crate) fn transition(&self, generation: u64, to: State) -> bool {
        let session = self.session();
        if session.generation != generation {
            return false;
        }
        let applied = self.set_state(to);
        drop(session);
        applied
    }

    fn set_state(&self, to: State) -> bool {
        let mut from = to;
        let applied = self.inner.state.send_if_modified(|state| {
            if *state == to || !state.can_transition_to(to) {
                return false;
            }
            from = *state;
            *state = to;
            true
        });
        if applied {
            self.inner.metrics.state.set(to.code());
            tracing::info!(%from, %to, "state transition");
        } else if from != to {
            tracing::debug!(current = %self.state(), %to, "transition rejected");
        }
        applied
    }

    /// Append a checkpoint for `header` if `generation` is still live.
    ///
    /// Returns `Ok(false)` when the session went stale and nothing was
    /// written.
    ///
    /// The fsync blocks the calling task under the tape's own lock only;
    /// `connect`, `disconnect` and `is_current` never wait on disk I/O. A
    /// record started before a disconnect still lands, and the loop lock
    /// keeps the next session from writing until this one returns.
    pub(crate) fn commit(&self, generation: u64, header: &BlockHeader) -> Result<bool, SyncError> {
        if !self.is_current(generation) {
            return Ok(false);
        }
        self.inner.tape.append(&CheckpointRecord::from(header))?;
        self.inner.metrics.checkpoint_height.set(header.height as i64);
        Ok(true)
    }

    /// First height that has not been checkpointed.
    pub(crate) fn next_height(&self) -> Height {
        let start = self.inner.config.start_height;
        self.inner
            .tape
            .height()
            .map_or(start, |h| (h + 1).max(start))
    }

    /// Sleep for `duration` unless the session is cancelled first.
    pub(crate) async fn pause(&self, cancel: &mut ShutdownSignal, duration: Duration) -> bool {
        tokio::select! {
            _ = cancel.recv() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.inner.config.poll_interval_ms)
    }

    fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.inner.config.connect_retry_ms)
    }

    /// Hand an error to the `on_error` hook.
    pub(crate) async fn report(&self, error: SyncError) {
        self.inner.metrics.errors_reported.inc();
        tracing::debug!(%error, "reporting error");
        self.inner.hooks.on_error(self, &error).await;
    }

    pub(crate) async fn check_hook(&self, hook: &'static str, result: Result<(), HookError>) {
        if let Err(source) = result {
            self.report(SyncError::Hook { hook, source }).await;
        }
    }
}
