//! Prometheus metrics for a sync instance.
//!
//! [`SyncMetrics`] owns a dedicated [`Registry`] so several instances in one
//! process never collide; an embedding application can encode it into the
//! Prometheus text exposition format with [`SyncMetrics::encode`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct SyncMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Blocks processed and checkpointed by the crawl engine.
    pub blocks_crawled: IntCounter,
    /// Blocks delivered and checkpointed by the live relay.
    pub blocks_relayed: IntCounter,
    /// Transactions handed to the balancer dispatcher.
    pub transactions_dispatched: IntCounter,
    /// Mempool transactions delivered through the mempool path.
    pub mempool_txs: IntCounter,
    /// Individual balancer invocations that returned an error.
    pub balancer_failures: IntCounter,
    /// Errors reported through the `on_error` hook.
    pub errors_reported: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Height of the latest checkpoint record, -1 when none exists.
    pub checkpoint_height: IntGauge,
    /// Lifecycle state as its numeric code (0 = disconnected .. 3 = listening).
    pub state: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from fetch start to checkpoint for one crawled block.
    pub crawl_block_time_ms: Histogram,
}

impl SyncMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let blocks_crawled = register_int_counter_with_registry!(
            Opts::new("hummingbird_blocks_crawled_total", "Blocks processed by the crawl engine"),
            registry
        )
        .expect("failed to register blocks_crawled counter");

        let blocks_relayed = register_int_counter_with_registry!(
            Opts::new("hummingbird_blocks_relayed_total", "Blocks delivered by the live relay"),
            registry
        )
        .expect("failed to register blocks_relayed counter");

        let transactions_dispatched = register_int_counter_with_registry!(
            Opts::new(
                "hummingbird_transactions_dispatched_total",
                "Transactions handed to the balancer dispatcher"
            ),
            registry
        )
        .expect("failed to register transactions_dispatched counter");

        let mempool_txs = register_int_counter_with_registry!(
            Opts::new("hummingbird_mempool_txs_total", "Mempool transactions delivered"),
            registry
        )
        .expect("failed to register mempool_txs counter");

        let balancer_failures = register_int_counter_with_registry!(
            Opts::new(
                "hummingbird_balancer_failures_total",
                "Balancer invocations that returned an error"
            ),
            registry
        )
        .expect("failed to register balancer_failures counter");

        let errors_reported = register_int_counter_with_registry!(
            Opts::new("hummingbird_errors_total", "Errors reported to the error hook"),
            registry
        )
        .expect("failed to register errors_reported counter");

        // Gauges
        let checkpoint_height = register_int_gauge_with_registry!(
            Opts::new("hummingbird_checkpoint_height", "Height of the latest checkpoint"),
            registry
        )
        .expect("failed to register checkpoint_height gauge");
        checkpoint_height.set(-1);

        let state = register_int_gauge_with_registry!(
            Opts::new("hummingbird_state", "Lifecycle state code"),
            registry
        )
        .expect("failed to register state gauge");

        // Histograms – exponential buckets covering 1 ms → ~16 s.
        let crawl_block_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "hummingbird_crawl_block_time_ms",
                "Time to fetch, process and checkpoint one crawled block"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap_or_default()),
            registry
        )
        .expect("failed to register crawl_block_time_ms histogram");

        Self {
            registry,
            blocks_crawled,
            blocks_relayed,
            transactions_dispatched,
            mempool_txs,
            balancer_failures,
            errors_reported,
            checkpoint_height,
            state,
            crawl_block_time_ms,
        }
    }

    /// Encode every metric in the text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}
