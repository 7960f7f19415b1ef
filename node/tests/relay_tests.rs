//! Live relay, mempool delivery and balancer dispatch.

mod common;

use std::sync::Arc;

use common::{fast_config, Harness, RecordingBalancer};
use hummingbird_node::{Hummingbird, State};
use hummingbird_nullables::{raw_tx, synthetic_block, tx_hash, NullDecoder, NullPeer, NullRpc};
use hummingbird_types::{Transaction, TxEnvelope};

async fn listening(rpc: NullRpc) -> Harness {
    let h = Harness::new(rpc);
    h.hb.connect();
    h.wait_for_state(State::Listening).await;
    h.wait_until("subscription", |h| h.peer.is_subscribed()).await;
    h
}

fn envelope(n: u64) -> TxEnvelope {
    TxEnvelope::unconfirmed(Transaction {
        hash: tx_hash(n),
        version: 1,
        inputs: Vec::new(),
        outputs: Vec::new(),
        lock_time: 0,
    })
}

#[tokio::test]
async fn pushed_block_is_dispatched_checkpointed_and_announced() {
    let h = listening(NullRpc::with_chain(0, 2)).await;
    let crawled = h.balancer.count();

    assert!(h.peer.push_block(synthetic_block(3, &[tx_hash(30), tx_hash(31)])));
    h.wait_until("block hook", |h| h.hooks.count("block") == 1).await;

    assert_eq!(h.hb.checkpoint_height(), Some(3));
    assert_eq!(
        h.balancer.hashes()[crawled..],
        [tx_hash(30), tx_hash(31)]
    );
    let seen = h.balancer.seen.lock().unwrap();
    assert!(seen[crawled..].iter().all(|tx| tx.blk.map(|b| b.height) == Some(3)));
    drop(seen);
    assert_eq!(h.hooks.blocks.lock().unwrap()[0].height(), 3);
    assert_eq!(h.hb.metrics().blocks_relayed.get(), 1);
    // Dispatch and checkpoint happen before the hook fires.
    assert_eq!(h.hooks.events(), vec!["connect", "ready", "block"]);
    h.hb.disconnect().await;
}

#[tokio::test]
async fn already_checkpointed_blocks_are_skipped() {
    let h = listening(NullRpc::with_chain(0, 2)).await;
    let crawled = h.balancer.count();

    h.peer.push_block(synthetic_block(2, &[tx_hash(99)]));
    h.peer.push_block(synthetic_block(3, &[tx_hash(3)]));
    h.wait_until("block 3", |h| h.hb.checkpoint_height() == Some(3)).await;

    assert_eq!(h.balancer.hashes()[crawled..], [tx_hash(3)]);
    assert_eq!(h.hooks.count("block"), 1);
    h.hb.disconnect().await;
}

#[tokio::test]
async fn gap_before_a_pushed_block_is_filled_over_rpc() {
    let h = listening(NullRpc::with_chain(0, 2)).await;
    h.rpc.extend_to(3, 4);

    h.peer.push_block(synthetic_block(5, &[tx_hash(5)]));
    h.wait_until("three blocks", |h| h.hooks.count("block") == 3).await;

    let heights: Vec<_> = h.hooks.blocks.lock().unwrap().iter().map(|b| b.height()).collect();
    assert_eq!(heights, vec![3, 4, 5]);
    assert_eq!(h.hb.checkpoint_height(), Some(5));
    assert_eq!(
        h.balancer.hashes(),
        (0..=5).map(tx_hash).collect::<Vec<_>>()
    );
    h.hb.disconnect().await;
}

#[tokio::test]
async fn pushed_mempool_transactions_arrive_in_order_without_blk() {
    let h = listening(NullRpc::with_chain(0, 0)).await;
    let crawled = h.balancer.count();

    h.peer.push_tx(raw_tx(&tx_hash(70)));
    h.peer.push_tx(vec![0xde, 0xad]);
    h.peer.push_tx(raw_tx(&tx_hash(71)));
    h.wait_until("two mempool txs", |h| h.hooks.count("mempool") == 2).await;

    let mempool = h.hooks.mempool.lock().unwrap().clone();
    assert_eq!(
        mempool.iter().map(|tx| *tx.hash()).collect::<Vec<_>>(),
        vec![tx_hash(70), tx_hash(71)]
    );
    assert!(mempool.iter().all(|tx| tx.blk.is_none()));
    assert_eq!(h.balancer.hashes()[crawled..], [tx_hash(70), tx_hash(71)]);
    assert!(h.hooks.errors().iter().any(|e| e.contains("decode error")));
    // Mempool traffic never moves the checkpoint.
    assert_eq!(h.hb.checkpoint_height(), Some(0));
    h.hb.disconnect().await;
}

#[tokio::test]
async fn fetchmempool_delivers_each_transaction_once() {
    let h = listening(NullRpc::with_chain(0, 0)).await;
    let crawled = h.balancer.count();
    h.peer.set_mempool(&[tx_hash(1), tx_hash(2), tx_hash(3)]);
    h.peer.add_mempool_raw(vec![0x00]);

    let delivered = h.hb.fetchmempool().await.unwrap();

    assert_eq!(delivered, 3);
    assert_eq!(h.peer.mempool_requests(), 1);
    assert_eq!(h.hooks.count("mempool"), 3);
    assert_eq!(
        h.balancer.hashes()[crawled..],
        [tx_hash(1), tx_hash(2), tx_hash(3)]
    );
    assert_eq!(h.hb.metrics().mempool_txs.get(), 3);
    assert_eq!(h.hooks.errors().len(), 1);
    h.hb.disconnect().await;
}

#[tokio::test]
async fn fetchmempool_needs_a_peer_session() {
    let h = Harness::new(NullRpc::with_chain(0, 0));
    assert!(h.hb.fetchmempool().await.is_err());
    assert_eq!(h.hooks.count("mempool"), 0);
}

#[tokio::test]
async fn ontransaction_with_no_balancers_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let hb = Hummingbird::builder(
        fast_config(dir.path()),
        Arc::new(NullRpc::new()),
        Arc::new(NullPeer::new()),
        Arc::new(NullDecoder::new()),
    )
    .build()
    .unwrap();

    let report = hb.ontransaction(&envelope(1)).await;
    assert!(report.is_clean());
    assert_eq!(report.delivered, 0);
}

#[tokio::test]
async fn ontransaction_invokes_the_balancer_once_before_returning() {
    let h = Harness::new(NullRpc::new());
    let report = h.hb.ontransaction(&envelope(5)).await;

    assert_eq!(report.delivered, 1);
    assert_eq!(h.balancer.hashes(), vec![tx_hash(5)]);
    assert_eq!(h.hb.state(), State::Disconnected);
}

#[tokio::test]
async fn failing_balancer_is_reported_and_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let failing = RecordingBalancer::failing("ledger");
    let healthy = RecordingBalancer::named("index");
    let hooks = Arc::new(common::RecordingHooks::default());
    let hb = Hummingbird::builder(
        fast_config(dir.path()),
        Arc::new(NullRpc::new()),
        Arc::new(NullPeer::new()),
        Arc::new(NullDecoder::new()),
    )
    .shared_hooks(hooks.clone())
    .balancer(failing.clone())
    .balancer(healthy.clone())
    .build()
    .unwrap();

    let report = hb.ontransaction(&envelope(8)).await;

    assert_eq!(report.failed().collect::<Vec<_>>(), vec!["ledger"]);
    assert_eq!(report.delivered, 1);
    assert_eq!(failing.count(), 1);
    assert_eq!(healthy.hashes(), vec![tx_hash(8)]);
    assert_eq!(hb.metrics().balancer_failures.get(), 1);
    assert_eq!(
        hooks.errors(),
        vec!["balancer `ledger` failed: ledger refused".to_string()]
    );
    assert_eq!(hb.state(), State::Disconnected);
}

#[tokio::test]
async fn failing_balancer_does_not_stall_the_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let failing = RecordingBalancer::failing("flaky");
    let healthy = RecordingBalancer::named("steady");
    let hb = Hummingbird::builder(
        fast_config(dir.path()),
        Arc::new(NullRpc::with_chain(0, 3)),
        Arc::new(NullPeer::new()),
        Arc::new(NullDecoder::new()),
    )
    .balancer(failing.clone())
    .balancer(healthy.clone())
    .build()
    .unwrap();

    hb.connect();
    common::wait_for_state(&hb, State::Listening).await;
    assert_eq!(hb.checkpoint_height(), Some(3));
    assert_eq!(failing.count(), 4);
    assert_eq!(healthy.count(), 4);
    hb.disconnect().await;
}

/// Replays the mempool from `ready`, then lets another transaction land in
/// the node's mempool before the hook returns.
struct ReplayOnReady {
    node: Arc<NullRpc>,
}

#[async_trait::async_trait]
impl hummingbird_node::Hooks for ReplayOnReady {
    async fn ready(&self, hb: &Hummingbird) -> Result<(), hummingbird_node::HookError> {
        hb.fetchmempool()
            .await
            .map_err(|e| hummingbird_node::HookError::new(e.to_string()))?;
        self.node.add_mempool_tx(tx_hash(2));
        Ok(())
    }
}

#[tokio::test]
async fn transaction_arriving_during_ready_replay_is_still_relayed() {
    let dir = tempfile::tempdir().unwrap();
    let node = Arc::new(NullRpc::with_chain(0, 0));
    node.add_mempool_tx(tx_hash(1));
    let peer = Arc::new(hummingbird_peer::PollingPeer::with_shared(
        node.clone(),
        std::time::Duration::from_millis(10),
    ));
    let balancer = RecordingBalancer::named("recorder");
    let hb = Hummingbird::builder(
        fast_config(dir.path()),
        node.clone(),
        peer,
        Arc::new(NullDecoder::new()),
    )
    .hooks(ReplayOnReady { node: node.clone() })
    .balancer(balancer.clone())
    .build()
    .unwrap();

    hb.connect();
    common::wait_for_state(&hb, State::Listening).await;

    let deadline = tokio::time::Instant::now() + common::WAIT;
    while !balancer.hashes().contains(&tx_hash(2)) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "transaction 2 never relayed, balancer saw {:?}",
            balancer.hashes()
        );
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(balancer.hashes().contains(&tx_hash(1)));
    hb.disconnect().await;
}
