//! Snapshot synthesizer
//!
//! Maintains the authoritative picture of every live order by replaying the
//! sequenced incremental stream, and periodically broadcasts a full
//! snapshot on the snapshot multicast group. Snapshot frames carry their own
//! local sequence starting at 0; the `SNAPSHOT_START`/`SNAPSHOT_END`
//! sentinels carry the incremental sequence the snapshot is consistent
//! with, which is what lets a recovering consumer splice the streams.

use bus::{Pool, PoolIdx, SpscRing, POOL_NIL};
use common::time::nanos_now;
use common::wire::WireMarketUpdate;
use common::{Limits, MarketUpdate, Nanos, SeqMarketUpdate, UpdateKind};
use net::McastSender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, info_span};
use zerocopy::AsBytes;

/// Snapshot stream worker.
pub struct SnapshotSynthesizer {
    rx_updates: Arc<SpscRing<SeqMarketUpdate>>,
    socket: McastSender,
    /// Live orders by `[ticker][order_id]`, backed by one pool.
    ticker_orders: Vec<Vec<PoolIdx>>,
    order_pool: Pool<MarketUpdate>,
    /// Incremental sequence of the last applied update.
    last_seq: u64,
    snapshot_interval: Duration,
    t_last_snapshot: Nanos,
    running: Arc<AtomicBool>,
}

impl SnapshotSynthesizer {
    #[must_use]
    pub fn new(
        limits: &Limits,
        rx_updates: Arc<SpscRing<SeqMarketUpdate>>,
        socket: McastSender,
        snapshot_interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rx_updates,
            socket,
            ticker_orders: vec![vec![POOL_NIL; limits.max_order_ids]; limits.max_tickers],
            order_pool: Pool::new(limits.max_order_ids),
            last_seq: 0,
            snapshot_interval,
            t_last_snapshot: 0,
            running,
        }
    }

    /// Apply one sequenced incremental to the snapshot state.
    ///
    /// # Panics
    /// Panics on a sequence gap, a duplicate ADD, or a MODIFY/CANCEL of an
    /// unknown order; the publisher feed is in-process and lossless, so any
    /// of these is a programming error.
    pub fn apply(&mut self, seq_update: &SeqMarketUpdate) {
        let update = &seq_update.update;
        let orders = &mut self.ticker_orders[update.ticker_id as usize];
        match update.kind {
            UpdateKind::Add => {
                let slot = &mut orders[update.order_id as usize];
                assert!(
                    *slot == POOL_NIL,
                    "snapshot ADD for an order that already exists: {update}"
                );
                *slot = self.order_pool.alloc(*update);
            }
            UpdateKind::Modify => {
                let idx = orders[update.order_id as usize];
                assert!(idx != POOL_NIL, "snapshot MODIFY for unknown order: {update}");
                let stored = self.order_pool.get_mut(idx);
                stored.qty = update.qty;
                stored.price = update.price;
            }
            UpdateKind::Cancel => {
                let idx = orders[update.order_id as usize];
                assert!(idx != POOL_NIL, "snapshot CANCEL for unknown order: {update}");
                orders[update.order_id as usize] = POOL_NIL;
                self.order_pool.free(idx);
            }
            // trades do not alter the book; sentinels never reach us
            UpdateKind::Trade
            | UpdateKind::Clear
            | UpdateKind::SnapshotStart
            | UpdateKind::SnapshotEnd
            | UpdateKind::Invalid => {}
        }

        assert!(
            seq_update.n_seq == self.last_seq + 1,
            "snapshot feed sequence gap: expected {}, got {}",
            self.last_seq + 1,
            seq_update.n_seq
        );
        self.last_seq = seq_update.n_seq;
    }

    /// Assemble a full snapshot as framed wire updates with snapshot-local
    /// sequence numbers.
    #[must_use]
    pub fn build_snapshot(&self) -> Vec<WireMarketUpdate> {
        let mut frames = Vec::new();
        let mut seq: u64 = 0;

        frames.push(WireMarketUpdate::pack(
            seq,
            &MarketUpdate::snapshot_sentinel(UpdateKind::SnapshotStart, self.last_seq),
        ));
        seq += 1;

        for (ticker, orders) in self.ticker_orders.iter().enumerate() {
            frames.push(WireMarketUpdate::pack(
                seq,
                &MarketUpdate::clear(ticker as u32),
            ));
            seq += 1;
            for &idx in orders {
                if idx != POOL_NIL {
                    frames.push(WireMarketUpdate::pack(seq, self.order_pool.get(idx)));
                    seq += 1;
                }
            }
        }

        frames.push(WireMarketUpdate::pack(
            seq,
            &MarketUpdate::snapshot_sentinel(UpdateKind::SnapshotEnd, self.last_seq),
        ));
        frames
    }

    fn publish_snapshot(&mut self) {
        let frames = self.build_snapshot();
        for frame in &frames {
            self.socket.send(frame.as_bytes());
        }
        info!(
            orders = frames.len() - 2,
            consistent_seq = self.last_seq,
            "snapshot published"
        );
    }

    /// Drain the feed and publish when the interval elapsed.
    pub fn poll_once(&mut self) {
        while let Some(seq_update) = self.rx_updates.next_read() {
            let seq_update = *seq_update;
            debug!(n_seq = seq_update.n_seq, update = %seq_update.update, "apply incremental");
            self.apply(&seq_update);
            self.rx_updates.commit_read();
        }
        let now = nanos_now();
        if now - self.t_last_snapshot > self.snapshot_interval.as_nanos() as Nanos {
            self.t_last_snapshot = now;
            self.publish_snapshot();
        }
    }

    /// Spin until the running flag clears.
    pub fn run(&mut self) {
        info!("snapshot synthesizer running");
        while self.running.load(Ordering::Acquire) {
            self.poll_once();
        }
        info!("snapshot synthesizer stopped");
    }

    /// Move the synthesizer onto its own named worker thread.
    pub fn start(mut self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("ss".into())
            .spawn(move || {
                let span = info_span!("ss");
                let _guard = span.enter();
                self.run();
            })
            .expect("failed to spawn snapshot synthesizer thread")
    }

    /// Incremental sequence the current snapshot state reflects.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }
}
