//! Market data consumer with gap recovery
//!
//! In the `Live` state incrementals flow straight to the trading engine.
//! The first sequence gap flips the consumer into `Recovering`: both
//! streams are buffered, the snapshot group is joined, and once a complete
//! snapshot plus a gapless tail of incrementals is assembled the two are
//! spliced and forwarded, after which the snapshot group is left again.

use bus::SpscRing;
use common::wire::{WireMarketUpdate, MARKET_UPDATE_SIZE};
use common::{MarketUpdate, UpdateKind};
use net::{McastReceiver, NetError};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, info_span, warn};
use zerocopy::FromBytes;

/// Gap-recovery state machine, free of any socket so it can be driven
/// directly in tests.
pub struct GapRecovery {
    tx_updates: Arc<SpscRing<MarketUpdate>>,
    /// Next expected incremental stream sequence.
    inc_next: u64,
    in_recovery: bool,
    queued_inc: BTreeMap<u64, MarketUpdate>,
    queued_snap: BTreeMap<u64, MarketUpdate>,
}

impl GapRecovery {
    #[must_use]
    pub fn new(tx_updates: Arc<SpscRing<MarketUpdate>>) -> Self {
        Self {
            tx_updates,
            inc_next: 1,
            in_recovery: false,
            queued_inc: BTreeMap::new(),
            queued_snap: BTreeMap::new(),
        }
    }

    /// True while a snapshot is being assembled; the owner keeps the
    /// snapshot group joined exactly as long as this holds.
    #[must_use]
    pub fn in_recovery(&self) -> bool {
        self.in_recovery
    }

    /// Feed one message from either stream.
    pub fn on_update(&mut self, from_snapshot: bool, n_seq: u64, update: &MarketUpdate) {
        // snapshot traffic is only meaningful while recovering
        if from_snapshot && !self.in_recovery {
            warn!(n_seq, "snapshot message received while live, dropped");
            return;
        }

        let already_in_recovery = self.in_recovery;
        self.in_recovery = already_in_recovery || n_seq != self.inc_next;

        if self.in_recovery {
            if !already_in_recovery {
                warn!(
                    expected = self.inc_next,
                    received = n_seq,
                    "incremental stream gap, starting snapshot sync"
                );
                self.queued_inc.clear();
                self.queued_snap.clear();
            }
            self.queue_update(from_snapshot, n_seq, update);
        } else {
            // the common case: in-order incremental while live
            debug!(n_seq, %update, "forward live incremental");
            self.inc_next += 1;
            self.forward(update);
        }
    }

    fn forward(&self, update: &MarketUpdate) {
        *self.tx_updates.next_write() = *update;
        self.tx_updates.commit_write();
    }

    fn queue_update(&mut self, from_snapshot: bool, n_seq: u64, update: &MarketUpdate) {
        if from_snapshot {
            if self.queued_snap.contains_key(&n_seq) {
                // seeing a snapshot-local seq twice means a new snapshot
                // cycle started while the last one was incomplete
                warn!(n_seq, "snapshot packets lost mid-cycle, restarting snapshot buffer");
                self.queued_snap.clear();
            }
            self.queued_snap.insert(n_seq, *update);
        } else {
            self.queued_inc.insert(n_seq, *update);
        }
        self.try_sync();
    }

    /// Attempt the splice: a complete snapshot (dense local seq 0..=end,
    /// delimited by its sentinels) plus a gapless incremental tail from
    /// `SNAPSHOT_END.order_id + 1` onward.
    fn try_sync(&mut self) {
        let Some(first_kind) = self.queued_snap.values().next().map(|u| u.kind) else {
            return;
        };
        if first_kind != UpdateKind::SnapshotStart {
            debug!("waiting for SNAPSHOT_START");
            self.queued_snap.clear();
            return;
        }

        let mut to_forward: Vec<MarketUpdate> = Vec::new();

        // the snapshot-local sequence must be dense from 0
        let mut snapshot_complete = true;
        let mut expected: u64 = 0;
        for (&n_seq, update) in &self.queued_snap {
            if n_seq != expected {
                warn!(
                    expected,
                    received = n_seq,
                    "snapshot stream packet loss, discarding snapshot"
                );
                snapshot_complete = false;
                break;
            }
            if !matches!(
                update.kind,
                UpdateKind::SnapshotStart | UpdateKind::SnapshotEnd
            ) {
                to_forward.push(*update);
            }
            expected += 1;
        }
        if !snapshot_complete {
            self.queued_snap.clear();
            return;
        }

        let last = self
            .queued_snap
            .values()
            .next_back()
            .expect("non-empty checked above");
        if last.kind != UpdateKind::SnapshotEnd {
            // snapshot still arriving
            return;
        }

        // the incremental stream must continue seamlessly from the seq the
        // snapshot is consistent with
        let mut inc_next = last.order_id + 1;
        let mut tail_complete = true;
        let mut n_forwarded_inc = 0usize;
        for (&n_seq, update) in &self.queued_inc {
            if n_seq < inc_next {
                continue;
            }
            if n_seq != inc_next {
                warn!(
                    expected = inc_next,
                    received = n_seq,
                    "incremental tail packet loss, discarding snapshot"
                );
                tail_complete = false;
                break;
            }
            to_forward.push(*update);
            inc_next += 1;
            n_forwarded_inc += 1;
        }
        if !tail_complete {
            self.queued_snap.clear();
            return;
        }

        info!(
            snapshot_orders = self.queued_snap.len() - 2,
            incrementals = n_forwarded_inc,
            resume_seq = inc_next,
            "snapshot recovery complete"
        );
        for update in &to_forward {
            self.forward(update);
        }
        self.inc_next = inc_next;
        self.queued_inc.clear();
        self.queued_snap.clear();
        self.in_recovery = false;
    }
}

/// Multicast groups the consumer listens on.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerGroups {
    pub iface: Ipv4Addr,
    pub incremental_ip: Ipv4Addr,
    pub incremental_port: u16,
    pub snapshot_ip: Ipv4Addr,
    pub snapshot_port: u16,
}

/// Market data consumer worker: sockets plus the recovery state machine.
pub struct MarketDataConsumer {
    recovery: GapRecovery,
    groups: ConsumerGroups,
    incremental: McastReceiver,
    /// Joined only while recovering.
    snapshot: Option<McastReceiver>,
    running: Arc<AtomicBool>,
}

impl MarketDataConsumer {
    pub fn new(
        groups: ConsumerGroups,
        tx_updates: Arc<SpscRing<MarketUpdate>>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, NetError> {
        let incremental =
            McastReceiver::join(groups.incremental_ip, groups.incremental_port, groups.iface)?;
        Ok(Self {
            recovery: GapRecovery::new(tx_updates),
            groups,
            incremental,
            snapshot: None,
            running,
        })
    }

    fn drain_socket(
        recovery: &mut GapRecovery,
        socket: &McastReceiver,
        from_snapshot: bool,
    ) {
        let mut buf = [0u8; MARKET_UPDATE_SIZE];
        while let Some(len) = socket.recv(&mut buf) {
            if len != MARKET_UPDATE_SIZE {
                warn!(len, from_snapshot, "runt market data datagram dropped");
                continue;
            }
            let frame = WireMarketUpdate::read_from(&buf[..]).expect("frame-sized buffer");
            let n_seq = frame.n_seq;
            recovery.on_update(from_snapshot, n_seq, &frame.unpack());
        }
    }

    /// One poll iteration over both sockets, managing snapshot membership.
    pub fn poll_once(&mut self) {
        Self::drain_socket(&mut self.recovery, &self.incremental, false);

        if self.recovery.in_recovery() && self.snapshot.is_none() {
            match McastReceiver::join(
                self.groups.snapshot_ip,
                self.groups.snapshot_port,
                self.groups.iface,
            ) {
                Ok(socket) => {
                    info!(group = %self.groups.snapshot_ip, "joined snapshot stream");
                    self.snapshot = Some(socket);
                }
                Err(e) => warn!(error = %e, "snapshot stream join failed, will retry"),
            }
        }

        if let Some(snapshot) = &self.snapshot {
            Self::drain_socket(&mut self.recovery, snapshot, true);
        }

        if !self.recovery.in_recovery() && self.snapshot.is_some() {
            info!(group = %self.groups.snapshot_ip, "leaving snapshot stream");
            self.snapshot = None;
        }
    }

    /// Spin until the running flag clears.
    pub fn run(&mut self) {
        info!("market data consumer running");
        while self.running.load(Ordering::Acquire) {
            self.poll_once();
        }
        info!("market data consumer stopped");
    }

    /// Move the consumer onto its own named worker thread.
    pub fn start(mut self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("mdc".into())
            .spawn(move || {
                let span = info_span!("mdc");
                let _guard = span.enter();
                self.run();
            })
            .expect("failed to spawn market data consumer thread")
    }
}
