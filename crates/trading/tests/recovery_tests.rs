//! Gap recovery and snapshot splicing

use bus::SpscRing;
use common::{MarketUpdate, Side, UpdateKind};
use std::sync::Arc;
use trading::data::GapRecovery;

fn update(order_id: u64, price: i64) -> MarketUpdate {
    MarketUpdate {
        kind: UpdateKind::Add,
        order_id,
        ticker_id: 0,
        side: Side::Buy,
        price,
        qty: 10,
        priority: 1,
    }
}

fn sentinel(kind: UpdateKind, consistent_seq: u64) -> MarketUpdate {
    MarketUpdate::snapshot_sentinel(kind, consistent_seq)
}

fn drain(ring: &SpscRing<MarketUpdate>) -> Vec<MarketUpdate> {
    let mut out = Vec::new();
    while let Some(u) = ring.next_read() {
        out.push(*u);
        ring.commit_read();
    }
    out
}

fn setup() -> (GapRecovery, Arc<SpscRing<MarketUpdate>>) {
    let ring: Arc<SpscRing<MarketUpdate>> = Arc::new(SpscRing::new(1024));
    (GapRecovery::new(Arc::clone(&ring)), ring)
}

#[test]
fn in_order_incrementals_flow_straight_through() {
    let (mut rec, ring) = setup();
    for seq in 1..=3 {
        rec.on_update(false, seq, &update(seq, 100 + seq as i64));
    }
    assert!(!rec.in_recovery());
    assert_eq!(drain(&ring).len(), 3);
}

#[test]
fn snapshot_while_live_is_dropped() {
    let (mut rec, ring) = setup();
    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 5));
    assert!(!rec.in_recovery());
    assert!(drain(&ring).is_empty());
}

#[test]
fn gap_recovery_splices_snapshot_and_tail() {
    // the S5 scenario: incrementals 1, 2 arrive, 3 is lost, 4 arrives;
    // a snapshot consistent with seq 6 then covers the gap and the stream
    // resumes at 7
    let (mut rec, ring) = setup();

    rec.on_update(false, 1, &update(101, 101));
    rec.on_update(false, 2, &update(102, 102));
    assert_eq!(drain(&ring).len(), 2);

    // 3 lost; 4 flips the consumer into recovery and is buffered
    rec.on_update(false, 4, &update(104, 104));
    assert!(rec.in_recovery());
    assert!(drain(&ring).is_empty());

    // snapshot cycle: start, clear, two body orders, end (consistent @ 6)
    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 6));
    rec.on_update(true, 1, &MarketUpdate::clear(0));
    rec.on_update(true, 2, &update(201, 99));
    rec.on_update(true, 3, &update(202, 98));
    rec.on_update(true, 4, &sentinel(UpdateKind::SnapshotEnd, 6));
    assert!(!rec.in_recovery());

    // the strategy sees the snapshot body, never incrementals 3..6
    let forwarded = drain(&ring);
    assert_eq!(forwarded.len(), 3);
    assert_eq!(forwarded[0].kind, UpdateKind::Clear);
    assert_eq!(forwarded[1].order_id, 201);
    assert_eq!(forwarded[2].order_id, 202);
    assert!(forwarded.iter().all(|u| u.order_id != 104));

    // seq 7 is the next expected incremental and flows straight through
    rec.on_update(false, 7, &update(107, 107));
    assert!(!rec.in_recovery());
    let live = drain(&ring);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].order_id, 107);
}

#[test]
fn tail_buffered_before_snapshot_end_is_forwarded_in_order() {
    let (mut rec, ring) = setup();
    rec.on_update(false, 5, &update(105, 105)); // gap: 1..4 never seen
    assert!(rec.in_recovery());

    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 4));
    rec.on_update(true, 1, &MarketUpdate::clear(0));
    rec.on_update(true, 2, &update(301, 99));
    // the live stream keeps arriving during recovery
    rec.on_update(false, 6, &update(106, 106));
    rec.on_update(true, 3, &sentinel(UpdateKind::SnapshotEnd, 4));

    assert!(!rec.in_recovery());
    let forwarded = drain(&ring);
    assert_eq!(forwarded.len(), 4);
    // snapshot body first, then the buffered tail 5, 6
    assert_eq!(forwarded[0].kind, UpdateKind::Clear);
    let ids: Vec<u64> = forwarded[1..].iter().map(|u| u.order_id).collect();
    assert_eq!(ids, vec![301, 105, 106]);
}

#[test]
fn snapshot_without_start_is_discarded_until_the_next_cycle() {
    let (mut rec, ring) = setup();
    rec.on_update(false, 9, &update(109, 109));
    assert!(rec.in_recovery());

    // joined mid-cycle: first thing seen is a body order at local seq 3
    rec.on_update(true, 3, &update(301, 99));
    assert!(rec.in_recovery());

    // next full cycle completes the sync
    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 8));
    rec.on_update(true, 1, &update(302, 98));
    rec.on_update(true, 2, &sentinel(UpdateKind::SnapshotEnd, 8));

    assert!(!rec.in_recovery());
    let ids: Vec<u64> = drain(&ring).iter().map(|u| u.order_id).collect();
    assert_eq!(ids, vec![302, 109]);
}

#[test]
fn snapshot_gap_discards_the_cycle() {
    let (mut rec, ring) = setup();
    rec.on_update(false, 9, &update(109, 109));

    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 8));
    // local seq 1 lost; 2 arrives
    rec.on_update(true, 2, &update(301, 99));
    rec.on_update(true, 3, &sentinel(UpdateKind::SnapshotEnd, 8));
    assert!(rec.in_recovery());
    assert!(drain(&ring).is_empty());
}

#[test]
fn incremental_tail_gap_keeps_the_consumer_recovering() {
    let (mut rec, ring) = setup();
    rec.on_update(false, 5, &update(105, 105));
    // 6 lost, 7 buffered: the tail from the snapshot seam is not dense
    rec.on_update(false, 7, &update(107, 107));

    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 4));
    rec.on_update(true, 1, &update(301, 99));
    rec.on_update(true, 2, &sentinel(UpdateKind::SnapshotEnd, 4));

    assert!(rec.in_recovery());
    assert!(drain(&ring).is_empty());
}

#[test]
fn repeated_snapshot_seq_restarts_the_snapshot_buffer() {
    let (mut rec, ring) = setup();
    rec.on_update(false, 9, &update(109, 109));

    // first cycle broken mid-way; the next cycle reuses local seq 0
    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 7));
    rec.on_update(true, 1, &update(301, 99));
    rec.on_update(true, 0, &sentinel(UpdateKind::SnapshotStart, 8));
    rec.on_update(true, 1, &update(302, 98));
    rec.on_update(true, 2, &sentinel(UpdateKind::SnapshotEnd, 8));

    assert!(!rec.in_recovery());
    let ids: Vec<u64> = drain(&ring).iter().map(|u| u.order_id).collect();
    // only the second cycle's body was forwarded
    assert_eq!(ids, vec![302, 109]);
}
