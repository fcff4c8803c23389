//! Replica book reconstruction and BBO maintenance

use common::{Limits, MarketUpdate, Side, UpdateKind, PRICE_INVALID};
use trading::ReplicaBook;

fn add(order_id: u64, side: Side, price: i64, qty: u32, priority: u64) -> MarketUpdate {
    MarketUpdate {
        kind: UpdateKind::Add,
        order_id,
        ticker_id: 0,
        side,
        price,
        qty,
        priority,
    }
}

fn cancel(order_id: u64, side: Side, price: i64) -> MarketUpdate {
    MarketUpdate {
        kind: UpdateKind::Cancel,
        order_id,
        ticker_id: 0,
        side,
        price,
        qty: 0,
        priority: 1,
    }
}

fn modify(order_id: u64, side: Side, price: i64, qty: u32) -> MarketUpdate {
    MarketUpdate {
        kind: UpdateKind::Modify,
        order_id,
        ticker_id: 0,
        side,
        price,
        qty,
        priority: 1,
    }
}

#[test]
fn bbo_aggregates_the_best_level() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    // 5 asks alternating 105 / 55, qty 50 each
    for (oid, price) in [(1, 105), (2, 55), (3, 105), (4, 55), (5, 105)] {
        book.apply(&add(oid, Side::Sell, price, 50, oid));
    }
    let bbo = book.bbo();
    assert_eq!(bbo.ask, 55);
    assert_eq!(bbo.ask_qty, 100);
    assert_eq!(bbo.bid, PRICE_INVALID);
}

#[test]
fn first_order_on_an_empty_side_sets_the_bbo() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    let changed = book.apply(&add(1, Side::Buy, 100, 10, 1));
    assert!(changed);
    assert_eq!(book.bbo().bid, 100);
    assert_eq!(book.bbo().bid_qty, 10);
}

#[test]
fn modify_at_the_top_updates_the_bbo_qty() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    book.apply(&add(1, Side::Buy, 100, 10, 1));
    book.apply(&add(2, Side::Buy, 100, 20, 2));
    assert_eq!(book.bbo().bid_qty, 30);

    book.apply(&modify(1, Side::Buy, 100, 5));
    assert_eq!(book.bbo().bid_qty, 25);
}

#[test]
fn cancelling_the_best_level_promotes_the_next() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    book.apply(&add(1, Side::Buy, 100, 10, 1));
    book.apply(&add(2, Side::Buy, 99, 20, 1));
    book.apply(&cancel(1, Side::Buy, 100));

    assert_eq!(book.bbo().bid, 99);
    assert_eq!(book.bbo().bid_qty, 20);
    assert_eq!(book.prices(Side::Buy), vec![99]);
    assert!(book.order(1).is_none());
}

#[test]
fn cancelling_the_last_order_invalidates_the_side() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    book.apply(&add(1, Side::Sell, 105, 10, 1));
    book.apply(&cancel(1, Side::Sell, 105));

    assert_eq!(book.bbo().ask, PRICE_INVALID);
    assert!(book.prices(Side::Sell).is_empty());
    assert_eq!(book.live_orders(), 0);
}

#[test]
fn clear_drops_everything() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    book.apply(&add(1, Side::Buy, 100, 10, 1));
    book.apply(&add(2, Side::Sell, 105, 10, 1));
    book.apply(&MarketUpdate::clear(0));

    assert_eq!(book.live_orders(), 0);
    assert!(book.prices(Side::Buy).is_empty());
    assert!(book.prices(Side::Sell).is_empty());
    assert_eq!(book.bbo().bid, PRICE_INVALID);
    assert_eq!(book.bbo().ask, PRICE_INVALID);

    // the book is usable again after the clear
    book.apply(&add(3, Side::Buy, 101, 5, 1));
    assert_eq!(book.bbo().bid, 101);
}

#[test]
fn levels_stay_sorted_by_aggressiveness() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    for (oid, price) in [(1, 100), (2, 103), (3, 101), (4, 99), (5, 102)] {
        book.apply(&add(oid, Side::Sell, price, 10, 1));
    }
    assert_eq!(book.prices(Side::Sell), vec![99, 100, 101, 102, 103]);

    let mut book = ReplicaBook::new(0, &Limits::small());
    for (oid, price) in [(1, 100), (2, 103), (3, 101), (4, 99), (5, 102)] {
        book.apply(&add(oid, Side::Buy, price, 10, 1));
    }
    assert_eq!(book.prices(Side::Buy), vec![103, 102, 101, 100, 99]);
}

#[test]
fn fifo_order_within_a_level_follows_arrival() {
    let mut book = ReplicaBook::new(0, &Limits::small());
    for oid in 1..=3 {
        book.apply(&add(oid, Side::Buy, 100, 10, oid));
    }
    let orders = book.orders_at(100);
    let ids: Vec<u64> = orders.iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}
