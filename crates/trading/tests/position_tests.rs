//! Position accounting, risk checks and order management

use bus::SpscRing;
use common::{
    Bbo, ClientRequest, ClientResponse, Limits, RequestKind, ResponseKind, RiskCfg, Side,
    PRICE_INVALID,
};
use rstest::rstest;
use std::sync::Arc;
use trading::trading::{
    OmOrderState, OrderManager, PositionManager, RiskManager, RiskResult,
};

fn fill(side: Side, qty: u32, price: i64) -> ClientResponse {
    ClientResponse {
        kind: ResponseKind::Filled,
        client_id: 0,
        ticker_id: 0,
        client_order_id: 1,
        market_order_id: 1,
        side,
        price,
        qty_exec: qty,
        qty_remain: 0,
    }
}

#[test]
fn pnl_sign_flip_scenario() {
    // BUY 10@100, BUY 10@90, SELL 10@92, SELL 20@97
    let mut positions = PositionManager::new(&Limits::small());
    positions.add_fill(&fill(Side::Buy, 10, 100));
    positions.add_fill(&fill(Side::Buy, 10, 90));
    positions.add_fill(&fill(Side::Sell, 10, 92));
    positions.add_fill(&fill(Side::Sell, 20, 97));

    let p = positions.position(0);
    assert_eq!(p.position, -10);
    assert_eq!(p.vwap_open[Side::Buy.index()], 0.0);
    assert!((p.pnl_real - -10.0).abs() < 1e-9, "realized was {}", p.pnl_real);
    assert!(p.pnl_unreal.abs() < 1e-9, "unrealized was {}", p.pnl_unreal);
    assert!((p.pnl_total - -10.0).abs() < 1e-9);
    assert_eq!(p.volume, 50);
}

#[rstest]
#[case(Side::Buy, Side::Sell, 50.0)] // long closed above entry
#[case(Side::Sell, Side::Buy, -50.0)] // short closed above entry
fn flat_position_resets_open_vwap_and_unrealized(
    #[case] open: Side,
    #[case] close: Side,
    #[case] expected_real: f64,
) {
    let mut positions = PositionManager::new(&Limits::small());
    positions.add_fill(&fill(open, 10, 100));
    positions.add_fill(&fill(close, 10, 105));

    let p = positions.position(0);
    assert_eq!(p.position, 0);
    assert_eq!(p.vwap_open, [0.0, 0.0]);
    assert_eq!(p.pnl_unreal, 0.0);
    assert!((p.pnl_real - expected_real).abs() < 1e-9);
    assert!((p.pnl_total - expected_real).abs() < 1e-9);
}

#[test]
fn increasing_a_long_accumulates_the_open_sum() {
    let mut positions = PositionManager::new(&Limits::small());
    positions.add_fill(&fill(Side::Buy, 10, 100));
    positions.add_fill(&fill(Side::Buy, 10, 90));

    let p = positions.position(0);
    assert_eq!(p.position, 20);
    assert_eq!(p.vwap_open[Side::Buy.index()], 1900.0);
    // marked against the last fill price: (90 - 95) * 20
    assert!((p.pnl_unreal - -100.0).abs() < 1e-9);
    assert_eq!(p.pnl_real, 0.0);
}

#[test]
fn bbo_updates_mark_open_positions_at_mid() {
    let mut positions = PositionManager::new(&Limits::small());
    positions.add_fill(&fill(Side::Buy, 10, 100));

    positions.on_bbo_update(
        0,
        &Bbo {
            bid: 104,
            ask: 106,
            bid_qty: 1,
            ask_qty: 1,
        },
    );
    let p = positions.position(0);
    // mid 105 vs open vwap 100, long 10
    assert!((p.pnl_unreal - 50.0).abs() < 1e-9);

    // a one-sided book leaves the mark unchanged
    positions.on_bbo_update(
        0,
        &Bbo {
            bid: 90,
            ..Bbo::default()
        },
    );
    let p = positions.position(0);
    assert!((p.pnl_unreal - 50.0).abs() < 1e-9);
}

fn risk_setup(cfg: RiskCfg) -> (RiskManager, PositionManager) {
    let limits = Limits::small();
    (RiskManager::new(&limits, cfg), PositionManager::new(&limits))
}

#[test]
fn risk_rejects_in_documented_order() {
    let cfg = RiskCfg {
        size_max: 10,
        position_max: 20,
        loss_max: -100.0,
    };
    let (risk, mut positions) = risk_setup(cfg);

    assert_eq!(
        risk.check(&positions, 0, Side::Buy, 11),
        RiskResult::SizeTooLarge
    );
    assert_eq!(
        risk.check(&positions, 0, Side::Buy, 10),
        RiskResult::Allowed
    );

    // a long of 15 allows at most 5 more
    positions.add_fill(&fill(Side::Buy, 15, 100));
    assert_eq!(
        risk.check(&positions, 0, Side::Buy, 6),
        RiskResult::PositionTooLarge
    );
    assert_eq!(
        risk.check(&positions, 0, Side::Sell, 10),
        RiskResult::Allowed
    );

    // crossing the loss floor blocks everything
    positions.add_fill(&fill(Side::Sell, 15, 80));
    assert_eq!(
        risk.check(&positions, 0, Side::Buy, 1),
        RiskResult::LossTooLarge
    );
}

fn manager_setup() -> (OrderManager, RiskManager, PositionManager, Arc<SpscRing<ClientRequest>>) {
    let limits = Limits::small();
    let ring: Arc<SpscRing<ClientRequest>> = Arc::new(SpscRing::new(64));
    let oman = OrderManager::new(7, &limits, Arc::clone(&ring));
    let rman = RiskManager::new(
        &limits,
        RiskCfg {
            size_max: 100,
            position_max: 1000,
            loss_max: -1000.0,
        },
    );
    (oman, rman, PositionManager::new(&limits), ring)
}

fn drain(ring: &SpscRing<ClientRequest>) -> Vec<ClientRequest> {
    let mut out = Vec::new();
    while let Some(r) = ring.next_read() {
        out.push(*r);
        ring.commit_read();
    }
    out
}

#[test]
fn manage_order_places_then_replaces_on_price_change() {
    let (mut oman, rman, pman, ring) = manager_setup();

    oman.manage_order(&rman, &pman, 0, 100, Side::Buy, 10);
    let sent = drain(&ring);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, RequestKind::New);
    assert_eq!((sent[0].price, sent[0].qty), (100, 10));
    assert_eq!(oman.order(0, Side::Buy).state, OmOrderState::PendingNew);

    // pending orders are left alone
    oman.manage_order(&rman, &pman, 0, 101, Side::Buy, 10);
    assert!(drain(&ring).is_empty());

    // ACCEPTED makes it live; a new target price triggers a cancel
    let mut accepted = fill(Side::Buy, 0, 100);
    accepted.kind = ResponseKind::Accepted;
    oman.on_order_response(&accepted);
    assert_eq!(oman.order(0, Side::Buy).state, OmOrderState::Live);

    oman.manage_order(&rman, &pman, 0, 101, Side::Buy, 10);
    let sent = drain(&ring);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, RequestKind::Cancel);
    assert_eq!(oman.order(0, Side::Buy).state, OmOrderState::PendingCancel);

    // once CANCELLED is observed the next tick places the replacement
    let mut cancelled = fill(Side::Buy, 0, 100);
    cancelled.kind = ResponseKind::Cancelled;
    oman.on_order_response(&cancelled);
    assert_eq!(oman.order(0, Side::Buy).state, OmOrderState::Dead);

    oman.manage_order(&rman, &pman, 0, 101, Side::Buy, 10);
    let sent = drain(&ring);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, RequestKind::New);
    assert_eq!(sent[0].price, 101);
}

#[test]
fn fills_reduce_qty_and_kill_at_zero() {
    let (mut oman, rman, pman, ring) = manager_setup();
    oman.manage_order(&rman, &pman, 0, 100, Side::Sell, 10);
    drain(&ring);

    let mut accepted = fill(Side::Sell, 0, 100);
    accepted.kind = ResponseKind::Accepted;
    oman.on_order_response(&accepted);

    let mut partial = fill(Side::Sell, 4, 100);
    partial.qty_remain = 6;
    oman.on_order_response(&partial);
    assert_eq!(oman.order(0, Side::Sell).qty, 6);
    assert_eq!(oman.order(0, Side::Sell).state, OmOrderState::Live);

    let mut full = fill(Side::Sell, 6, 100);
    full.qty_remain = 0;
    oman.on_order_response(&full);
    assert_eq!(oman.order(0, Side::Sell).state, OmOrderState::Dead);
}

#[test]
fn invalid_price_target_sends_nothing() {
    let (mut oman, rman, pman, ring) = manager_setup();
    oman.manage_order(&rman, &pman, 0, PRICE_INVALID, Side::Buy, 10);
    assert!(drain(&ring).is_empty());
    assert_eq!(oman.order(0, Side::Buy).state, OmOrderState::Invalid);
}

#[test]
fn risk_refusal_sends_nothing() {
    let limits = Limits::small();
    let ring: Arc<SpscRing<ClientRequest>> = Arc::new(SpscRing::new(64));
    let mut oman = OrderManager::new(7, &limits, Arc::clone(&ring));
    let rman = RiskManager::new(
        &limits,
        RiskCfg {
            size_max: 5,
            position_max: 10,
            loss_max: -100.0,
        },
    );
    let pman = PositionManager::new(&limits);

    oman.manage_order(&rman, &pman, 0, 100, Side::Buy, 6);
    assert!(drain(&ring).is_empty());
    assert_eq!(oman.order(0, Side::Buy).state, OmOrderState::Invalid);
}
