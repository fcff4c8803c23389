//! Order management on behalf of the strategy
//!
//! The manager keeps at most one working order per (instrument, side) and
//! converges it towards the price the strategy asks for: live orders at the
//! wrong price are cancelled, and a replacement goes out on a later tick
//! once the cancel is confirmed.

use crate::trading::position::PositionManager;
use crate::trading::risk::{RiskManager, RiskResult};
use bus::SpscRing;
use common::{
    fmt_id, ClientId, ClientRequest, ClientResponse, Limits, OrderId, Price, Qty, RequestKind,
    ResponseKind, Side, TickerId, ORDER_ID_INVALID, PRICE_INVALID, QTY_INVALID, TICKER_ID_INVALID,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle of a managed order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OmOrderState {
    #[default]
    Invalid,
    PendingNew,
    Live,
    PendingCancel,
    Dead,
}

/// The client's view of one working order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OmOrder {
    pub ticker_id: TickerId,
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub state: OmOrderState,
}

impl Default for OmOrder {
    fn default() -> Self {
        Self {
            ticker_id: TICKER_ID_INVALID,
            order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
            state: OmOrderState::Invalid,
        }
    }
}

impl fmt::Display for OmOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<OmOrder> [tid:{} oid:{} {} {}@{} {:?}]",
            fmt_id(self.ticker_id, TICKER_ID_INVALID),
            fmt_id(self.order_id, ORDER_ID_INVALID),
            self.side,
            fmt_id(self.qty, QTY_INVALID),
            fmt_id(self.price, PRICE_INVALID),
            self.state,
        )
    }
}

/// Tracks one `OmOrder` per (instrument, side) and turns strategy price
/// targets into NEW/CANCEL requests.
pub struct OrderManager {
    client_id: ClientId,
    tx_requests: Arc<SpscRing<ClientRequest>>,
    orders: Vec<[OmOrder; 2]>,
    next_order_id: OrderId,
}

impl OrderManager {
    #[must_use]
    pub fn new(
        client_id: ClientId,
        limits: &Limits,
        tx_requests: Arc<SpscRing<ClientRequest>>,
    ) -> Self {
        Self {
            client_id,
            tx_requests,
            orders: vec![[OmOrder::default(); 2]; limits.max_tickers],
            next_order_id: 1,
        }
    }

    fn send_request(&self, request: &ClientRequest) {
        *self.tx_requests.next_write() = *request;
        self.tx_requests.commit_write();
    }

    fn request_new_order(
        &mut self,
        ticker_id: TickerId,
        price: Price,
        side: Side,
        qty: Qty,
    ) {
        let request = ClientRequest {
            kind: RequestKind::New,
            client_id: self.client_id,
            ticker_id,
            order_id: self.next_order_id,
            side,
            price,
            qty,
        };
        self.send_request(&request);
        let order = OmOrder {
            ticker_id,
            order_id: self.next_order_id,
            side,
            price,
            qty,
            state: OmOrderState::PendingNew,
        };
        self.orders[ticker_id as usize][side.index()] = order;
        self.next_order_id += 1;
        debug!(%request, %order, "new order requested");
    }

    fn request_cancel_order(&mut self, ticker_id: TickerId, side: Side) {
        let order = &mut self.orders[ticker_id as usize][side.index()];
        let request = ClientRequest {
            kind: RequestKind::Cancel,
            client_id: self.client_id,
            ticker_id,
            order_id: order.order_id,
            side,
            price: order.price,
            qty: order.qty,
        };
        order.state = OmOrderState::PendingCancel;
        debug!(%request, order = %*order, "cancel requested");
        self.send_request(&request);
    }

    /// Converge the (instrument, side) order towards `price`.
    ///
    /// A live order at another price is cancelled; the replacement goes out
    /// on the next tick once CANCELLED is observed. Dead or untouched slots
    /// spawn a fresh order if risk allows. Pending states wait.
    pub fn manage_order(
        &mut self,
        risk: &RiskManager,
        positions: &PositionManager,
        ticker_id: TickerId,
        price: Price,
        side: Side,
        qty: Qty,
    ) {
        let state = self.orders[ticker_id as usize][side.index()].state;
        match state {
            OmOrderState::Live => {
                if self.orders[ticker_id as usize][side.index()].price != price {
                    self.request_cancel_order(ticker_id, side);
                }
            }
            OmOrderState::Invalid | OmOrderState::Dead => {
                if price != PRICE_INVALID {
                    match risk.check(positions, ticker_id, side, qty) {
                        RiskResult::Allowed => {
                            self.request_new_order(ticker_id, price, side, qty);
                        }
                        reason => {
                            info!(ticker_id, %side, qty, %reason, "risk check refused order");
                        }
                    }
                }
            }
            OmOrderState::PendingNew | OmOrderState::PendingCancel => {}
        }
    }

    /// Converge both sides of an instrument at once.
    pub fn manage_orders(
        &mut self,
        risk: &RiskManager,
        positions: &PositionManager,
        ticker_id: TickerId,
        bid: Price,
        ask: Price,
        trade_size: Qty,
    ) {
        self.manage_order(risk, positions, ticker_id, bid, Side::Buy, trade_size);
        self.manage_order(risk, positions, ticker_id, ask, Side::Sell, trade_size);
    }

    /// Fold an exchange response into the managed order's state machine.
    pub fn on_order_response(&mut self, response: &ClientResponse) {
        if response.side == Side::Invalid {
            // cancel rejects for unknown orders carry no side; nothing of
            // ours changed state
            debug!(%response, "sideless response ignored");
            return;
        }
        let order = &mut self.orders[response.ticker_id as usize][response.side.index()];
        debug!(%response, %order, "order response");
        match response.kind {
            ResponseKind::Accepted => order.state = OmOrderState::Live,
            ResponseKind::Cancelled => order.state = OmOrderState::Dead,
            ResponseKind::Filled => {
                order.qty = response.qty_remain;
                if order.qty == 0 {
                    order.state = OmOrderState::Dead;
                }
            }
            ResponseKind::CancelRejected | ResponseKind::Invalid => {}
        }
    }

    /// The managed order for (instrument, side).
    #[must_use]
    pub fn order(&self, ticker_id: TickerId, side: Side) -> &OmOrder {
        &self.orders[ticker_id as usize][side.index()]
    }
}
