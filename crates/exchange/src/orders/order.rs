//! Arena-resident order and price level records
//!
//! Orders link to their level neighbours and levels link to adjacent levels
//! with pool handles, never references; the book owns both arenas.

use bus::{PoolIdx, POOL_NIL};
use common::{
    fmt_id, ClientId, OrderId, Price, Priority, Qty, Side, TickerId, CLIENT_ID_INVALID,
    ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID, QTY_INVALID, TICKER_ID_INVALID,
};
use std::fmt;

/// A resting order in the matching engine's book.
///
/// `prev`/`next` chain the orders of one price level into a circular FIFO
/// list; `priority` is the order's place in that queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OmeOrder {
    pub ticker_id: TickerId,
    pub client_id: ClientId,
    pub client_order_id: OrderId,
    pub market_order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
    pub prev: PoolIdx,
    pub next: PoolIdx,
}

impl Default for OmeOrder {
    fn default() -> Self {
        Self {
            ticker_id: TICKER_ID_INVALID,
            client_id: CLIENT_ID_INVALID,
            client_order_id: ORDER_ID_INVALID,
            market_order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
            priority: PRIORITY_INVALID,
            prev: POOL_NIL,
            next: POOL_NIL,
        }
    }
}

impl fmt::Display for OmeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<OmeOrder> [tid:{} cid:{} coid:{} moid:{} {} {}@{} prio:{}]",
            fmt_id(self.ticker_id, TICKER_ID_INVALID),
            fmt_id(self.client_id, CLIENT_ID_INVALID),
            fmt_id(self.client_order_id, ORDER_ID_INVALID),
            fmt_id(self.market_order_id, ORDER_ID_INVALID),
            self.side,
            fmt_id(self.qty, QTY_INVALID),
            fmt_id(self.price, PRICE_INVALID),
            fmt_id(self.priority, PRIORITY_INVALID),
        )
    }
}

/// One price level of the book.
///
/// `head` is the front of the level's FIFO order list. `prev`/`next` chain
/// the levels of one side into a circular list sorted by aggressiveness:
/// highest bid first, lowest ask first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub side: Side,
    pub price: Price,
    pub head: PoolIdx,
    pub prev: PoolIdx,
    pub next: PoolIdx,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self {
            side: Side::Invalid,
            price: PRICE_INVALID,
            head: POOL_NIL,
            prev: POOL_NIL,
            next: POOL_NIL,
        }
    }
}

impl PriceLevel {
    /// True when `other` should sit closer to the top of book than `self`.
    #[must_use]
    pub fn less_aggressive_than(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.price < price,
            Side::Sell => self.price > price,
            Side::Invalid => false,
        }
    }
}
