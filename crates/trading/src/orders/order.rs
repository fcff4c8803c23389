//! Arena-resident replica order and price level records

use bus::{PoolIdx, POOL_NIL};
use common::{
    OrderId, Price, Priority, Qty, Side, ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID,
    QTY_INVALID,
};

/// A public order reconstructed from market data. The client does not own
/// `client_order_id`s across peers, so the replica keys by market order id
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
    pub prev: PoolIdx,
    pub next: PoolIdx,
}

impl Default for TeOrder {
    fn default() -> Self {
        Self {
            order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            qty: QTY_INVALID,
            priority: PRIORITY_INVALID,
            prev: POOL_NIL,
            next: POOL_NIL,
        }
    }
}

/// One price level of the replica book, linked like the exchange's levels:
/// circular list per side, most aggressive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeLevel {
    pub side: Side,
    pub price: Price,
    pub head: PoolIdx,
    pub prev: PoolIdx,
    pub next: PoolIdx,
}

impl Default for TeLevel {
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

impl TeLevel {
    /// True when this level ranks behind a level at `price` on `side`.
    #[must_use]
    pub fn less_aggressive_than(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.price < price,
            Side::Sell => self.price > price,
            Side::Invalid => false,
        }
    }
}
