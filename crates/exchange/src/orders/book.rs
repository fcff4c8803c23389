//! Price-time-priority limit order book
//!
//! One book per instrument, owned exclusively by the matching engine
//! thread. Orders and levels live in pool arenas and reference each other by
//! handle. Matching consumes the opposite side's head-of-level queues in
//! price-then-priority order.

use crate::engine::EngineIo;
use crate::orders::order::{OmeOrder, PriceLevel};
use bus::{Pool, PoolIdx, POOL_NIL};
use common::{
    ClientId, ClientResponse, Limits, MarketUpdate, OrderId, Price, Priority, Qty, ResponseKind,
    Side, TickerId, UpdateKind, ORDER_ID_INVALID, PRICE_INVALID, PRIORITY_INVALID, QTY_INVALID,
};
use rustc_hash::FxHashMap;

/// Exchange-side order book for a single instrument.
pub struct OrderBook {
    ticker_id: TickerId,
    orders: Pool<OmeOrder>,
    levels: Pool<PriceLevel>,
    best_bid: PoolIdx,
    best_ask: PoolIdx,
    /// Live price levels by price. A real map: simultaneously-live prices
    /// never collide with each other.
    price_to_level: FxHashMap<Price, PoolIdx>,
    /// `[client_id][client_order_id]` direct-address table of live orders.
    client_orders: Vec<Vec<PoolIdx>>,
    next_market_oid: OrderId,
}

impl OrderBook {
    #[must_use]
    pub fn new(ticker_id: TickerId, limits: &Limits) -> Self {
        Self {
            ticker_id,
            orders: Pool::new(limits.max_order_ids),
            levels: Pool::new(limits.max_price_levels),
            best_bid: POOL_NIL,
            best_ask: POOL_NIL,
            price_to_level: FxHashMap::default(),
            client_orders: vec![vec![POOL_NIL; limits.max_order_ids]; limits.max_clients],
            next_market_oid: 1,
        }
    }

    /// Process a NEW request: acknowledge, cross against the far side, and
    /// rest any remainder as a passive order.
    pub fn add(
        &mut self,
        io: &EngineIo,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
    ) {
        let market_order_id = self.next_market_oid;
        self.next_market_oid += 1;

        io.send_client_response(&ClientResponse {
            kind: ResponseKind::Accepted,
            client_id,
            ticker_id: self.ticker_id,
            client_order_id,
            market_order_id,
            side,
            price,
            qty_exec: 0,
            qty_remain: qty,
        });

        let qty_remains =
            self.find_match(io, client_id, client_order_id, side, price, qty, market_order_id);

        if qty_remains > 0 {
            let priority = self.next_priority(price);
            let order_idx = self.orders.alloc(OmeOrder {
                ticker_id: self.ticker_id,
                client_id,
                client_order_id,
                market_order_id,
                side,
                price,
                qty: qty_remains,
                priority,
                prev: POOL_NIL,
                next: POOL_NIL,
            });
            self.add_order_to_book(order_idx);
            io.send_market_update(&MarketUpdate {
                kind: UpdateKind::Add,
                order_id: market_order_id,
                ticker_id: self.ticker_id,
                side,
                price,
                qty: qty_remains,
                priority,
            });
        }
    }

    /// Process a CANCEL request. Unknown orders are rejected; live ones are
    /// unlinked, freed and announced to the market.
    pub fn cancel(&mut self, io: &EngineIo, client_id: ClientId, client_order_id: OrderId) {
        let order_idx = self.lookup(client_id, client_order_id);

        if order_idx == POOL_NIL {
            io.send_client_response(&ClientResponse {
                kind: ResponseKind::CancelRejected,
                client_id,
                ticker_id: self.ticker_id,
                client_order_id,
                market_order_id: ORDER_ID_INVALID,
                side: Side::Invalid,
                price: PRICE_INVALID,
                qty_exec: QTY_INVALID,
                qty_remain: QTY_INVALID,
            });
            return;
        }

        let order = *self.orders.get(order_idx);
        io.send_client_response(&ClientResponse {
            kind: ResponseKind::Cancelled,
            client_id,
            ticker_id: self.ticker_id,
            client_order_id,
            market_order_id: order.market_order_id,
            side: order.side,
            price: order.price,
            qty_exec: QTY_INVALID,
            qty_remain: order.qty,
        });
        io.send_market_update(&MarketUpdate {
            kind: UpdateKind::Cancel,
            order_id: order.market_order_id,
            ticker_id: self.ticker_id,
            side: order.side,
            price: order.price,
            qty: 0,
            priority: order.priority,
        });
        self.remove_order_from_book(order_idx);
    }

    /// Cross the incoming order against the opposite side until the price no
    /// longer matches, the side empties, or the order fills. Returns the
    /// unfilled remainder.
    #[allow(clippy::too_many_arguments)]
    fn find_match(
        &mut self,
        io: &EngineIo,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        market_order_id: OrderId,
    ) -> Qty {
        let mut qty_remains = qty;
        match side {
            Side::Buy => {
                while qty_remains > 0 && self.best_ask != POOL_NIL {
                    let head = self.levels.get(self.best_ask).head;
                    if price < self.orders.get(head).price {
                        break;
                    }
                    self.execute_match(
                        io,
                        client_id,
                        client_order_id,
                        side,
                        market_order_id,
                        head,
                        &mut qty_remains,
                    );
                }
            }
            Side::Sell => {
                while qty_remains > 0 && self.best_bid != POOL_NIL {
                    let head = self.levels.get(self.best_bid).head;
                    if price > self.orders.get(head).price {
                        break;
                    }
                    self.execute_match(
                        io,
                        client_id,
                        client_order_id,
                        side,
                        market_order_id,
                        head,
                        &mut qty_remains,
                    );
                }
            }
            Side::Invalid => {}
        }
        qty_remains
    }

    /// Fill the incoming order against one resting order: both parties get a
    /// FILLED response, the market gets a TRADE, and the resting order is
    /// either modified in place or cancelled out of the book.
    #[allow(clippy::too_many_arguments)]
    fn execute_match(
        &mut self,
        io: &EngineIo,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        market_order_id: OrderId,
        resting_idx: PoolIdx,
        qty_remains: &mut Qty,
    ) {
        let resting_qty = self.orders.get(resting_idx).qty;
        let fill_qty = (*qty_remains).min(resting_qty);

        *qty_remains -= fill_qty;
        self.orders.get_mut(resting_idx).qty -= fill_qty;
        let resting = *self.orders.get(resting_idx);

        // aggressor side of the trade
        io.send_client_response(&ClientResponse {
            kind: ResponseKind::Filled,
            client_id,
            ticker_id: self.ticker_id,
            client_order_id,
            market_order_id,
            side,
            price: resting.price,
            qty_exec: fill_qty,
            qty_remain: *qty_remains,
        });
        // passive side of the trade
        io.send_client_response(&ClientResponse {
            kind: ResponseKind::Filled,
            client_id: resting.client_id,
            ticker_id: self.ticker_id,
            client_order_id: resting.client_order_id,
            market_order_id: resting.market_order_id,
            side: resting.side,
            price: resting.price,
            qty_exec: fill_qty,
            qty_remain: resting.qty,
        });
        io.send_market_update(&MarketUpdate {
            kind: UpdateKind::Trade,
            order_id: ORDER_ID_INVALID,
            ticker_id: self.ticker_id,
            side,
            price: resting.price,
            qty: fill_qty,
            priority: PRIORITY_INVALID,
        });

        if resting.qty == 0 {
            // resting order fully consumed; the market sees it cancelled
            // with its pre-fill quantity
            io.send_market_update(&MarketUpdate {
                kind: UpdateKind::Cancel,
                order_id: resting.market_order_id,
                ticker_id: self.ticker_id,
                side: resting.side,
                price: resting.price,
                qty: resting_qty,
                priority: PRIORITY_INVALID,
            });
            self.remove_order_from_book(resting_idx);
        } else {
            io.send_market_update(&MarketUpdate {
                kind: UpdateKind::Modify,
                order_id: resting.market_order_id,
                ticker_id: self.ticker_id,
                side: resting.side,
                price: resting.price,
                qty: resting.qty,
                priority: resting.priority,
            });
        }
    }

    /// FIFO priority for a new arrival at `price`: one past the level tail,
    /// or 1 for a fresh level.
    fn next_priority(&self, price: Price) -> Priority {
        match self.price_to_level.get(&price) {
            Some(&level_idx) => {
                let head = self.levels.get(level_idx).head;
                let tail = self.orders.get(head).prev;
                self.orders.get(tail).priority + 1
            }
            None => 1,
        }
    }

    fn add_order_to_book(&mut self, order_idx: PoolIdx) {
        let order = *self.orders.get(order_idx);
        match self.price_to_level.get(&order.price) {
            None => {
                // first order at this price creates the level
                {
                    let o = self.orders.get_mut(order_idx);
                    o.prev = order_idx;
                    o.next = order_idx;
                }
                let level_idx = self.levels.alloc(PriceLevel {
                    side: order.side,
                    price: order.price,
                    head: order_idx,
                    prev: POOL_NIL,
                    next: POOL_NIL,
                });
                self.add_price_level(level_idx);
            }
            Some(&level_idx) => {
                // append at the tail of the level's FIFO
                let head = self.levels.get(level_idx).head;
                let tail = self.orders.get(head).prev;
                {
                    let o = self.orders.get_mut(order_idx);
                    o.prev = tail;
                    o.next = head;
                }
                self.orders.get_mut(tail).next = order_idx;
                self.orders.get_mut(head).prev = order_idx;
            }
        }
        self.client_orders[order.client_id as usize][order.client_order_id as usize] = order_idx;
    }

    fn remove_order_from_book(&mut self, order_idx: PoolIdx) {
        let order = *self.orders.get(order_idx);
        let level_idx = self.price_to_level[&order.price];

        if order.prev == order_idx {
            // last order at the price vacates the whole level
            self.remove_price_level(order.side, order.price);
        } else {
            self.orders.get_mut(order.prev).next = order.next;
            self.orders.get_mut(order.next).prev = order.prev;
            let level = self.levels.get_mut(level_idx);
            if level.head == order_idx {
                level.head = order.next;
            }
        }

        self.client_orders[order.client_id as usize][order.client_order_id as usize] = POOL_NIL;
        self.orders.free(order_idx);
    }

    /// Link a freshly allocated level into the sorted circular list, walking
    /// from the current best towards less aggressive prices.
    fn add_price_level(&mut self, level_idx: PoolIdx) {
        let (side, price) = {
            let level = self.levels.get(level_idx);
            (level.side, level.price)
        };
        self.price_to_level.insert(price, level_idx);

        let best = self.best(side);
        if best == POOL_NIL {
            // this side of the book was empty
            let level = self.levels.get_mut(level_idx);
            level.prev = level_idx;
            level.next = level_idx;
            self.set_best(side, level_idx);
            return;
        }

        // find the first level the newcomer outranks and insert before it;
        // a full lap means the newcomer is the least aggressive and goes at
        // the tail
        let mut target = best;
        loop {
            if self.levels.get(target).less_aggressive_than(side, price) {
                self.insert_level_before(level_idx, target);
                if target == best {
                    self.set_best(side, level_idx);
                }
                return;
            }
            target = self.levels.get(target).next;
            if target == best {
                self.insert_level_before(level_idx, best);
                return;
            }
        }
    }

    fn insert_level_before(&mut self, new_idx: PoolIdx, target: PoolIdx) {
        let target_prev = self.levels.get(target).prev;
        {
            let new = self.levels.get_mut(new_idx);
            new.prev = target_prev;
            new.next = target;
        }
        self.levels.get_mut(target_prev).next = new_idx;
        self.levels.get_mut(target).prev = new_idx;
    }

    fn remove_price_level(&mut self, side: Side, price: Price) {
        let level_idx = self
            .price_to_level
            .remove(&price)
            .expect("removing a price level that is not indexed");
        let level = *self.levels.get(level_idx);

        if level.next == level_idx {
            // sole level: this side of the book is now empty
            self.set_best(side, POOL_NIL);
        } else {
            self.levels.get_mut(level.prev).next = level.next;
            self.levels.get_mut(level.next).prev = level.prev;
            if self.best(side) == level_idx {
                self.set_best(side, level.next);
            }
        }
        self.levels.free(level_idx);
    }

    fn best(&self, side: Side) -> PoolIdx {
        match side {
            Side::Buy => self.best_bid,
            _ => self.best_ask,
        }
    }

    fn set_best(&mut self, side: Side, idx: PoolIdx) {
        match side {
            Side::Buy => self.best_bid = idx,
            _ => self.best_ask = idx,
        }
    }

    fn lookup(&self, client_id: ClientId, client_order_id: OrderId) -> PoolIdx {
        let Some(per_client) = self.client_orders.get(client_id as usize) else {
            return POOL_NIL;
        };
        match per_client.get(client_order_id as usize) {
            Some(&idx) => idx,
            None => POOL_NIL,
        }
    }

    // ---- read API (used by market data, wiring and tests) ----

    #[must_use]
    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    /// Top of book for one side: price and qty aggregated across the head
    /// level's FIFO.
    #[must_use]
    pub fn best_level(&self, side: Side) -> Option<(Price, Qty)> {
        let best = self.best(side);
        if best == POOL_NIL {
            return None;
        }
        let level = self.levels.get(best);
        let mut qty: Qty = 0;
        let head = level.head;
        let mut cursor = head;
        loop {
            let order = self.orders.get(cursor);
            qty += order.qty;
            cursor = order.next;
            if cursor == head {
                break;
            }
        }
        Some((level.price, qty))
    }

    /// Prices of one side, most aggressive first.
    #[must_use]
    pub fn prices(&self, side: Side) -> Vec<Price> {
        let best = self.best(side);
        let mut out = Vec::new();
        if best == POOL_NIL {
            return out;
        }
        let mut cursor = best;
        loop {
            let level = self.levels.get(cursor);
            out.push(level.price);
            cursor = level.next;
            if cursor == best {
                break;
            }
        }
        out
    }

    /// Orders resting at `price` in FIFO order.
    #[must_use]
    pub fn orders_at(&self, price: Price) -> Vec<OmeOrder> {
        let Some(&level_idx) = self.price_to_level.get(&price) else {
            return Vec::new();
        };
        let head = self.levels.get(level_idx).head;
        let mut out = Vec::new();
        let mut cursor = head;
        loop {
            let order = *self.orders.get(cursor);
            let next = order.next;
            out.push(order);
            cursor = next;
            if cursor == head {
                break;
            }
        }
        out
    }

    /// A client's live order, if the id is known to the book.
    #[must_use]
    pub fn order_for(&self, client_id: ClientId, client_order_id: OrderId) -> Option<OmeOrder> {
        let idx = self.lookup(client_id, client_order_id);
        if idx == POOL_NIL {
            None
        } else {
            Some(*self.orders.get(idx))
        }
    }

    /// Number of live orders in the book.
    #[must_use]
    pub fn live_orders(&self) -> usize {
        self.orders.in_use()
    }
}
