//! Client-side replica order book
//!
//! Rebuilt purely from the sequenced market data stream; by the time an
//! update reaches the book the consumer has already ordered it, so no
//! sequence checking happens here. After every mutation the affected
//! side(s) of the BBO are recomputed from the head level.

use crate::orders::order::{TeLevel, TeOrder};
use bus::{Pool, PoolIdx, POOL_NIL};
use common::{
    Bbo, Limits, MarketUpdate, Price, Qty, Side, TickerId, UpdateKind, PRICE_INVALID, QTY_INVALID,
};
use rustc_hash::FxHashMap;

/// Replica book for one instrument.
pub struct ReplicaBook {
    ticker_id: TickerId,
    orders: Pool<TeOrder>,
    levels: Pool<TeLevel>,
    best_bid: PoolIdx,
    best_ask: PoolIdx,
    price_to_level: FxHashMap<Price, PoolIdx>,
    /// `market_order_id -> order`, direct-address.
    oid_to_order: Vec<PoolIdx>,
    bbo: Bbo,
}

impl ReplicaBook {
    #[must_use]
    pub fn new(ticker_id: TickerId, limits: &Limits) -> Self {
        Self {
            ticker_id,
            orders: Pool::new(limits.max_order_ids),
            levels: Pool::new(limits.max_price_levels),
            best_bid: POOL_NIL,
            best_ask: POOL_NIL,
            price_to_level: FxHashMap::default(),
            oid_to_order: vec![POOL_NIL; limits.max_order_ids],
            bbo: Bbo::default(),
        }
    }

    /// Apply one book-mutating update. Returns true when the BBO changed.
    ///
    /// TRADE and the snapshot sentinels never reach this method; the engine
    /// routes trades straight to the strategy.
    ///
    /// # Panics
    /// Panics on a MODIFY or CANCEL for an unknown order id; the consumer
    /// guarantees a gapless stream, so that is a programming error.
    pub fn apply(&mut self, update: &MarketUpdate) -> bool {
        // decide up front which sides of the top of book this can touch
        let bid_affected = update.side == Side::Buy
            && (self.best_bid == POOL_NIL
                || update.price >= self.levels.get(self.best_bid).price);
        let ask_affected = update.side == Side::Sell
            && (self.best_ask == POOL_NIL
                || update.price <= self.levels.get(self.best_ask).price);

        match update.kind {
            UpdateKind::Add => {
                let order_idx = self.orders.alloc(TeOrder {
                    order_id: update.order_id,
                    side: update.side,
                    price: update.price,
                    qty: update.qty,
                    priority: update.priority,
                    prev: POOL_NIL,
                    next: POOL_NIL,
                });
                self.add_order(order_idx);
            }
            UpdateKind::Modify => {
                let idx = self.oid_to_order[update.order_id as usize];
                assert!(idx != POOL_NIL, "replica MODIFY for unknown order: {update}");
                self.orders.get_mut(idx).qty = update.qty;
            }
            UpdateKind::Cancel => {
                let idx = self.oid_to_order[update.order_id as usize];
                assert!(idx != POOL_NIL, "replica CANCEL for unknown order: {update}");
                self.remove_order(idx);
            }
            UpdateKind::Clear => {
                self.clear();
                // both sides are gone; recompute both
                self.update_bbo(true, true);
                return true;
            }
            UpdateKind::Trade
            | UpdateKind::SnapshotStart
            | UpdateKind::SnapshotEnd
            | UpdateKind::Invalid => return false,
        }

        self.update_bbo(bid_affected, ask_affected);
        bid_affected || ask_affected
    }

    /// Drop every order and level; the book is about to be rebuilt from a
    /// snapshot.
    fn clear(&mut self) {
        for slot in &mut self.oid_to_order {
            if *slot != POOL_NIL {
                self.orders.free(*slot);
                *slot = POOL_NIL;
            }
        }
        let level_handles: Vec<PoolIdx> = self.price_to_level.values().copied().collect();
        for idx in level_handles {
            self.levels.free(idx);
        }
        self.price_to_level.clear();
        self.best_bid = POOL_NIL;
        self.best_ask = POOL_NIL;
    }

    fn update_bbo(&mut self, update_bid: bool, update_ask: bool) {
        if update_bid {
            if self.best_bid == POOL_NIL {
                self.bbo.bid = PRICE_INVALID;
                self.bbo.bid_qty = QTY_INVALID;
            } else {
                let (price, qty) = self.level_price_qty(self.best_bid);
                self.bbo.bid = price;
                self.bbo.bid_qty = qty;
            }
        }
        if update_ask {
            if self.best_ask == POOL_NIL {
                self.bbo.ask = PRICE_INVALID;
                self.bbo.ask_qty = QTY_INVALID;
            } else {
                let (price, qty) = self.level_price_qty(self.best_ask);
                self.bbo.ask = price;
                self.bbo.ask_qty = qty;
            }
        }
    }

    fn level_price_qty(&self, level_idx: PoolIdx) -> (Price, Qty) {
        let level = self.levels.get(level_idx);
        let head = level.head;
        let mut qty: Qty = 0;
        let mut cursor = head;
        loop {
            let order = self.orders.get(cursor);
            qty += order.qty;
            cursor = order.next;
            if cursor == head {
                break;
            }
        }
        (level.price, qty)
    }

    fn add_order(&mut self, order_idx: PoolIdx) {
        let order = *self.orders.get(order_idx);
        match self.price_to_level.get(&order.price) {
            None => {
                {
                    let o = self.orders.get_mut(order_idx);
                    o.prev = order_idx;
                    o.next = order_idx;
                }
                let level_idx = self.levels.alloc(TeLevel {
                    side: order.side,
                    price: order.price,
                    head: order_idx,
                    prev: POOL_NIL,
                    next: POOL_NIL,
                });
                self.add_price_level(level_idx);
            }
            Some(&level_idx) => {
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
        self.oid_to_order[order.order_id as usize] = order_idx;
    }

    fn remove_order(&mut self, order_idx: PoolIdx) {
        let order = *self.orders.get(order_idx);
        let level_idx = self.price_to_level[&order.price];

        if order.prev == order_idx {
            self.remove_price_level(order.side, order.price);
        } else {
            self.orders.get_mut(order.prev).next = order.next;
            self.orders.get_mut(order.next).prev = order.prev;
            let level = self.levels.get_mut(level_idx);
            if level.head == order_idx {
                level.head = order.next;
            }
        }

        self.oid_to_order[order.order_id as usize] = POOL_NIL;
        self.orders.free(order_idx);
    }

    fn add_price_level(&mut self, level_idx: PoolIdx) {
        let (side, price) = {
            let level = self.levels.get(level_idx);
            (level.side, level.price)
        };
        self.price_to_level.insert(price, level_idx);

        let best = self.best(side);
        if best == POOL_NIL {
            let level = self.levels.get_mut(level_idx);
            level.prev = level_idx;
            level.next = level_idx;
            self.set_best(side, level_idx);
            return;
        }

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

    // ---- read API ----

    #[must_use]
    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    /// Current top of book.
    #[must_use]
    pub fn bbo(&self) -> &Bbo {
        &self.bbo
    }

    /// A live order by market order id.
    #[must_use]
    pub fn order(&self, order_id: u64) -> Option<TeOrder> {
        let idx = self.oid_to_order[order_id as usize];
        if idx == POOL_NIL {
            None
        } else {
            Some(*self.orders.get(idx))
        }
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

    /// Orders at `price` in FIFO order.
    #[must_use]
    pub fn orders_at(&self, price: Price) -> Vec<TeOrder> {
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

    /// Number of live orders.
    #[must_use]
    pub fn live_orders(&self) -> usize {
        self.orders.in_use()
    }
}
