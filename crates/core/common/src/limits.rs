//! Sizing limits for pools, rings and dense lookup tables
//!
//! Both processes must agree on these values: every dense array on either
//! side of the wire is sized from them at construction. They are runtime
//! values rather than compile-time constants so the test profile is the same
//! code path as production, just smaller.

use serde::{Deserialize, Serialize};

/// Capacity limits shared by the exchange and the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Trading instruments supported.
    pub max_tickers: usize,
    /// Market participants supported.
    pub max_clients: usize,
    /// Orders for a single trading instrument.
    pub max_order_ids: usize,
    /// Price levels resident per book side.
    pub max_price_levels: usize,
    /// Client requests/responses queued between gateway and matching engine.
    pub max_client_updates: usize,
    /// Market updates queued between matching engine and publisher.
    pub max_market_updates: usize,
    /// Pending requests held by the FIFO sequencer within one poll batch.
    pub max_pending_requests: usize,
}

impl Default for Limits {
    fn default() -> Self {
        const SIZE: usize = 64;
        Self {
            max_tickers: 8,
            max_clients: SIZE,
            // every book carries a dense [clients][order_ids] lookup table,
            // so this bounds per-book memory, not just id space
            max_order_ids: 64 * 1024,
            max_price_levels: 256,
            max_client_updates: SIZE * 1024,
            max_market_updates: SIZE * 1024,
            max_pending_requests: 1024,
        }
    }
}

impl Limits {
    /// Reduced profile for tests. Allocating the production tables for every
    /// unit test takes non-trivial time, so tests run the same code against
    /// smaller arenas.
    #[must_use]
    pub fn small() -> Self {
        const SIZE: usize = 16;
        Self {
            max_tickers: 8,
            max_clients: SIZE,
            max_order_ids: 1024,
            max_price_levels: SIZE,
            max_client_updates: SIZE * 1024,
            max_market_updates: SIZE * 1024,
            max_pending_requests: 1024,
        }
    }
}
