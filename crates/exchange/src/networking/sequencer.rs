//! FIFO sequencer
//!
//! Client requests arrive over many TCP sockets within one gateway poll
//! batch. The sequencer totally orders that batch by receive timestamp
//! before anything reaches the matching engine, so cross-client ordering is
//! arrival order rather than socket iteration order.

use bus::SpscRing;
use common::{ClientRequest, Nanos};
use std::sync::Arc;
use tracing::debug;

struct PendingRequest {
    t_rx: Nanos,
    request: ClientRequest,
}

/// Batch sequencer feeding the matching engine's inbound ring.
pub struct FifoSequencer {
    tx_requests: Arc<SpscRing<ClientRequest>>,
    pending: Vec<PendingRequest>,
    capacity: usize,
}

impl FifoSequencer {
    #[must_use]
    pub fn new(tx_requests: Arc<SpscRing<ClientRequest>>, capacity: usize) -> Self {
        Self {
            tx_requests,
            pending: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue one request with its receive stamp.
    ///
    /// # Panics
    /// Panics when the batch exceeds the configured capacity; the gateway's
    /// poll loop must publish before that many requests accumulate.
    pub fn push(&mut self, request: ClientRequest, t_rx: Nanos) {
        assert!(
            self.pending.len() < self.capacity,
            "FifoSequencer overflow: {} pending requests",
            self.pending.len()
        );
        self.pending.push(PendingRequest { t_rx, request });
    }

    /// Sort the batch by receive time and forward it in order. Called
    /// exactly once per gateway poll iteration.
    pub fn sequence_and_publish(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        debug!(pending = self.pending.len(), "sequencing batch");
        self.pending.sort_by_key(|p| p.t_rx);
        for p in &self.pending {
            debug!(request = %p.request, t_rx = p.t_rx, "sequenced");
            *self.tx_requests.next_write() = p.request;
            self.tx_requests.commit_write();
        }
        self.pending.clear();
    }

    /// Requests waiting in the current batch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
