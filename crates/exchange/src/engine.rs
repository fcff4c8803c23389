//! Order matching engine
//!
//! Single consumer of the client request ring, single producer of the
//! client response and market update rings. One order book per instrument,
//! all owned by the engine thread.

use crate::orders::OrderBook;
use bus::SpscRing;
use common::{ClientRequest, ClientResponse, Limits, MarketUpdate, RequestKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, info_span};

/// The engine's outbound rings. Books push responses and market updates
/// through this so they need no reference back into the engine.
#[derive(Clone)]
pub struct EngineIo {
    tx_responses: Arc<SpscRing<ClientResponse>>,
    tx_updates: Arc<SpscRing<MarketUpdate>>,
}

impl EngineIo {
    #[must_use]
    pub fn new(
        tx_responses: Arc<SpscRing<ClientResponse>>,
        tx_updates: Arc<SpscRing<MarketUpdate>>,
    ) -> Self {
        Self {
            tx_responses,
            tx_updates,
        }
    }

    pub fn send_client_response(&self, response: &ClientResponse) {
        debug!(%response, "tx response");
        *self.tx_responses.next_write() = *response;
        self.tx_responses.commit_write();
    }

    pub fn send_market_update(&self, update: &MarketUpdate) {
        debug!(%update, "tx update");
        *self.tx_updates.next_write() = *update;
        self.tx_updates.commit_write();
    }
}

/// Matching engine worker.
pub struct MatchingEngine {
    books: Vec<OrderBook>,
    rx_requests: Arc<SpscRing<ClientRequest>>,
    io: EngineIo,
    running: Arc<AtomicBool>,
}

impl MatchingEngine {
    #[must_use]
    pub fn new(
        limits: &Limits,
        rx_requests: Arc<SpscRing<ClientRequest>>,
        tx_responses: Arc<SpscRing<ClientResponse>>,
        tx_updates: Arc<SpscRing<MarketUpdate>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let books = (0..limits.max_tickers)
            .map(|ticker| OrderBook::new(ticker as u32, limits))
            .collect();
        Self {
            books,
            rx_requests,
            io: EngineIo::new(tx_responses, tx_updates),
            running,
        }
    }

    /// Dispatch one request to its instrument's book.
    ///
    /// # Panics
    /// Panics on a request kind the gateway should never forward; reaching
    /// the engine with one is a programming error.
    pub fn process(&mut self, request: &ClientRequest) {
        let book = &mut self.books[request.ticker_id as usize];
        match request.kind {
            RequestKind::New => book.add(
                &self.io,
                request.client_id,
                request.order_id,
                request.side,
                request.price,
                request.qty,
            ),
            RequestKind::Cancel => book.cancel(&self.io, request.client_id, request.order_id),
            RequestKind::Invalid => {
                panic!("matching engine received an invalid request: {request}")
            }
        }
    }

    /// Spin on the request ring until the running flag clears.
    pub fn run(&mut self) {
        info!("accepting client order requests");
        while self.running.load(Ordering::Acquire) {
            if let Some(request) = self.rx_requests.next_read() {
                let request = *request;
                debug!(%request, "rx request");
                self.process(&request);
                self.rx_requests.commit_read();
            }
        }
        info!("matching engine stopped");
    }

    /// Move the engine onto its own named worker thread.
    pub fn start(mut self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("ome".into())
            .spawn(move || {
                let span = info_span!("ome");
                let _guard = span.enter();
                self.run();
            })
            .expect("failed to spawn matching engine thread")
    }

    /// Direct access to a book, for wiring and tests.
    #[must_use]
    pub fn book(&self, ticker_id: u32) -> &OrderBook {
        &self.books[ticker_id as usize]
    }
}
