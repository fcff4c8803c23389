//! Market data publisher
//!
//! Drains the matching engine's market update ring, stamps each update with
//! the incremental stream sequence (monotone from 1), multicasts it, and
//! tees a sequenced copy to the snapshot synthesizer.

use bus::SpscRing;
use common::wire::WireMarketUpdate;
use common::{MarketUpdate, SeqMarketUpdate};
use net::McastSender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, info_span};
use zerocopy::AsBytes;

/// Incremental stream publisher worker.
pub struct MarketDataPublisher {
    rx_updates: Arc<SpscRing<MarketUpdate>>,
    tx_snapshot_feed: Arc<SpscRing<SeqMarketUpdate>>,
    socket: McastSender,
    n_seq_next: u64,
    running: Arc<AtomicBool>,
}

impl MarketDataPublisher {
    #[must_use]
    pub fn new(
        rx_updates: Arc<SpscRing<MarketUpdate>>,
        tx_snapshot_feed: Arc<SpscRing<SeqMarketUpdate>>,
        socket: McastSender,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rx_updates,
            tx_snapshot_feed,
            socket,
            n_seq_next: 1,
            running,
        }
    }

    /// Publish everything currently queued by the matching engine.
    pub fn drain(&mut self) {
        while let Some(update) = self.rx_updates.next_read() {
            let update = *update;
            self.rx_updates.commit_read();

            debug!(n_seq = self.n_seq_next, %update, "tx incremental");
            let frame = WireMarketUpdate::pack(self.n_seq_next, &update);
            self.socket.send(frame.as_bytes());

            // the synthesizer sees the same sequenced stream the wire does
            *self.tx_snapshot_feed.next_write() = SeqMarketUpdate {
                n_seq: self.n_seq_next,
                update,
            };
            self.tx_snapshot_feed.commit_write();

            self.n_seq_next += 1;
        }
    }

    /// Spin until the running flag clears.
    pub fn run(&mut self) {
        info!("market data publisher running");
        while self.running.load(Ordering::Acquire) {
            self.drain();
        }
        info!("market data publisher stopped");
    }

    /// Move the publisher onto its own named worker thread.
    pub fn start(mut self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("mdp".into())
            .spawn(move || {
                let span = info_span!("mdp");
                let _guard = span.enter();
                self.run();
            })
            .expect("failed to spawn market data publisher thread")
    }
}
