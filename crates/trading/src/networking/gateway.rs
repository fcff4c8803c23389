//! Order gateway client
//!
//! One TCP connection to the exchange. Outbound requests are framed with
//! this client's monotone sequence; inbound responses are validated against
//! the expected response sequence and this client's id before they reach
//! the trading engine.

use bus::SpscRing;
use common::wire::{WireClientRequest, WireClientResponse, CLIENT_RESPONSE_SIZE};
use common::{ClientId, ClientRequest, ClientResponse};
use net::{NetError, TcpClient};
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, info_span, warn};
use zerocopy::{AsBytes, FromBytes};

/// Client-side order gateway worker.
pub struct OrderGatewayClient {
    client_id: ClientId,
    tcp: TcpClient,
    /// Requests from the trading engine, to be framed and sent.
    rx_requests: Arc<SpscRing<ClientRequest>>,
    /// Responses towards the trading engine.
    tx_responses: Arc<SpscRing<ClientResponse>>,
    /// Sequence stamped on the next outgoing request.
    n_seq_tx_next: u64,
    /// Sequence expected on the next incoming response.
    n_seq_rx_next: u64,
    running: Arc<AtomicBool>,
}

impl OrderGatewayClient {
    pub fn connect(
        client_id: ClientId,
        addr: SocketAddrV4,
        rx_requests: Arc<SpscRing<ClientRequest>>,
        tx_responses: Arc<SpscRing<ClientResponse>>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, NetError> {
        Ok(Self {
            client_id,
            tcp: TcpClient::connect(addr)?,
            rx_requests,
            tx_responses,
            n_seq_tx_next: 1,
            n_seq_rx_next: 1,
            running,
        })
    }

    /// One poll iteration: receive/validate responses, then frame and send
    /// queued requests.
    pub fn poll_once(&mut self) {
        if !self.tcp.poll() {
            warn!("gateway connection lost");
            self.running.store(false, Ordering::Release);
            return;
        }

        let rx = self.tcp.rx();
        let mut consumed = 0;
        let mut responses = Vec::new();
        while rx.len() - consumed >= CLIENT_RESPONSE_SIZE {
            let frame =
                WireClientResponse::read_from(&rx[consumed..consumed + CLIENT_RESPONSE_SIZE])
                    .expect("frame-sized slice");
            consumed += CLIENT_RESPONSE_SIZE;
            responses.push((frame.n_seq, frame.unpack()));
        }
        rx.drain(..consumed);

        for (n_seq, response) in responses {
            debug!(n_seq, %response, "rx response frame");
            if response.client_id != self.client_id {
                warn!(
                    expected = self.client_id,
                    received = response.client_id,
                    "response for wrong client id dropped"
                );
                continue;
            }
            if n_seq != self.n_seq_rx_next {
                warn!(
                    expected = self.n_seq_rx_next,
                    received = n_seq,
                    "response sequence mismatch, dropped"
                );
                continue;
            }
            self.n_seq_rx_next += 1;
            *self.tx_responses.next_write() = response;
            self.tx_responses.commit_write();
        }

        while let Some(request) = self.rx_requests.next_read() {
            let request = *request;
            self.rx_requests.commit_read();
            debug!(n_seq = self.n_seq_tx_next, %request, "tx request frame");
            let frame = WireClientRequest::pack(self.n_seq_tx_next, &request);
            self.n_seq_tx_next += 1;
            self.tcp.load_tx(frame.as_bytes());
        }
    }

    /// Spin until the running flag clears.
    pub fn run(&mut self) {
        info!(client_id = self.client_id, "order gateway client running");
        while self.running.load(Ordering::Acquire) {
            self.poll_once();
        }
        info!("order gateway client stopped");
    }

    /// Move the gateway client onto its own named worker thread.
    pub fn start(mut self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("ogc".into())
            .spawn(move || {
                let span = info_span!("ogc");
                let _guard = span.enter();
                self.run();
            })
            .expect("failed to spawn order gateway client thread")
    }
}
