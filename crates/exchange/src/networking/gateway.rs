//! Order gateway server
//!
//! Accepts client TCP connections, peels framed requests, enforces the
//! per-client sequence contract, and feeds the FIFO sequencer. Responses
//! coming back from the matching engine are framed with the per-client
//! outbound sequence and written to the owning socket.

use crate::networking::sequencer::FifoSequencer;
use bus::SpscRing;
use common::wire::{WireClientRequest, WireClientResponse, CLIENT_REQUEST_SIZE};
use common::{ClientRequest, ClientResponse, Limits};
use net::{NetError, TcpServer};
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, info_span, warn};
use zerocopy::FromBytes;

/// Exchange-side order gateway worker.
pub struct OrderGatewayServer {
    server: TcpServer,
    fifo: FifoSequencer,
    rx_responses: Arc<SpscRing<ClientResponse>>,
    /// `client_id -> connection` binding, set by the first request seen.
    client_to_conn: Vec<Option<usize>>,
    /// Next sequence number to stamp on a response, per client.
    tx_n_seq: Vec<u64>,
    /// Next sequence number expected from each client.
    rx_n_seq: Vec<u64>,
    running: Arc<AtomicBool>,
}

impl OrderGatewayServer {
    pub fn new(
        addr: SocketAddrV4,
        limits: &Limits,
        tx_requests: Arc<SpscRing<ClientRequest>>,
        rx_responses: Arc<SpscRing<ClientResponse>>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, NetError> {
        Ok(Self {
            server: TcpServer::listen(addr)?,
            fifo: FifoSequencer::new(tx_requests, limits.max_pending_requests),
            rx_responses,
            client_to_conn: vec![None; limits.max_clients],
            tx_n_seq: vec![1; limits.max_clients],
            rx_n_seq: vec![1; limits.max_clients],
            running,
        })
    }

    /// Address the gateway actually listens on (port 0 resolves here).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.server.local_addr()
    }

    /// One poll iteration: read sockets, peel and vet frames, publish the
    /// sequenced batch, then push out pending responses.
    pub fn poll_once(&mut self) {
        self.server.poll();

        for conn_id in self.server.conn_ids() {
            let Some(conn) = self.server.conn_mut(conn_id) else {
                continue;
            };
            let t_rx = conn.t_rx;
            let mut consumed = 0;
            while conn.rx.len() - consumed >= CLIENT_REQUEST_SIZE {
                let frame =
                    WireClientRequest::read_from(&conn.rx[consumed..consumed + CLIENT_REQUEST_SIZE])
                        .expect("frame-sized slice");
                consumed += CLIENT_REQUEST_SIZE;
                let n_seq = frame.n_seq;
                let request = frame.unpack();
                debug!(conn_id, n_seq, %request, "rx request frame");

                let client = request.client_id as usize;
                if client >= self.client_to_conn.len() {
                    warn!(conn_id, client, "request with out-of-range client id dropped");
                    continue;
                }

                // first request from this client binds it to the socket
                if self.client_to_conn[client].is_none() {
                    self.client_to_conn[client] = Some(conn_id);
                }
                if self.client_to_conn[client] != Some(conn_id) {
                    warn!(
                        conn_id,
                        client,
                        expected_conn = ?self.client_to_conn[client],
                        "request from client on wrong socket dropped"
                    );
                    continue;
                }

                let expected = self.rx_n_seq[client];
                if n_seq != expected {
                    warn!(
                        conn_id,
                        client, expected, received = n_seq, "request sequence mismatch, dropped"
                    );
                    continue;
                }
                self.rx_n_seq[client] += 1;
                self.fifo.push(request, t_rx);
            }
            conn.rx.drain(..consumed);
        }

        // everything this batch delivered goes to the engine in rx order
        self.fifo.sequence_and_publish();

        while let Some(response) = self.rx_responses.next_read() {
            let response = *response;
            self.rx_responses.commit_read();
            let client = response.client_id as usize;
            let Some(Some(conn_id)) = self.client_to_conn.get(client).copied() else {
                warn!(client, %response, "response for unmapped client dropped");
                continue;
            };
            let n_seq = self.tx_n_seq[client];
            self.tx_n_seq[client] += 1;
            debug!(client, n_seq, %response, "tx response frame");
            let frame = WireClientResponse::pack(n_seq, &response);
            if let Some(conn) = self.server.conn_mut(conn_id) {
                conn.load_tx(zerocopy::AsBytes::as_bytes(&frame));
            }
        }

        self.server.flush();

        for gone in self.server.drain_disconnected() {
            for binding in &mut self.client_to_conn {
                if *binding == Some(gone) {
                    info!(conn_id = gone, "client connection gone, unbinding");
                    *binding = None;
                }
            }
        }
    }

    /// Spin until the running flag clears.
    pub fn run(&mut self) {
        info!("order gateway serving");
        while self.running.load(Ordering::Acquire) {
            self.poll_once();
        }
        info!("order gateway stopped");
    }

    /// Move the gateway onto its own named worker thread.
    pub fn start(mut self) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name("ogs".into())
            .spawn(move || {
                let span = info_span!("ogs");
                let _guard = span.enter();
                self.run();
            })
            .expect("failed to spawn order gateway thread")
    }
}
