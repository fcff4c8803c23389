//! Non-blocking TCP server and client
//!
//! Each connection keeps a receive buffer the owner peels fixed-size frames
//! from, and a transmit buffer drained opportunistically on every poll. Read
//! batches are stamped with the receive-time clock for the FIFO sequencer.

use crate::NetError;
use common::time::nanos_now;
use common::Nanos;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use tracing::{debug, warn};

const READ_CHUNK: usize = 16 * 1024;

/// One accepted gateway connection.
pub struct TcpConn {
    stream: TcpStream,
    peer: SocketAddr,
    /// Bytes received and not yet consumed by the owner.
    pub rx: Vec<u8>,
    /// Receive stamp of the most recent read batch.
    pub t_rx: Nanos,
    tx: Vec<u8>,
    alive: bool,
}

impl TcpConn {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            rx: Vec::new(),
            t_rx: 0,
            tx: Vec::new(),
            alive: true,
        }
    }

    /// Peer address, for logs.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue bytes for transmission on the next flush.
    pub fn load_tx(&mut self, bytes: &[u8]) {
        self.tx.extend_from_slice(bytes);
    }

    /// Read everything currently available; false when the peer went away.
    fn fill_rx(&mut self) -> bool {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return false,
                Ok(n) => {
                    self.rx.extend_from_slice(&chunk[..n]);
                    self.t_rx = nanos_now();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "tcp read failed");
                    return false;
                }
            }
        }
    }

    /// Write as much buffered tx data as the socket accepts right now.
    fn flush_tx(&mut self) -> bool {
        while !self.tx.is_empty() {
            match self.stream.write(&self.tx) {
                Ok(0) => return false,
                Ok(n) => {
                    self.tx.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "tcp write failed");
                    return false;
                }
            }
        }
        true
    }
}

/// Non-blocking accepting server; the order gateway's transport.
pub struct TcpServer {
    listener: TcpListener,
    conns: Vec<Option<TcpConn>>,
    disconnected: Vec<usize>,
}

impl TcpServer {
    /// Bind and listen without blocking.
    pub fn listen(addr: SocketAddrV4) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr).map_err(|source| NetError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| NetError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            conns: Vec::new(),
            disconnected: Vec::new(),
        })
    }

    /// Address the listener actually bound (port 0 resolves here).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept pending connections and read from every live socket.
    ///
    /// Connections that hung up or errored are parked in the disconnect
    /// list for the owner to reap via [`TcpServer::drain_disconnected`].
    pub fn poll(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!(%peer, error = %e, "failed to set accepted socket non-blocking");
                        continue;
                    }
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "failed to set TCP_NODELAY");
                    }
                    let conn = TcpConn::new(stream, peer);
                    let id = self.store(conn);
                    debug!(%peer, id, "accepted gateway connection");
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "tcp accept failed");
                    break;
                }
            }
        }

        for id in 0..self.conns.len() {
            if let Some(conn) = &mut self.conns[id] {
                if conn.alive && !conn.fill_rx() {
                    conn.alive = false;
                    self.disconnected.push(id);
                }
            }
        }
    }

    /// Flush every connection's pending transmit buffer.
    pub fn flush(&mut self) {
        for id in 0..self.conns.len() {
            if let Some(conn) = &mut self.conns[id] {
                if conn.alive && !conn.flush_tx() {
                    conn.alive = false;
                    self.disconnected.push(id);
                }
            }
        }
    }

    /// Ids of live connections, for frame peeling.
    #[must_use]
    pub fn conn_ids(&self) -> Vec<usize> {
        self.conns
            .iter()
            .enumerate()
            .filter_map(|(id, c)| match c {
                Some(conn) if conn.alive => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Borrow a connection by id.
    pub fn conn_mut(&mut self, id: usize) -> Option<&mut TcpConn> {
        self.conns.get_mut(id).and_then(Option::as_mut)
    }

    /// Ids that went away since the last call; their slots are released.
    pub fn drain_disconnected(&mut self) -> Vec<usize> {
        let gone = std::mem::take(&mut self.disconnected);
        for &id in &gone {
            self.conns[id] = None;
        }
        gone
    }

    fn store(&mut self, conn: TcpConn) -> usize {
        match self.conns.iter().position(Option::is_none) {
            Some(slot) => {
                self.conns[slot] = Some(conn);
                slot
            }
            None => {
                self.conns.push(Some(conn));
                self.conns.len() - 1
            }
        }
    }
}

/// Non-blocking client connection; the order gateway client's transport.
pub struct TcpClient {
    conn: TcpConn,
}

impl TcpClient {
    /// Connect (blocking, once at startup), then switch to non-blocking.
    pub fn connect(addr: SocketAddrV4) -> Result<Self, NetError> {
        let as_err = |source| NetError::Connect {
            addr: addr.to_string(),
            source,
        };
        let stream = TcpStream::connect(addr).map_err(as_err)?;
        stream.set_nonblocking(true).map_err(as_err)?;
        stream.set_nodelay(true).map_err(as_err)?;
        let peer = SocketAddr::V4(addr);
        Ok(Self {
            conn: TcpConn::new(stream, peer),
        })
    }

    /// Read available data and flush pending writes.
    ///
    /// Returns false once the connection is gone.
    pub fn poll(&mut self) -> bool {
        if !self.conn.alive {
            return false;
        }
        if !self.conn.fill_rx() || !self.conn.flush_tx() {
            self.conn.alive = false;
        }
        self.conn.alive
    }

    /// Queue bytes for transmission on the next poll.
    pub fn load_tx(&mut self, bytes: &[u8]) {
        self.conn.load_tx(bytes);
    }

    /// Received bytes awaiting frame peeling.
    pub fn rx(&mut self) -> &mut Vec<u8> {
        &mut self.conn.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn local(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)
    }

    #[test]
    fn round_trip_over_loopback() {
        let mut server = TcpServer::listen(local(0)).expect("listen");
        let addr = match server.listener.local_addr().unwrap() {
            SocketAddr::V4(a) => a,
            SocketAddr::V6(_) => unreachable!("bound v4"),
        };
        let mut client = TcpClient::connect(addr).expect("connect");

        client.load_tx(b"ping");
        // a few polls give the loopback time to move bytes
        let mut got = Vec::new();
        for _ in 0..200 {
            client.poll();
            server.poll();
            for id in server.conn_ids() {
                let conn = server.conn_mut(id).unwrap();
                if !conn.rx.is_empty() {
                    got = std::mem::take(&mut conn.rx);
                    conn.load_tx(b"pong");
                }
            }
            server.flush();
            if !client.rx().is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(got, b"ping");
        assert_eq!(client.rx().as_slice(), b"pong");
    }

    #[test]
    fn disconnect_is_reaped() {
        let mut server = TcpServer::listen(local(0)).expect("listen");
        let addr = match server.listener.local_addr().unwrap() {
            SocketAddr::V4(a) => a,
            SocketAddr::V6(_) => unreachable!("bound v4"),
        };
        let client = TcpClient::connect(addr).expect("connect");
        for _ in 0..100 {
            server.poll();
            if !server.conn_ids().is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(server.conn_ids().len(), 1);

        drop(client);
        let mut gone = Vec::new();
        for _ in 0..200 {
            server.poll();
            gone = server.drain_disconnected();
            if !gone.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(gone.len(), 1);
        assert!(server.conn_ids().is_empty());
    }
}
