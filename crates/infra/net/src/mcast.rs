//! UDP multicast sender and receiver
//!
//! Market data treats the multicast channel as best-effort, ordered per
//! writer, and lossy; sequencing and recovery are the consumer's job. The
//! receiver joins its group on construction and leaves on drop, which is
//! how the consumer binds the snapshot stream only while recovering.

use crate::NetError;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use tracing::warn;

/// One-group multicast publisher.
pub struct McastSender {
    sock: UdpSocket,
    group: SocketAddrV4,
}

impl McastSender {
    /// Socket connected to `group`; sends never block.
    pub fn new(group: SocketAddrV4) -> Result<Self, NetError> {
        let as_err = |source| NetError::Connect {
            addr: group.to_string(),
            source,
        };
        let sock =
            UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).map_err(as_err)?;
        sock.set_nonblocking(true).map_err(as_err)?;
        sock.connect(group).map_err(as_err)?;
        Ok(Self { sock, group })
    }

    /// Send one datagram. A full socket buffer drops the datagram with a
    /// warning; multicast is lossy by contract and the recovery stream
    /// covers the gap.
    pub fn send(&self, frame: &[u8]) {
        match self.sock.send(frame) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                warn!(group = %self.group, "multicast send dropped: socket buffer full");
            }
            Err(e) => {
                warn!(group = %self.group, error = %e, "multicast send failed");
            }
        }
    }
}

/// Multicast subscriber; membership lasts for the lifetime of the value.
pub struct McastReceiver {
    sock: UdpSocket,
    group: Ipv4Addr,
    iface: Ipv4Addr,
}

impl McastReceiver {
    /// Bind the group port and join `group` on `iface`.
    pub fn join(group: Ipv4Addr, port: u16, iface: Ipv4Addr) -> Result<Self, NetError> {
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let sock = UdpSocket::bind(bind_addr).map_err(|source| NetError::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;
        let as_join_err = |source| NetError::Join {
            group: group.to_string(),
            source,
        };
        sock.set_nonblocking(true).map_err(as_join_err)?;
        sock.join_multicast_v4(&group, &iface).map_err(as_join_err)?;
        Ok(Self { sock, group, iface })
    }

    /// One datagram if available, `None` when the socket is dry.
    pub fn recv(&self, buf: &mut [u8]) -> Option<usize> {
        match self.sock.recv(buf) {
            Ok(n) => Some(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!(group = %self.group, error = %e, "multicast recv failed");
                None
            }
        }
    }
}

impl Drop for McastReceiver {
    fn drop(&mut self) {
        if let Err(e) = self.sock.leave_multicast_v4(&self.group, &self.iface) {
            warn!(group = %self.group, error = %e, "multicast leave failed");
        }
    }
}
