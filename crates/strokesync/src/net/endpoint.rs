use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::transport::{Transport, TransportError};
use crate::codec::Payload;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Non-blocking datagram transport. Sends to one remote, receives from any.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    recv_buffer: Vec<u8>,
}

impl UdpTransport {
    pub fn connect<A: ToSocketAddrs>(local: A, remote: &str) -> Result<Self, TransportError> {
        let remote_addr = remote
            .to_socket_addrs()
            .map_err(|e| TransportError::InvalidAddress(format!("{remote}: {e}")))?
            .next()
            .ok_or_else(|| TransportError::InvalidAddress(remote.to_string()))?;

        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        log::debug!("udp transport bound on {} -> {}", local_addr, remote_addr);

        Ok(Self {
            socket,
            local_addr,
            remote_addr,
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn set_remote(&mut self, addr: SocketAddr) {
        self.remote_addr = addr;
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, payload: &Payload) -> Result<usize, TransportError> {
        let data = payload.as_bytes();
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::PayloadTooLarge {
                size: data.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(self.socket.send_to(data, self.remote_addr)?)
    }

    fn receive(&mut self) -> Result<Vec<Payload>, TransportError> {
        let mut payloads = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((0, _)) => continue,
                Ok((size, addr)) => {
                    log::trace!("{} byte datagram from {}", size, addr);
                    let data = self.recv_buffer.get(..size).unwrap_or_default();
                    payloads.push(Payload::Binary(data.to_vec()));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // An ICMP port-unreachable from an earlier send; the remote may
                // simply not be listening yet.
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(payloads)
    }

    fn close(&mut self) {
        log::debug!("udp transport on {} closed", self.local_addr);
    }

    fn describe(&self) -> String {
        format!("udp://{} (local {})", self.remote_addr, self.local_addr)
    }
}
