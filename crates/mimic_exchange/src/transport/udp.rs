//! # UDP Transport
//!
//! One datagram per message. Simple and connectionless, but a message is
//! capped at [`MAX_DATAGRAM_SIZE`], which rules out full-size debug frames.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use super::{Inbound, Outbound};

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Bound UDP socket receiving one message per datagram.
pub struct UdpInbound {
    /// The underlying socket.
    socket: UdpSocket,
    /// Local address.
    local_addr: SocketAddr,
    /// Receive buffer.
    recv_buffer: Vec<u8>,
    /// Timeout currently set on the socket.
    current_timeout: Option<Duration>,
}

impl UdpInbound {
    /// Binds to `addr`.
    ///
    /// # Errors
    ///
    /// Bind failures.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket,
            local_addr,
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
            current_timeout: None,
        })
    }
}

impl Inbound for UdpInbound {
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        // A zero read timeout is rejected by the OS
        let timeout = timeout.max(Duration::from_millis(1));
        if self.current_timeout != Some(timeout) {
            self.socket.set_read_timeout(Some(timeout))?;
            self.current_timeout = Some(timeout);
        }

        match self.socket.recv(&mut self.recv_buffer) {
            Ok(len) => Ok(Some(self.recv_buffer[..len].to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}

/// UDP socket connected to one peer.
pub struct UdpOutbound {
    socket: UdpSocket,
}

impl UdpOutbound {
    /// Creates a socket on an ephemeral port connected to `peer`.
    ///
    /// # Errors
    ///
    /// Bind or connect failures.
    pub fn connect(peer: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;
        Ok(Self { socket })
    }
}

impl Outbound for UdpOutbound {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        if message.len() > MAX_DATAGRAM_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "message of {} bytes exceeds the {MAX_DATAGRAM_SIZE} byte datagram limit",
                    message.len()
                ),
            ));
        }
        let sent = self.socket.send(message)?;
        if sent != message.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "datagram truncated on send",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[test]
    fn test_datagram_roundtrip() {
        let mut inbound = UdpInbound::bind(loopback()).unwrap();
        let addr = inbound.local_addr().unwrap();
        let mut outbound = UdpOutbound::connect(addr).unwrap();

        outbound.send(&[9, 8, 7]).unwrap();
        let message = inbound.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(message, Some(vec![9, 8, 7]));
    }

    #[test]
    fn test_timeout_returns_none() {
        let mut inbound = UdpInbound::bind(loopback()).unwrap();
        assert_eq!(inbound.recv_timeout(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn test_oversize_rejected() {
        let mut outbound = UdpOutbound::connect("127.0.0.1:9".parse().unwrap()).unwrap();
        let err = outbound.send(&vec![0u8; MAX_DATAGRAM_SIZE + 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
