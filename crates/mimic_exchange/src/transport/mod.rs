//! # Transport Layer
//!
//! Unidirectional message pipes between the client and the tracker.
//!
//! ## Topology
//!
//! ```text
//!   Tracker ──push──▶ [Inbound: bind 0.0.0.0:5556]  ──▶ Listener
//!   Sender  ──push──▶ [Outbound: connect :5557]     ──▶ Tracker
//! ```
//!
//! The client binds its inbound side and connects its outbound side; the
//! tracker does the mirror image.
//!
//! ## Design
//!
//! - One call moves one whole message, never a fragment
//! - Receives are bounded by a timeout so the listener can be cancelled
//! - No delivery guarantees beyond what the socket gives

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crate::config::{ExchangeConfig, TransportKind};

pub mod memory;
pub mod tcp;
pub mod udp;

pub use memory::{memory_pair, MemoryInbound, MemoryOutbound};
pub use tcp::{TcpInbound, TcpOutbound};
pub use udp::{UdpInbound, UdpOutbound, MAX_DATAGRAM_SIZE};

/// Receiving end of a message pipe.
pub trait Inbound: Send {
    /// Waits up to `timeout` for one whole message.
    ///
    /// `Ok(None)` means nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Socket-level failures. These are transient from the listener's
    /// point of view and are retried.
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>>;

    /// Bound address, if the transport has one.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Sending end of a message pipe.
pub trait Outbound: Send {
    /// Sends one whole message.
    ///
    /// # Errors
    ///
    /// Connect or write failures.
    fn send(&mut self, message: &[u8]) -> io::Result<()>;
}

/// Binds the inbound side described by `config`.
///
/// # Errors
///
/// Bind failures.
pub fn bind_inbound(config: &ExchangeConfig) -> io::Result<Box<dyn Inbound>> {
    Ok(match config.transport {
        TransportKind::Tcp => Box::new(TcpInbound::bind(
            config.inbound.bind,
            config.max_message_bytes,
        )?),
        TransportKind::Udp => Box::new(UdpInbound::bind(config.inbound.bind)?),
    })
}

/// Creates the outbound side described by `config`.
///
/// # Errors
///
/// Socket creation failures. TCP connects on first send instead.
pub fn connect_outbound(config: &ExchangeConfig) -> io::Result<Box<dyn Outbound>> {
    Ok(match config.transport {
        TransportKind::Tcp => Box::new(TcpOutbound::new(config.outbound.connect)),
        TransportKind::Udp => Box::new(UdpOutbound::connect(config.outbound.connect)?),
    })
}
