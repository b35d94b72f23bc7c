//! # TCP Transport
//!
//! Stream sockets carrying length-prefixed messages.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────────────┬─────────────────────┐
//! │ Length (4 bytes) │ Message             │
//! │ Big-endian u32   │ (Length bytes)      │
//! └──────────────────┴─────────────────────┘
//! ```
//!
//! The prefix is framing only; the message itself keeps its native-order
//! header.
//!
//! ## Inbound
//!
//! - Any number of pushers may connect; each gets its own reassembly buffer
//! - Partial frames wait for the rest of their bytes
//! - A frame longer than the size limit closes that connection

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{Inbound, Outbound};

/// Size of the length prefix.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// First sleep after an empty poll.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Idle sleeps double up to this, about one frame at 60 Hz.
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Bytes read per syscall.
const READ_CHUNK: usize = 64 * 1024;

/// Connect timeout for the outbound side.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Longest one outbound message may take to write, across all syscalls.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Sleep interval after `current` came up empty.
fn next_poll_interval(current: Duration) -> Duration {
    (current * 2).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Writes all of `buf` or fails once `deadline` passes.
///
/// The socket write timeout is re-armed with the remaining time before
/// every syscall, so a peer that drains slowly cannot stretch the total.
fn write_all_until(stream: &mut TcpStream, mut buf: &[u8], deadline: Instant) -> io::Result<()> {
    while !buf.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "peer is not draining the connection",
            ));
        }
        stream.set_write_timeout(Some(remaining))?;
        match stream.write(buf) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// One accepted pusher.
struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
}

impl Connection {
    /// Reads everything available and queues complete frames.
    ///
    /// Returns `false` once the peer has closed.
    fn fill(
        &mut self,
        chunk: &mut [u8],
        max_message_bytes: usize,
        ready: &mut VecDeque<Vec<u8>>,
    ) -> io::Result<bool> {
        loop {
            match self.stream.read(chunk) {
                Ok(0) => {
                    self.extract(max_message_bytes, ready)?;
                    return Ok(false);
                }
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    self.extract(max_message_bytes, ready)?;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn extract(&mut self, max_message_bytes: usize, ready: &mut VecDeque<Vec<u8>>) -> io::Result<()> {
        let mut start = 0;
        while self.buffer.len() - start >= FRAME_PREFIX_SIZE {
            let mut prefix = [0u8; FRAME_PREFIX_SIZE];
            prefix.copy_from_slice(&self.buffer[start..start + FRAME_PREFIX_SIZE]);
            let len = u32::from_be_bytes(prefix) as usize;

            if len > max_message_bytes {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame of {len} bytes exceeds the {max_message_bytes} byte limit"),
                ));
            }

            let body = start + FRAME_PREFIX_SIZE;
            if self.buffer.len() - body < len {
                break;
            }
            ready.push_back(self.buffer[body..body + len].to_vec());
            start = body + len;
        }
        self.buffer.drain(..start);
        Ok(())
    }
}

/// Listening socket accepting pushers.
pub struct TcpInbound {
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: Vec<Connection>,
    ready: VecDeque<Vec<u8>>,
    max_message_bytes: usize,
    read_chunk: Vec<u8>,
}

impl TcpInbound {
    /// Binds to `addr`.
    ///
    /// # Errors
    ///
    /// Bind failures.
    pub fn bind(addr: SocketAddr, max_message_bytes: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            connections: Vec::new(),
            ready: VecDeque::new(),
            max_message_bytes,
            read_chunk: vec![0u8; READ_CHUNK],
        })
    }

    /// Number of connected pushers.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn accept_pending(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!(%peer, error = %e, "rejecting connection");
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    info!(%peer, "pusher connected");
                    self.connections.push(Connection {
                        stream,
                        peer,
                        buffer: Vec::new(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn poll_connections(&mut self) {
        let chunk = &mut self.read_chunk;
        let ready = &mut self.ready;
        let max = self.max_message_bytes;

        self.connections
            .retain_mut(|conn| match conn.fill(chunk, max, ready) {
                Ok(true) => true,
                Ok(false) => {
                    debug!(peer = %conn.peer, "pusher disconnected");
                    false
                }
                Err(e) => {
                    warn!(peer = %conn.peer, error = %e, "dropping pusher connection");
                    false
                }
            });
    }
}

impl Inbound for TcpInbound {
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut interval = MIN_POLL_INTERVAL;
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(Some(message));
            }

            self.accept_pending()?;
            self.poll_connections();

            if let Some(message) = self.ready.pop_front() {
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(interval.min(deadline - now));
            interval = next_poll_interval(interval);
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}

/// Pushing socket that connects on first use and after failures.
pub struct TcpOutbound {
    peer: SocketAddr,
    stream: Option<TcpStream>,
    frame: Vec<u8>,
}

impl TcpOutbound {
    /// Creates an unconnected sender for `peer`.
    #[must_use]
    pub const fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            stream: None,
            frame: Vec::new(),
        }
    }

    /// Whether a connection is currently open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&self.peer, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        debug!(peer = %self.peer, "outbound connected");
        Ok(stream)
    }
}

impl Outbound for TcpOutbound {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        let len = u32::try_from(message.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "message exceeds u32 length prefix")
        })?;

        self.frame.clear();
        self.frame.extend_from_slice(&len.to_be_bytes());
        self.frame.extend_from_slice(message);

        if self.stream.is_none() {
            self.stream = Some(self.connect()?);
        }

        let result = match self.stream.as_mut() {
            Some(stream) => write_all_until(stream, &self.frame, Instant::now() + WRITE_TIMEOUT),
            None => Err(io::ErrorKind::NotConnected.into()),
        };
        if result.is_err() {
            // Reconnect on the next send
            self.stream = None;
        }
        result
    }
}
