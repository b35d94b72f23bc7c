//! In-process transport over a crossbeam channel.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::{Inbound, Outbound};

/// Creates a connected pair: whatever the outbound sends, the inbound receives.
#[must_use]
pub fn memory_pair() -> (MemoryOutbound, MemoryInbound) {
    let (sender, receiver) = unbounded();
    (MemoryOutbound { sender }, MemoryInbound { receiver })
}

/// Sending half of [`memory_pair`].
#[derive(Clone, Debug)]
pub struct MemoryOutbound {
    sender: Sender<Vec<u8>>,
}

/// Receiving half of [`memory_pair`].
#[derive(Debug)]
pub struct MemoryInbound {
    receiver: Receiver<Vec<u8>>,
}

impl MemoryInbound {
    /// Takes a pending message without waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.receiver.try_recv().ok()
    }
}

impl Outbound for MemoryOutbound {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        self.sender
            .send(message.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "memory inbound dropped"))
    }
}

impl Inbound for MemoryInbound {
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "every memory outbound dropped",
            )),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}
