//! Exchange counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated by the listener and the sender.
#[derive(Debug, Default)]
pub struct ExchangeStats {
    /// Messages pulled off the inbound transport.
    pub messages_received: AtomicU64,
    /// Bytes pulled off the inbound transport.
    pub bytes_received: AtomicU64,
    /// Messages decoded and stored.
    pub messages_decoded: AtomicU64,
    /// Messages dropped as malformed.
    pub messages_malformed: AtomicU64,
    /// Well-formed messages that carry no entity state.
    pub messages_ignored: AtomicU64,
    /// Failed receive calls.
    pub recv_errors: AtomicU64,
    /// Commands written to the outbound transport.
    pub commands_sent: AtomicU64,
    /// Commands refused because the send queue was full.
    pub commands_dropped: AtomicU64,
    /// Failed command writes.
    pub send_errors: AtomicU64,
}

/// Point-in-time copy of [`ExchangeStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages pulled off the inbound transport.
    pub messages_received: u64,
    /// Bytes pulled off the inbound transport.
    pub bytes_received: u64,
    /// Messages decoded and stored.
    pub messages_decoded: u64,
    /// Messages dropped as malformed.
    pub messages_malformed: u64,
    /// Well-formed messages that carry no entity state.
    pub messages_ignored: u64,
    /// Failed receive calls.
    pub recv_errors: u64,
    /// Commands written to the outbound transport.
    pub commands_sent: u64,
    /// Commands refused because the send queue was full.
    pub commands_dropped: u64,
    /// Failed command writes.
    pub send_errors: u64,
}

impl ExchangeStats {
    /// Counts one received message of `len` bytes.
    pub fn record_received(&self, len: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Copies the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            messages_malformed: self.messages_malformed.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
