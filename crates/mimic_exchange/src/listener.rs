//! # Listener
//!
//! Background thread that pulls messages off the inbound transport,
//! decodes them and writes them into the entity store.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──spawn──▶ Running ──stop──▶ CancelRequested ──loop exits──▶ Stopped
//! ```
//!
//! ## Shutdown
//!
//! The loop re-checks the state after every bounded receive, so it
//! notices a cancel within one receive timeout. `stop` waits for the
//! thread's exit signal for at most the join timeout and never joins a
//! thread that has not signalled.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use mimic_core::EntityStore;
use mimic_protocol::decode;
use tracing::{debug, info, warn};

use crate::error::ShutdownError;
use crate::stats::{bump, ExchangeStats};
use crate::transport::Inbound;

/// Pause after a failed receive before trying again.
pub const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(20);

/// Lifecycle of the listener thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    /// Not started.
    Idle = 0,
    /// Receive loop active.
    Running = 1,
    /// Cancel requested, loop not yet exited.
    CancelRequested = 2,
    /// Loop exited and inbound transport closed.
    Stopped = 3,
}

impl ListenerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::CancelRequested,
            _ => Self::Stopped,
        }
    }
}

/// Listener state shared between the thread and its owner.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Creates a cell in `state`.
    #[must_use]
    pub const fn new(state: ListenerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// Current state.
    #[must_use]
    pub fn load(&self) -> ListenerState {
        ListenerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Sets the state.
    pub fn store(&self, state: ListenerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `from` to `to`; false if the state was not `from`.
    pub fn transition(&self, from: ListenerState, to: ListenerState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Everything the receive loop needs.
struct ReceiveLoop {
    inbound: Box<dyn Inbound>,
    store: Arc<EntityStore>,
    stats: Arc<ExchangeStats>,
    state: Arc<StateCell>,
    recv_timeout: Duration,
}

impl ReceiveLoop {
    fn run(mut self, exited: Sender<()>) {
        info!(addr = ?self.inbound.local_addr(), "listener running");

        while self.state.load() == ListenerState::Running {
            match self.inbound.recv_timeout(self.recv_timeout) {
                Ok(Some(message)) => self.handle(&message),
                Ok(None) => {}
                Err(e) => {
                    bump(&self.stats.recv_errors);
                    warn!(error = %e, "receive failed, retrying");
                    thread::sleep(RECV_ERROR_BACKOFF);
                }
            }
        }

        // Closes the transport before reporting Stopped
        drop(self.inbound);
        self.state.store(ListenerState::Stopped);
        info!("listener stopped");
        let _ = exited.send(());
    }

    fn handle(&self, message: &[u8]) {
        self.stats.record_received(message.len());

        match decode(message) {
            Ok(decoded) => {
                let applied = self.store.apply(decoded);
                if applied.is_stored() {
                    bump(&self.stats.messages_decoded);
                    debug!(?applied, "message stored");
                } else {
                    bump(&self.stats.messages_ignored);
                    debug!(?applied, "message ignored");
                }
            }
            Err(e) => {
                bump(&self.stats.messages_malformed);
                warn!(error = %e, len = message.len(), "dropping malformed message");
            }
        }
    }
}

/// Handle to a running listener thread.
pub struct Listener {
    state: Arc<StateCell>,
    handle: Option<JoinHandle<()>>,
    exited: Receiver<()>,
    join_timeout: Duration,
}

impl Listener {
    /// Spawns the receive loop on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Thread spawn failures.
    pub fn spawn(
        inbound: Box<dyn Inbound>,
        store: Arc<EntityStore>,
        stats: Arc<ExchangeStats>,
        recv_timeout: Duration,
        join_timeout: Duration,
    ) -> std::io::Result<Self> {
        let state = Arc::new(StateCell::new(ListenerState::Idle));
        let (exit_tx, exit_rx) = bounded(1);

        let receive_loop = ReceiveLoop {
            inbound,
            store,
            stats,
            state: Arc::clone(&state),
            recv_timeout,
        };

        state.store(ListenerState::Running);
        let handle = thread::Builder::new()
            .name("mimic-listener".into())
            .spawn(move || receive_loop.run(exit_tx));

        match handle {
            Ok(handle) => Ok(Self {
                state,
                handle: Some(handle),
                exited: exit_rx,
                join_timeout,
            }),
            Err(e) => {
                state.store(ListenerState::Stopped);
                Err(e)
            }
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ListenerState {
        self.state.load()
    }

    /// State cell shared with the thread, still updated after a timed-out
    /// stop.
    pub(crate) fn shared_state(&self) -> Arc<StateCell> {
        Arc::clone(&self.state)
    }

    /// Requests cancellation and waits for the thread to exit.
    ///
    /// # Errors
    ///
    /// [`ShutdownError::JoinTimeout`] if the thread does not exit within the
    /// join timeout, [`ShutdownError::ListenerPanicked`] if it panicked.
    pub fn stop(mut self) -> Result<(), ShutdownError> {
        self.state
            .transition(ListenerState::Running, ListenerState::CancelRequested);

        // A panicking thread drops its sender, which also ends the wait
        match self.exited.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?self.join_timeout, "listener did not exit in time");
                return Err(ShutdownError::JoinTimeout(self.join_timeout));
            }
        }

        match self.handle.take().map(JoinHandle::join) {
            Some(Err(_)) => {
                self.state.store(ListenerState::Stopped);
                Err(ShutdownError::ListenerPanicked)
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("state", &self.state())
            .field("join_timeout", &self.join_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{memory_pair, Outbound};
    use mimic_protocol::{encode_message, encode_rays, MessageKind, Point3, Ray};
    use std::io;
    use std::net::SocketAddr;
    use std::time::Instant;

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn spawn(inbound: Box<dyn Inbound>) -> (Listener, Arc<EntityStore>, Arc<ExchangeStats>) {
        let store = Arc::new(EntityStore::new());
        let stats = Arc::new(ExchangeStats::default());
        let listener = Listener::spawn(
            inbound,
            Arc::clone(&store),
            Arc::clone(&stats),
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .unwrap();
        (listener, store, stats)
    }

    #[test]
    fn test_malformed_then_valid() {
        let (mut tx, rx) = memory_pair();
        let (listener, store, stats) = spawn(Box::new(rx));
        assert_eq!(listener.state(), ListenerState::Running);

        tx.send(&encode_message(MessageKind::Payload, 0, &[0u8; 13]).unwrap())
            .unwrap();
        let ray = Ray::new(Point3::ZERO, Point3::new(1.0, 0.0, 0.0));
        tx.send(&encode_rays(&[ray]).unwrap()).unwrap();

        assert!(wait_for(|| stats.snapshot().messages_decoded == 1));
        assert_eq!(stats.snapshot().messages_malformed, 1);
        assert!(store.take_model_points().is_none());
        assert_eq!(*store.take_rays_if_changed().unwrap(), vec![ray]);

        listener.stop().unwrap();
    }

    #[test]
    fn test_stop_reports_stopped() {
        let (_tx, rx) = memory_pair();
        let (listener, _store, _stats) = spawn(Box::new(rx));
        let state = Arc::clone(&listener.state);

        listener.stop().unwrap();
        assert_eq!(state.load(), ListenerState::Stopped);
    }

    #[test]
    fn test_receive_errors_are_retried() {
        let (tx, rx) = memory_pair();
        drop(tx);
        let (listener, _store, stats) = spawn(Box::new(rx));

        assert!(wait_for(|| stats.snapshot().recv_errors >= 2));
        listener.stop().unwrap();
    }

    /// Inbound that ignores its timeout.
    struct Stuck;

    impl Inbound for Stuck {
        fn recv_timeout(&mut self, _timeout: Duration) -> io::Result<Option<Vec<u8>>> {
            thread::sleep(Duration::from_millis(300));
            Ok(None)
        }

        fn local_addr(&self) -> Option<SocketAddr> {
            None
        }
    }

    #[test]
    fn test_join_timeout_is_reported() {
        let store = Arc::new(EntityStore::new());
        let stats = Arc::new(ExchangeStats::default());
        let listener = Listener::spawn(
            Box::new(Stuck),
            store,
            stats,
            Duration::from_millis(10),
            Duration::from_millis(20),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(5));

        assert_eq!(
            listener.stop(),
            Err(ShutdownError::JoinTimeout(Duration::from_millis(20)))
        );
    }

    /// Inbound that panics on first use.
    struct Exploding;

    impl Inbound for Exploding {
        fn recv_timeout(&mut self, _timeout: Duration) -> io::Result<Option<Vec<u8>>> {
            panic!("inbound exploded");
        }

        fn local_addr(&self) -> Option<SocketAddr> {
            None
        }
    }

    #[test]
    fn test_panic_is_reported() {
        let store = Arc::new(EntityStore::new());
        let stats = Arc::new(ExchangeStats::default());
        let listener = Listener::spawn(
            Box::new(Exploding),
            store,
            stats,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(listener.stop(), Err(ShutdownError::ListenerPanicked));
    }
}
