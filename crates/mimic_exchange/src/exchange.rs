//! # Exchange
//!
//! Facade over the entity store, the listener thread and the command
//! sender, with an explicit lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! new ──start──▶ Running ──stop──▶ Stopped
//!       (binds inbound,     (closes the sender, cancels and
//!        opens outbound,     joins the listener, both
//!        spawns threads)     transports released)
//! ```
//!
//! `start` is idempotent while running. `stop` is single-shot: once it
//! has run, the exchange cannot be started again, and senders handed out
//! by [`Exchange::sender`] refuse further commands.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let exchange = Arc::new(Exchange::new(ExchangeConfig::default()));
//! exchange.start()?;
//!
//! // Frame loop
//! if let Some(rays) = exchange.take_rays_if_changed() {
//!     upload(&rays);
//! }
//! for (camera_id, pose) in exchange.drain_cameras() {
//!     place_camera(camera_id, pose);
//! }
//! exchange.send_command(CommandKind::EstimatePose, &[])?;
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use mimic_core::EntityStore;
use mimic_protocol::{CommandKind, DebugFrame, Mat4x4, ModelPoints, Point3, Ray};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, ExchangeResult};
use crate::listener::{Listener, ListenerState, StateCell};
use crate::sender::CommandSender;
use crate::stats::{ExchangeStats, StatsSnapshot};
use crate::transport::{bind_inbound, connect_outbound, Inbound, Outbound};

enum Lifecycle {
    Idle {
        transports: Option<(Box<dyn Inbound>, Box<dyn Outbound>)>,
    },
    Running {
        listener: Listener,
        sender: Arc<CommandSender>,
        inbound_addr: Option<SocketAddr>,
    },
    Stopped {
        /// Listener state at stop; the thread may still be winding down.
        listener: Option<Arc<StateCell>>,
    },
}

/// Message exchange with the tracking system.
///
/// Share it as `Arc<Exchange>`; every method takes `&self`.
pub struct Exchange {
    config: ExchangeConfig,
    store: Arc<EntityStore>,
    stats: Arc<ExchangeStats>,
    lifecycle: Mutex<Lifecycle>,
}

impl Exchange {
    /// Creates an exchange that opens the transports named in `config`
    /// on [`Exchange::start`].
    #[must_use]
    pub fn new(config: ExchangeConfig) -> Self {
        Self::with_lifecycle(config, Lifecycle::Idle { transports: None })
    }

    /// Creates an exchange over already-open transports.
    #[must_use]
    pub fn with_transports(
        config: ExchangeConfig,
        inbound: Box<dyn Inbound>,
        outbound: Box<dyn Outbound>,
    ) -> Self {
        Self::with_lifecycle(
            config,
            Lifecycle::Idle {
                transports: Some((inbound, outbound)),
            },
        )
    }

    fn with_lifecycle(config: ExchangeConfig, lifecycle: Lifecycle) -> Self {
        Self {
            config,
            store: Arc::new(EntityStore::new()),
            stats: Arc::new(ExchangeStats::default()),
            lifecycle: Mutex::new(lifecycle),
        }
    }

    /// Binds inbound, opens outbound and spawns the listener.
    ///
    /// Does nothing if already running.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::Config`] for invalid settings,
    /// [`ExchangeError::Transport`] for bind, connect or spawn failures,
    /// [`ExchangeError::AlreadyStopped`] after [`Exchange::stop`].
    pub fn start(&self) -> ExchangeResult<()> {
        let mut lifecycle = self.lifecycle.lock();

        match &*lifecycle {
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Stopped { .. } => return Err(ExchangeError::AlreadyStopped),
            Lifecycle::Idle { .. } => {}
        }

        self.config.validate()?;

        let transports = match &mut *lifecycle {
            Lifecycle::Idle { transports } => transports.take(),
            _ => None,
        };

        let (inbound, outbound) = match transports {
            Some(pair) => pair,
            None => (
                bind_inbound(&self.config)
                    .map_err(|e| ExchangeError::transport("binding inbound", e))?,
                connect_outbound(&self.config)
                    .map_err(|e| ExchangeError::transport("opening outbound", e))?,
            ),
        };

        let sender = CommandSender::spawn(
            outbound,
            Arc::clone(&self.stats),
            self.config.send_queue_capacity,
            self.config.join_timeout(),
        )
        .map_err(|e| ExchangeError::transport("spawning outbound writer", e))?;

        let inbound_addr = inbound.local_addr();
        let listener = match Listener::spawn(
            inbound,
            Arc::clone(&self.store),
            Arc::clone(&self.stats),
            self.config.recv_timeout(),
            self.config.join_timeout(),
        ) {
            Ok(listener) => listener,
            Err(e) => {
                if let Err(close) = sender.close() {
                    warn!(error = %close, "outbound writer shutdown failed");
                }
                return Err(ExchangeError::transport("spawning listener", e));
            }
        };

        for &kind in &self.config.startup_commands {
            if let Err(e) = sender.send_empty(kind) {
                warn!(%kind, error = %e, "startup command not sent");
            }
        }

        info!(
            transport = ?self.config.transport,
            inbound = ?inbound_addr,
            outbound = %self.config.outbound.connect,
            "exchange started"
        );

        *lifecycle = Lifecycle::Running {
            listener,
            sender: Arc::new(sender),
            inbound_addr,
        };
        Ok(())
    }

    /// Closes the sender, stops the listener and releases both
    /// transports.
    ///
    /// Calling it again, or on a never-started exchange, is a no-op.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::Shutdown`] if a background thread could not be
    /// joined; the listener's failure wins if both fail. The exchange is
    /// stopped either way.
    pub fn stop(&self) -> ExchangeResult<()> {
        let previous = {
            let mut lifecycle = self.lifecycle.lock();
            let listener = match &*lifecycle {
                Lifecycle::Stopped { .. } => return Ok(()),
                Lifecycle::Running { listener, .. } => Some(listener.shared_state()),
                Lifecycle::Idle { .. } => None,
            };
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped { listener })
        };

        match previous {
            Lifecycle::Running {
                listener, sender, ..
            } => {
                let sender_result = sender.close();
                let listener_result = listener.stop();
                info!(stats = ?self.stats.snapshot(), "exchange stopped");
                listener_result.and(sender_result).map_err(ExchangeError::from)
            }
            Lifecycle::Idle { .. } | Lifecycle::Stopped { .. } => Ok(()),
        }
    }

    /// Listener state; `Idle` before start.
    ///
    /// After a stop whose join timed out this stays `CancelRequested`
    /// until the detached thread actually exits.
    #[must_use]
    pub fn state(&self) -> ListenerState {
        match &*self.lifecycle.lock() {
            Lifecycle::Idle { .. } => ListenerState::Idle,
            Lifecycle::Running { listener, .. } => listener.state(),
            Lifecycle::Stopped {
                listener: Some(state),
            } => state.load(),
            Lifecycle::Stopped { listener: None } => ListenerState::Stopped,
        }
    }

    /// Whether the listener is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    /// Bound inbound address while running.
    #[must_use]
    pub fn inbound_addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle.lock() {
            Lifecycle::Running { inbound_addr, .. } => *inbound_addr,
            _ => None,
        }
    }

    /// Configuration this exchange was created with.
    #[must_use]
    pub const fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// The entity store.
    #[must_use]
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Command sender while running.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::NotRunning`] before start or after stop.
    pub fn sender(&self) -> ExchangeResult<Arc<CommandSender>> {
        match &*self.lifecycle.lock() {
            Lifecycle::Running { sender, .. } => Ok(Arc::clone(sender)),
            _ => Err(ExchangeError::NotRunning),
        }
    }

    /// Sends a command with an opaque payload.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::NotRunning`], or whatever the sender reports.
    pub fn send_command(&self, kind: CommandKind, payload: &[u8]) -> ExchangeResult<()> {
        // Lifecycle lock released before the send
        let sender = self.sender()?;
        sender.send(kind, payload)
    }

    /// Model points if they changed since the last take.
    pub fn take_model_points(&self) -> Option<ModelPoints> {
        self.store.take_model_points()
    }

    /// Ray batch snapshot if it changed since the last take.
    pub fn take_rays_if_changed(&self) -> Option<Arc<Vec<Ray>>> {
        self.store.take_rays_if_changed()
    }

    /// Intersections if they changed since the last take.
    pub fn take_intersections_if_changed(&self) -> Option<Vec<Point3>> {
        self.store.take_intersections_if_changed()
    }

    /// Pending debug frame of `spotter_id`.
    pub fn take_debug_frame(&self, spotter_id: u8) -> Option<DebugFrame> {
        self.store.take_debug_frame(spotter_id)
    }

    /// Every pending camera pose.
    pub fn drain_cameras(&self) -> HashMap<u8, Mat4x4> {
        self.store.drain_cameras()
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "exchange shutdown on drop failed");
        }
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
