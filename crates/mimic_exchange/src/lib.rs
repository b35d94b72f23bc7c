//! # MIMIC Exchange - The Tracker Link
//!
//! Connects the visualization client to the tracking system: pulls
//! decoded state into the entity store on a background thread and pushes
//! control commands back.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌─────────────┐
//! │ Tracker  │ ──▶ │ Inbound  │ ──▶ │ Listener │ ──▶ │ EntityStore │ ──▶ Frame loop
//! └──────────┘     └──────────┘     │ (decode) │     └─────────────┘
//!      ▲                            └──────────┘
//!      │           ┌──────────┐     ┌──────────────┐     ┌───────────────┐
//!      └────────── │ Outbound │ ◀── │ mimic-sender │ ◀── │ CommandSender │ ◀── UI
//!                  └──────────┘     │   (queue)    │     └───────────────┘
//!                                   └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Neither store reads nor command sends block on the network
//! - A malformed message is dropped and counted, never stored
//! - Shutdown finishes within the configured join timeout or reports why not
//!
//! ## Example
//!
//! ```rust,ignore
//! use mimic_exchange::{Exchange, ExchangeConfig};
//!
//! let exchange = Exchange::new(ExchangeConfig::from_file("mimic.toml")?);
//! exchange.start()?;
//! exchange.sender()?.start_debugging()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod exchange;
pub mod listener;
pub mod sender;
pub mod stats;
pub mod transport;

pub use config::{ExchangeConfig, InboundConfig, OutboundConfig, TransportKind};
pub use error::{ConfigError, ExchangeError, ExchangeResult, ShutdownError};
pub use exchange::Exchange;
pub use listener::{Listener, ListenerState};
pub use sender::CommandSender;
pub use stats::{ExchangeStats, StatsSnapshot};
pub use transport::{Inbound, Outbound};

/// Installs the `tracing` subscriber used by the binaries.
///
/// `RUST_LOG` overrides `default_directive`.
pub fn init_logging(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
