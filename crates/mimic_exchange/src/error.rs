//! # Exchange Error Types
//!
//! Everything that can go wrong outside of decoding. Malformed inbound
//! messages are not errors at this level; the listener counts and drops
//! them.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use mimic_protocol::EncodeError;
use thiserror::Error;

/// Errors surfaced by the exchange.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Bind, connect, send or spawn failure.
    #[error("transport error while {context}: {source}")]
    Transport {
        /// What the exchange was doing.
        context: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Listener or writer thread could not be shut down cleanly.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// Command could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Outbound writer is behind; the command was dropped.
    #[error("send queue full ({capacity} commands pending)")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },

    /// A stopped exchange cannot be started again.
    #[error("exchange already stopped")]
    AlreadyStopped,

    /// Operation needs a running exchange, or its sender was closed.
    #[error("exchange not running")]
    NotRunning,
}

impl ExchangeError {
    /// Wraps an I/O error with what was being attempted.
    #[must_use]
    pub fn transport(context: &'static str, source: io::Error) -> Self {
        Self::Transport { context, source }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Shutdown failures of the background threads.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownError {
    /// Listener thread did not exit within the join timeout.
    #[error("listener thread did not exit within {0:?}")]
    JoinTimeout(Duration),

    /// Listener thread panicked.
    #[error("listener thread panicked")]
    ListenerPanicked,

    /// Outbound writer did not flush its queue within the timeout.
    #[error("outbound writer did not exit within {0:?}")]
    WriterTimeout(Duration),

    /// Outbound writer thread panicked.
    #[error("outbound writer thread panicked")]
    WriterPanicked,
}

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
