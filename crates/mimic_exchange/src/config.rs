//! # Exchange Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an
//! empty file (or no file) yields the standard deployment:
//!
//! ```toml
//! transport = "tcp"
//! recv_timeout_ms = 50
//! join_timeout_ms = 2000
//! max_message_bytes = 16777216
//! send_queue_capacity = 64
//! startup_commands = []
//!
//! [inbound]
//! bind = "0.0.0.0:5556"
//!
//! [outbound]
//! connect = "127.0.0.1:5557"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use mimic_protocol::CommandKind;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default inbound (pull) endpoint.
pub const DEFAULT_INBOUND_BIND: &str = "0.0.0.0:5556";

/// Default outbound (push) endpoint.
pub const DEFAULT_OUTBOUND_CONNECT: &str = "127.0.0.1:5557";

/// Largest message the inbound side accepts by default (16 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Commands that may wait for the outbound writer by default.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 64;

/// Socket flavor used for both directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Length-prefixed frames over TCP.
    #[default]
    Tcp,
    /// One datagram per message.
    Udp,
}

/// Inbound (pull) side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Address to bind, all interfaces by default.
    pub bind: SocketAddr,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5556)),
        }
    }
}

/// Outbound (push) side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Address of the tracker's command endpoint.
    pub connect: SocketAddr,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            connect: SocketAddr::from(([127, 0, 0, 1], 5557)),
        }
    }
}

/// Exchange configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Transport for both directions.
    pub transport: TransportKind,
    /// Inbound endpoint.
    pub inbound: InboundConfig,
    /// Outbound endpoint.
    pub outbound: OutboundConfig,
    /// Longest the listener blocks in one receive call (ms).
    pub recv_timeout_ms: u64,
    /// Longest `stop` waits for the listener thread (ms).
    pub join_timeout_ms: u64,
    /// Largest accepted inbound message in bytes.
    pub max_message_bytes: usize,
    /// Commands queued for the outbound writer before sends are refused.
    pub send_queue_capacity: usize,
    /// Payload-less commands sent right after start, in order.
    pub startup_commands: Vec<CommandKind>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            inbound: InboundConfig::default(),
            outbound: OutboundConfig::default(),
            recv_timeout_ms: 50,
            join_timeout_ms: 2000,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            startup_commands: Vec::new(),
        }
    }
}

impl ExchangeConfig {
    /// Loads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for zero timeouts or limits, or more startup
    /// commands than the send queue holds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recv_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "recv_timeout_ms must be positive, a zero timeout would block forever".into(),
            ));
        }
        if self.join_timeout_ms == 0 {
            return Err(ConfigError::Invalid("join_timeout_ms must be positive".into()));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid("max_message_bytes must be positive".into()));
        }
        if self.send_queue_capacity == 0 {
            return Err(ConfigError::Invalid("send_queue_capacity must be positive".into()));
        }
        if self.startup_commands.len() > self.send_queue_capacity {
            return Err(ConfigError::Invalid(format!(
                "{} startup commands do not fit a send queue of {}",
                self.startup_commands.len(),
                self.send_queue_capacity
            )));
        }
        if self.join_timeout_ms <= self.recv_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "join_timeout_ms ({}) must exceed recv_timeout_ms ({})",
                self.join_timeout_ms, self.recv_timeout_ms
            )));
        }
        Ok(())
    }

    /// Config for tests and local runs: loopback on ephemeral ports.
    #[must_use]
    pub fn loopback(transport: TransportKind) -> Self {
        Self {
            transport,
            inbound: InboundConfig {
                bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            },
            ..Self::default()
        }
    }

    /// Sets the transport.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the inbound bind address.
    #[must_use]
    pub fn with_inbound(mut self, bind: SocketAddr) -> Self {
        self.inbound.bind = bind;
        self
    }

    /// Sets the outbound connect address.
    #[must_use]
    pub fn with_outbound(mut self, connect: SocketAddr) -> Self {
        self.outbound.connect = connect;
        self
    }

    /// Receive timeout as a duration.
    #[must_use]
    pub const fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Join timeout as a duration.
    #[must_use]
    pub const fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ExchangeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ExchangeConfig::default());
        assert_eq!(config.inbound.bind.to_string(), DEFAULT_INBOUND_BIND);
        assert_eq!(config.outbound.connect.to_string(), DEFAULT_OUTBOUND_CONNECT);
        assert_eq!(config.transport, TransportKind::Tcp);
    }

    #[test]
    fn test_partial_override() {
        let config = ExchangeConfig::from_toml_str(
            r#"
            transport = "udp"
            recv_timeout_ms = 20

            [outbound]
            connect = "10.0.0.2:6000"
            "#,
        )
        .unwrap();

        assert_eq!(config.transport, TransportKind::Udp);
        assert_eq!(config.recv_timeout(), Duration::from_millis(20));
        assert_eq!(config.outbound.connect, "10.0.0.2:6000".parse().unwrap());
        assert_eq!(config.inbound, InboundConfig::default());
    }

    #[test]
    fn test_startup_commands_by_name() {
        let config = ExchangeConfig::from_toml_str(
            r#"startup_commands = ["start_debugging", "send_grayscale"]"#,
        )
        .unwrap();
        assert_eq!(
            config.startup_commands,
            vec![CommandKind::StartDebugging, CommandKind::SendGrayscale]
        );

        let err = ExchangeConfig::from_toml_str(r#"startup_commands = ["warp_drive"]"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_send_queue_limits() {
        let err = ExchangeConfig::from_toml_str("send_queue_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ExchangeConfig::from_toml_str(
            "send_queue_capacity = 1\nstartup_commands = [\"grab_frame\", \"match_model\"]",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ExchangeConfig::from_toml_str("recv_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_join_must_outlast_receive() {
        let err = ExchangeConfig::from_toml_str("recv_timeout_ms = 500\njoin_timeout_ms = 100")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = ExchangeConfig::from_toml_str("transport = \"zmq\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ExchangeConfig::from_file("/nonexistent/mimic.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
