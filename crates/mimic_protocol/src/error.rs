//! # Decode Errors
//!
//! Everything that makes an inbound message malformed. None of these are
//! fatal: the listener drops the message and counts it.

use thiserror::Error;

use crate::kinds::MessageKind;

/// Errors produced while decoding a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer ended before a fixed-size field.
    #[error("truncated message: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// Header declares a payload larger than the message.
    #[error("payload overrun: header declares {declared} bytes, message carries {available}")]
    PayloadOverrun {
        /// Declared payload size.
        declared: usize,
        /// Bytes following the header.
        available: usize,
    },

    /// Payload is not a whole number of records.
    #[error("misaligned {kind:?} payload: {payload_size} bytes is not a multiple of {stride}")]
    Misaligned {
        /// Message kind.
        kind: MessageKind,
        /// Declared payload size.
        payload_size: usize,
        /// Record size.
        stride: usize,
    },

    /// Message kind ordinal outside the known set.
    #[error("unknown message kind: {0}")]
    UnknownMessageKind(u32),

    /// Command kind ordinal outside the known set.
    #[error("unknown command kind: {0}")]
    UnknownCommandKind(u32),

    /// Kind that never carries data.
    #[error("reserved message kind: {0:?}")]
    Reserved(MessageKind),

    /// Frame is not a command message.
    #[error("expected a command message, got {0:?}")]
    NotACommand(MessageKind),
}

/// Result type for codec operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors produced while encoding a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Payload does not fit the 32-bit size field.
    #[error("payload of {0} bytes exceeds the u32 size field")]
    PayloadTooLarge(usize),
}

/// Result type for encode operations.
pub type EncodeResult<T> = Result<T, EncodeError>;
