//! # MIMIC Protocol - The Wire Codec
//!
//! Binary message format spoken between the tracking system and its
//! visualization client.
//!
//! ## Message Shapes
//!
//! ```text
//! Payload            : Point3 * n            -> ModelPoints (indexed 0..n)
//! DebugCameraPose    : Mat4x4                -> pose of camera `spotter_id`
//! DebugRays          : Ray * n               -> ray batch
//! DebugFrame         : DebugFrameInfo + px   -> frame of spotter `spotter_id`
//! DebugIntersections : Point3 * n            -> intersection batch
//! Command            : CommandKind + bytes   -> outbound control
//! ```
//!
//! ## Rules
//!
//! - Header is 9 packed bytes: `kind:u32 spotter_id:u8 payload_size:u32`
//! - All numbers use the host's native byte order
//! - Array payloads must be a whole number of records
//! - Malformed input is an error value, never a panic
//!
//! ## Example
//!
//! ```rust
//! use mimic_protocol::{decode, encode_rays, DecodedMessage, Point3, Ray};
//!
//! let ray = Ray::new(Point3::ZERO, Point3::new(0.0, 0.0, 1.0));
//! let frame = encode_rays(&[ray]).unwrap();
//! assert_eq!(decode(&frame).unwrap(), DecodedMessage::Rays(vec![ray]));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod codec;
pub mod error;
pub mod kinds;
pub mod serialization;
pub mod types;

pub use codec::{
    decode, decode_command, encode_camera_pose, encode_command, encode_command_into,
    encode_debug_frame, encode_hello, encode_intersections, encode_message, encode_model_points,
    encode_rays, peek_header, split, CommandHeader, DecodedMessage, MessageHeader,
};
pub use error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use kinds::{CommandKind, MessageKind};
pub use serialization::{WireReader, WireWriter};
pub use types::{
    as_bytes, DebugFrame, DebugFrameInfo, HelloPayload, Mat4x4, ModelPoints, Point3, Ray,
};
