//! # Message Codec
//!
//! Maps whole messages to typed values and back.
//!
//! ## Frame Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ MessageHeader (9 bytes)                                    │
//! ├────────────────────────────────────────────────────────────┤
//! │ kind:u32 │ spotter_id:u8 │ payload_size:u32                │
//! ├────────────────────────────────────────────────────────────┤
//! │ Payload (payload_size bytes, shape depends on kind)        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Outbound commands carry a `CommandHeader` (kind:u32) at the start of
//! the payload, followed by opaque bytes.

use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::kinds::{CommandKind, MessageKind};
use crate::serialization::{WireReader, WireWriter};
use crate::types::{DebugFrame, HelloPayload, Mat4x4, ModelPoints, Point3, Ray};

/// Header present in front of every message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// Message kind.
    pub kind: MessageKind,
    /// Spotter the message is about (camera id for poses and frames).
    pub spotter_id: u8,
    /// Payload size in bytes.
    pub payload_size: u32,
}

impl MessageHeader {
    /// Wire size in bytes.
    pub const SIZE: usize = 9;

    /// Creates a header.
    #[inline]
    #[must_use]
    pub const fn new(kind: MessageKind, spotter_id: u8, payload_size: u32) -> Self {
        Self {
            kind,
            spotter_id,
            payload_size,
        }
    }

    /// Writes the header.
    pub fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.kind.as_u32());
        writer.write_u8(self.spotter_id);
        writer.write_u32(self.payload_size);
    }

    /// Reads a header.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] or [`DecodeError::UnknownMessageKind`].
    pub fn read(reader: &mut WireReader<'_>) -> DecodeResult<Self> {
        if reader.remaining() < Self::SIZE {
            return Err(DecodeError::Truncated {
                needed: Self::SIZE,
                available: reader.remaining(),
            });
        }
        let kind = MessageKind::from_u32(reader.read_u32()?)?;
        Ok(Self {
            kind,
            spotter_id: reader.read_u8()?,
            payload_size: reader.read_u32()?,
        })
    }
}

/// Header at the start of a command payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandHeader {
    /// Command kind.
    pub kind: CommandKind,
}

impl CommandHeader {
    /// Wire size in bytes.
    pub const SIZE: usize = 4;
}

/// A successfully decoded inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedMessage {
    /// Model points, indexed `0..n` in payload order.
    ModelPoints(ModelPoints),
    /// Pose of one camera.
    CameraPose {
        /// Camera (spotter) id.
        camera_id: u8,
        /// Column-major pose.
        pose: Mat4x4,
    },
    /// Ray batch in payload order.
    Rays(Vec<Ray>),
    /// Debug frame of one spotter.
    DebugFrame {
        /// Spotter id.
        spotter_id: u8,
        /// Frame with dimensions.
        frame: DebugFrame,
    },
    /// Intersection batch in payload order.
    Intersections(Vec<Point3>),
    /// Spotter registration request.
    HelloRequest {
        /// Id in the header, 0 for unregistered spotters.
        spotter_id: u8,
        /// Address and frame size.
        hello: HelloPayload,
    },
    /// Registration reply.
    HelloReply {
        /// Id assigned to the spotter.
        assigned_id: u8,
    },
    /// Control command.
    Command {
        /// Addressed spotter, 0 for all.
        spotter_id: u8,
        /// Command kind.
        kind: CommandKind,
        /// Opaque command payload.
        payload: Vec<u8>,
    },
}

impl DecodedMessage {
    /// Kind this message was decoded from.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::ModelPoints(_) => MessageKind::Payload,
            Self::CameraPose { .. } => MessageKind::DebugCameraPose,
            Self::Rays(_) => MessageKind::DebugRays,
            Self::DebugFrame { .. } => MessageKind::DebugFrame,
            Self::Intersections(_) => MessageKind::DebugIntersections,
            Self::HelloRequest { .. } => MessageKind::HelloReq,
            Self::HelloReply { .. } => MessageKind::HelloRep,
            Self::Command { .. } => MessageKind::Command,
        }
    }
}

/// Reads the header and returns it with exactly `payload_size` payload bytes.
///
/// Bytes after the declared payload are ignored.
///
/// # Errors
///
/// Header errors, or [`DecodeError::PayloadOverrun`] if the message is
/// shorter than the header claims.
pub fn split(buffer: &[u8]) -> DecodeResult<(MessageHeader, &[u8])> {
    let mut reader = WireReader::new(buffer);
    let header = MessageHeader::read(&mut reader)?;
    let declared = header.payload_size as usize;
    if reader.remaining() < declared {
        return Err(DecodeError::PayloadOverrun {
            declared,
            available: reader.remaining(),
        });
    }
    Ok((header, reader.read_bytes(declared)?))
}

/// Reads only the header of a message.
///
/// # Errors
///
/// Same as [`MessageHeader::read`].
pub fn peek_header(buffer: &[u8]) -> DecodeResult<MessageHeader> {
    MessageHeader::read(&mut WireReader::new(buffer))
}

/// Number of whole records in `payload`.
fn record_count(kind: MessageKind, payload: &[u8]) -> DecodeResult<usize> {
    let Some(stride) = kind.record_stride() else {
        return Err(DecodeError::Reserved(kind));
    };
    if payload.len() % stride != 0 {
        return Err(DecodeError::Misaligned {
            kind,
            payload_size: payload.len(),
            stride,
        });
    }
    Ok(payload.len() / stride)
}

/// Decodes one inbound message.
///
/// # Errors
///
/// Any [`DecodeError`]; the message should be dropped.
pub fn decode(buffer: &[u8]) -> DecodeResult<DecodedMessage> {
    let (header, payload) = split(buffer)?;
    let mut reader = WireReader::new(payload);

    match header.kind {
        MessageKind::Payload => {
            let count = record_count(header.kind, payload)?;
            let mut points = ModelPoints::new();
            for index in 0..count {
                points.insert(index as u32, reader.read_point()?);
            }
            Ok(DecodedMessage::ModelPoints(points))
        }
        MessageKind::DebugCameraPose => {
            if payload.len() != Mat4x4::SIZE {
                return Err(DecodeError::Misaligned {
                    kind: header.kind,
                    payload_size: payload.len(),
                    stride: Mat4x4::SIZE,
                });
            }
            Ok(DecodedMessage::CameraPose {
                camera_id: header.spotter_id,
                pose: reader.read_mat()?,
            })
        }
        MessageKind::DebugRays => {
            let count = record_count(header.kind, payload)?;
            let mut rays = Vec::with_capacity(count);
            for _ in 0..count {
                rays.push(reader.read_ray()?);
            }
            Ok(DecodedMessage::Rays(rays))
        }
        MessageKind::DebugFrame => {
            let info = reader.read_frame_info()?;
            let pixels = reader.read_bytes(reader.remaining())?.to_vec();
            Ok(DecodedMessage::DebugFrame {
                spotter_id: header.spotter_id,
                frame: DebugFrame::new(info, pixels),
            })
        }
        MessageKind::DebugIntersections => {
            let count = record_count(header.kind, payload)?;
            let mut points = Vec::with_capacity(count);
            for _ in 0..count {
                points.push(reader.read_point()?);
            }
            Ok(DecodedMessage::Intersections(points))
        }
        MessageKind::HelloReq => Ok(DecodedMessage::HelloRequest {
            spotter_id: header.spotter_id,
            hello: reader.read_hello()?,
        }),
        MessageKind::HelloRep => Ok(DecodedMessage::HelloReply {
            assigned_id: reader.read_u8()?,
        }),
        MessageKind::Command => {
            let kind = CommandKind::from_u32(reader.read_u32()?)?;
            Ok(DecodedMessage::Command {
                spotter_id: header.spotter_id,
                kind,
                payload: reader.read_bytes(reader.remaining())?.to_vec(),
            })
        }
        MessageKind::None => Err(DecodeError::Reserved(header.kind)),
    }
}

/// Decodes a command frame into its kind and opaque payload.
///
/// # Errors
///
/// [`DecodeError::NotACommand`] for other kinds, or any header error.
pub fn decode_command(buffer: &[u8]) -> DecodeResult<(CommandKind, Vec<u8>)> {
    let header = peek_header(buffer)?;
    if header.kind != MessageKind::Command {
        return Err(DecodeError::NotACommand(header.kind));
    }
    match decode(buffer)? {
        DecodedMessage::Command { kind, payload, .. } => Ok((kind, payload)),
        other => Err(DecodeError::NotACommand(other.kind())),
    }
}

fn size_field(len: usize) -> EncodeResult<u32> {
    u32::try_from(len).map_err(|_| EncodeError::PayloadTooLarge(len))
}

/// Writes a command frame into `writer`, replacing its contents.
///
/// # Errors
///
/// [`EncodeError::PayloadTooLarge`] if the payload overflows the size field.
pub fn encode_command_into(
    writer: &mut WireWriter,
    kind: CommandKind,
    payload: &[u8],
) -> EncodeResult<()> {
    let payload_size = size_field(CommandHeader::SIZE + payload.len())?;
    writer.reset();
    MessageHeader::new(MessageKind::Command, 0, payload_size).write(writer);
    writer.write_u32(kind.as_u32());
    writer.write_bytes(payload);
    Ok(())
}

/// Encodes a command frame.
///
/// # Errors
///
/// [`EncodeError::PayloadTooLarge`] if the payload overflows the size field.
pub fn encode_command(kind: CommandKind, payload: &[u8]) -> EncodeResult<Vec<u8>> {
    let mut writer =
        WireWriter::with_capacity(MessageHeader::SIZE + CommandHeader::SIZE + payload.len());
    encode_command_into(&mut writer, kind, payload)?;
    Ok(writer.into_inner())
}

/// Encodes an arbitrary message from a raw payload.
///
/// # Errors
///
/// [`EncodeError::PayloadTooLarge`] if the payload overflows the size field.
pub fn encode_message(kind: MessageKind, spotter_id: u8, payload: &[u8]) -> EncodeResult<Vec<u8>> {
    let mut writer = WireWriter::with_capacity(MessageHeader::SIZE + payload.len());
    MessageHeader::new(kind, spotter_id, size_field(payload.len())?).write(&mut writer);
    writer.write_bytes(payload);
    Ok(writer.into_inner())
}

fn encode_records<T>(
    kind: MessageKind,
    spotter_id: u8,
    records: &[T],
    stride: usize,
    write: impl Fn(&mut WireWriter, &T),
) -> EncodeResult<Vec<u8>> {
    let payload_size = size_field(records.len().saturating_mul(stride))?;
    let mut writer = WireWriter::with_capacity(MessageHeader::SIZE + payload_size as usize);
    MessageHeader::new(kind, spotter_id, payload_size).write(&mut writer);
    for record in records {
        write(&mut writer, record);
    }
    Ok(writer.into_inner())
}

/// Encodes a model point message.
///
/// # Errors
///
/// [`EncodeError::PayloadTooLarge`] for absurdly large batches.
pub fn encode_model_points(points: &[Point3]) -> EncodeResult<Vec<u8>> {
    encode_records(MessageKind::Payload, 0, points, Point3::SIZE, WireWriter::write_point)
}

/// Encodes a camera pose message for `camera_id`.
#[must_use]
pub fn encode_camera_pose(camera_id: u8, pose: &Mat4x4) -> Vec<u8> {
    let mut writer = WireWriter::with_capacity(MessageHeader::SIZE + Mat4x4::SIZE);
    MessageHeader::new(MessageKind::DebugCameraPose, camera_id, Mat4x4::SIZE as u32)
        .write(&mut writer);
    writer.write_mat(pose);
    writer.into_inner()
}

/// Encodes a ray batch message.
///
/// # Errors
///
/// [`EncodeError::PayloadTooLarge`] for absurdly large batches.
pub fn encode_rays(rays: &[Ray]) -> EncodeResult<Vec<u8>> {
    encode_records(MessageKind::DebugRays, 0, rays, Ray::SIZE, WireWriter::write_ray)
}

/// Encodes an intersection batch message.
///
/// # Errors
///
/// [`EncodeError::PayloadTooLarge`] for absurdly large batches.
pub fn encode_intersections(points: &[Point3]) -> EncodeResult<Vec<u8>> {
    encode_records(
        MessageKind::DebugIntersections,
        0,
        points,
        Point3::SIZE,
        WireWriter::write_point,
    )
}

/// Encodes a debug frame message for `spotter_id`.
///
/// # Errors
///
/// [`EncodeError::PayloadTooLarge`] if the pixels overflow the size field.
pub fn encode_debug_frame(spotter_id: u8, frame: &DebugFrame) -> EncodeResult<Vec<u8>> {
    let payload_size = size_field(crate::DebugFrameInfo::SIZE + frame.pixels.len())?;
    let mut writer = WireWriter::with_capacity(MessageHeader::SIZE + payload_size as usize);
    MessageHeader::new(MessageKind::DebugFrame, spotter_id, payload_size).write(&mut writer);
    writer.write_frame_info(&frame.info());
    writer.write_bytes(&frame.pixels);
    Ok(writer.into_inner())
}

/// Encodes a spotter registration request.
#[must_use]
pub fn encode_hello(spotter_id: u8, hello: &HelloPayload) -> Vec<u8> {
    let mut writer = WireWriter::with_capacity(MessageHeader::SIZE + HelloPayload::SIZE);
    MessageHeader::new(MessageKind::HelloReq, spotter_id, HelloPayload::SIZE as u32)
        .write(&mut writer);
    writer.write_hello(hello);
    writer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(i: f32) -> Ray {
        Ray::new(Point3::new(i, i + 1.0, i + 2.0), Point3::new(-i, 0.5 * i, 1.0))
    }

    #[test]
    fn test_command_header_roundtrip() {
        let payload = [1u8, 2, 3, 4, 5];
        let frame = encode_command(CommandKind::SaveRaysToFile, &payload).unwrap();

        let header = peek_header(&frame).unwrap();
        assert_eq!(header.kind, MessageKind::Command);
        assert_eq!(header.payload_size as usize, CommandHeader::SIZE + payload.len());
        assert_eq!(frame.len(), MessageHeader::SIZE + CommandHeader::SIZE + payload.len());

        let (kind, body) = decode_command(&frame).unwrap();
        assert_eq!(kind, CommandKind::SaveRaysToFile);
        assert_eq!(body, payload);
    }

    #[test]
    fn test_binarization_threshold_frame() {
        let frame = encode_command(CommandKind::BinarizationThreshold, &[42]).unwrap();
        let header = peek_header(&frame).unwrap();
        assert_eq!(header.payload_size, 5);
        assert_eq!(
            &frame[MessageHeader::SIZE..MessageHeader::SIZE + 4],
            &8u32.to_ne_bytes()
        );
        assert_eq!(*frame.last().unwrap(), 42);
    }

    #[test]
    fn test_model_points_indexed_in_order() {
        let points: Vec<Point3> = (0..5).map(|i| Point3::new(i as f32, 0.0, -1.0)).collect();
        let frame = encode_model_points(&points).unwrap();

        match decode(&frame).unwrap() {
            DecodedMessage::ModelPoints(decoded) => {
                assert_eq!(decoded.len(), 5);
                let keys: Vec<u32> = decoded.keys().copied().collect();
                assert_eq!(keys, vec![0, 1, 2, 3, 4]);
                assert_eq!(decoded[&3], points[3]);
            }
            other => panic!("expected model points, got {other:?}"),
        }
    }

    #[test]
    fn test_three_rays_decode_field_for_field() {
        let rays = [ray(1.0), ray(2.0), ray(3.0)];
        let frame = encode_rays(&rays).unwrap();
        assert_eq!(peek_header(&frame).unwrap().payload_size, 72);

        assert_eq!(decode(&frame).unwrap(), DecodedMessage::Rays(rays.to_vec()));
    }

    #[test]
    fn test_misaligned_points_rejected() {
        let mut payload = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            payload.extend_from_slice(&v.to_ne_bytes());
        }
        let frame = encode_message(MessageKind::Payload, 0, &payload).unwrap();

        assert_eq!(
            decode(&frame),
            Err(DecodeError::Misaligned {
                kind: MessageKind::Payload,
                payload_size: 16,
                stride: 12,
            })
        );
    }

    #[test]
    fn test_misalignment_reports_record_stride() {
        for kind in [MessageKind::DebugRays, MessageKind::DebugIntersections] {
            let frame = encode_message(kind, 0, &[0u8; 25]).unwrap();
            match decode(&frame) {
                Err(DecodeError::Misaligned { stride, .. }) => {
                    assert_eq!(Some(stride), kind.record_stride());
                }
                other => panic!("{kind:?} decoded to {other:?}"),
            }
        }
    }

    #[test]
    fn test_payload_overrun_rejected() {
        let mut frame = encode_rays(&[ray(1.0)]).unwrap();
        frame.truncate(frame.len() - 1);
        assert_eq!(
            decode(&frame),
            Err(DecodeError::PayloadOverrun {
                declared: 24,
                available: 23,
            })
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut frame = encode_intersections(&[Point3::new(1.0, 2.0, 3.0)]).unwrap();
        frame.extend_from_slice(&[0xAA; 7]);
        assert_eq!(
            decode(&frame).unwrap(),
            DecodedMessage::Intersections(vec![Point3::new(1.0, 2.0, 3.0)])
        );
    }

    #[test]
    fn test_short_header_rejected() {
        assert_eq!(
            decode(&[3, 0, 0]),
            Err(DecodeError::Truncated {
                needed: 9,
                available: 3,
            })
        );
    }

    #[test]
    fn test_unknown_and_reserved_kinds() {
        let mut unknown = encode_message(MessageKind::Payload, 0, &[]).unwrap();
        unknown[..4].copy_from_slice(&99u32.to_ne_bytes());
        assert_eq!(decode(&unknown), Err(DecodeError::UnknownMessageKind(99)));

        let none = encode_message(MessageKind::None, 0, &[]).unwrap();
        assert_eq!(decode(&none), Err(DecodeError::Reserved(MessageKind::None)));
    }

    #[test]
    fn test_camera_pose_uses_spotter_id() {
        let pose = Mat4x4::from_columns([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [4.0, 5.0, 6.0, 1.0],
        ]);
        let frame = encode_camera_pose(3, &pose);
        assert_eq!(
            decode(&frame).unwrap(),
            DecodedMessage::CameraPose { camera_id: 3, pose }
        );

        let short = encode_message(MessageKind::DebugCameraPose, 3, &[0; 60]).unwrap();
        assert!(matches!(decode(&short), Err(DecodeError::Misaligned { .. })));
    }

    #[test]
    fn test_debug_frame_passthrough() {
        let frame = DebugFrame::new(
            crate::DebugFrameInfo {
                width: 2,
                height: 2,
                bytes_per_pixel: 1,
            },
            vec![10, 20, 30, 40],
        );
        let bytes = encode_debug_frame(2, &frame).unwrap();

        match decode(&bytes).unwrap() {
            DecodedMessage::DebugFrame { spotter_id, frame: decoded } => {
                assert_eq!(spotter_id, 2);
                assert_eq!(decoded.pitch, 2);
                assert_eq!(decoded.pixels, vec![10, 20, 30, 40]);
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_frame_without_info_rejected() {
        let bytes = encode_message(MessageKind::DebugFrame, 1, &[0; 8]).unwrap();
        assert!(matches!(decode(&bytes), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_hello_request() {
        let hello = HelloPayload::new("10.0.0.7", 640, 480);
        match decode(&encode_hello(0, &hello)).unwrap() {
            DecodedMessage::HelloRequest { hello: decoded, .. } => {
                assert_eq!(decoded.ip_str(), "10.0.0.7");
                assert_eq!(decoded.frame_height, 480);
            }
            other => panic!("expected hello, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_command_rejects_other_kinds() {
        let frame = encode_rays(&[]).unwrap();
        assert_eq!(
            decode_command(&frame),
            Err(DecodeError::NotACommand(MessageKind::DebugRays))
        );
    }
}
