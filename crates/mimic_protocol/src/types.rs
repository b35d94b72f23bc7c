//! # Record Types
//!
//! Fixed-size records carried in message payloads.
//!
//! ```text
//! Point3         : x:f32 y:f32 z:f32                 (12 bytes)
//! Mat4x4         : 16 x f32, column-major            (64 bytes)
//! Ray            : origin:Point3 direction:Point3    (24 bytes)
//! DebugFrameInfo : width:i32 height:i32 bpp:i32      (12 bytes)
//! HelloPayload   : ip:[u8;16] width:i32 height:i32   (24 bytes)
//! ```
//!
//! The `repr(C)` + `Pod` derives exist so a renderer can hand snapshot
//! slices straight to a vertex buffer. The codec never reinterprets
//! memory; it reads and writes every field explicitly.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};

/// Tracked model points, keyed by their index in the payload.
pub type ModelPoints = BTreeMap<u32, Point3>;

/// 3D point or direction.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Point3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Point3 {
    /// Wire size in bytes.
    pub const SIZE: usize = 12;

    /// Origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new point.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Converts to array.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// 4x4 matrix, 16 floats in column-major order.
///
/// No axis remapping happens here; converting into a renderer's
/// handedness is the renderer's job.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Mat4x4 {
    /// Elements, column after column.
    pub m: [f32; 16],
}

impl Mat4x4 {
    /// Wire size in bytes.
    pub const SIZE: usize = 64;

    /// Identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Builds a matrix from its four columns.
    #[must_use]
    pub fn from_columns(columns: [[f32; 4]; 4]) -> Self {
        let mut m = [0.0; 16];
        for (col, values) in columns.iter().enumerate() {
            m[col * 4..col * 4 + 4].copy_from_slice(values);
        }
        Self { m }
    }

    /// Element at `(col, row)`.
    #[inline]
    #[must_use]
    pub const fn get(&self, col: usize, row: usize) -> f32 {
        self.m[col * 4 + row]
    }

    /// One column.
    #[must_use]
    pub fn column(&self, col: usize) -> [f32; 4] {
        [
            self.m[col * 4],
            self.m[col * 4 + 1],
            self.m[col * 4 + 2],
            self.m[col * 4 + 3],
        ]
    }

    /// Translation part (fourth column).
    #[must_use]
    pub const fn translation(&self) -> Point3 {
        Point3::new(self.m[12], self.m[13], self.m[14])
    }
}

impl Default for Mat4x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Ray cast from a spotter through a detected marker.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Ray {
    /// Ray origin (camera center).
    pub origin: Point3,
    /// Ray direction.
    pub direction: Point3,
}

impl Ray {
    /// Wire size in bytes.
    pub const SIZE: usize = 24;

    /// Creates a new ray.
    #[inline]
    #[must_use]
    pub const fn new(origin: Point3, direction: Point3) -> Self {
        Self { origin, direction }
    }
}

/// Dimensions that precede the pixel bytes of a debug frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugFrameInfo {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Bytes per pixel.
    pub bytes_per_pixel: i32,
}

impl DebugFrameInfo {
    /// Wire size in bytes.
    pub const SIZE: usize = 12;
}

/// Debug frame from one spotter.
///
/// Pixel bytes are passed through untouched; whether they are raw or
/// compressed is not encoded in the message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebugFrame {
    /// Pixel bytes following the frame info.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Bytes per pixel.
    pub bytes_per_pixel: i32,
    /// Bytes per row, `width * bytes_per_pixel`.
    pub pitch: i32,
}

impl DebugFrame {
    /// Builds a frame from its info header and pixel bytes.
    #[must_use]
    pub fn new(info: DebugFrameInfo, pixels: Vec<u8>) -> Self {
        Self {
            pixels,
            width: info.width,
            height: info.height,
            bytes_per_pixel: info.bytes_per_pixel,
            pitch: info.width.saturating_mul(info.bytes_per_pixel),
        }
    }

    /// Info header of this frame.
    #[must_use]
    pub const fn info(&self) -> DebugFrameInfo {
        DebugFrameInfo {
            width: self.width,
            height: self.height,
            bytes_per_pixel: self.bytes_per_pixel,
        }
    }

    /// Whether the pixel buffer holds exactly `height * pitch` bytes.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let expected = i64::from(self.height) * i64::from(self.pitch);
        expected >= 0 && usize::try_from(expected).map_or(false, |n| n == self.pixels.len())
    }
}

/// Registration request a spotter sends on startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HelloPayload {
    /// IPv4 address as NUL-padded ASCII.
    pub ip: [u8; 16],
    /// Frame width of the spotter camera.
    pub frame_width: i32,
    /// Frame height of the spotter camera.
    pub frame_height: i32,
}

impl HelloPayload {
    /// Wire size in bytes.
    pub const SIZE: usize = 24;

    /// Creates a payload, truncating `ip` to 15 bytes plus terminator.
    #[must_use]
    pub fn new(ip: &str, frame_width: i32, frame_height: i32) -> Self {
        let mut buf = [0u8; 16];
        let len = ip.len().min(15);
        buf[..len].copy_from_slice(&ip.as_bytes()[..len]);
        Self {
            ip: buf,
            frame_width,
            frame_height,
        }
    }

    /// Address up to the first NUL, lossily decoded.
    #[must_use]
    pub fn ip_str(&self) -> String {
        let end = self.ip.iter().position(|&b| b == 0).unwrap_or(self.ip.len());
        String::from_utf8_lossy(&self.ip[..end]).into_owned()
    }
}

/// Reinterprets a slice of records as bytes, for vertex upload.
#[inline]
#[must_use]
pub fn as_bytes<T: Pod>(records: &[T]) -> &[u8] {
    bytemuck::cast_slice(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sizes_match_wire() {
        assert_eq!(std::mem::size_of::<Point3>(), Point3::SIZE);
        assert_eq!(std::mem::size_of::<Ray>(), Ray::SIZE);
        assert_eq!(std::mem::size_of::<Mat4x4>(), Mat4x4::SIZE);
    }

    #[test]
    fn test_mat_column_major() {
        let m = Mat4x4::from_columns([
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0, 16.0],
        ]);
        assert_eq!(m.get(0, 3), 4.0);
        assert_eq!(m.get(3, 0), 13.0);
        assert_eq!(m.column(1), [5.0, 6.0, 7.0, 8.0]);
        assert_eq!(m.translation(), Point3::new(13.0, 14.0, 15.0));
    }

    #[test]
    fn test_frame_pitch_and_consistency() {
        let info = DebugFrameInfo {
            width: 4,
            height: 2,
            bytes_per_pixel: 3,
        };
        let frame = DebugFrame::new(info, vec![0; 24]);
        assert_eq!(frame.pitch, 12);
        assert!(frame.is_consistent());

        let short = DebugFrame::new(info, vec![0; 10]);
        assert!(!short.is_consistent());
    }

    #[test]
    fn test_hello_ip_roundtrip() {
        let hello = HelloPayload::new("192.168.178.42", 640, 480);
        assert_eq!(hello.ip_str(), "192.168.178.42");
    }

    #[test]
    fn test_rays_as_vertex_bytes() {
        let rays = [Ray::default(); 3];
        assert_eq!(as_bytes(&rays).len(), 3 * Ray::SIZE);
    }
}
