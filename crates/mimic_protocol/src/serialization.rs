//! # Field Serialization
//!
//! Cursor-style reader and writer for fixed-width fields.
//!
//! ## Design
//!
//! - Every multi-byte field uses the host's native byte order
//! - No padding is ever inserted between fields
//! - Records are built field by field, never by casting memory

use crate::error::{DecodeError, DecodeResult};
use crate::types::{DebugFrameInfo, HelloPayload, Mat4x4, Point3, Ray};

/// Appends fields to a growable buffer.
///
/// Reuse one writer across messages with [`WireWriter::reset`] to keep the
/// allocation.
#[derive(Debug, Default)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Clears the written bytes, keeping the allocation.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if nothing was written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning the buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_ne_bytes());
    }

    /// Writes an i32.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_ne_bytes());
    }

    /// Writes an f32.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_ne_bytes());
    }

    /// Writes raw bytes verbatim.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a point.
    pub fn write_point(&mut self, point: &Point3) {
        self.write_f32(point.x);
        self.write_f32(point.y);
        self.write_f32(point.z);
    }

    /// Writes a matrix, column-major.
    pub fn write_mat(&mut self, mat: &Mat4x4) {
        for value in mat.m {
            self.write_f32(value);
        }
    }

    /// Writes a ray.
    pub fn write_ray(&mut self, ray: &Ray) {
        self.write_point(&ray.origin);
        self.write_point(&ray.direction);
    }

    /// Writes a frame info header.
    pub fn write_frame_info(&mut self, info: &DebugFrameInfo) {
        self.write_i32(info.width);
        self.write_i32(info.height);
        self.write_i32(info.bytes_per_pixel);
    }

    /// Writes a hello payload.
    pub fn write_hello(&mut self, hello: &HelloPayload) {
        self.write_bytes(&hello.ip);
        self.write_i32(hello.frame_width);
        self.write_i32(hello.frame_height);
    }
}

/// Reads fields from a borrowed buffer.
#[derive(Debug)]
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Bytes not yet consumed.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Current offset into the buffer.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Takes the next `len` bytes.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than `len` bytes remain.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] at end of buffer.
    #[inline]
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a u32.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 4 bytes remain.
    #[inline]
    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.read_array().map(u32::from_ne_bytes)
    }

    /// Reads an i32.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 4 bytes remain.
    #[inline]
    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        self.read_array().map(i32::from_ne_bytes)
    }

    /// Reads an f32.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 4 bytes remain.
    #[inline]
    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.read_array().map(f32::from_ne_bytes)
    }

    /// Reads a point.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 12 bytes remain.
    pub fn read_point(&mut self) -> DecodeResult<Point3> {
        Ok(Point3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Reads a column-major matrix.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 64 bytes remain.
    pub fn read_mat(&mut self) -> DecodeResult<Mat4x4> {
        let mut m = [0.0f32; 16];
        for value in &mut m {
            *value = self.read_f32()?;
        }
        Ok(Mat4x4 { m })
    }

    /// Reads a ray.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 24 bytes remain.
    pub fn read_ray(&mut self) -> DecodeResult<Ray> {
        Ok(Ray::new(self.read_point()?, self.read_point()?))
    }

    /// Reads a frame info header.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 12 bytes remain.
    pub fn read_frame_info(&mut self) -> DecodeResult<DebugFrameInfo> {
        Ok(DebugFrameInfo {
            width: self.read_i32()?,
            height: self.read_i32()?,
            bytes_per_pixel: self.read_i32()?,
        })
    }

    /// Reads a hello payload.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Truncated`] if fewer than 24 bytes remain.
    pub fn read_hello(&mut self) -> DecodeResult<HelloPayload> {
        Ok(HelloPayload {
            ip: self.read_array()?,
            frame_width: self.read_i32()?,
            frame_height: self.read_i32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_packed() {
        let mut writer = WireWriter::new();
        writer.write_u32(7);
        writer.write_u8(3);
        writer.write_u32(9);
        assert_eq!(writer.len(), 9);

        let mut reader = WireReader::new(writer.as_slice());
        assert_eq!(reader.read_u32().unwrap(), 7);
        assert_eq!(reader.read_u8().unwrap(), 3);
        assert_eq!(reader.read_u32().unwrap(), 9);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_native_byte_order() {
        let mut writer = WireWriter::new();
        writer.write_f32(1.5);
        assert_eq!(writer.as_slice(), &1.5f32.to_ne_bytes());
    }

    #[test]
    fn test_truncated_read() {
        let bytes = [1u8, 2, 3];
        let mut reader = WireReader::new(&bytes);
        assert_eq!(
            reader.read_u32(),
            Err(DecodeError::Truncated {
                needed: 4,
                available: 3
            })
        );
        // Nothing consumed on failure
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_ray_fields_in_order() {
        let ray = Ray::new(Point3::new(1.0, 2.0, 3.0), Point3::new(-1.0, 0.5, 0.25));
        let mut writer = WireWriter::new();
        writer.write_ray(&ray);
        assert_eq!(writer.len(), Ray::SIZE);
        assert_eq!(&writer.as_slice()[12..16], &(-1.0f32).to_ne_bytes());

        let mut reader = WireReader::new(writer.as_slice());
        assert_eq!(reader.read_ray().unwrap(), ray);
    }
}
