//! Pixel buffers and immutable history snapshots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: u64 = 4;

/// Errors raised when constructing a pixel buffer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PixelError {
    /// Byte length does not match `width * height * 4`
    #[error("pixel data is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: u64,
        actual: usize,
    },
}

/// Size in bytes of an RGBA8 image with the given dimensions
pub fn rgba_byte_size(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * BYTES_PER_PIXEL
}

/// Mutable RGBA8 pixel data as read from, or written to, a surface
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 bytes, checking that the length matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PixelError> {
        let expected = rgba_byte_size(width, height);
        if data.len() as u64 != expected {
            return Err(PixelError::LengthMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer of the given size with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// A zero-sized buffer, what an uninitialized surface reports.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn byte_size(&self) -> u64 {
        rgba_byte_size(self.width, self.height)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Stable identity of a snapshot within one history.
///
/// Ids are handed out in increasing order and never reused, so a stale
/// reference can only ever miss, never hit a different snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(u64);

impl SnapshotId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable captured pixel state
///
/// Cloning a snapshot shares the underlying bytes. Use
/// [`deep_copy`](Self::deep_copy) for an independent allocation.
#[derive(Clone)]
pub struct Snapshot {
    id: SnapshotId,
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Snapshot {
    /// Freeze a pixel buffer under the given id.
    pub fn from_buffer(id: SnapshotId, buffer: PixelBuffer) -> Self {
        Self {
            id,
            width: buffer.width,
            height: buffer.height,
            pixels: Arc::from(buffer.data),
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Estimated memory held by this snapshot (`w * h * 4`)
    pub fn byte_size(&self) -> u64 {
        rgba_byte_size(self.width, self.height)
    }

    /// Copy of this snapshot that shares no memory with the original.
    pub fn deep_copy(&self) -> Self {
        Self {
            id: self.id,
            width: self.width,
            height: self.height,
            pixels: Arc::from(self.pixels.to_vec()),
        }
    }

    /// True if both snapshots point at the same pixel allocation.
    pub fn shares_pixels_with(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Same dimensions and same bytes, regardless of identity.
    pub fn same_pixels(&self, other: &Snapshot) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.shares_pixels_with(other) || self.pixels == other.pixels)
    }

    /// Copy the pixels out into a buffer suitable for writing to a surface.
    pub fn to_buffer(&self) -> PixelBuffer {
        PixelBuffer {
            width: self.width,
            height: self.height,
            data: self.pixels.to_vec(),
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_buffer_rejects_wrong_length() {
        let err = PixelBuffer::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            PixelError::LengthMismatch {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15,
            }
        );
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_filled_buffer() {
        let buffer = PixelBuffer::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(buffer.data().len(), 24);
        assert_eq!(&buffer.data()[20..], &[1, 2, 3, 4]);
        assert_eq!(buffer.byte_size(), 24);
    }

    #[test]
    fn test_empty_buffer() {
        assert!(PixelBuffer::empty().is_empty());
        assert!(PixelBuffer::new(0, 10, Vec::new()).unwrap().is_empty());
        assert!(!PixelBuffer::filled(1, 1, [0; 4]).is_empty());
    }

    #[test]
    fn test_snapshot_clone_shares_and_deep_copy_does_not() {
        let snapshot = Snapshot::from_buffer(SnapshotId::new(7), PixelBuffer::filled(4, 4, [9; 4]));

        let shared = snapshot.clone();
        assert!(shared.shares_pixels_with(&snapshot));

        let copy = snapshot.deep_copy();
        assert!(!copy.shares_pixels_with(&snapshot));
        assert_eq!(copy.pixels(), snapshot.pixels());
        assert_eq!(copy.id(), snapshot.id());
        assert!(copy.same_pixels(&snapshot));
    }

    #[test]
    fn test_same_pixels_compares_dimensions() {
        let wide = Snapshot::from_buffer(SnapshotId::new(1), PixelBuffer::filled(4, 1, [0; 4]));
        let tall = Snapshot::from_buffer(SnapshotId::new(2), PixelBuffer::filled(1, 4, [0; 4]));
        assert_eq!(wide.pixels(), tall.pixels());
        assert!(!wide.same_pixels(&tall));
    }

    #[test]
    fn test_to_buffer_round_trips_dimensions() {
        let buffer = PixelBuffer::filled(5, 3, [1, 2, 3, 255]);
        let snapshot = Snapshot::from_buffer(SnapshotId::new(1), buffer.clone());
        assert_eq!(snapshot.to_buffer(), buffer);
        assert_eq!(snapshot.byte_size(), 60);
    }
}
