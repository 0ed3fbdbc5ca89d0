//! Surface accessor: the editor canvas the history reads from and restores to

use crate::pixels::PixelBuffer;

/// Errors reported by a surface accessor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// Pixels cannot be read back, typically because cross-origin content
    /// was drawn onto the canvas.
    #[error("surface is not readable: {0}")]
    Security(String),
}

/// Pixel surface provided by the host.
///
/// Reads must return the currently visible pixels. A read failure is taken
/// as a taint: the history stops serving snapshots until a later push reads
/// the surface successfully.
pub trait Surface {
    /// Read the current visible pixels
    fn read_pixels(&self) -> Result<PixelBuffer, SurfaceError>;

    /// Replace the visible pixels (used to redraw undo/redo results)
    fn write_pixels(&mut self, pixels: &PixelBuffer) -> Result<(), SurfaceError>;
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn read_pixels(&self) -> Result<PixelBuffer, SurfaceError> {
        (**self).read_pixels()
    }

    fn write_pixels(&mut self, pixels: &PixelBuffer) -> Result<(), SurfaceError> {
        (**self).write_pixels(pixels)
    }
}

/// In-memory surface
///
/// Used by headless hosts and tests. Reads can be blocked to reproduce a
/// canvas that has been tainted by cross-origin content.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    pixels: PixelBuffer,
    blocked: Option<String>,
}

impl MemorySurface {
    pub fn new(pixels: PixelBuffer) -> Self {
        Self {
            pixels,
            blocked: None,
        }
    }

    /// A surface with no pixels yet (reads return a zero-sized buffer)
    pub fn uninitialized() -> Self {
        Self::new(PixelBuffer::empty())
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }

    pub fn set_pixels(&mut self, pixels: PixelBuffer) {
        self.pixels = pixels;
    }

    /// Make every subsequent read fail with [`SurfaceError::Security`]
    pub fn block_reads(&mut self, reason: impl Into<String>) {
        self.blocked = Some(reason.into());
    }

    pub fn unblock_reads(&mut self) {
        self.blocked = None;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }
}

impl Surface for MemorySurface {
    fn read_pixels(&self) -> Result<PixelBuffer, SurfaceError> {
        match &self.blocked {
            Some(reason) => Err(SurfaceError::Security(reason.clone())),
            None => Ok(self.pixels.clone()),
        }
    }

    fn write_pixels(&mut self, pixels: &PixelBuffer) -> Result<(), SurfaceError> {
        self.pixels = pixels.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_surface_read_write() {
        let mut surface = MemorySurface::new(PixelBuffer::filled(2, 2, [1, 1, 1, 1]));
        assert_eq!(surface.read_pixels().unwrap().data()[0], 1);

        surface
            .write_pixels(&PixelBuffer::filled(2, 2, [7, 7, 7, 7]))
            .unwrap();
        assert_eq!(surface.read_pixels().unwrap().data()[0], 7);
    }

    #[test]
    fn test_blocked_reads_fail_with_security_error() {
        let mut surface = MemorySurface::new(PixelBuffer::filled(1, 1, [0; 4]));
        surface.block_reads("cross-origin image");

        assert_eq!(
            surface.read_pixels(),
            Err(SurfaceError::Security("cross-origin image".to_string()))
        );

        // Writes still go through, only reads are blocked
        assert!(surface.write_pixels(&PixelBuffer::filled(1, 1, [1; 4])).is_ok());

        surface.unblock_reads();
        assert_eq!(surface.read_pixels().unwrap().data(), &[1, 1, 1, 1]);
    }

    #[test]
    fn test_uninitialized_surface_reads_empty() {
        let surface = MemorySurface::uninitialized();
        assert!(surface.read_pixels().unwrap().is_empty());
    }

    #[test]
    fn test_boxed_surface_delegates() {
        let mut boxed: Box<dyn Surface> = Box::new(MemorySurface::new(PixelBuffer::filled(1, 1, [3; 4])));
        assert_eq!(boxed.read_pixels().unwrap().data(), &[3, 3, 3, 3]);
        boxed.write_pixels(&PixelBuffer::filled(1, 1, [4; 4])).unwrap();
        assert_eq!(boxed.read_pixels().unwrap().data(), &[4, 4, 4, 4]);
    }
}
