//! Alternate triangle sinks for the camera pass.
//!
//! A backend receives already-transformed screen triangles one at a time and
//! composites its result onto the frame when the pass ends. The built-in
//! [`FlatBackend`] draws every triangle in one color with its own depth test.

use super::buffer::{DepthBuffer, FrameBuffer};
use super::triangle::{rasterize, Shader};
use crate::util::{Vec3, Vec4};

/// Receiver for screen-space triangles.
pub trait TriangleBackend {
    /// Reset internal targets for a `width x height` frame.
    fn begin_frame(&mut self, width: u32, height: u32);

    /// Draw one triangle given homogeneous screen positions.
    fn submit_triangle(&mut self, pts: &[Vec4; 3]);

    /// Composite onto `target`. Returns the number of pixels written.
    fn end_frame(&mut self, target: &mut FrameBuffer) -> usize;
}

struct FlatShader([u8; 3]);

impl Shader for FlatShader {
    fn vertex(&mut self, _face: usize, _nth: usize, _slot: usize) -> Vec4 {
        Vec4::ZERO
    }

    fn fragment(&self, _bar: Vec3) -> Option<[u8; 3]> {
        Some(self.0)
    }
}

/// Single-color software backend.
#[derive(Debug)]
pub struct FlatBackend {
    color: [u8; 3],
    frame: FrameBuffer,
    depth: DepthBuffer,
}

impl FlatBackend {
    pub fn new(color: [u8; 3]) -> Self {
        Self {
            color,
            frame: FrameBuffer::new(1, 1),
            depth: DepthBuffer::new(1, 1),
        }
    }

    pub fn set_color(&mut self, color: [u8; 3]) {
        self.color = color;
    }
}

impl TriangleBackend for FlatBackend {
    fn begin_frame(&mut self, width: u32, height: u32) {
        if self.frame.width() != width || self.frame.height() != height {
            self.frame = FrameBuffer::new(width, height);
            self.depth = DepthBuffer::new(width, height);
        } else {
            self.frame.clear([0, 0, 0]);
            self.depth.clear();
        }
    }

    fn submit_triangle(&mut self, pts: &[Vec4; 3]) {
        rasterize(pts, &FlatShader(self.color), Some(&mut self.frame), &mut self.depth);
    }

    fn end_frame(&mut self, target: &mut FrameBuffer) -> usize {
        let w = self.frame.width().min(target.width());
        let h = self.frame.height().min(target.height());
        let mut written = 0;
        for y in 0..h {
            for x in 0..w {
                if self.depth.get(x, y).is_finite() {
                    target.set(x, y, self.frame.get(x, y));
                    written += 1;
                }
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_backend_composites_covered_only() {
        let mut backend = FlatBackend::new([150, 100, 100]);
        let mut target = FrameBuffer::new(8, 8);
        target.clear([7, 7, 7]);

        backend.begin_frame(8, 8);
        backend.submit_triangle(&[
            Vec4::new(0.0, 0.0, 1.0, 1.0),
            Vec4::new(4.0, 0.0, 1.0, 1.0),
            Vec4::new(0.0, 4.0, 1.0, 1.0),
        ]);
        let n = backend.end_frame(&mut target);
        assert!(n > 0);
        assert_eq!(target.get(1, 1), [150, 100, 100]);
        assert_eq!(target.get(7, 7), [7, 7, 7]);

        // a new frame starts empty
        backend.begin_frame(8, 8);
        assert_eq!(backend.end_frame(&mut target), 0);
    }
}
