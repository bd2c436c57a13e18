//! Color and depth render targets.
//!
//! Both buffers use a bottom-left origin: row 0 is the bottom of the picture.
//! [`FrameBuffer::to_image`] flips back to the usual top-down layout.

use std::path::Path;

use image::{imageops, Rgb, RgbImage};

use crate::util::Result;

/// 8-bit RGB color target.
#[derive(Clone)]
pub struct FrameBuffer {
    image: RgbImage,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, Rgb(rgb));
        }
    }

    pub fn clear(&mut self, rgb: [u8; 3]) {
        for p in self.image.pixels_mut() {
            *p = Rgb(rgb);
        }
    }

    /// Raw bottom-up pixels.
    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Top-down copy suitable for saving or display.
    pub fn to_image(&self) -> RgbImage {
        imageops::flip_vertical(&self.image)
    }

    /// Save in whatever format the extension names.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_image().save(path.as_ref())?;
        Ok(())
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameBuffer({}x{})", self.width(), self.height())
    }
}

/// Per-pixel depth, smaller is closer. Cleared to `+inf`.
#[derive(Debug, Clone)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![f32::INFINITY; (width * height) as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) {
        self.data.fill(f32::INFINITY);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (x + y * self.width) as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[self.index(x, y)]
    }

    /// Depth at integer coordinates, `None` outside the buffer.
    #[inline]
    pub fn sample(&self, x: i64, y: i64) -> Option<f32> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.get(x as u32, y as u32))
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, z: f32) {
        let i = self.index(x, y);
        self.data[i] = z;
    }

    /// True if `z` is at least as close as the stored value.
    #[inline]
    pub fn passes(&self, x: u32, y: u32, z: f32) -> bool {
        z <= self.get(x, y)
    }

    /// Pixels that received at least one fragment since the last clear.
    pub fn covered(&self) -> usize {
        self.data.iter().filter(|d| d.is_finite()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_flip_on_export() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.set(0, 0, [255, 0, 0]);
        let img = fb.to_image();
        assert_eq!(img.get_pixel(0, 1).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_framebuffer_set_out_of_range_ignored() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.set(5, 5, [1, 2, 3]);
        fb.clear([9, 9, 9]);
        assert_eq!(fb.get(1, 1), [9, 9, 9]);
    }

    #[test]
    fn test_depth_keeps_minimum() {
        let mut d = DepthBuffer::new(4, 4);
        assert!(d.passes(1, 1, 100.0));
        d.set(1, 1, 50.0);
        assert!(!d.passes(1, 1, 60.0));
        assert!(d.passes(1, 1, 10.0));
        assert_eq!(d.covered(), 1);
        assert_eq!(d.sample(-1, 0), None);
        assert_eq!(d.sample(1, 1), Some(50.0));
        d.clear();
        assert_eq!(d.covered(), 0);
    }
}
