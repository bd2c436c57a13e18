//! Texture maps attached to a model.
//!
//! Images are stored bottom row first so that `v = 0` addresses the bottom
//! of the picture, matching the UV convention of the mesh format.

use std::path::Path;

use image::{imageops, Rgb, RgbImage};

use crate::util::{Result, Vec2, Vec3};

/// An 8-bit RGB texture.
#[derive(Clone)]
pub struct Texture {
    image: RgbImage,
}

impl Texture {
    /// Load an image file and flip it into UV orientation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let image = image::open(path.as_ref())?.to_rgb8();
        Ok(Self::from_image_top_down(image))
    }

    /// Wrap an image whose first row is the top of the picture.
    pub fn from_image_top_down(mut image: RgbImage) -> Self {
        imageops::flip_vertical_in_place(&mut image);
        Self { image }
    }

    /// Wrap an image already stored bottom row first.
    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// Solid single-pixel texture.
    pub fn solid(rgb: [u8; 3]) -> Self {
        Self::from_image(RgbImage::from_pixel(1, 1, Rgb(rgb)))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel lookup with coordinates clamped into the image.
    pub fn get(&self, x: i64, y: i64) -> [u8; 3] {
        if self.image.width() == 0 || self.image.height() == 0 {
            return [0, 0, 0];
        }
        let x = x.clamp(0, self.image.width() as i64 - 1) as u32;
        let y = y.clamp(0, self.image.height() as i64 - 1) as u32;
        self.image.get_pixel(x, y).0
    }

    /// Nearest-texel lookup at a UV coordinate.
    pub fn sample(&self, uv: Vec2) -> [u8; 3] {
        let x = (uv.x * self.image.width() as f32).floor() as i64;
        let y = (uv.y * self.image.height() as f32).floor() as i64;
        self.get(x, y)
    }

    /// Tangent-less normal map decode: each channel maps `[0, 255]` to `[-1, 1]`.
    pub fn sample_normal(&self, uv: Vec2) -> Vec3 {
        let c = self.sample(uv);
        Vec3::new(
            c[0] as f32 / 255.0 * 2.0 - 1.0,
            c[1] as f32 / 255.0 * 2.0 - 1.0,
            c[2] as f32 / 255.0 * 2.0 - 1.0,
        )
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Texture({}x{})", self.width(), self.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> RgbImage {
        // 2x2, top row red, bottom row blue
        let mut img = RgbImage::new(2, 2);
        for x in 0..2 {
            img.put_pixel(x, 0, Rgb([255, 0, 0]));
            img.put_pixel(x, 1, Rgb([0, 0, 255]));
        }
        img
    }

    #[test]
    fn test_flip_puts_bottom_at_v0() {
        let tex = Texture::from_image_top_down(gradient());
        assert_eq!(tex.sample(Vec2::new(0.1, 0.1)), [0, 0, 255]);
        assert_eq!(tex.sample(Vec2::new(0.1, 0.9)), [255, 0, 0]);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let tex = Texture::from_image_top_down(gradient());
        assert_eq!(tex.get(-5, -5), [0, 0, 255]);
        assert_eq!(tex.get(100, 100), [255, 0, 0]);
        assert_eq!(tex.sample(Vec2::new(3.0, -2.0)), [0, 0, 255]);
    }

    #[test]
    fn test_normal_decode() {
        let tex = Texture::solid([255, 0, 128]);
        let n = tex.sample_normal(Vec2::ZERO);
        assert!((n.x - 1.0).abs() < 1e-6);
        assert!((n.y + 1.0).abs() < 1e-6);
        assert!(n.z.abs() < 0.01);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Texture::load("/definitely/not/here.tga").is_err());
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        gradient().save(&path).unwrap();
        let tex = Texture::load(&path).unwrap();
        assert_eq!(tex.width(), 2);
        assert_eq!(tex.sample(Vec2::new(0.0, 0.0)), [0, 0, 255]);
    }
}
