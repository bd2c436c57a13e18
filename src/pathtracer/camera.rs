//! Pinhole camera for the path tracer and the recursive radiance estimate.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::primitives::Hittable;
use super::ray::{Interval, Ray};
use crate::util::{DVec2, DVec3};

/// Lower bound of the hit interval, keeps bounced rays off their own surface.
pub const SELF_HIT_EPSILON: f64 = 0.001;

/// What a ray that escapes the scene sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    /// Misses contribute nothing.
    #[default]
    Black,
    /// Vertical gradient from black (looking down) to light grey (looking up).
    Sky,
}

impl Background {
    pub fn color(self, ray: &Ray) -> DVec3 {
        match self {
            Background::Black => DVec3::ZERO,
            Background::Sky => {
                let unit = ray.direction.normalize_or_zero();
                let a = 0.5 * (unit.y + 1.0);
                DVec3::ZERO * (1.0 - a) + DVec3::splat(0.8) * a
            }
        }
    }
}

/// Radiance along `ray`, bouncing at most `depth` times.
pub fn ray_color<H: Hittable + ?Sized>(
    ray: &Ray,
    depth: u32,
    world: &H,
    background: Background,
    rng: &mut dyn RngCore,
) -> DVec3 {
    if depth == 0 {
        return DVec3::ZERO;
    }
    let Some(rec) = world.hit(ray, Interval::new(SELF_HIT_EPSILON, f64::INFINITY)) else {
        return background.color(ray);
    };
    match rec.material.scatter(ray, &rec, rng) {
        Some(s) => s.attenuation * ray_color(&s.ray, depth - 1, world, background, rng),
        None => DVec3::ZERO,
    }
}

/// Look-from / look-at camera with a vertical field of view.
///
/// Pixel `(0, 0)` is the top-left corner of the image. Call
/// [`RtCamera::initialize`] after changing any public field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtCamera {
    pub look_from: DVec3,
    pub look_at: DVec3,
    pub vup: DVec3,
    /// Vertical field of view in degrees.
    pub vfov: f64,
    pub image_width: u32,
    pub image_height: u32,
    pixel00: DVec3,
    delta_u: DVec3,
    delta_v: DVec3,
}

impl Default for RtCamera {
    fn default() -> Self {
        let mut cam = Self {
            look_from: DVec3::ZERO,
            look_at: DVec3::NEG_Z,
            vup: DVec3::Y,
            vfov: 90.0,
            image_width: 100,
            image_height: 100,
            pixel00: DVec3::ZERO,
            delta_u: DVec3::ZERO,
            delta_v: DVec3::ZERO,
        };
        cam.initialize();
        cam
    }
}

impl RtCamera {
    pub fn new(look_from: DVec3, look_at: DVec3, vup: DVec3, vfov: f64, width: u32, height: u32) -> Self {
        let mut cam = Self {
            look_from,
            look_at,
            vup,
            vfov,
            image_width: width.max(1),
            image_height: height.max(1),
            ..Self::default()
        };
        cam.initialize();
        cam
    }

    /// Image height derived from `width / aspect`, at least one row.
    pub fn height_for_aspect(width: u32, aspect_ratio: f64) -> u32 {
        if aspect_ratio <= 0.0 || !aspect_ratio.is_finite() {
            return width.max(1);
        }
        ((width as f64 / aspect_ratio) as u32).max(1)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.image_width as f64 / self.image_height as f64
    }

    /// Recompute the pixel grid.
    pub fn initialize(&mut self) {
        self.image_width = self.image_width.max(1);
        self.image_height = self.image_height.max(1);

        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = viewport_height * self.aspect_ratio();

        let w = (self.look_from - self.look_at)
            .try_normalize()
            .unwrap_or(DVec3::Z);
        let u = self
            .vup
            .cross(w)
            .try_normalize()
            .or_else(|| DVec3::Z.cross(w).try_normalize())
            .unwrap_or(DVec3::X);
        let v = w.cross(u);

        let viewport_u = u * viewport_width;
        let viewport_v = -v * viewport_height;
        self.delta_u = viewport_u / self.image_width as f64;
        self.delta_v = viewport_v / self.image_height as f64;

        let upper_left = self.look_from - w - viewport_u / 2.0 - viewport_v / 2.0;
        self.pixel00 = upper_left + (self.delta_u + self.delta_v) * 0.5;
    }

    /// Ray through pixel `(x, y)` shifted by `offset` pixels (`(0, 0)` is the center).
    pub fn ray_for(&self, x: u32, y: u32, offset: DVec2) -> Ray {
        let sample = self.pixel00
            + self.delta_u * (x as f64 + offset.x)
            + self.delta_v * (y as f64 + offset.y);
        Ray::new(self.look_from, sample - self.look_from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pathtracer::material::Lambertian;
    use crate::pathtracer::primitives::{Primitive, Sphere};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_center_ray_points_at_target() {
        let cam = RtCamera::new(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, DVec3::Y, 45.0, 64, 64);
        // between the four center pixels
        let ray = cam.ray_for(31, 31, DVec2::splat(0.5));
        let dir = ray.direction.normalize();
        assert!((dir - DVec3::NEG_Z).length() < 1e-9);
    }

    #[test]
    fn test_top_left_pixel_is_up_left() {
        let cam = RtCamera::new(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, DVec3::Y, 45.0, 64, 32);
        let d = cam.ray_for(0, 0, DVec2::ZERO).direction;
        assert!(d.x < 0.0 && d.y > 0.0);
        assert_eq!(cam.aspect_ratio(), 2.0);
    }

    #[test]
    fn test_degenerate_up_still_builds_grid() {
        let cam = RtCamera::new(DVec3::new(0.0, 5.0, 0.0), DVec3::ZERO, DVec3::Y, 45.0, 8, 8);
        let d = cam.ray_for(4, 4, DVec2::ZERO).direction;
        assert!(d.is_finite());
        assert!(d.y < 0.0);
    }

    #[test]
    fn test_height_for_aspect() {
        assert_eq!(RtCamera::height_for_aspect(1200, 1.0), 1200);
        assert_eq!(RtCamera::height_for_aspect(400, 16.0 / 9.0), 225);
        assert_eq!(RtCamera::height_for_aspect(1, 10.0), 1);
    }

    #[test]
    fn test_ray_color_backgrounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let empty: Vec<Primitive> = Vec::new();
        let up = Ray::new(DVec3::ZERO, DVec3::Y);
        assert_eq!(ray_color(&up, 5, empty.as_slice(), Background::Black, &mut rng), DVec3::ZERO);
        let sky = ray_color(&up, 5, empty.as_slice(), Background::Sky, &mut rng);
        assert!((sky - DVec3::splat(0.8)).length() < 1e-12);
        assert_eq!(ray_color(&up, 0, empty.as_slice(), Background::Sky, &mut rng), DVec3::ZERO);
    }

    #[test]
    fn test_ray_color_attenuates() {
        let mut rng = StdRng::seed_from_u64(4);
        let albedo = DVec3::new(0.5, 0.5, 0.5);
        let world: Vec<Primitive> = vec![Sphere::new(
            DVec3::new(0.0, 0.0, -2.0),
            0.5,
            Arc::new(Lambertian::new(albedo)),
        )
        .into()];
        let ray = Ray::new(DVec3::ZERO, DVec3::NEG_Z);
        let c = ray_color(&ray, 10, world.as_slice(), Background::Sky, &mut rng);
        // one bounce at least, never brighter than albedo * sky
        assert!(c.max_element() <= 0.5 * 0.8 + 1e-12);
        // black background swallows everything
        let c = ray_color(&ray, 10, world.as_slice(), Background::Black, &mut rng);
        assert_eq!(c, DVec3::ZERO);
    }
}
