//! Directional light.

use crate::util::{Bounds, Vec3};

/// A single directional light.
///
/// `direction` points from the scene toward the light and is kept unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self::new(Vec3::ONE, Vec3::ONE, 1.0)
    }
}

impl Light {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.try_normalize().unwrap_or(Vec3::Y),
            color,
            intensity,
        }
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Zero vectors are ignored.
    pub fn set_direction(&mut self, direction: Vec3) {
        if let Some(d) = direction.try_normalize() {
            self.direction = d;
        }
    }

    /// Stand-in eye position for the shadow pass: twice the scene radius away
    /// from the bounds center along the light direction.
    pub fn virtual_eye(&self, bounds: &Bounds) -> Vec3 {
        bounds.center() + self.direction * bounds.radius() * 2.0
    }
}
