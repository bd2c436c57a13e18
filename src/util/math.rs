//! Math type re-exports and renderer-specific transform helpers.
//!
//! The rasterizer works in single precision (`Vec3`/`Mat4`), the path tracer
//! in double precision (`DVec3`). Everything that crosses between the two goes
//! through the conversion functions at the bottom of this module.

pub use glam::{DVec2, DVec3, Mat3, Mat4, Vec2, Vec3, Vec4};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth range of the screen-space z coordinate produced by [`viewport`].
pub const DEPTH: f32 = 255.0;

/// Determinants below this magnitude are treated as singular.
const DET_EPSILON: f32 = 1e-12;

/// Camera basis matrix (world -> view) in the tinyrenderer convention.
///
/// The view is centered on `center`, not on `eye`: the translation part moves
/// `center` to the origin and the rotation aligns `eye - center` with +Z.
/// A degenerate configuration (eye on the target, or `up` parallel to the
/// viewing axis) substitutes a fallback axis instead of producing NaN.
pub fn look_at(eye: Vec3, center: Vec3, up: Vec3) -> Mat4 {
    let z = (eye - center).try_normalize().unwrap_or(Vec3::Z);
    let x = match up.cross(z).try_normalize() {
        Some(x) => x,
        None => {
            let alt = if z.z.abs() < 0.9 { Vec3::Z } else { Vec3::X };
            alt.cross(z).normalize()
        }
    };
    let y = z.cross(x);

    // rows are the basis vectors
    let rotation = Mat4::from_mat3(Mat3::from_cols(x, y, z).transpose());
    rotation * Mat4::from_translation(-center)
}

/// Projection with `coeff` in the projective-divide slot (row 3, column 2).
///
/// `coeff == 0` gives an orthographic projection; perspective uses
/// `-1 / |eye - center|`, see [`ProjectionKind::coefficient`].
pub fn projection(coeff: f32) -> Mat4 {
    let mut m = Mat4::IDENTITY;
    m.z_axis.w = coeff;
    m
}

/// Maps NDC into the pixel rectangle `(x, y, w, h)` and depth into `[0, DEPTH]`.
///
/// Depth is flipped so that smaller values are closer to the eye; every depth
/// buffer in the crate keeps the minimum.
pub fn viewport(x: f32, y: f32, w: f32, h: f32) -> Mat4 {
    let half_depth = DEPTH / 2.0;
    Mat4::from_cols(
        Vec4::new(w / 2.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, h / 2.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, -half_depth, 0.0),
        Vec4::new(x + w / 2.0, y + h / 2.0, half_depth, 1.0),
    )
}

/// Which projection a camera uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectionKind {
    Orthographic,
    #[default]
    Perspective,
}

impl ProjectionKind {
    /// Projective-divide coefficient for a camera at `eye` looking at `center`.
    pub fn coefficient(self, eye: Vec3, center: Vec3) -> f32 {
        match self {
            Self::Orthographic => 0.0,
            Self::Perspective => {
                let dist = eye.distance(center);
                if dist > f32::EPSILON {
                    -1.0 / dist
                } else {
                    0.0
                }
            }
        }
    }

    /// Full projection matrix for the given eye/center pair.
    pub fn matrix(self, eye: Vec3, center: Vec3) -> Mat4 {
        projection(self.coefficient(eye, center))
    }
}

/// Extra matrix operations used by the shading pipeline.
pub trait MatExt {
    /// Classical adjoint (transpose of the cofactor matrix).
    fn adjugate(&self) -> Self;
    /// Inverse computed as `adjugate / determinant`.
    fn inverse_adjugate(&self) -> Self;
    /// Inverse transpose, used to carry normals.
    fn invert_transpose(&self) -> Self;
}

impl MatExt for Mat4 {
    fn adjugate(&self) -> Self {
        let mut cols = [[0.0f32; 4]; 4];
        for (c, col) in cols.iter_mut().enumerate() {
            for (r, v) in col.iter_mut().enumerate() {
                // adj[r][c] = cofactor(c, r)
                *v = cofactor(self, c, r);
            }
        }
        Mat4::from_cols_array_2d(&cols)
    }

    fn inverse_adjugate(&self) -> Self {
        let adj = self.adjugate();
        // det = row 0 of self dotted with column 0 of the adjugate
        let det = (0..4).map(|j| element(self, 0, j) * element(&adj, j, 0)).sum::<f32>();
        debug_assert!(
            det.abs() > DET_EPSILON,
            "inverting a singular matrix (det = {det})"
        );
        adj * (1.0 / det)
    }

    fn invert_transpose(&self) -> Self {
        self.inverse_adjugate().transpose()
    }
}

#[inline]
fn element(m: &Mat4, row: usize, col: usize) -> f32 {
    m.col(col)[row]
}

fn cofactor(m: &Mat4, row: usize, col: usize) -> f32 {
    let mut minor = [0.0f32; 9];
    let mut k = 0;
    for r in (0..4).filter(|&r| r != row) {
        for c in (0..4).filter(|&c| c != col) {
            minor[k] = element(m, r, c);
            k += 1;
        }
    }
    let det = Mat3::from_cols_array(&minor).transpose().determinant();
    if (row + col) % 2 == 0 {
        det
    } else {
        -det
    }
}

/// Axis-aligned bounds in rasterizer space.
#[derive(Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Empty bounds (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// Radius of the bounding sphere around [`Self::center`], never below a small floor.
    #[inline]
    pub fn radius(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            ((self.max - self.min).length() * 0.5).max(1e-3)
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bounds({:?} - {:?})", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Rasterizer <-> path tracer conversions
// ---------------------------------------------------------------------------

/// Rasterizer vector to path tracer vector.
#[inline]
pub fn raster_to_rt(v: Vec3) -> DVec3 {
    v.as_dvec3()
}

/// Path tracer vector to rasterizer vector.
#[inline]
pub fn rt_to_raster(v: DVec3) -> Vec3 {
    v.as_vec3()
}

/// Homogeneous rasterizer point to path tracer point, dividing by `w` when it is non-zero.
#[inline]
pub fn raster_point_to_rt(p: Vec4) -> DVec3 {
    if p.w != 0.0 && p.w != 1.0 {
        raster_to_rt(p.truncate() / p.w)
    } else {
        raster_to_rt(p.truncate())
    }
}

/// Path tracer point to homogeneous rasterizer point (`w = 1`).
#[inline]
pub fn rt_point_to_raster(p: DVec3) -> Vec4 {
    rt_to_raster(p).extend(1.0)
}

/// Gamma 2 encoding. Non-positive inputs map to zero.
#[inline]
pub fn linear_to_gamma(c: f64) -> f64 {
    if c > 0.0 {
        c.sqrt()
    } else {
        0.0
    }
}

/// Linear path tracer color to gamma-encoded 8-bit RGB.
pub fn rt_color_to_rgb(c: DVec3) -> [u8; 3] {
    let q = |v: f64| (256.0 * linear_to_gamma(v).clamp(0.0, 0.999)) as u8;
    [q(c.x), q(c.y), q(c.z)]
}

/// Gamma-encoded 8-bit RGB back to linear path tracer color.
pub fn rgb_to_rt_color(rgb: [u8; 3]) -> DVec3 {
    let l = |v: u8| {
        let g = v as f64 / 255.0;
        g * g
    };
    DVec3::new(l(rgb[0]), l(rgb[1]), l(rgb[2]))
}
