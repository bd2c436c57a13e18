//! Triangle scan conversion.
//!
//! Bounding-box scan with screen-space barycentric weights and a per-pixel
//! depth test. Shaders see the raw barycentric weights and return a color or
//! discard.

use super::buffer::{DepthBuffer, FrameBuffer};
use crate::util::{Vec2, Vec3, Vec4};

/// Twice the signed pixel area below which a triangle is treated as degenerate.
const MIN_DOUBLE_AREA: f32 = 1e-2;

/// Programmable stages of the pipeline.
pub trait Shader {
    /// Transform corner `nth` of `face` and store its varyings in `slot` (0..3).
    ///
    /// Returns the homogeneous screen position (after the viewport transform).
    fn vertex(&mut self, face: usize, nth: usize, slot: usize) -> Vec4;

    /// Color of the fragment at barycentric `bar`, or `None` to discard.
    fn fragment(&self, bar: Vec3) -> Option<[u8; 3]>;
}

/// Barycentric weights of `p` in the 2D triangle `(a, b, c)`.
///
/// `None` for degenerate triangles. Works for either winding.
pub fn barycentric(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> Option<Vec3> {
    let s0 = Vec3::new(c.x - a.x, b.x - a.x, a.x - p.x);
    let s1 = Vec3::new(c.y - a.y, b.y - a.y, a.y - p.y);
    let u = s0.cross(s1);
    if u.z.abs() < MIN_DOUBLE_AREA {
        return None;
    }
    Some(Vec3::new(1.0 - (u.x + u.y) / u.z, u.y / u.z, u.x / u.z))
}

/// Rasterize one triangle.
///
/// `pts` are homogeneous screen positions. Fragments are tested against
/// `depth` (smaller wins) and, when the shader accepts them, written to
/// `depth` and to `color` if given. Degenerate, non-finite and off-screen
/// triangles produce no coverage. Returns the number of fragments written.
pub fn rasterize<S: Shader + ?Sized>(
    pts: &[Vec4; 3],
    shader: &S,
    mut color: Option<&mut FrameBuffer>,
    depth: &mut DepthBuffer,
) -> usize {
    if pts.iter().any(|p| !p.is_finite() || p.w.abs() < f32::EPSILON) {
        return 0;
    }
    let screen = [
        (pts[0].truncate() / pts[0].w).truncate(),
        (pts[1].truncate() / pts[1].w).truncate(),
        (pts[2].truncate() / pts[2].w).truncate(),
    ];

    let (w, h) = (depth.width() as f32, depth.height() as f32);
    let bmin = screen[0].min(screen[1]).min(screen[2]).max(Vec2::ZERO);
    let bmax = screen[0].max(screen[1]).max(screen[2]).min(Vec2::new(w - 1.0, h - 1.0));
    if bmin.x > bmax.x || bmin.y > bmax.y {
        return 0;
    }
    if barycentric(screen[0], screen[1], screen[2], screen[0]).is_none() {
        return 0;
    }

    let mut written = 0;
    for y in bmin.y.floor() as u32..=bmax.y.floor() as u32 {
        for x in bmin.x.floor() as u32..=bmax.x.floor() as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let Some(bar) = barycentric(screen[0], screen[1], screen[2], p) else {
                continue;
            };
            if bar.x < 0.0 || bar.y < 0.0 || bar.z < 0.0 {
                continue;
            }
            let z = pts[0].z * bar.x + pts[1].z * bar.y + pts[2].z * bar.z;
            let zw = pts[0].w * bar.x + pts[1].w * bar.y + pts[2].w * bar.z;
            let frag_depth = z / zw;
            if !frag_depth.is_finite() || !depth.passes(x, y, frag_depth) {
                continue;
            }
            if let Some(rgb) = shader.fragment(bar) {
                depth.set(x, y, frag_depth);
                if let Some(fb) = color.as_deref_mut() {
                    fb.set(x, y, rgb);
                }
                written += 1;
            }
        }
    }
    written
}
