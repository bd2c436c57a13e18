//! Depth and shadow-mapped shading programs.

use serde::{Deserialize, Serialize};

use super::buffer::DepthBuffer;
use super::triangle::Shader;
use crate::geom::Model;
use crate::util::{MatExt, Mat4, Vec2, Vec3, Vec4};

/// Debug color for texture coordinates outside `[0, 1]`.
pub const MISSING_UV_COLOR: [u8; 3] = [255, 0, 255];
/// Debug color for an all-black diffuse texel.
pub const BLACK_TEXEL_COLOR: [u8; 3] = [0, 255, 0];

/// Lighting coefficients of the camera pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingParams {
    /// Constant term added to every channel (0..255).
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    /// Depth slack in light-space units before a fragment counts as occluded.
    pub shadow_bias: f32,
    /// Fraction of the lit value a shadowed fragment keeps.
    pub shadow_floor: f32,
    /// Surface color when the model has no diffuse map.
    pub base_color: [u8; 3],
    /// Flat color used by the alternate triangle backend.
    pub flat_color: [u8; 3],
}

impl Default for ShadingParams {
    fn default() -> Self {
        Self {
            ambient: 20.0,
            diffuse: 0.8,
            specular: 0.3,
            shadow_bias: 43.34,
            shadow_floor: 0.3,
            base_color: [200, 200, 200],
            flat_color: [150, 100, 100],
        }
    }
}

/// Everything one draw call of one mesh node needs.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext<'a> {
    pub model: &'a Model,
    /// `Viewport * Projection * ModelView` for this node.
    pub transform: Mat4,
    /// View * world of this node, used for lighting vectors.
    pub model_view: Mat4,
    /// Unit light direction in world space.
    pub light_dir: Vec3,
    pub params: &'a ShadingParams,
}

impl DrawContext<'_> {
    /// Homogeneous screen position of a face corner.
    #[inline]
    fn project(&self, face: usize, nth: usize) -> Vec4 {
        self.transform * self.model.vertex(face, nth).extend(1.0)
    }
}

/// Homogeneous point to its 3D projection.
#[inline]
fn dehomogenize(p: Vec4) -> Vec3 {
    p.truncate() / p.w
}

/// Light-pass program: only the depth test matters, the color is a grey ramp.
pub struct DepthShader<'a> {
    ctx: DrawContext<'a>,
    tri: [Vec3; 3],
}

impl<'a> DepthShader<'a> {
    pub fn new(ctx: DrawContext<'a>) -> Self {
        Self {
            ctx,
            tri: [Vec3::ZERO; 3],
        }
    }
}

impl Shader for DepthShader<'_> {
    fn vertex(&mut self, face: usize, nth: usize, slot: usize) -> Vec4 {
        let p = self.ctx.project(face, nth);
        self.tri[slot] = dehomogenize(p);
        p
    }

    fn fragment(&self, bar: Vec3) -> Option<[u8; 3]> {
        let p = self.tri[0] * bar.x + self.tri[1] * bar.y + self.tri[2] * bar.z;
        let v = (255.0 - p.z).clamp(0.0, 255.0) as u8;
        Some([v, v, v])
    }
}

/// Camera-pass program: textured Phong lighting with a shadow-map lookup.
pub struct ShadowShader<'a> {
    ctx: DrawContext<'a>,
    shadow_map: &'a DepthBuffer,
    /// Camera screen space to light screen space.
    m_shadow: Mat4,
    /// Inverse transpose of the model-view matrix, for normals.
    mit: Mat4,
    /// Light direction in view space.
    light: Vec3,
    tri: [Vec3; 3],
    uv: [Vec2; 3],
    normal: [Vec3; 3],
}

impl<'a> ShadowShader<'a> {
    /// `light_transform` is the light pass `Viewport * Projection * ModelView` for the same node.
    pub fn new(ctx: DrawContext<'a>, light_transform: Mat4, shadow_map: &'a DepthBuffer) -> Self {
        let m_shadow = light_transform * ctx.transform.inverse_adjugate();
        let light = (ctx.model_view * ctx.light_dir.extend(0.0))
            .truncate()
            .try_normalize()
            .unwrap_or(Vec3::Z);
        Self {
            mit: ctx.model_view.invert_transpose(),
            ctx,
            shadow_map,
            m_shadow,
            light,
            tri: [Vec3::ZERO; 3],
            uv: [Vec2::ZERO; 3],
            normal: [Vec3::Z; 3],
        }
    }

    /// 1.0 when lit, `shadow_floor` when something sits closer to the light.
    fn shadow_factor(&self, screen: Vec3) -> f32 {
        let sb = self.m_shadow * screen.extend(1.0);
        if sb.w.abs() < f32::EPSILON {
            return 1.0;
        }
        let sb = dehomogenize(sb);
        match self.shadow_map.sample(sb.x.floor() as i64, sb.y.floor() as i64) {
            Some(stored) if sb.z > stored + self.ctx.params.shadow_bias => {
                self.ctx.params.shadow_floor
            }
            _ => 1.0,
        }
    }

    /// Object-space normal from the normal map, else interpolated vertex normals.
    fn surface_normal(&self, uv: Vec2, bar: Vec3) -> Vec3 {
        self.ctx.model.normal_at(uv).unwrap_or_else(|| {
            self.normal[0] * bar.x + self.normal[1] * bar.y + self.normal[2] * bar.z
        })
    }
}

impl Shader for ShadowShader<'_> {
    fn vertex(&mut self, face: usize, nth: usize, slot: usize) -> Vec4 {
        self.uv[slot] = self.ctx.model.uv(face, nth);
        let p = self.ctx.project(face, nth);
        self.tri[slot] = dehomogenize(p);
        self.normal[slot] = match self.ctx.model.normal(face, nth) {
            Some(n) => n,
            None => face_normal(self.ctx.model, face),
        };
        p
    }

    fn fragment(&self, bar: Vec3) -> Option<[u8; 3]> {
        let params = self.ctx.params;
        let screen = self.tri[0] * bar.x + self.tri[1] * bar.y + self.tri[2] * bar.z;
        let shadow = self.shadow_factor(screen);

        let uv = self.uv[0] * bar.x + self.uv[1] * bar.y + self.uv[2] * bar.z;
        if uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
            return Some(MISSING_UV_COLOR);
        }

        let n = (self.mit * self.surface_normal(uv, bar).extend(0.0))
            .truncate()
            .try_normalize()
            .unwrap_or(Vec3::Z);
        let l = self.light;
        let diff = n.dot(l).max(0.0);
        let spec = match self.ctx.model.specular(uv) {
            Some(shininess) => {
                let r = (n * (n.dot(l) * 2.0) - l).try_normalize().unwrap_or(Vec3::ZERO);
                r.z.max(0.0).powf(shininess)
            }
            None => 0.0,
        };

        let texel = match self.ctx.model.diffuse(uv) {
            Some([0, 0, 0]) => return Some(BLACK_TEXEL_COLOR),
            Some(c) => c,
            None => params.base_color,
        };
        let light = shadow * (params.diffuse * diff + params.specular * spec);
        Some(texel.map(|c| (params.ambient + c as f32 * light).min(255.0) as u8))
    }
}

/// Unit normal of the plane through the first three corners of a face.
fn face_normal(model: &Model, face: usize) -> Vec3 {
    let a = model.vertex(face, 0);
    let b = model.vertex(face, 1);
    let c = model.vertex(face, 2);
    (b - a).cross(c - a).try_normalize().unwrap_or(Vec3::Z)
}
