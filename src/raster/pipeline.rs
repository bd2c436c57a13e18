//! Two-pass frame renderer.
//!
//! ```text
//! background -> light pass (depth only, into the shadow map)
//!            -> camera pass (ShadowShader, or a TriangleBackend)
//! ```
//!
//! The light pass looks at the scene bounds from a virtual eye placed along
//! the light direction with an orthographic projection, so the shadow map
//! always frames the whole visible scene.

use tracing::debug;

use super::backend::{FlatBackend, TriangleBackend};
use super::buffer::{DepthBuffer, FrameBuffer};
use super::shaders::{DepthShader, DrawContext, ShadingParams, ShadowShader};
use super::triangle::{rasterize, Shader};
use crate::geom::{Model, Texture};
use crate::scene::{Camera, Scene};
use crate::scene::Light;
use crate::util::{look_at, projection, viewport, Bounds, Mat4, Vec3, Vec4};

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub meshes: usize,
    pub triangles: usize,
    /// Fragments written by the camera pass.
    pub fragments: usize,
    /// Fragments written into the shadow map.
    pub shadow_fragments: usize,
}

/// Scanline renderer with a directional shadow map.
pub struct Rasterizer {
    width: u32,
    height: u32,
    depth: DepthBuffer,
    shadow: DepthBuffer,
    pub params: ShadingParams,
    pub shadows_enabled: bool,
    /// Route the camera pass through [`Self::set_backend`]'s backend instead of the shadow shader.
    pub use_flat_backend: bool,
    backend: Box<dyn TriangleBackend + Send>,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("params", &self.params)
            .field("shadows_enabled", &self.shadows_enabled)
            .field("use_flat_backend", &self.use_flat_backend)
            .finish_non_exhaustive()
    }
}

impl Rasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        let params = ShadingParams::default();
        Self {
            width,
            height,
            depth: DepthBuffer::new(width, height),
            shadow: DepthBuffer::new(width, height),
            backend: Box::new(FlatBackend::new(params.flat_color)),
            params,
            shadows_enabled: true,
            use_flat_backend: false,
        }
    }

    pub fn with_params(width: u32, height: u32, params: ShadingParams) -> Self {
        let mut r = Self::new(width, height);
        r.backend = Box::new(FlatBackend::new(params.flat_color));
        r.params = params;
        r
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.depth = DepthBuffer::new(width, height);
        self.shadow = DepthBuffer::new(width, height);
    }

    pub fn set_backend(&mut self, backend: Box<dyn TriangleBackend + Send>) {
        self.backend = backend;
    }

    /// Light-space depth of the last frame.
    pub fn shadow_map(&self) -> &DepthBuffer {
        &self.shadow
    }

    /// Camera-space depth of the last frame.
    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth
    }

    /// Camera viewport: the central three quarters of the frame.
    pub fn camera_viewport(&self) -> Mat4 {
        let (w, h) = (self.width as f32, self.height as f32);
        viewport(w / 8.0, h / 8.0, w * 3.0 / 4.0, h * 3.0 / 4.0)
    }

    /// World -> camera screen space.
    pub fn camera_matrix(&self, camera: &Camera) -> Mat4 {
        self.camera_viewport() * camera.projection_matrix() * camera.view()
    }

    /// World -> light screen space for the current scene bounds.
    ///
    /// Transforms must be up to date.
    pub fn light_matrix(&self, scene: &Scene) -> Mat4 {
        self.light_screen(light_view(&scene.light, &scene.bounds()))
    }

    fn light_screen(&self, light_view: Mat4) -> Mat4 {
        let (w, h) = (self.width as f32, self.height as f32);
        viewport(0.0, 0.0, w, h) * projection(0.0) * light_view
    }

    /// Render `scene` into `frame`, resizing internal buffers to match it.
    ///
    /// World transforms are read as they are; call
    /// [`Scene::update_all_transforms`] first after editing nodes.
    #[tracing::instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    pub fn render(&mut self, scene: &Scene, frame: &mut FrameBuffer) -> FrameStats {
        self.resize(frame.width(), frame.height());
        frame.clear([0, 0, 0]);
        self.depth.clear();
        self.shadow.clear();

        if let Some(bg) = scene.background() {
            draw_background(bg, frame);
        }

        let meshes = scene.visible_meshes();
        let mut stats = FrameStats {
            meshes: meshes.len(),
            ..Default::default()
        };
        if meshes.is_empty() {
            return stats;
        }

        let light_dir = scene.light.direction();
        // one pass over the vertices per frame
        let bounds = scene.bounds();
        let light_view = light_view(&scene.light, &bounds);
        let light_base = self.light_screen(light_view);

        if self.shadows_enabled {
            for &(node, model) in &meshes {
                let world = node.world_matrix();
                let ctx = DrawContext {
                    model,
                    transform: light_base * world,
                    model_view: light_view * world,
                    light_dir,
                    params: &self.params,
                };
                let mut shader = DepthShader::new(ctx);
                stats.shadow_fragments +=
                    draw_model(model, &mut shader, None, &mut self.shadow).1;
            }
        }

        let view = scene.camera.view();
        let camera_base = self.camera_matrix(&scene.camera);
        if self.use_flat_backend {
            self.backend.begin_frame(self.width, self.height);
        }
        for &(node, model) in &meshes {
            let world = node.world_matrix();
            let transform = camera_base * world;
            if self.use_flat_backend {
                stats.triangles += submit_model(model, transform, self.backend.as_mut());
                continue;
            }
            let ctx = DrawContext {
                model,
                transform,
                model_view: view * world,
                light_dir,
                params: &self.params,
            };
            let mut shader = ShadowShader::new(ctx, light_base * world, &self.shadow);
            let (tris, frags) = draw_model(model, &mut shader, Some(&mut *frame), &mut self.depth);
            stats.triangles += tris;
            stats.fragments += frags;
        }
        if self.use_flat_backend {
            stats.fragments = self.backend.end_frame(frame);
        }

        debug!(
            meshes = stats.meshes,
            triangles = stats.triangles,
            fragments = stats.fragments,
            "frame rendered"
        );
        stats
    }
}

/// Light view centered on `bounds` and scaled to unit radius.
fn light_view(light: &Light, bounds: &Bounds) -> Mat4 {
    let eye = light.virtual_eye(bounds);
    Mat4::from_scale(Vec3::splat(1.0 / bounds.radius())) * look_at(eye, bounds.center(), Vec3::Y)
}

/// Run every fan triangle of `model` through `shader`. Returns (triangles, fragments).
fn draw_model<S: Shader>(
    model: &Model,
    shader: &mut S,
    mut color: Option<&mut FrameBuffer>,
    depth: &mut DepthBuffer,
) -> (usize, usize) {
    let mut triangles = 0;
    let mut fragments = 0;
    for face in 0..model.face_count() {
        for corners in model.fan(face) {
            let mut pts = [Vec4::ZERO; 3];
            for (slot, &nth) in corners.iter().enumerate() {
                pts[slot] = shader.vertex(face, nth, slot);
            }
            fragments += rasterize(&pts, &*shader, color.as_deref_mut(), depth);
            triangles += 1;
        }
    }
    (triangles, fragments)
}

fn submit_model(model: &Model, transform: Mat4, backend: &mut dyn TriangleBackend) -> usize {
    let mut triangles = 0;
    for face in 0..model.face_count() {
        for corners in model.fan(face) {
            let pts = corners.map(|nth| transform * model.vertex(face, nth).extend(1.0));
            backend.submit_triangle(&pts);
            triangles += 1;
        }
    }
    triangles
}

/// Nearest-neighbor stretch of `bg` over the whole frame.
fn draw_background(bg: &Texture, frame: &mut FrameBuffer) {
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let (tw, th) = (bg.width() as i64, bg.height() as i64);
    if tw == 0 || th == 0 {
        return;
    }
    for y in 0..h {
        for x in 0..w {
            let rgb = bg.get(x * tw / w, y * th / h);
            frame.set(x as u32, y as u32, rgb);
        }
    }
}
