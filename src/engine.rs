//! Headless frame loop tying the scene, the rasterizer and the real-time
//! path tracer together.
//!
//! One call to [`Engine::render_frame`] does exactly one tick:
//!
//! ```text
//! update transforms -> shadow pass -> camera pass
//!                   -> (ray tracing on) sync scene, trace one tile, blend
//! ```

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info};

use crate::pathtracer::{render_offline, OfflineSettings, RealtimeTracer};
use crate::raster::{FrameBuffer, FrameStats, Rasterizer};
use crate::scene::{CameraController, Scene, ROOT_NAME};
use crate::settings::Settings;
use crate::util::{Result, Vec3};

/// Smallest per-axis scale reachable through [`Engine::scale_selected`].
pub const MIN_NODE_SCALE: f32 = 0.1;

/// Offset applied to a duplicated node so it does not overlap the original.
const DUPLICATE_OFFSET: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// Owns everything needed to produce frames without a window.
pub struct Engine {
    pub scene: Scene,
    pub controller: CameraController,
    rasterizer: Rasterizer,
    realtime: RealtimeTracer,
    frame: FrameBuffer,
    frame_index: u64,
    last_stats: FrameStats,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("size", &(self.frame.width(), self.frame.height()))
            .field("frame_index", &self.frame_index)
            .field("rasterizer", &self.rasterizer)
            .field("realtime", &self.realtime)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let scene = Scene::new();
        let controller = CameraController::new(&scene.camera);
        let mut engine = Self {
            scene,
            controller,
            rasterizer: Rasterizer::new(width, height),
            realtime: RealtimeTracer::new(width, height),
            frame: FrameBuffer::new(width, height),
            frame_index: 0,
            last_stats: FrameStats::default(),
        };
        engine.controller.update_camera(&mut engine.scene.camera);
        engine
    }

    /// Engine configured from persisted settings. Fails only when the
    /// configured background image cannot be loaded.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut engine = Self::new(settings.width, settings.height);
        engine.apply_settings(settings);
        if let Some(bg) = &settings.background_image {
            engine.load_background(bg)?;
        }
        Ok(engine)
    }

    /// Copy shading, light and ray tracing options out of `settings`.
    /// Does not touch the frame size or the background.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.rasterizer.params = settings.shading;
        self.rasterizer.shadows_enabled = settings.shadows;
        self.rasterizer.use_flat_backend = settings.flat_backend;
        self.scene
            .light
            .set_direction(Vec3::from_array(settings.light_direction));

        let rt = &settings.realtime;
        self.realtime.set_quality(rt.quality);
        self.realtime.set_blend_strength(rt.blend_strength);
        self.realtime.set_progress_overlay(rt.progress_overlay);
        self.realtime.set_adaptive_quality(rt.adaptive_quality);
        self.realtime.set_tile_boundaries(rt.tile_boundaries);
        self.realtime.background = rt.background;
        self.realtime.set_enabled(rt.enabled);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    /// The last composited frame.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn rasterizer_mut(&mut self) -> &mut Rasterizer {
        &mut self.rasterizer
    }

    pub fn realtime(&self) -> &RealtimeTracer {
        &self.realtime
    }

    pub fn realtime_mut(&mut self) -> &mut RealtimeTracer {
        &mut self.realtime
    }

    /// Frames rendered so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// One line summary for logs and the CLI.
    pub fn status_line(&self) -> String {
        let s = self.last_stats;
        format!(
            "frame {} | {} meshes | {} triangles | {} fragments | {}",
            self.frame_index,
            s.meshes,
            s.triangles,
            s.fragments,
            self.realtime.status()
        )
    }

    /// New render size. Invalidates any progressive ray tracing.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.frame.width(), self.frame.height()) {
            return;
        }
        self.frame = FrameBuffer::new(width, height);
        self.rasterizer.resize(width, height);
        self.realtime.resize(width, height);
        info!("resized to {width}x{height}");
    }

    // ------------------------------------------------------------------
    // Scene content
    // ------------------------------------------------------------------

    /// Load a mesh, select its node and return the node name.
    pub fn load_model(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<String> {
        let node = self.scene.load_model(path, name)?;
        self.scene.select_node(&node);
        self.realtime.mark_scene_dirty();
        Ok(node)
    }

    pub fn create_empty_node(&mut self, name: Option<&str>) -> String {
        self.scene.create_empty_node(name)
    }

    pub fn load_background(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.scene.load_background(path)
    }

    // ------------------------------------------------------------------
    // Selection edits
    // ------------------------------------------------------------------

    pub fn select_next(&mut self) -> Option<String> {
        self.scene.select_next()
    }

    pub fn select_previous(&mut self) -> Option<String> {
        self.scene.select_previous()
    }

    /// Delete the selected node. The root is never deleted.
    pub fn delete_selected(&mut self) -> bool {
        let Some(name) = self.selected_name() else {
            return false;
        };
        if name == ROOT_NAME {
            return false;
        }
        let deleted = self.scene.delete_node(&name);
        if deleted {
            self.realtime.mark_scene_dirty();
        }
        deleted
    }

    /// Copy the selected node next to itself and select the copy.
    pub fn duplicate_selected(&mut self) -> Option<String> {
        let name = self.selected_name()?;
        let copy = self.scene.duplicate_node(&name)?;
        if let Some(node) = self.scene.find_node_mut(&copy) {
            node.transform.position += DUPLICATE_OFFSET;
        }
        self.scene.select_node(&copy);
        self.realtime.mark_scene_dirty();
        debug!("duplicated {name} as {copy}");
        Some(copy)
    }

    /// Translate the selected node. False when nothing is selected.
    pub fn move_selected(&mut self, delta: Vec3) -> bool {
        self.edit_selected(|t| t.position += delta)
    }

    /// Add `delta` radians to the selected node's Euler angles.
    pub fn rotate_selected(&mut self, delta: Vec3) -> bool {
        self.edit_selected(|t| t.rotation += delta)
    }

    /// Add `delta` to the selected node's scale, never below [`MIN_NODE_SCALE`].
    pub fn scale_selected(&mut self, delta: Vec3) -> bool {
        self.edit_selected(|t| t.scale = (t.scale + delta).max(Vec3::splat(MIN_NODE_SCALE)))
    }

    fn edit_selected(&mut self, edit: impl FnOnce(&mut crate::scene::Transform)) -> bool {
        let Some(node) = self.scene.selected_node_mut() else {
            return false;
        };
        edit(&mut node.transform);
        self.realtime.mark_scene_dirty();
        true
    }

    fn selected_name(&self) -> Option<String> {
        self.scene.selected_node().map(|n| n.name.clone())
    }

    // ------------------------------------------------------------------
    // Camera
    // ------------------------------------------------------------------

    pub fn orbit_camera(&mut self, d_yaw: f32, d_pitch: f32) {
        self.controller.orbit(d_yaw, d_pitch, &mut self.scene.camera);
    }

    pub fn zoom_camera(&mut self, amount: f32) {
        self.controller.zoom(amount, &mut self.scene.camera);
    }

    pub fn pan_camera(&mut self, dx: f32, dy: f32) {
        self.controller.pan(dx, dy, &mut self.scene.camera);
    }

    pub fn reset_camera(&mut self) {
        self.controller.reset(&mut self.scene.camera);
    }

    pub fn toggle_camera_mode(&mut self) {
        self.controller.toggle_mode(&mut self.scene.camera);
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Produce one frame into [`Self::frame`].
    #[tracing::instrument(skip_all, fields(frame = self.frame_index))]
    pub fn render_frame(&mut self) -> FrameStats {
        self.scene.update_all_transforms();
        let stats = self.rasterizer.render(&self.scene, &mut self.frame);

        if self.realtime.is_enabled() {
            self.realtime.update_scene(&self.scene);
            self.realtime.render_one_tile();
            self.realtime.blend_into(&mut self.frame);
        }

        self.frame_index += 1;
        self.last_stats = stats;
        stats
    }

    /// Save the current frame; the format follows the extension.
    pub fn capture_frame(&self, path: impl AsRef<Path>) -> Result<()> {
        self.frame.save(path.as_ref())?;
        info!("captured {}", path.as_ref().display());
        Ok(())
    }

    /// Render `count` frames on one full orbit and save each as
    /// `<stem>_0000.<ext>`, `<stem>_0001.<ext>`, ...
    ///
    /// The camera is switched to orbit mode and restored afterwards.
    pub fn capture_sequence(&mut self, base: impl AsRef<Path>, count: u32) -> Result<Vec<PathBuf>> {
        let base = base.as_ref();
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        let ext = base
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_string());
        let dir = base.parent().unwrap_or_else(|| Path::new(""));

        let mode = self.controller.mode();
        let step = if count > 0 { TAU / count as f32 } else { 0.0 };
        let mut written = Vec::with_capacity(count as usize);
        for i in 0..count {
            if i > 0 {
                self.controller
                    .orbit_by_angle(step, 0.0, &mut self.scene.camera);
            }
            self.render_frame();
            let path = dir.join(format!("{stem}_{i:04}.{ext}"));
            self.capture_frame(&path)?;
            written.push(path);
        }
        self.controller.set_mode(mode, &mut self.scene.camera);
        Ok(written)
    }

    /// Path trace the scene from its camera at full quality.
    pub fn trace_offline(&mut self, settings: &OfflineSettings) -> RgbImage {
        self.scene.update_all_transforms();
        render_offline(&self.scene, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Model;
    use crate::scene::CameraMode;

    fn engine_with_triangle() -> (Engine, String) {
        let mut engine = Engine::new(64, 64);
        let model = Model::from_triangles(
            vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.0, 0.5, 0.0),
            ],
            &[0, 1, 2],
        );
        let name = engine.scene.add_model("tri", model, "Tri");
        engine.scene.select_node(&name);
        (engine, name)
    }

    #[test]
    fn test_render_frame_counts() {
        let (mut engine, _) = engine_with_triangle();
        let stats = engine.render_frame();
        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.triangles, 1);
        assert!(stats.fragments > 0);
        assert_eq!(engine.frame_index(), 1);
        assert!(engine.status_line().contains("1 meshes"));
    }

    #[test]
    fn test_duplicate_offsets_and_selects() {
        let (mut engine, name) = engine_with_triangle();
        let copy = engine.duplicate_selected().unwrap();
        assert_ne!(copy, name);
        assert_eq!(engine.scene.selected_node().unwrap().name, copy);
        let node = engine.scene.find_node(&copy).unwrap();
        assert_eq!(node.transform.position, DUPLICATE_OFFSET);
        assert_eq!(engine.scene.mesh_count(), 2);
    }

    #[test]
    fn test_delete_selected_never_removes_root() {
        let (mut engine, _) = engine_with_triangle();
        assert!(engine.delete_selected());
        assert_eq!(engine.scene.mesh_count(), 0);
        assert!(!engine.delete_selected());

        engine.scene.select_node(ROOT_NAME);
        assert!(!engine.delete_selected());
        assert_eq!(engine.scene.root().name, ROOT_NAME);
    }

    #[test]
    fn test_scale_is_clamped() {
        let (mut engine, name) = engine_with_triangle();
        assert!(engine.scale_selected(Vec3::splat(-5.0)));
        let t = engine.scene.find_node(&name).unwrap().transform;
        assert_eq!(t.scale, Vec3::splat(MIN_NODE_SCALE));

        assert!(engine.move_selected(Vec3::Y));
        assert!(engine.rotate_selected(Vec3::Z));
        let t = engine.scene.find_node(&name).unwrap().transform;
        assert_eq!(t.position, Vec3::Y);
        assert_eq!(t.rotation, Vec3::Z);

        engine.scene.clear_selection();
        assert!(!engine.move_selected(Vec3::X));
    }

    #[test]
    fn test_realtime_tile_runs_inside_frame() {
        let (mut engine, _) = engine_with_triangle();
        engine.realtime_mut().set_enabled(true);
        engine.render_frame();
        assert!(engine.realtime().coverage() > 0);
        assert!(!engine.realtime().is_scene_dirty());
    }

    #[test]
    fn test_settings_are_applied() {
        let mut settings = Settings::default();
        settings.width = 32;
        settings.height = 16;
        settings.shadows = false;
        settings.realtime.quality = 4;
        settings.realtime.enabled = true;
        let engine = Engine::from_settings(&settings).unwrap();
        assert_eq!((engine.width(), engine.height()), (32, 16));
        assert!(!engine.rasterizer().shadows_enabled);
        assert_eq!(engine.realtime().quality(), 4);
        assert!(engine.realtime().is_enabled());
    }

    #[test]
    fn test_capture_sequence_names() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, _) = engine_with_triangle();
        let paths = engine.capture_sequence(dir.path().join("spin.png"), 3).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("spin_0002.png"));
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_capture_sequence_orbits_without_speed() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, _) = engine_with_triangle();
        engine.controller.orbit_speed = 0.0;
        engine.toggle_camera_mode();
        let start = engine.scene.camera.position;

        engine.capture_sequence(dir.path().join("spin.png"), 4).unwrap();
        let eye = engine.scene.camera.position;
        assert!(eye.is_finite());
        // three quarter turns about +Y from (0, 0, 3)
        assert!((eye - Vec3::new(-start.z, start.y, start.x)).length() < 1e-3, "{eye:?}");
        assert_eq!(engine.controller.mode(), CameraMode::FreeLook);
    }

    #[test]
    fn test_resize_reallocates() {
        let (mut engine, _) = engine_with_triangle();
        engine.resize(20, 10);
        assert_eq!((engine.width(), engine.height()), (20, 10));
        assert_eq!(engine.realtime().rt_size(), (10, 5));
        engine.render_frame();
    }
}
