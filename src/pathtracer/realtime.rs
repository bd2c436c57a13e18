//! Progressive path tracing, one tile per frame.
//!
//! The tracer renders at half the frame resolution. Each call to
//! [`RealtimeTracer::render_one_tile`] traces a single tile and advances the
//! cursor in row-major order, wrapping back to the first tile after the last
//! one. [`RealtimeTracer::blend_into`] upsamples whatever has been traced so
//! far onto the rasterized frame.
//!
//! Both low-resolution buffers use the same bottom-left origin as
//! [`FrameBuffer`]; only camera ray generation counts rows from the top.

use std::fmt;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::build::build_bvh;
use super::bvh::Bvh;
use super::camera::{ray_color, Background, RtCamera};
use super::scene_convert::convert_scene;
use crate::raster::FrameBuffer;
use crate::scene::Scene;
use crate::util::{raster_to_rt, rt_color_to_rgb, DVec2, DVec3, Vec3};

/// Per-tile time the adaptive controller aims for, in milliseconds.
pub const TARGET_TILE_MS: f32 = 2.0;
/// Minimum eye or target displacement that restarts accumulation.
const CAMERA_MOVE_THRESHOLD: f32 = 0.01;
/// Cap on the moving-average window.
const MAX_TIME_SAMPLES: u32 = 60;
const INITIAL_TILE_MS: f32 = 16.67;
const RT_VFOV: f64 = 45.0;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 4;

const COMPLETED_TILE_TINT: [u8; 3] = [0, 50, 0];
const TILE_BOUNDARY_TINT: [u8; 3] = [100, 100, 0];

/// Sampling parameters for one quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub samples_per_pixel: u32,
    pub max_depth: u32,
    pub tile_size: u32,
}

impl QualityPreset {
    /// Preset for `level`, clamped into `1..=4`.
    pub fn for_level(level: u8) -> Self {
        let (samples_per_pixel, max_depth, tile_size) = match level.clamp(MIN_QUALITY, MAX_QUALITY) {
            1 => (1, 2, 32),
            2 => (1, 3, 16),
            3 => (2, 4, 8),
            _ => (4, 6, 8),
        };
        Self {
            samples_per_pixel,
            max_depth,
            tile_size,
        }
    }
}

fn quality_label(level: u8) -> &'static str {
    match level {
        1 => "Fast",
        2 => "Medium",
        3 => "High",
        _ => "Ultra",
    }
}

/// Snapshot of the scheduler for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileStatus {
    pub enabled: bool,
    /// Share of the current pass already traced, in percent.
    pub progress: f32,
    pub quality: u8,
    pub blend_strength: f32,
    pub average_tile_ms: f32,
    pub adaptive_quality: bool,
    pub progress_overlay: bool,
    pub tile_boundaries: bool,
    pub tile: (u32, u32),
    pub tiles: (u32, u32),
}

impl fmt::Display for TileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return write!(f, "ray tracing disabled");
        }
        let on = |b: bool| if b { "on" } else { "off" };
        write!(
            f,
            "progress {:.1}% | quality {}/{} ({}) | blend {:.0}% | tile {:.2} ms | adaptive {} | overlay {} | boundaries {}",
            self.progress,
            self.quality,
            MAX_QUALITY,
            quality_label(self.quality),
            self.blend_strength * 100.0,
            self.average_tile_ms,
            on(self.adaptive_quality),
            on(self.progress_overlay),
            on(self.tile_boundaries),
        )
    }
}

/// Tile-by-tile path tracer that refines a low-resolution image across frames.
pub struct RealtimeTracer {
    render_width: u32,
    render_height: u32,
    rt_width: u32,
    rt_height: u32,

    quality: u8,
    preset: QualityPreset,
    tile_x: u32,
    tile_y: u32,
    tiles_x: u32,
    tiles_y: u32,
    enabled: bool,

    /// Traced pixels, `rt_width x rt_height`.
    frame: FrameBuffer,
    /// Pixels written since the last reset.
    written: Vec<bool>,
    /// Completed-tile tint, full render resolution.
    overlay: FrameBuffer,

    world: Bvh,
    world_dirty: bool,
    camera: RtCamera,
    last_eye: Vec3,
    last_target: Vec3,
    frames_since_camera_move: u32,

    blend_strength: f32,
    show_overlay: bool,
    adaptive_quality: bool,
    show_boundaries: bool,
    /// Seen by rays that leave the scene.
    pub background: Background,

    average_tile_ms: f32,
    time_samples: u32,
    rng: StdRng,
}

impl fmt::Debug for RealtimeTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeTracer")
            .field("rt_size", &(self.rt_width, self.rt_height))
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl RealtimeTracer {
    /// Tracer for a `render_width x render_height` frame. Starts disabled.
    pub fn new(render_width: u32, render_height: u32) -> Self {
        let (rt_width, rt_height) = rt_size(render_width, render_height);
        let quality = 2;
        let mut tracer = Self {
            render_width,
            render_height,
            rt_width,
            rt_height,
            quality,
            preset: QualityPreset::for_level(quality),
            tile_x: 0,
            tile_y: 0,
            tiles_x: 0,
            tiles_y: 0,
            enabled: false,
            frame: FrameBuffer::new(rt_width, rt_height),
            written: vec![false; (rt_width * rt_height) as usize],
            overlay: FrameBuffer::new(render_width, render_height),
            world: Bvh::default(),
            world_dirty: true,
            camera: RtCamera::default(),
            last_eye: Vec3::ZERO,
            last_target: Vec3::ZERO,
            frames_since_camera_move: 0,
            blend_strength: 0.7,
            show_overlay: true,
            adaptive_quality: false,
            show_boundaries: false,
            background: Background::Black,
            average_tile_ms: INITIAL_TILE_MS,
            time_samples: 0,
            rng: StdRng::seed_from_u64(0),
        };
        tracer.update_tile_grid();
        debug!(
            "real-time tracer {}x{}, {} tiles",
            rt_width,
            rt_height,
            tracer.tiles_x * tracer.tiles_y
        );
        tracer
    }

    // ------------------------------------------------------------------
    // Toggles
    // ------------------------------------------------------------------

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn toggle(&mut self) {
        self.set_enabled(!self.enabled);
    }

    /// Enabling starts a fresh pass.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        info!("real-time ray tracing {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            self.reset_tiles();
        }
    }

    #[inline]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn preset(&self) -> QualityPreset {
        self.preset
    }

    /// Returns false at the top level.
    pub fn increase_quality(&mut self) -> bool {
        if self.quality >= MAX_QUALITY {
            return false;
        }
        self.set_quality(self.quality + 1);
        true
    }

    /// Returns false at the bottom level.
    pub fn decrease_quality(&mut self) -> bool {
        if self.quality <= MIN_QUALITY {
            return false;
        }
        self.set_quality(self.quality - 1);
        true
    }

    /// Switch level (clamped). Changing level restarts the pass.
    pub fn set_quality(&mut self, level: u8) {
        let level = level.clamp(MIN_QUALITY, MAX_QUALITY);
        if level == self.quality {
            return;
        }
        self.quality = level;
        self.preset = QualityPreset::for_level(level);
        self.update_tile_grid();
        self.reset_tiles();
        debug!("ray tracing quality {}/{}", level, MAX_QUALITY);
    }

    #[inline]
    pub fn blend_strength(&self) -> f32 {
        self.blend_strength
    }

    pub fn adjust_blend_strength(&mut self, delta: f32) {
        self.set_blend_strength(self.blend_strength + delta);
    }

    /// Clamped into `[0, 1]`; NaN is ignored.
    pub fn set_blend_strength(&mut self, blend: f32) {
        if !blend.is_nan() {
            self.blend_strength = blend.clamp(0.0, 1.0);
        }
    }

    pub fn progress_overlay(&self) -> bool {
        self.show_overlay
    }

    /// Turning the overlay off also erases it.
    pub fn toggle_progress_overlay(&mut self) {
        self.set_progress_overlay(!self.show_overlay);
    }

    pub fn set_progress_overlay(&mut self, on: bool) {
        self.show_overlay = on;
        if !on {
            self.overlay.clear([0, 0, 0]);
        }
    }

    pub fn adaptive_quality(&self) -> bool {
        self.adaptive_quality
    }

    pub fn toggle_adaptive_quality(&mut self) {
        self.adaptive_quality = !self.adaptive_quality;
    }

    pub fn set_adaptive_quality(&mut self, on: bool) {
        self.adaptive_quality = on;
    }

    pub fn tile_boundaries(&self) -> bool {
        self.show_boundaries
    }

    pub fn toggle_tile_boundaries(&mut self) {
        self.show_boundaries = !self.show_boundaries;
    }

    pub fn set_tile_boundaries(&mut self, on: bool) {
        self.show_boundaries = on;
    }

    // ------------------------------------------------------------------
    // Geometry and accumulation state
    // ------------------------------------------------------------------

    /// Low-resolution size.
    pub fn rt_size(&self) -> (u32, u32) {
        (self.rt_width, self.rt_height)
    }

    /// Number of tiles horizontally and vertically.
    pub fn tile_grid(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }

    /// Tile the next call to [`Self::render_one_tile`] traces.
    pub fn current_tile(&self) -> (u32, u32) {
        (self.tile_x, self.tile_y)
    }

    /// Traced low-resolution image (bottom-left origin).
    pub fn rt_frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Low-resolution pixels traced since the last reset.
    pub fn coverage(&self) -> usize {
        self.written.iter().filter(|&&w| w).count()
    }

    pub fn world(&self) -> &Bvh {
        &self.world
    }

    pub fn is_scene_dirty(&self) -> bool {
        self.world_dirty
    }

    pub fn frames_since_camera_move(&self) -> u32 {
        self.frames_since_camera_move
    }

    /// Restart the pass from the first tile with an empty image.
    pub fn reset_tiles(&mut self) {
        self.tile_x = 0;
        self.tile_y = 0;
        self.frame.clear([0, 0, 0]);
        self.written.fill(false);
        if self.show_overlay {
            self.overlay.clear([0, 0, 0]);
        }
        debug!("ray trace tiles reset");
    }

    /// Rebuild the primitives on the next [`Self::update_scene`] and restart the pass.
    pub fn mark_scene_dirty(&mut self) {
        self.world_dirty = true;
        self.reset_tiles();
    }

    /// Follow a new frame size. Drops everything traced so far.
    pub fn resize(&mut self, render_width: u32, render_height: u32) {
        if (render_width, render_height) == (self.render_width, self.render_height) {
            return;
        }
        self.render_width = render_width;
        self.render_height = render_height;
        (self.rt_width, self.rt_height) = rt_size(render_width, render_height);
        self.frame = FrameBuffer::new(self.rt_width, self.rt_height);
        self.written = vec![false; (self.rt_width * self.rt_height) as usize];
        self.overlay = FrameBuffer::new(render_width, render_height);
        self.update_tile_grid();
        self.reset_tiles();
    }

    fn update_tile_grid(&mut self) {
        let t = self.preset.tile_size;
        self.tiles_x = self.rt_width.div_ceil(t);
        self.tiles_y = self.rt_height.div_ceil(t);
    }

    // ------------------------------------------------------------------
    // Per-frame work
    // ------------------------------------------------------------------

    /// Sync with the scene: restart on camera motion, rebuild when dirty,
    /// and point the tracing camera where the scene camera looks.
    ///
    /// Does nothing while disabled. Transforms must be up to date.
    pub fn update_scene(&mut self, scene: &Scene) {
        if !self.enabled {
            return;
        }
        let cam = &scene.camera;
        let moved = (cam.position - self.last_eye).length() > CAMERA_MOVE_THRESHOLD
            || (cam.target - self.last_target).length() > CAMERA_MOVE_THRESHOLD;
        if moved {
            self.reset_tiles();
            self.last_eye = cam.position;
            self.last_target = cam.target;
            self.frames_since_camera_move = 0;
        } else {
            self.frames_since_camera_move += 1;
        }

        if self.world_dirty {
            self.world = build_bvh(convert_scene(scene));
            self.world_dirty = false;
            info!(
                primitives = self.world.primitives().len(),
                "ray traced scene rebuilt"
            );
        }

        self.camera = RtCamera::new(
            raster_to_rt(cam.position),
            raster_to_rt(cam.target),
            raster_to_rt(cam.up),
            RT_VFOV,
            self.rt_width,
            self.rt_height,
        );
    }

    /// Trace the current tile and advance. Does nothing while disabled.
    pub fn render_one_tile(&mut self) {
        if !self.enabled {
            return;
        }
        let start = Instant::now();

        let t = self.preset.tile_size;
        let x0 = self.tile_x * t;
        let y0 = self.tile_y * t;
        let x1 = (x0 + t).min(self.rt_width);
        let y1 = (y0 + t).min(self.rt_height);
        self.trace_tile(x0, y0, x1, y1);
        if self.show_overlay {
            self.paint_overlay(x0, y0, x1, y1);
        }
        self.advance_tile();

        self.record_tile_time(start.elapsed().as_secs_f32() * 1000.0);
        if self.adaptive_quality {
            self.adapt_quality();
        }
    }

    fn trace_tile(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) {
        let spp = self.preset.samples_per_pixel.max(1);
        let depth = self.preset.max_depth;
        for y in y0..y1 {
            // camera rows count from the top
            let row = self.rt_height - 1 - y;
            for x in x0..x1 {
                let mut color = DVec3::ZERO;
                for sample in 0..spp {
                    let offset = if sample == 0 {
                        DVec2::ZERO
                    } else {
                        DVec2::new(
                            self.rng.random::<f64>() - 0.5,
                            self.rng.random::<f64>() - 0.5,
                        )
                    };
                    let ray = self.camera.ray_for(x, row, offset);
                    color += ray_color(&ray, depth, &self.world, self.background, &mut self.rng);
                }
                self.frame.set(x, y, rt_color_to_rgb(color / spp as f64));
                self.written[(x + y * self.rt_width) as usize] = true;
            }
        }
    }

    /// Tint the frame-space rectangle covered by a finished tile.
    fn paint_overlay(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) {
        let (w, h) = (self.render_width, self.render_height);
        let mx0 = x0 * w / self.rt_width;
        let my0 = y0 * h / self.rt_height;
        let mx1 = (x1 * w / self.rt_width).min(w);
        let my1 = (y1 * h / self.rt_height).min(h);
        if mx0 >= mx1 || my0 >= my1 {
            return;
        }
        for y in my0..my1 {
            for x in mx0..mx1 {
                self.overlay.set(x, y, COMPLETED_TILE_TINT);
            }
        }
        if self.show_boundaries {
            for x in mx0..mx1 {
                self.overlay.set(x, my0, TILE_BOUNDARY_TINT);
                self.overlay.set(x, my1 - 1, TILE_BOUNDARY_TINT);
            }
            for y in my0..my1 {
                self.overlay.set(mx0, y, TILE_BOUNDARY_TINT);
                self.overlay.set(mx1 - 1, y, TILE_BOUNDARY_TINT);
            }
        }
    }

    fn advance_tile(&mut self) {
        self.tile_x += 1;
        if self.tile_x >= self.tiles_x {
            self.tile_x = 0;
            self.tile_y += 1;
            if self.tile_y >= self.tiles_y {
                self.tile_y = 0;
            }
        }
    }

    // ------------------------------------------------------------------
    // Adaptive quality
    // ------------------------------------------------------------------

    pub fn average_tile_ms(&self) -> f32 {
        self.average_tile_ms
    }

    /// Fold one tile time into the moving average.
    pub fn record_tile_time(&mut self, ms: f32) {
        self.time_samples = self.time_samples.saturating_add(1);
        let alpha = 1.0 / self.time_samples.min(MAX_TIME_SAMPLES) as f32;
        self.average_tile_ms = self.average_tile_ms * (1.0 - alpha) + ms * alpha;
    }

    /// Step quality once if the average leaves the `[0.5, 2] x target` band.
    pub fn adapt_quality(&mut self) {
        if self.average_tile_ms > TARGET_TILE_MS * 2.0 {
            self.decrease_quality();
        } else if self.average_tile_ms < TARGET_TILE_MS * 0.5 {
            self.increase_quality();
        }
    }

    // ------------------------------------------------------------------
    // Compositing
    // ------------------------------------------------------------------

    /// Mix the traced image into `target` and add the progress overlay.
    ///
    /// A black traced pixel counts as "not traced yet", so genuinely black
    /// results show the raster color instead. Does nothing while disabled.
    pub fn blend_into(&self, target: &mut FrameBuffer) {
        if !self.enabled {
            return;
        }
        let (w, h) = (target.width(), target.height());
        if w == 0 || h == 0 {
            return;
        }
        let mut blend = self.blend_strength;
        if self.quality == MIN_QUALITY {
            blend *= 0.6;
        }

        for y in 0..h {
            let ry = (y * self.rt_height / h).min(self.rt_height - 1);
            for x in 0..w {
                let rx = (x * self.rt_width / w).min(self.rt_width - 1);
                let rt = self.frame.get(rx, ry);
                if rt != [0, 0, 0] {
                    let raster = target.get(x, y);
                    let mixed: [u8; 3] = std::array::from_fn(|i| {
                        (rt[i] as f32 * blend + raster[i] as f32 * (1.0 - blend)) as u8
                    });
                    target.set(x, y, mixed);
                }

                if self.show_overlay && x < self.overlay.width() && y < self.overlay.height() {
                    let tint = self.overlay.get(x, y);
                    if tint != [0, 0, 0] {
                        let current = target.get(x, y);
                        let lit: [u8; 3] =
                            std::array::from_fn(|i| current[i].saturating_add(tint[i] / 4));
                        target.set(x, y, lit);
                    }
                }
            }
        }
    }

    pub fn status(&self) -> TileStatus {
        let total = (self.tiles_x * self.tiles_y).max(1);
        let done = self.tile_y * self.tiles_x + self.tile_x;
        TileStatus {
            enabled: self.enabled,
            progress: done as f32 / total as f32 * 100.0,
            quality: self.quality,
            blend_strength: self.blend_strength,
            average_tile_ms: self.average_tile_ms,
            adaptive_quality: self.adaptive_quality,
            progress_overlay: self.show_overlay,
            tile_boundaries: self.show_boundaries,
            tile: (self.tile_x, self.tile_y),
            tiles: (self.tiles_x, self.tiles_y),
        }
    }
}

/// Half the frame size, at least one pixel each way.
fn rt_size(render_width: u32, render_height: u32) -> (u32, u32) {
    ((render_width / 2).max(1), (render_height / 2).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let rt = RealtimeTracer::new(200, 100);
        assert!(!rt.is_enabled());
        assert_eq!(rt.rt_size(), (100, 50));
        assert_eq!(rt.quality(), 2);
        assert_eq!(rt.tile_grid(), (7, 4));
        assert_eq!(rt.blend_strength(), 0.7);
        assert!(rt.progress_overlay());
        assert!(!rt.adaptive_quality());
        assert!(!rt.tile_boundaries());
        assert_eq!(rt.average_tile_ms(), INITIAL_TILE_MS);
    }

    #[test]
    fn test_quality_table() {
        assert_eq!(QualityPreset::for_level(1).tile_size, 32);
        assert_eq!(QualityPreset::for_level(3).samples_per_pixel, 2);
        assert_eq!(QualityPreset::for_level(4).max_depth, 6);
        assert_eq!(QualityPreset::for_level(0), QualityPreset::for_level(1));
        assert_eq!(QualityPreset::for_level(9), QualityPreset::for_level(4));
    }

    #[test]
    fn test_quality_change_resizes_grid_and_resets() {
        let mut rt = RealtimeTracer::new(64, 64);
        rt.set_enabled(true);
        rt.render_one_tile();
        assert_ne!(rt.current_tile(), (0, 0));
        assert!(rt.increase_quality());
        assert_eq!(rt.tile_grid(), (4, 4));
        assert_eq!(rt.current_tile(), (0, 0));
        assert_eq!(rt.coverage(), 0);
        assert!(rt.increase_quality());
        assert!(!rt.increase_quality());
        assert_eq!(rt.quality(), 4);
    }

    #[test]
    fn test_disabled_does_nothing() {
        let mut rt = RealtimeTracer::new(32, 32);
        rt.render_one_tile();
        assert_eq!(rt.coverage(), 0);
        let mut fb = FrameBuffer::new(32, 32);
        fb.clear([5, 5, 5]);
        rt.blend_into(&mut fb);
        assert_eq!(fb.get(0, 0), [5, 5, 5]);
    }

    #[test]
    fn test_blend_strength_clamped() {
        let mut rt = RealtimeTracer::new(8, 8);
        rt.adjust_blend_strength(1.0);
        assert_eq!(rt.blend_strength(), 1.0);
        rt.adjust_blend_strength(-5.0);
        assert_eq!(rt.blend_strength(), 0.0);
        rt.set_blend_strength(f32::NAN);
        assert_eq!(rt.blend_strength(), 0.0);
    }

    #[test]
    fn test_ema_first_sample_replaces_seed() {
        let mut rt = RealtimeTracer::new(8, 8);
        rt.record_tile_time(4.0);
        assert_eq!(rt.average_tile_ms(), 4.0);
        rt.record_tile_time(2.0);
        assert_eq!(rt.average_tile_ms(), 3.0);
    }

    #[test]
    fn test_blend_skips_black_and_adds_overlay() {
        let mut rt = RealtimeTracer::new(4, 4);
        rt.set_enabled(true);
        rt.frame.set(0, 0, [200, 200, 200]);
        rt.overlay.set(3, 3, [0, 40, 0]);

        let mut fb = FrameBuffer::new(4, 4);
        fb.clear([100, 100, 100]);
        rt.blend_into(&mut fb);
        // 200 * 0.7 + 100 * 0.3
        let c = fb.get(0, 0);
        assert!(c[0].abs_diff(170) <= 1);
        // untraced pixels keep the raster color, tinted by the overlay
        assert_eq!(fb.get(3, 3), [100, 110, 100]);
        assert_eq!(fb.get(2, 3), [100, 100, 100]);
    }

    #[test]
    fn test_overlay_off_clears() {
        let mut rt = RealtimeTracer::new(4, 4);
        rt.overlay.set(1, 1, [0, 50, 0]);
        rt.toggle_progress_overlay();
        assert_eq!(rt.overlay.get(1, 1), [0, 0, 0]);
    }

    #[test]
    fn test_status_display() {
        let mut rt = RealtimeTracer::new(64, 64);
        assert_eq!(rt.status().to_string(), "ray tracing disabled");
        rt.toggle();
        rt.render_one_tile();
        let s = rt.status();
        assert_eq!(s.tile, (1, 0));
        assert!((s.progress - 25.0).abs() < 1e-4);
        assert!(s.to_string().contains("quality 2/4 (Medium)"));
    }

    #[test]
    fn test_resize_invalidates() {
        let mut rt = RealtimeTracer::new(64, 64);
        rt.set_enabled(true);
        rt.render_one_tile();
        rt.resize(128, 32);
        assert_eq!(rt.rt_size(), (64, 16));
        assert_eq!(rt.tile_grid(), (4, 1));
        assert_eq!(rt.coverage(), 0);
        assert_eq!(rt.current_tile(), (0, 0));
    }
}
