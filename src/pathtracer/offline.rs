//! Full-resolution path tracing to an image.
//!
//! Rows are traced in parallel with `rayon`, each with its own seeded RNG, so
//! a given seed always produces the same picture.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::build::build_bvh;
use super::camera::{ray_color, Background, RtCamera};
use super::primitives::Hittable;
use super::scene_convert::convert_scene;
use crate::scene::Scene;
use crate::util::{raster_to_rt, rt_color_to_rgb, DVec2, DVec3, Result};

/// Parameters of an offline render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineSettings {
    pub width: u32,
    /// Width over height.
    pub aspect_ratio: f64,
    pub samples_per_pixel: u32,
    pub max_depth: u32,
    /// Vertical field of view in degrees.
    pub vfov: f64,
    pub background: Background,
    pub seed: u64,
}

impl Default for OfflineSettings {
    fn default() -> Self {
        Self {
            width: 1200,
            aspect_ratio: 1.0,
            samples_per_pixel: 16,
            max_depth: 10,
            vfov: 20.0,
            background: Background::Sky,
            seed: 0,
        }
    }
}

impl OfflineSettings {
    pub fn height(&self) -> u32 {
        RtCamera::height_for_aspect(self.width, self.aspect_ratio)
    }
}

/// Path trace the visible meshes of `scene` from its camera.
#[tracing::instrument(skip_all, fields(width = settings.width, spp = settings.samples_per_pixel))]
pub fn render_offline(scene: &Scene, settings: &OfflineSettings) -> RgbImage {
    let world = build_bvh(convert_scene(scene));
    let camera = RtCamera::new(
        raster_to_rt(scene.camera.position),
        raster_to_rt(scene.camera.target),
        raster_to_rt(scene.camera.up),
        settings.vfov,
        settings.width,
        settings.height(),
    );
    render_world(&world, &camera, settings)
}

/// Path trace `world` through `camera`. Image row 0 is the top of the picture.
pub fn render_world<H: Hittable + Sync + ?Sized>(
    world: &H,
    camera: &RtCamera,
    settings: &OfflineSettings,
) -> RgbImage {
    let (width, height) = (camera.image_width, camera.image_height);
    let spp = settings.samples_per_pixel.max(1);
    let scale = 1.0 / spp as f64;
    let start = Instant::now();

    let mut image = RgbImage::new(width, height);
    image
        .par_chunks_mut(width as usize * 3)
        .enumerate()
        .for_each(|(j, row)| {
            let mut rng = StdRng::seed_from_u64(settings.seed.wrapping_add(j as u64));
            for (i, px) in row.chunks_exact_mut(3).enumerate() {
                let mut color = DVec3::ZERO;
                for _ in 0..spp {
                    let offset = DVec2::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5);
                    let ray = camera.ray_for(i as u32, j as u32, offset);
                    color += ray_color(&ray, settings.max_depth, world, settings.background, &mut rng);
                }
                px.copy_from_slice(&rt_color_to_rgb(color * scale));
            }
        });

    info!(
        "traced {}x{} at {} spp in {:.2?}",
        width,
        height,
        spp,
        start.elapsed()
    );
    image
}

/// Write `image` as plain-text (P3) PPM.
pub fn write_ppm(image: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let writer = BufWriter::new(File::create(path)?);
    PnmEncoder::new(writer)
        .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Ascii))
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)?;
    info!("wrote {}", path.display());
    Ok(())
}
