//! Convert the scene graph into path tracer primitives.
//!
//! Every visible mesh node is fan triangulated and moved to world space.
//! All triangles share one diffuse material.

use std::sync::Arc;

use tracing::{debug, info};

use super::material::{Lambertian, Material};
use super::primitives::{Primitive, Triangle};
use crate::scene::Scene;
use crate::util::{raster_point_to_rt, DVec3};

/// Albedo of the shared material.
pub const DEFAULT_ALBEDO: DVec3 = DVec3::new(0.7, 0.3, 0.3);

/// World-space triangles of every visible mesh. Transforms must be up to date.
#[tracing::instrument(skip_all)]
pub fn convert_scene(scene: &Scene) -> Vec<Primitive> {
    let material: Arc<dyn Material> = Arc::new(Lambertian::new(DEFAULT_ALBEDO));
    let meshes = scene.visible_meshes();
    let mut out = Vec::new();

    for (node, model) in &meshes {
        let world = node.world_matrix();
        let before = out.len();
        for face in 0..model.face_count() {
            for corners in model.fan(face) {
                let [a, b, c] =
                    corners.map(|nth| raster_point_to_rt(world * model.vertex(face, nth).extend(1.0)));
                out.push(Triangle::new(a, b, c, material.clone()).into());
            }
        }
        debug!(node = %node.name, triangles = out.len() - before, "converted mesh");
    }

    info!(meshes = meshes.len(), triangles = out.len(), "scene converted");
    out
}
