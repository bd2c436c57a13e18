//! CPU path tracer.
//!
//! Double precision throughout. Two front ends share the same core:
//!
//! ```text
//! Scene -> convert_scene -> build_bvh -> render_offline  (whole image, rayon rows)
//!                                     -> RealtimeTracer  (one tile per frame)
//! ```

pub mod build;
pub mod bvh;
pub mod camera;
pub mod material;
pub mod offline;
pub mod primitives;
pub mod ray;
pub mod realtime;
pub mod scene_convert;

pub use build::build_bvh;
pub use bvh::{Aabb, Bvh, BvhNode};
pub use camera::{ray_color, Background, RtCamera};
pub use material::{random_unit_vector, Lambertian, Material, Scatter};
pub use offline::{render_offline, render_world, write_ppm, OfflineSettings};
pub use primitives::{Hittable, Primitive, Sphere, Triangle};
pub use ray::{HitRecord, Interval, Ray};
pub use realtime::{QualityPreset, RealtimeTracer, TileStatus, TARGET_TILE_MS};
pub use scene_convert::{convert_scene, DEFAULT_ALBEDO};
