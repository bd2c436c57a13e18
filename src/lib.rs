//! # softrender
//!
//! CPU-only 3D renderer with two pipelines sharing one scene graph:
//!
//! - a scanline rasterizer with two-pass directional shadow mapping, and
//! - a double-precision BVH path tracer, used either offline for a whole
//!   image or progressively, one tile per frame, blended over the raster.
//!
//! ## Modules
//!
//! - [`util`] - Math helpers, coordinate/color conversion, errors
//! - [`geom`] - Meshes, textures, blend shapes
//! - [`scene`] - Scene graph, camera, light
//! - [`raster`] - Buffers, triangle service, shaders, frame pipeline
//! - [`pathtracer`] - Rays, materials, BVH, offline and real-time tracing
//! - [`settings`] - Persisted configuration
//! - [`engine`] - Headless frame loop
//!
//! ## Example
//!
//! ```ignore
//! use softrender::Engine;
//!
//! let mut engine = Engine::new(800, 800);
//! engine.load_model("head.obj", None)?;
//! engine.realtime_mut().set_enabled(true);
//! for _ in 0..100 {
//!     engine.render_frame();
//! }
//! engine.capture_frame("head.png")?;
//! ```

pub mod util;
pub mod geom;
pub mod scene;
pub mod raster;
pub mod pathtracer;
pub mod settings;
pub mod engine;

// Re-export commonly used types
pub use engine::Engine;
pub use settings::Settings;
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::Engine;
    pub use crate::geom::{Model, Texture};
    pub use crate::pathtracer::{OfflineSettings, RealtimeTracer};
    pub use crate::raster::{FrameBuffer, Rasterizer};
    pub use crate::scene::{Camera, CameraController, Light, Scene, SceneNode, Transform};
    pub use crate::settings::Settings;
    pub use crate::util::{Error, Result};
}
