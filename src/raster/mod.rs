//! Software rasterizer.
//!
//! Screen space has its origin at the bottom-left corner and depth grows away
//! from the viewer: every depth buffer keeps the minimum.

mod backend;
mod buffer;
mod pipeline;
mod shaders;
mod triangle;

pub use backend::{FlatBackend, TriangleBackend};
pub use buffer::{DepthBuffer, FrameBuffer};
pub use pipeline::{FrameStats, Rasterizer};
pub use shaders::{
    DepthShader, DrawContext, ShadingParams, ShadowShader, BLACK_TEXEL_COLOR, MISSING_UV_COLOR,
};
pub use triangle::{barycentric, rasterize, Shader};
