//! Mesh storage and texture maps.
//!
//! - [`Model`] - indexed polygon mesh, texture maps, blend shapes
//! - [`Texture`] - clamped 8-bit RGB lookups

mod model;
mod texture;

pub use model::{BlendShape, Face, FaceVertex, Model};
pub use texture::Texture;
