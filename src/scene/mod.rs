//! Scene graph, camera and light.
//!
//! - [`Scene`] - node tree plus the model registry
//! - [`SceneNode`] / [`Transform`] - hierarchy and local/world transforms
//! - [`Camera`] / [`CameraController`] - view and orbit/free-look control
//! - [`Light`] - the directional light

mod camera;
mod graph;
mod light;
mod node;

pub use camera::{Camera, CameraController, CameraMode};
pub use graph::{Scene, ROOT_NAME};
pub use light::Light;
pub use node::{ModelHandle, NodeKind, SceneNode, Transform};
