//! Error types for the renderer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for renderer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Mesh file could not be parsed
    #[error("Failed to load mesh {path}: {source}")]
    ObjLoad {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    /// Mesh file parsed but produced no vertices
    #[error("Mesh has no vertices: {0}")]
    EmptyModel(PathBuf),

    /// Scene node not found by name
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Image decode or encode failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Settings file could not be (de)serialized
    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a node-not-found error.
    pub fn node(name: impl Into<String>) -> Self {
        Self::NodeNotFound(name.into())
    }
}

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, Error>;
