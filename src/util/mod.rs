//! Utility types and functions shared by both render pipelines.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math re-exports from glam plus transform construction helpers

mod error;
mod math;

pub use error::*;
pub use math::*;
