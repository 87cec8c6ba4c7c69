//! Utility types shared by every layer of the engine.
//!
//! - [`Aabb`] / [`Ray`] - Bounding boxes and rays (slab test)
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
