//! # phr-bvh
//!
//! Parallel bounding volume hierarchy construction and traversal for ray
//! tracing.
//!
//! Two builders are provided. The linear builder sorts primitives along a
//! Morton curve and derives a binary radix tree from the sorted keys; it is
//! fast but ignores primitive sizes. The agglomerative builder refines a
//! linear tree top-down with a surface area heuristic sweep, trading build
//! time (tuned through `alpha` and `delta`) for cheaper traversal.
//!
//! ## Modules
//!
//! - [`util`] - Boxes, rays and errors
//! - [`core`] - The primitive contract, build configuration, worker pool
//! - [`bvh`] - The tree, closest-hit traversal and the cost model
//! - [`lbvh`] - Morton keys, parallel bucket sort, linear builder
//! - [`phr`] - Agglomerative builder
//!
//! ## Example
//!
//! ```ignore
//! use phr_bvh::prelude::*;
//!
//! let builder = PhrBuilder::with_defaults(&triangles);
//! let bvh = builder.build()?;
//! if let Some(hit) = bvh.intersect(&ray, 0.001, f64::MAX) {
//!     println!("hit primitive {} at t = {}", hit.primitive, hit.t);
//! }
//! ```

pub mod util;
pub mod core;
pub mod bvh;
pub mod lbvh;
pub mod phr;

// Re-export commonly used types
pub use util::{Aabb, Error, Ray, Result};
pub use bvh::{Bvh, Node, NodeId};
pub use lbvh::{default_linear_build, linear_build};
pub use phr::{default_threshold, AreaThreshold, PhrBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Aabb, DVec3, Error, Ray, Result};
    pub use crate::core::{enclosing, BuildConfig, CostModel, Hit, PhrParams, Primitive};
    pub use crate::bvh::{Bvh, Node, NodeId};
    pub use crate::lbvh::{default_linear_build, linear_build};
    pub use crate::phr::{default_threshold, AreaThreshold, PhrBuilder};
}
