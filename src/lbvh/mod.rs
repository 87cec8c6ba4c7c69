//! Linear BVH construction.
//!
//! ## Pipeline
//! ```text
//! primitives -> Morton keys -> bucket sort -> radix tree jobs -> refit
//!               (rayon)        (rayon)        (job pool)         (rayon)
//! ```
//!
//! The radix tree is built top-down over the sorted keys: a job covering a
//! range of keys splits it at the first key whose current bit is set, then
//! moves to the next lower bit. Only structure is produced here; boxes come
//! from the bottom-up refit pass at the end.

pub mod morton;
pub mod sort;

use std::time::Instant;

use crate::bvh::arena::{BuildArena, BuildNode, ParentSlot};
use crate::bvh::{refit, Bvh};
use crate::core::pool::{self, JobHandler, Scheduler};
use crate::core::{enclosing, BuildConfig, Primitive};
use crate::util::{Aabb, Error, Result};

pub use morton::KeyPair;
pub use sort::bucket_sort;

/// Build a linear BVH with the default configuration.
pub fn default_linear_build<P: Primitive>(primitives: &[P]) -> Result<Bvh<'_, P>> {
    let scene = enclosing(primitives).ok_or(Error::EmptyScene)?;
    linear_build(primitives, scene, &BuildConfig::default())
}

/// Build a linear BVH over `primitives` quantised inside `enclosing`.
///
/// `enclosing` must contain every primitive's centroid; centroids outside
/// it are clamped to the grid border.
#[tracing::instrument(skip_all, fields(prim_count = primitives.len(), workers = config.workers))]
pub fn linear_build<'p, P: Primitive>(
    primitives: &'p [P],
    enclosing: Aabb,
    config: &BuildConfig,
) -> Result<Bvh<'p, P>> {
    config.validate()?;
    if primitives.is_empty() {
        return Err(Error::EmptyScene);
    }
    if primitives.len() > u32::MAX as usize {
        return Err(Error::invalid(format!(
            "at most {} primitives are supported, got {}",
            u32::MAX,
            primitives.len()
        )));
    }

    let threads = config.thread_pool("lbvh")?;

    let start = Instant::now();
    let mut pairs = morton::assign_keys(primitives, &enclosing, config.morton_bits, config.workers, &threads);
    tracing::debug!(elapsed = ?start.elapsed(), "assigned morton keys");

    let start = Instant::now();
    sort::bucket_sort_in(&threads, &mut pairs, config.key_bits(), config.bucket_count, config.workers);
    tracing::debug!(elapsed = ?start.elapsed(), "sorted keys");

    let start = Instant::now();
    let (arena, root) = BuildArena::new();
    let handler = RadixTree { arena: &arena };
    let top = 1u64 << (config.key_bits() - 1);
    pool::run(
        &handler,
        config.workers,
        "lbvh-build",
        RangeJob {
            pairs: &pairs,
            mask: top,
            parent: root,
        },
    )?;
    let finished = arena.finish(None);
    tracing::debug!(elapsed = ?start.elapsed(), nodes = finished.nodes.len(), "built radix tree");

    let start = Instant::now();
    let mut bvh = Bvh::from_parts(finished.nodes, finished.root, primitives, finished.leaves, config.cost);
    let leaves = bvh.leaves().to_vec();
    refit::refit(bvh.nodes_mut(), &leaves, primitives, &threads);
    tracing::debug!(elapsed = ?start.elapsed(), "refit boxes");

    Ok(bvh)
}

/// Index of the first pair in `pairs` whose code has `mask` set.
///
/// `pairs` must be sorted and share every bit above `mask`, which makes the
/// masked bit monotonic over the range.
#[inline]
pub(crate) fn find_split(pairs: &[KeyPair], mask: u64) -> usize {
    pairs.partition_point(|p| p.code & mask == 0)
}

struct RangeJob<'a> {
    pairs: &'a [KeyPair],
    mask: u64,
    parent: ParentSlot,
}

struct RadixTree<'a> {
    arena: &'a BuildArena,
}

impl<'a> JobHandler for RadixTree<'a> {
    type Job = RangeJob<'a>;

    fn process(&self, job: RangeJob<'a>, scheduler: &Scheduler<'_, Self>) {
        let RangeJob {
            pairs,
            mut mask,
            parent,
        } = job;

        // Equal first and last keys mean the whole sorted range is equal
        if pairs[0].code != pairs[pairs.len() - 1].code {
            while mask != 0 {
                let split = find_split(pairs, mask);
                if split == 0 || split == pairs.len() {
                    mask >>= 1;
                    continue;
                }
                let branch = self.arena.insert(parent, BuildNode::branch(None, 2));
                scheduler.spawn(RangeJob {
                    pairs: &pairs[..split],
                    mask: mask >> 1,
                    parent: ParentSlot { node: branch, index: 0 },
                });
                scheduler.spawn(RangeJob {
                    pairs: &pairs[split..],
                    mask: mask >> 1,
                    parent: ParentSlot { node: branch, index: 1 },
                });
                return;
            }
        }

        let primitives = pairs.iter().map(|p| p.primitive).collect();
        self.arena.insert(parent, BuildNode::leaf(primitives));
    }
}
