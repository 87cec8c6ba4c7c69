//! Bottom-up bounding box computation for the linear builder.
//!
//! The radix tree is built from Morton codes alone, so its boxes are filled
//! in afterwards. Workers pull leaves from a shared cursor, compute each
//! leaf's box from its primitives, then walk toward the root. At every
//! branch the worker bumps an arrival counter; only the worker that brings
//! the counter to the branch's child count computes the union and continues
//! upward, all others stop. Each branch box is therefore computed exactly
//! once, after all of its children are final.
//!
//! Boxes are staged in per-node atomics during the parallel phase and copied
//! into the nodes once every worker has returned.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use super::{Node, NodeId};
use crate::core::Primitive;
use crate::util::{Aabb, DVec3};

const NO_PARENT: u32 = u32::MAX;

/// Box staging area of one node.
struct RefitSlot {
    arrived: AtomicU32,
    min: [AtomicU64; 3],
    max: [AtomicU64; 3],
}

impl RefitSlot {
    fn new() -> Self {
        Self {
            arrived: AtomicU32::new(0),
            min: Default::default(),
            max: Default::default(),
        }
    }

    // Relaxed is enough: the AcqRel arrival counter of the parent orders
    // these stores before the union that reads them.
    fn store(&self, b: &Aabb) {
        let (min, max) = (b.min().to_array(), b.max().to_array());
        for axis in 0..3 {
            self.min[axis].store(min[axis].to_bits(), Ordering::Relaxed);
            self.max[axis].store(max[axis].to_bits(), Ordering::Relaxed);
        }
    }

    fn load(&self) -> Aabb {
        let read = |v: &[AtomicU64; 3]| {
            DVec3::new(
                f64::from_bits(v[0].load(Ordering::Relaxed)),
                f64::from_bits(v[1].load(Ordering::Relaxed)),
                f64::from_bits(v[2].load(Ordering::Relaxed)),
            )
        };
        Aabb::new(read(&self.min), read(&self.max))
    }
}

/// Parent of every node, [`NO_PARENT`] for the root.
fn parents(nodes: &[Node]) -> Vec<u32> {
    let mut parents = vec![NO_PARENT; nodes.len()];
    for (id, node) in nodes.iter().enumerate() {
        for &child in node.children() {
            parents[child as usize] = id as u32;
        }
    }
    parents
}

fn leaf_bounds<P: Primitive>(node: &Node, primitives: &[P]) -> Aabb {
    Aabb::union_all(node.primitives().iter().map(|&i| primitives[i as usize].bounds()))
        .unwrap_or_else(|| panic!("leaf without primitives"))
}

/// Recompute every box of `nodes` from the primitives below it.
#[tracing::instrument(skip_all, fields(nodes = nodes.len(), leaves = leaves.len()))]
pub(crate) fn refit<P: Primitive>(
    nodes: &mut [Node],
    leaves: &[NodeId],
    primitives: &[P],
    pool: &rayon::ThreadPool,
) {
    let parents = parents(nodes);
    let slots: Vec<RefitSlot> = (0..nodes.len()).map(|_| RefitSlot::new()).collect();
    let cursor = AtomicUsize::new(0);

    {
        let nodes = &*nodes;
        pool.broadcast(|_| loop {
            let next = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(&leaf) = leaves.get(next) else {
                break;
            };
            slots[leaf as usize].store(&leaf_bounds(&nodes[leaf as usize], primitives));

            let mut child = leaf;
            loop {
                let parent = parents[child as usize];
                if parent == NO_PARENT {
                    break;
                }
                let node = &nodes[parent as usize];
                let slot = &slots[parent as usize];
                let arrived = slot.arrived.fetch_add(1, Ordering::AcqRel) + 1;
                if arrived < node.children().len() as u32 {
                    break;
                }
                let union = Aabb::union_all(node.children().iter().map(|&c| slots[c as usize].load()))
                    .unwrap_or_else(|| panic!("branch without children"));
                slot.store(&union);
                child = parent;
            }
        });
    }

    for (node, slot) in nodes.iter_mut().zip(&slots) {
        node.set_bounds(slot.load());
    }
}
