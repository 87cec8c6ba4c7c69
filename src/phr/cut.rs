//! Cuts through the auxiliary tree.
//!
//! A cut is a set of nodes whose subtrees partition the primitives. The
//! initial cut descends from the auxiliary root and keeps every node whose
//! box is at or below the area threshold; refinement later replaces large
//! auxiliary branches of a sub-cut by their children.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::bvh::arena::Slot;
use crate::bvh::{Node, NodeId};
use crate::core::pool::{self, JobHandler, Scheduler};
use crate::util::{Aabb, Result};

/// One member of a cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CutNode {
    pub slot: Slot,
    pub bounds: Aabb,
    /// Primitives in the member's subtree.
    pub primitives: u32,
}

impl CutNode {
    pub fn aux(id: NodeId, node: &Node) -> Self {
        Self {
            slot: Slot::Aux(id),
            bounds: *node.bounds(),
            primitives: node.primitive_count(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Cut {
    pub nodes: Vec<CutNode>,
    /// Union of the members' boxes.
    pub bounds: Aabb,
    pub depth: usize,
}

impl Cut {
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

struct InitialCut<'a> {
    aux: &'a [Node],
    threshold: f64,
    max_size: usize,
    size: AtomicUsize,
    members: Mutex<Vec<CutNode>>,
}

impl JobHandler for InitialCut<'_> {
    type Job = NodeId;

    fn process(&self, id: NodeId, scheduler: &Scheduler<'_, Self>) {
        let node = &self.aux[id as usize];
        if let Node::Branch { bounds, children, .. } = node {
            if bounds.surface_area() > self.threshold {
                // Expanding replaces one member by all of its children
                let growth = children.len() - 1;
                if self.size.fetch_add(growth, Ordering::AcqRel) + growth <= self.max_size {
                    for &child in children {
                        scheduler.spawn(child);
                    }
                    return;
                }
                // Over the cap: undo the reservation and keep the node whole
                self.size.fetch_sub(growth, Ordering::AcqRel);
            }
        }
        self.members.lock().push(CutNode::aux(id, node));
    }
}

/// Initial cut of the auxiliary tree rooted at `root`.
///
/// Branches with area above `threshold` are expanded while the cut stays
/// within `max_size` members. Members are returned in auxiliary id order.
pub(crate) fn initial_cut(aux: &[Node], root: NodeId, threshold: f64, max_size: usize, workers: usize) -> Result<Cut> {
    let handler = InitialCut {
        aux,
        threshold,
        max_size,
        size: AtomicUsize::new(1),
        members: Mutex::new(Vec::new()),
    };
    pool::run(&handler, workers, "phr-cut", root)?;

    let mut nodes = handler.members.into_inner();
    nodes.sort_unstable_by_key(|n| match n.slot {
        Slot::Aux(id) | Slot::Built(id) => id,
        Slot::Unset => NodeId::MAX,
    });
    Ok(Cut {
        nodes,
        bounds: *aux[root as usize].bounds(),
        depth: 1,
    })
}

/// Replace every auxiliary branch of `cut` with area above `threshold` by
/// its children, one level deep.
pub(crate) fn refine(cut: Cut, aux: &[Node], threshold: f64) -> Cut {
    let mut nodes = Vec::with_capacity(cut.nodes.len() * 2);
    for member in cut.nodes {
        match member.slot {
            Slot::Aux(id) => match &aux[id as usize] {
                Node::Branch { bounds, children, .. } if bounds.surface_area() > threshold => {
                    nodes.extend(children.iter().map(|&c| CutNode::aux(c, &aux[c as usize])));
                }
                _ => nodes.push(member),
            },
            _ => nodes.push(member),
        }
    }
    Cut {
        nodes,
        bounds: cut.bounds,
        depth: cut.depth + 1,
    }
}
