//! Shared node arena used while a tree is under construction.
//!
//! Build workers append nodes to one mutex-guarded arena and link them into
//! their parent's child slot. Every child slot is filled exactly once; the
//! parent reserves its slots when it is created, and the job that owns a
//! slot is the only writer. Slots may also point into a finished auxiliary
//! tree; those subtrees are copied over when the build is finalised.
//!
//! Index 0 is a placeholder branch with one slot that receives the real
//! root, so the root job needs no special casing.

use std::mem;

use parking_lot::Mutex;
use smallvec::{smallvec, SmallVec};

use super::{Children, LeafPrimitives, Node, NodeId};
use crate::util::{Aabb, DVec3};

/// Target of a child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Not filled yet; must never survive a finished build.
    Unset,
    /// A node of this arena.
    Built(NodeId),
    /// A node of the auxiliary tree, grafted on finalisation.
    Aux(NodeId),
}

/// Address of one child slot: the `index`-th child of `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParentSlot {
    pub node: NodeId,
    pub index: usize,
}

#[derive(Debug)]
pub(crate) enum BuildKind {
    Leaf(LeafPrimitives),
    Branch(SmallVec<[Slot; 4]>),
}

/// Arena entry. `bounds` is `None` until the linear builder's refit.
#[derive(Debug)]
pub(crate) struct BuildNode {
    pub bounds: Option<Aabb>,
    pub kind: BuildKind,
}

impl BuildNode {
    pub fn leaf(primitives: LeafPrimitives) -> Self {
        Self {
            bounds: None,
            kind: BuildKind::Leaf(primitives),
        }
    }

    /// Branch with `arity` unset child slots.
    pub fn branch(bounds: Option<Aabb>, arity: usize) -> Self {
        Self {
            bounds,
            kind: BuildKind::Branch(smallvec![Slot::Unset; arity]),
        }
    }

    /// Branch whose slots are already filled.
    pub fn group(bounds: Aabb, slots: SmallVec<[Slot; 4]>) -> Self {
        Self {
            bounds: Some(bounds),
            kind: BuildKind::Branch(slots),
        }
    }
}

/// A finalised node arena ready to be wrapped in a [`Bvh`](super::Bvh).
#[derive(Debug)]
pub(crate) struct Finished {
    pub nodes: Vec<Node>,
    pub root: NodeId,
    pub leaves: Vec<NodeId>,
}

#[derive(Debug)]
pub(crate) struct BuildArena {
    nodes: Mutex<Vec<BuildNode>>,
}

impl BuildArena {
    /// New arena and the slot the root job fills.
    pub fn new() -> (Self, ParentSlot) {
        let arena = Self {
            nodes: Mutex::new(vec![BuildNode::branch(None, 1)]),
        };
        (arena, ParentSlot { node: 0, index: 0 })
    }

    /// Append `node` without linking it anywhere.
    pub fn push(&self, node: BuildNode) -> NodeId {
        let mut nodes = self.nodes.lock();
        let id = nodes.len() as NodeId;
        nodes.push(node);
        id
    }

    /// Append `node` and link it into `parent` under one lock.
    pub fn insert(&self, parent: ParentSlot, node: BuildNode) -> NodeId {
        let mut nodes = self.nodes.lock();
        let id = nodes.len() as NodeId;
        nodes.push(node);
        fill(&mut nodes, parent, Slot::Built(id));
        id
    }

    /// Link an existing node (of this arena or the auxiliary tree) into `parent`.
    pub fn attach(&self, parent: ParentSlot, child: Slot) {
        fill(&mut self.nodes.lock(), parent, child);
    }

    /// Flatten into a depth-first [`Node`] arena.
    ///
    /// `aux` resolves [`Slot::Aux`] references; their subtrees are copied.
    ///
    /// # Panics
    /// If a slot was never filled, if a leaf holds no primitives, or if an
    /// auxiliary slot is present without `aux`. Each of these is a builder bug.
    pub fn finish(self, aux: Option<&[Node]>) -> Finished {
        let mut built = self.nodes.into_inner();
        let root_slot = match &built[0].kind {
            BuildKind::Branch(slots) => slots[0],
            BuildKind::Leaf(_) => unreachable!("arena placeholder is a branch"),
        };

        let mut nodes: Vec<Node> = Vec::with_capacity(built.len());
        let mut leaves = Vec::new();
        // (slot, position in the parent's child list)
        let mut stack: Vec<(Slot, Option<(usize, usize)>)> = vec![(root_slot, None)];

        while let Some((slot, link)) = stack.pop() {
            let id = nodes.len();
            if let Some((parent, pos)) = link {
                if let Node::Branch { children, .. } = &mut nodes[parent] {
                    children[pos] = id as NodeId;
                }
            }

            match slot {
                Slot::Unset => panic!("child slot left unset by the builder"),
                Slot::Built(index) => {
                    let entry = &mut built[index as usize];
                    // Linear-build boxes are written by the refit pass
                    let bounds = entry.bounds.unwrap_or_else(|| Aabb::from_point(DVec3::ZERO));
                    match &mut entry.kind {
                        BuildKind::Leaf(primitives) => {
                            let primitives = mem::take(primitives);
                            assert!(!primitives.is_empty(), "leaf without primitives");
                            leaves.push(id as NodeId);
                            nodes.push(Node::Leaf { bounds, primitives });
                        }
                        BuildKind::Branch(slots) => {
                            nodes.push(placeholder_branch(bounds, slots.len()));
                            for (pos, child) in slots.iter().enumerate().rev() {
                                stack.push((*child, Some((id, pos))));
                            }
                        }
                    }
                }
                Slot::Aux(index) => {
                    let aux = aux.unwrap_or_else(|| panic!("auxiliary slot without auxiliary tree"));
                    match &aux[index as usize] {
                        Node::Leaf { bounds, primitives } => {
                            leaves.push(id as NodeId);
                            nodes.push(Node::Leaf {
                                bounds: *bounds,
                                primitives: primitives.clone(),
                            });
                        }
                        Node::Branch {
                            bounds, children, ..
                        } => {
                            nodes.push(placeholder_branch(*bounds, children.len()));
                            for (pos, child) in children.iter().enumerate().rev() {
                                stack.push((Slot::Aux(*child), Some((id, pos))));
                            }
                        }
                    }
                }
            }
        }

        // Preorder puts children after parents, so one reverse pass suffices
        let mut counts = vec![0u32; nodes.len()];
        for i in (0..nodes.len()).rev() {
            counts[i] = match &nodes[i] {
                Node::Leaf { primitives, .. } => primitives.len() as u32,
                Node::Branch { children, .. } => children.iter().map(|&c| counts[c as usize]).sum(),
            };
        }
        for (node, count) in nodes.iter_mut().zip(counts) {
            if let Node::Branch {
                primitive_count, ..
            } = node
            {
                *primitive_count = count;
            }
        }

        Finished {
            nodes,
            root: 0,
            leaves,
        }
    }
}

fn placeholder_branch(bounds: Aabb, arity: usize) -> Node {
    let children: Children = smallvec![NodeId::MAX; arity];
    Node::Branch {
        bounds,
        children,
        primitive_count: 0,
    }
}

fn fill(nodes: &mut [BuildNode], parent: ParentSlot, child: Slot) {
    match &mut nodes[parent.node as usize].kind {
        BuildKind::Branch(slots) => {
            let slot = &mut slots[parent.index];
            assert_eq!(*slot, Slot::Unset, "child slot {parent:?} filled twice");
            *slot = child;
        }
        BuildKind::Leaf(_) => panic!("node {} is a leaf and has no child slots", parent.node),
    }
}
