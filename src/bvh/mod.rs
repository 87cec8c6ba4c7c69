//! The BVH handle and its node arena.
//!
//! A [`Bvh`] owns its nodes in a flat arena addressed by [`NodeId`] and
//! borrows the primitive slice it was built over. Branches own their
//! children by id; nothing is shared between subtrees. After construction
//! (and the linear builder's one-time refit) the tree is immutable and can
//! be traversed from any number of threads.
//!
//! ## Layout
//! ```text
//! nodes: [root, child, grandchild, ...]   depth-first preorder
//! Leaf   { bounds, primitives: [i, j, ...] }  -> indices into `primitives`
//! Branch { bounds, children: [a, b, ...] }    -> indices into `nodes`
//! ```

pub(crate) mod arena;
mod cost;
pub(crate) mod refit;
mod traverse;

use std::fmt;

use smallvec::SmallVec;

use crate::core::{CostModel, Primitive};
use crate::util::Aabb;

/// Index of a node in a [`Bvh`]'s arena.
pub type NodeId = u32;

/// Primitive indices held by one leaf.
pub type LeafPrimitives = SmallVec<[u32; 4]>;

/// Child ids of one branch.
pub type Children = SmallVec<[NodeId; 4]>;

/// A tree node: either a leaf over primitives or a branch over nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        bounds: Aabb,
        primitives: LeafPrimitives,
    },
    Branch {
        bounds: Aabb,
        children: Children,
        /// Number of primitives anywhere below this branch.
        primitive_count: u32,
    },
}

impl Node {
    #[inline]
    pub fn bounds(&self) -> &Aabb {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => bounds,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Child ids, empty for a leaf.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Leaf { .. } => &[],
            Node::Branch { children, .. } => children,
        }
    }

    /// Primitive indices, empty for a branch.
    #[inline]
    pub fn primitives(&self) -> &[u32] {
        match self {
            Node::Leaf { primitives, .. } => primitives,
            Node::Branch { .. } => &[],
        }
    }

    /// Number of primitives in this node's subtree.
    #[inline]
    pub fn primitive_count(&self) -> u32 {
        match self {
            Node::Leaf { primitives, .. } => primitives.len() as u32,
            Node::Branch {
                primitive_count, ..
            } => *primitive_count,
        }
    }

    pub(crate) fn set_bounds(&mut self, new_bounds: Aabb) {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => *bounds = new_bounds,
        }
    }
}

/// Bounding volume hierarchy over a borrowed primitive slice.
pub struct Bvh<'p, P> {
    nodes: Vec<Node>,
    root: NodeId,
    primitives: &'p [P],
    leaves: Vec<NodeId>,
    cost_model: CostModel,
}

impl<'p, P: Primitive> Bvh<'p, P> {
    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        root: NodeId,
        primitives: &'p [P],
        leaves: Vec<NodeId>,
        cost_model: CostModel,
    ) -> Self {
        Self {
            nodes,
            root,
            primitives,
            leaves,
            cost_model,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// The whole arena, in depth-first preorder from the root.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The primitive slice the tree was built over.
    #[inline]
    pub fn primitives(&self) -> &'p [P] {
        self.primitives
    }

    /// Box of the root, enclosing every primitive.
    #[inline]
    pub fn bounds(&self) -> &Aabb {
        self.node(self.root).bounds()
    }

    /// Leaf ids in depth-first order.
    #[inline]
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    #[inline]
    pub fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: SmallVec<[(NodeId, usize); 64]> = SmallVec::new();
        stack.push((self.root, 1));
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            for &child in self.node(id).children() {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }
}

impl<P> fmt::Debug for Bvh<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bvh")
            .field("nodes", &self.nodes.len())
            .field("leaves", &self.leaves.len())
            .field("primitives", &self.primitives.len())
            .field("root", &self.root)
            .finish()
    }
}
