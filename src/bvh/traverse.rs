//! Closest-hit ray traversal.

use smallvec::SmallVec;

use super::{Bvh, Node, NodeId};
use crate::core::{Hit, Primitive};
use crate::util::Ray;

/// Inline stack depth before spilling to the heap.
type Stack = SmallVec<[NodeId; 64]>;

impl<P: Primitive> Bvh<'_, P> {
    /// Closest primitive hit by `ray` within `(t_min, t_max)`.
    ///
    /// The far end of the interval shrinks to each accepted hit, so subtrees
    /// whose boxes lie wholly beyond the current closest hit are skipped.
    pub fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        let mut closest = t_max;
        let mut result = None;
        let mut stack = Stack::new();
        stack.push(self.root);

        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if !node.bounds().hit(ray, t_min, closest) {
                continue;
            }
            match node {
                Node::Leaf { primitives, .. } => {
                    for &index in primitives {
                        if let Some(mut hit) = self.primitives[index as usize].intersect(ray, t_min, closest) {
                            closest = hit.t;
                            hit.primitive = index as usize;
                            result = Some(hit);
                        }
                    }
                }
                Node::Branch { children, .. } => {
                    // Reverse so the first child is visited first
                    stack.extend(children.iter().rev().copied());
                }
            }
        }
        result
    }

    /// Number of box tests a closest-hit query for `ray` performs.
    pub fn traversal_steps(&self, ray: &Ray, t_min: f64, t_max: f64) -> usize {
        let mut closest = t_max;
        let mut steps = 0;
        let mut stack = Stack::new();
        stack.push(self.root);

        while let Some(id) = stack.pop() {
            let node = self.node(id);
            steps += 1;
            if !node.bounds().hit(ray, t_min, closest) {
                continue;
            }
            match node {
                Node::Leaf { primitives, .. } => {
                    for &index in primitives {
                        if let Some(hit) = self.primitives[index as usize].intersect(ray, t_min, closest) {
                            closest = hit.t;
                        }
                    }
                }
                Node::Branch { children, .. } => stack.extend(children.iter().rev().copied()),
            }
        }
        steps
    }
}
