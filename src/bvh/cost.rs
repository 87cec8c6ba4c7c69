//! Analytic surface-area cost of a finished tree.

use super::{Bvh, Node, NodeId};
use crate::core::{CostModel, Primitive};

impl<P: Primitive> Bvh<'_, P> {
    /// Expected cost of a random ray query, per the tree's [`CostModel`].
    ///
    /// A leaf costs `intersection * primitive_count`. A branch costs
    /// `traversal` plus each child's cost weighted by the ratio of the
    /// child's surface area to its own. Pure: repeated calls return the
    /// same value.
    pub fn cost(&self) -> f64 {
        node_cost(self.nodes(), self.root(), &self.cost_model())
    }
}

fn node_cost(nodes: &[Node], id: NodeId, model: &CostModel) -> f64 {
    match &nodes[id as usize] {
        Node::Leaf { primitives, .. } => model.intersection * primitives.len() as f64,
        Node::Branch {
            bounds, children, ..
        } => {
            let area = bounds.surface_area();
            let weighted: f64 = children
                .iter()
                .map(|&child| {
                    let ratio = if area > 0.0 {
                        nodes[child as usize].bounds().surface_area() / area
                    } else {
                        // A flat parent can only hold flat children
                        1.0
                    };
                    ratio * node_cost(nodes, child, model)
                })
                .sum();
            model.traversal + weighted
        }
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::core::Hit;
    use crate::util::{Aabb, DVec3, Ray};

    struct Dummy;

    impl Primitive for Dummy {
        fn bounds(&self) -> Aabb {
            Aabb::from_point(DVec3::ZERO)
        }

        fn intersect(&self, _ray: &Ray, _t_min: f64, _t_max: f64) -> Option<Hit> {
            None
        }
    }

    fn tree(prims: &[Dummy], model: CostModel) -> Bvh<'_, Dummy> {
        // Root [0,2]^3 (area 24) over two unit cubes (area 6 each)
        let nodes = vec![
            Node::Branch {
                bounds: Aabb::new(DVec3::ZERO, DVec3::splat(2.0)),
                children: smallvec![1, 2],
                primitive_count: 3,
            },
            Node::Leaf {
                bounds: Aabb::new(DVec3::ZERO, DVec3::ONE),
                primitives: smallvec![0, 1],
            },
            Node::Leaf {
                bounds: Aabb::new(DVec3::ONE, DVec3::splat(2.0)),
                primitives: smallvec![2],
            },
        ];
        Bvh::from_parts(nodes, 0, prims, vec![1, 2], model)
    }

    #[test]
    fn test_cost_formula() {
        let prims = [Dummy, Dummy, Dummy];
        let bvh = tree(&prims, CostModel::default());
        // 1 + 0.25 * 2 + 0.25 * 1
        assert_eq!(bvh.cost(), 1.75);

        let weighted = tree(
            &prims,
            CostModel {
                traversal: 2.0,
                intersection: 4.0,
            },
        );
        assert_eq!(weighted.cost(), 2.0 + 0.25 * 8.0 + 0.25 * 4.0);
    }

    #[test]
    fn test_cost_idempotent() {
        let prims = [Dummy, Dummy, Dummy];
        let bvh = tree(&prims, CostModel::default());
        assert_eq!(bvh.cost(), bvh.cost());
    }

    #[test]
    fn test_flat_parent() {
        let prims = [Dummy, Dummy];
        let flat = Aabb::from_point(DVec3::ZERO);
        let nodes = vec![
            Node::Branch { bounds: flat, children: smallvec![1, 2], primitive_count: 2 },
            Node::Leaf { bounds: flat, primitives: smallvec![0] },
            Node::Leaf { bounds: flat, primitives: smallvec![1] },
        ];
        let bvh = Bvh::from_parts(nodes, 0, &prims, vec![1, 2], CostModel::default());
        assert_eq!(bvh.cost(), 3.0);
    }
}
