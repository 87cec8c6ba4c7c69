//! Surface-area-heuristic sweep over a cut.
//!
//! For each axis the members are stably sorted by box centroid and every
//! split position is priced as
//! `area(left) * count(left) + area(right) * count(right)`, where counts are
//! primitives in the members' subtrees. Right-hand costs come from one
//! suffix sweep, left-hand costs from one prefix sweep. A split is taken only
//! if it is strictly cheaper than keeping the cut whole, priced as
//! `area(cut) * count(cut)`.

use super::cut::CutNode;
use crate::util::Aabb;

/// Cheapest split found by [`sweep`].
#[derive(Debug, Clone)]
pub(crate) struct SahSplit {
    pub axis: usize,
    pub cost: f64,
    pub left: Vec<CutNode>,
    pub left_bounds: Aabb,
    pub right: Vec<CutNode>,
    pub right_bounds: Aabb,
}

/// Best split of `nodes` bounded by `bounds`, or `None` when no split beats
/// the unsplit cost. Ties go to the lower axis, then the lower index.
pub(crate) fn sweep(nodes: &[CutNode], bounds: &Aabb) -> Option<SahSplit> {
    if nodes.len() < 2 {
        return None;
    }
    let total: f64 = nodes.iter().map(|n| n.primitives as f64).sum();
    let mut best: Option<(usize, AxisSplit, Vec<CutNode>)> = None;
    let mut best_cost = bounds.surface_area() * total;

    for axis in 0..3 {
        let mut sorted = nodes.to_vec();
        sorted.sort_by(|a, b| a.bounds.centroid()[axis].total_cmp(&b.bounds.centroid()[axis]));
        if let Some(split) = cheapest(&sorted, best_cost) {
            best_cost = split.cost;
            best = Some((axis, split, sorted));
        }
    }

    best.map(|(axis, split, mut left)| {
        let right = left.split_off(split.index);
        SahSplit {
            axis,
            cost: split.cost,
            left,
            left_bounds: split.left_bounds,
            right,
            right_bounds: split.right_bounds,
        }
    })
}

struct AxisSplit {
    index: usize,
    cost: f64,
    left_bounds: Aabb,
    right_bounds: Aabb,
}

/// Cheapest split of `sorted` strictly below `limit`.
fn cheapest(sorted: &[CutNode], limit: f64) -> Option<AxisSplit> {
    let n = sorted.len();

    // right_* [i] describe sorted[i..]
    let mut right_bounds = vec![sorted[n - 1].bounds; n];
    let mut right_cost = vec![0.0; n];
    let mut acc = sorted[n - 1].bounds;
    let mut count = 0.0;
    for i in (1..n).rev() {
        acc = acc.union(&sorted[i].bounds);
        count += sorted[i].primitives as f64;
        right_bounds[i] = acc;
        right_cost[i] = acc.surface_area() * count;
    }

    let mut best: Option<AxisSplit> = None;
    let mut limit = limit;
    let mut left = sorted[0].bounds;
    let mut left_count = sorted[0].primitives as f64;
    for i in 1..n {
        let cost = left.surface_area() * left_count + right_cost[i];
        if cost < limit {
            limit = cost;
            best = Some(AxisSplit {
                index: i,
                cost,
                left_bounds: left,
                right_bounds: right_bounds[i],
            });
        }
        left = left.union(&sorted[i].bounds);
        left_count += sorted[i].primitives as f64;
    }
    best
}
