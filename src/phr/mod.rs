//! Agglomerative BVH construction by progressive hierarchical refinement.
//!
//! The builder starts from a fast auxiliary tree (a linear BVH) and rebuilds
//! it top-down with a full SAH sweep at every level:
//!
//! 1. Take a cut through the auxiliary tree: every node whose box area is at
//!    most `threshold(0)`, capped at `max_cut_size` members.
//! 2. For a cut job, split the largest sub-cut with an SAH sweep until
//!    there are `branching_factor` sub-cuts or none can be split further.
//! 3. Refine each new sub-cut by replacing auxiliary branches whose area
//!    exceeds `threshold(depth)` with their children, then recurse.
//!
//! The area threshold `surface / 2^(alpha * depth + delta)` shrinks with
//! depth, so upper levels see a coarse cut and lower levels a fine one.
//! Sub-cuts no split improves are grouped under one branch that references
//! the existing nodes; the final tree always holds every primitive once.

pub(crate) mod cut;
pub(crate) mod sah;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::bvh::arena::{BuildArena, BuildNode, ParentSlot, Slot};
use crate::bvh::{Bvh, Node};
use crate::core::pool::{self, JobHandler, Scheduler};
use crate::core::{enclosing, BuildConfig, PhrParams, Primitive};
use crate::lbvh::linear_build;
use crate::util::{Error, Result};

use cut::{Cut, CutNode};

/// Area threshold at recursion depth `depth` for an auxiliary tree whose
/// root has surface area `total_surface`.
///
/// Auxiliary branches above the threshold are expanded into their children
/// when a cut is formed or refined.
pub type AreaThreshold = fn(total_surface: f64, params: &PhrParams, depth: usize) -> f64;

/// `total_surface / 2^(alpha * depth + delta)`, see [`PhrParams::threshold`].
pub fn default_threshold(total_surface: f64, params: &PhrParams, depth: usize) -> f64 {
    params.threshold(total_surface, depth)
}

/// Builder for agglomerative BVHs over one primitive slice.
///
/// Parameters may be changed between builds; each build reads them once.
#[derive(Debug, Clone)]
pub struct PhrBuilder<'p, P> {
    primitives: &'p [P],
    params: PhrParams,
    config: BuildConfig,
    threshold: AreaThreshold,
}

impl<'p, P: Primitive> PhrBuilder<'p, P> {
    /// Builder with the given threshold decay, offset, fan-out and worker count.
    pub fn new(primitives: &'p [P], alpha: f64, delta: f64, branching_factor: usize, workers: usize) -> Self {
        Self::with_config(
            primitives,
            PhrParams::new(alpha, delta, branching_factor),
            BuildConfig::default().with_workers(workers),
        )
    }

    /// Builder with default parameters and one worker per logical CPU.
    pub fn with_defaults(primitives: &'p [P]) -> Self {
        Self::with_config(primitives, PhrParams::default(), BuildConfig::default())
    }

    pub fn with_config(primitives: &'p [P], params: PhrParams, config: BuildConfig) -> Self {
        Self {
            primitives,
            params,
            config,
            threshold: default_threshold,
        }
    }

    /// Use `threshold` instead of [`default_threshold`] for cuts and refinement.
    pub fn with_threshold(mut self, threshold: AreaThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    #[inline]
    pub fn params(&self) -> &PhrParams {
        &self.params
    }

    #[inline]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Replace the parameters used by subsequent builds.
    pub fn set_params(&mut self, params: PhrParams) {
        self.params = params;
    }

    /// Build a linear auxiliary tree, then the agglomerative tree from it.
    #[tracing::instrument(skip_all, fields(prim_count = self.primitives.len()))]
    pub fn build(&self) -> Result<Bvh<'p, P>> {
        self.params.validate()?;
        let scene = enclosing(self.primitives).ok_or(Error::EmptyScene)?;
        let aux = linear_build(self.primitives, scene, &self.config)?;
        self.build_from_auxiliary(&aux)
    }

    /// Build from an existing auxiliary tree over the same primitives.
    pub fn build_from_auxiliary(&self, aux: &Bvh<'p, P>) -> Result<Bvh<'p, P>> {
        self.construct(aux, None)
    }

    /// Like [`build_from_auxiliary`](Self::build_from_auxiliary), also
    /// returning the total number of cut members the SAH sweeps processed.
    ///
    /// The count is a cheap proxy for build time and is reproducible for a
    /// given auxiliary tree and parameter set.
    pub fn build_with_cost(&self, aux: &Bvh<'p, P>) -> Result<(Bvh<'p, P>, usize)> {
        let work = AtomicUsize::new(0);
        let bvh = self.construct(aux, Some(&work))?;
        Ok((bvh, work.into_inner()))
    }

    /// Number of members in the initial cut through `aux`.
    pub fn initial_cut_size(&self, aux: &Bvh<'p, P>) -> Result<usize> {
        self.params.validate()?;
        self.config.validate()?;
        let surface = aux.bounds().surface_area();
        let cut = cut::initial_cut(
            aux.nodes(),
            aux.root(),
            (self.threshold)(surface, &self.params, 0),
            self.config.max_cut_size,
            self.config.workers,
        )?;
        Ok(cut.len())
    }

    #[tracing::instrument(
        skip_all,
        fields(
            prim_count = aux.primitives().len(),
            alpha = self.params.alpha,
            delta = self.params.delta,
            branching_factor = self.params.branching_factor,
        )
    )]
    fn construct(&self, aux: &Bvh<'p, P>, work: Option<&AtomicUsize>) -> Result<Bvh<'p, P>> {
        self.params.validate()?;
        self.config.validate()?;
        debug_assert!(
            std::ptr::eq(aux.primitives(), self.primitives),
            "auxiliary tree built over another primitive slice"
        );

        let surface = aux.bounds().surface_area();
        let start = Instant::now();
        let initial = cut::initial_cut(
            aux.nodes(),
            aux.root(),
            (self.threshold)(surface, &self.params, 0),
            self.config.max_cut_size,
            self.config.workers,
        )?;
        tracing::debug!(elapsed = ?start.elapsed(), size = initial.len(), "initial cut");
        if let Some(work) = work {
            work.fetch_add(initial.len(), Ordering::Relaxed);
        }

        let start = Instant::now();
        let (arena, root) = BuildArena::new();
        let handler = Refinement {
            aux: aux.nodes(),
            params: self.params,
            threshold: self.threshold,
            surface,
            arena: &arena,
            work,
        };
        pool::run(
            &handler,
            self.config.workers,
            "phr-build",
            CutJob {
                cut: initial,
                parent: root,
            },
        )?;
        let finished = arena.finish(Some(aux.nodes()));
        tracing::debug!(elapsed = ?start.elapsed(), nodes = finished.nodes.len(), "refined tree");

        Ok(Bvh::from_parts(
            finished.nodes,
            finished.root,
            aux.primitives(),
            finished.leaves,
            self.config.cost,
        ))
    }
}

struct CutJob {
    cut: Cut,
    parent: ParentSlot,
}

struct Refinement<'a> {
    aux: &'a [Node],
    params: PhrParams,
    threshold: AreaThreshold,
    surface: f64,
    arena: &'a BuildArena,
    work: Option<&'a AtomicUsize>,
}

impl Refinement<'_> {
    /// Split `cut` in two refined halves, or group it into one member.
    fn split(&self, cut: Cut) -> (Cut, Option<Cut>) {
        if let Some(work) = self.work {
            work.fetch_add(cut.len(), Ordering::Relaxed);
        }
        match sah::sweep(&cut.nodes, &cut.bounds) {
            Some(split) => {
                tracing::trace!(axis = split.axis, cost = split.cost, members = cut.len(), "split cut");
                let threshold = (self.threshold)(self.surface, &self.params, cut.depth);
                let left = Cut {
                    nodes: split.left,
                    bounds: split.left_bounds,
                    depth: cut.depth,
                };
                let right = Cut {
                    nodes: split.right,
                    bounds: split.right_bounds,
                    depth: cut.depth,
                };
                (
                    cut::refine(left, self.aux, threshold),
                    Some(cut::refine(right, self.aux, threshold)),
                )
            }
            None => (self.group(cut), None),
        }
    }

    /// Collapse `cut` into a single member: a branch over its nodes.
    fn group(&self, cut: Cut) -> Cut {
        let primitives = cut.nodes.iter().map(|n| n.primitives).sum();
        let slots = cut.nodes.iter().map(|n| n.slot).collect();
        let id = self.arena.push(BuildNode::group(cut.bounds, slots));
        tracing::trace!(members = cut.len(), "grouped unsplittable cut");
        Cut {
            nodes: vec![CutNode {
                slot: Slot::Built(id),
                bounds: cut.bounds,
                primitives,
            }],
            bounds: cut.bounds,
            depth: cut.depth,
        }
    }
}

/// Index of the first largest cut.
fn largest(cuts: &[Cut]) -> usize {
    let mut best = 0;
    for (i, cut) in cuts.iter().enumerate().skip(1) {
        if cut.len() > cuts[best].len() {
            best = i;
        }
    }
    best
}

impl JobHandler for Refinement<'_> {
    type Job = CutJob;

    fn process(&self, job: CutJob, scheduler: &Scheduler<'_, Self>) {
        let CutJob { cut, parent } = job;
        if cut.len() == 1 {
            self.arena.attach(parent, cut.nodes[0].slot);
            return;
        }

        let bounds = cut.bounds;
        let mut cuts = vec![cut];
        while cuts.len() < self.params.branching_factor {
            let target = largest(&cuts);
            if cuts[target].len() <= 1 {
                break;
            }
            let (left, right) = self.split(cuts.swap_remove(target));
            cuts.push(left);
            cuts.extend(right);
        }

        if let [only] = cuts.as_slice() {
            self.arena.attach(parent, only.nodes[0].slot);
            return;
        }

        let branch = self.arena.insert(parent, BuildNode::branch(Some(bounds), cuts.len()));
        for (index, cut) in cuts.into_iter().enumerate() {
            scheduler.spawn(CutJob {
                cut,
                parent: ParentSlot { node: branch, index },
            });
        }
    }
}
