//! Build configuration.
//!
//! Every tunable of the engine (Morton grid resolution, sort bucket count,
//! cut size cap, SAH cost constants, worker count) is passed explicitly into
//! the builders, so two builds with equal configs are reproducible.

use std::num::NonZeroUsize;

use crate::util::{Error, Result};

/// Default Morton grid resolution: 2^20 cells per axis.
pub const DEFAULT_MORTON_BITS: u32 = 20;

/// Largest per-axis resolution that still fits three axes into a `u64`.
pub const MAX_MORTON_BITS: u32 = 21;

/// Default number of buckets for the parallel key sort.
pub const DEFAULT_BUCKET_COUNT: usize = 4096;

/// Default cap on the size of the initial agglomerative cut.
pub const DEFAULT_MAX_CUT_SIZE: usize = 2500;

/// Number of logical CPUs, 1 if it cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Calibrated constants of the analytic tree cost.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostModel {
    /// Cost of visiting one branch (one box test plus stack work).
    pub traversal: f64,
    /// Cost of one ray/primitive test.
    pub intersection: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            traversal: 1.0,
            intersection: 1.0,
        }
    }
}

/// Parameters shared by the linear and the agglomerative builder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildConfig {
    /// Size of every worker pool.
    pub workers: usize,
    /// Bits per axis of the Morton grid (resolution `2^morton_bits`).
    pub morton_bits: u32,
    /// Buckets of the parallel key sort.
    pub bucket_count: usize,
    /// Cap on the initial agglomerative cut.
    pub max_cut_size: usize,
    /// Constants for [`Bvh::cost`](crate::bvh::Bvh::cost).
    pub cost: CostModel,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            morton_bits: DEFAULT_MORTON_BITS,
            bucket_count: DEFAULT_BUCKET_COUNT,
            max_cut_size: DEFAULT_MAX_CUT_SIZE,
            cost: CostModel::default(),
        }
    }
}

impl BuildConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_morton_bits(mut self, bits: u32) -> Self {
        self.morton_bits = bits;
        self
    }

    pub fn with_bucket_count(mut self, buckets: usize) -> Self {
        self.bucket_count = buckets;
        self
    }

    pub fn with_max_cut_size(mut self, size: usize) -> Self {
        self.max_cut_size = size;
        self
    }

    pub fn with_cost(mut self, cost: CostModel) -> Self {
        self.cost = cost;
        self
    }

    /// Width of a Morton code in bits.
    #[inline]
    pub fn key_bits(&self) -> u32 {
        3 * self.morton_bits
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::invalid("workers must be at least 1"));
        }
        if self.morton_bits == 0 || self.morton_bits > MAX_MORTON_BITS {
            return Err(Error::invalid(format!(
                "morton_bits must be in 1..={MAX_MORTON_BITS}, got {}",
                self.morton_bits
            )));
        }
        if self.bucket_count == 0 {
            return Err(Error::invalid("bucket_count must be at least 1"));
        }
        if self.max_cut_size == 0 {
            return Err(Error::invalid("max_cut_size must be at least 1"));
        }
        if !self.cost.traversal.is_finite() || !self.cost.intersection.is_finite() {
            return Err(Error::invalid("cost constants must be finite"));
        }
        Ok(())
    }

    /// Rayon pool with `workers` threads for one parallel phase.
    pub(crate) fn thread_pool(&self, phase: &'static str) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(move |i| format!("{phase}-{i}"))
            .build()?)
    }
}

/// Tuning of the agglomerative builder.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhrParams {
    /// How quickly the area threshold shrinks with depth.
    pub alpha: f64,
    /// Base offset of the area threshold, sets the initial cut size.
    pub delta: f64,
    /// Target fan-out of every built branch.
    pub branching_factor: usize,
}

impl Default for PhrParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            delta: 6.0,
            branching_factor: 2,
        }
    }
}

impl PhrParams {
    pub fn new(alpha: f64, delta: f64, branching_factor: usize) -> Self {
        Self {
            alpha,
            delta,
            branching_factor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || !self.delta.is_finite() {
            return Err(Error::invalid(format!(
                "alpha and delta must be finite, got {} / {}",
                self.alpha, self.delta
            )));
        }
        if self.branching_factor < 2 {
            return Err(Error::invalid(format!(
                "branching_factor must be at least 2, got {}",
                self.branching_factor
            )));
        }
        Ok(())
    }

    /// Area threshold at recursion depth `depth`:
    /// `total_surface / 2^(alpha * depth + delta)`.
    #[inline]
    pub fn threshold(&self, total_surface: f64, depth: usize) -> f64 {
        total_surface / (self.alpha * depth as f64 + self.delta).exp2()
    }
}
