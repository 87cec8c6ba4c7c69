//! Morton (Z-order) keys for primitive centroids.
//!
//! Each centroid is quantised onto a `2^bits` grid over the scene box and
//! its three cell coordinates are bit-interleaved, x in the lowest bit of
//! every triple, then y, then z. Sorting by key orders primitives along a
//! space-filling curve, so neighbours in the sorted list are neighbours in
//! space.

use rayon::prelude::*;

use crate::core::Primitive;
use crate::util::{Aabb, DVec3};

/// A primitive index with its Morton key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPair {
    pub primitive: u32,
    pub code: u64,
}

impl KeyPair {
    #[inline]
    pub fn new(primitive: u32, code: u64) -> Self {
        Self { primitive, code }
    }
}

/// Spread the low 21 bits of `v` so two zero bits follow each one.
#[inline]
pub fn expand_bits(v: u64) -> u64 {
    let mut x = v & 0x1f_ffff;
    x = (x | x << 32) & 0x001f_0000_0000_ffff;
    x = (x | x << 16) & 0x001f_0000_ff00_00ff;
    x = (x | x << 8) & 0x100f_00f0_0f00_f00f;
    x = (x | x << 4) & 0x10c3_0c30_c30c_30c3;
    x = (x | x << 2) & 0x1249_2492_4924_9249;
    x
}

/// Interleave three cell coordinates into one key.
#[inline]
pub fn interleave(x: u64, y: u64, z: u64) -> u64 {
    expand_bits(x) | expand_bits(y) << 1 | expand_bits(z) << 2
}

/// Grid cell of `point` inside `enclosing` at `2^bits` cells per axis.
///
/// An axis with zero extent maps to cell 0.
pub fn quantize(point: DVec3, enclosing: &Aabb, bits: u32) -> [u64; 3] {
    let last = ((1u64 << bits) - 1) as f64;
    let offset = (point - enclosing.min()).to_array();
    let extent = enclosing.extent().to_array();
    let mut cell = [0u64; 3];
    for axis in 0..3 {
        if extent[axis] > 0.0 {
            let step = extent[axis] / last;
            cell[axis] = (offset[axis] / step).floor().clamp(0.0, last) as u64;
        }
    }
    cell
}

/// Morton key of `point` inside `enclosing`.
#[inline]
pub fn morton_code(point: DVec3, enclosing: &Aabb, bits: u32) -> u64 {
    let [x, y, z] = quantize(point, enclosing, bits);
    interleave(x, y, z)
}

/// Key every primitive by its centroid, in parallel batches of
/// `ceil(n / workers)` primitives.
pub(crate) fn assign_keys<P: Primitive>(
    primitives: &[P],
    enclosing: &Aabb,
    bits: u32,
    workers: usize,
    pool: &rayon::ThreadPool,
) -> Vec<KeyPair> {
    let mut pairs = vec![KeyPair::default(); primitives.len()];
    let batch = primitives.len().div_ceil(workers.max(1)).max(1);
    pool.install(|| {
        pairs.par_chunks_mut(batch).enumerate().for_each(|(chunk, out)| {
            let start = chunk * batch;
            for (offset, pair) in out.iter_mut().enumerate() {
                let index = start + offset;
                let centroid = primitives[index].bounds().centroid();
                *pair = KeyPair::new(index as u32, morton_code(centroid, enclosing, bits));
            }
        });
    });
    pairs
}
