//! Parallel bucket sort of [`KeyPair`]s by code.
//!
//! Two phases:
//! 1. Workers scatter disjoint input batches into worker-local buckets and
//!    bump shared per-bucket counters.
//! 2. A prefix sum over the counters gives every bucket a disjoint output
//!    range. Each bucket gathers its pairs from all workers, in worker
//!    order, and sorts its range independently.
//!
//! Bucket `i` covers codes `[i * width, (i + 1) * width)` with
//! `width = ceil(2^key_bits / bucket_count)`, so concatenated buckets are
//! globally ordered.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use super::KeyPair;
use crate::core::BuildConfig;
use crate::util::Result;

/// Sort `pairs` ascending by code using `workers` threads.
///
/// `key_bits` is the width of the codes; codes at or above `2^key_bits`
/// all land in the last bucket and are still sorted correctly.
pub fn bucket_sort(pairs: &mut [KeyPair], key_bits: u32, bucket_count: usize, workers: usize) -> Result<()> {
    let pool = BuildConfig::default().with_workers(workers).thread_pool("bvh-sort")?;
    bucket_sort_in(&pool, pairs, key_bits, bucket_count, workers);
    Ok(())
}

#[inline]
fn bucket_width(key_bits: u32, bucket_count: usize) -> u128 {
    let span = 1u128 << key_bits.min(64);
    span.div_ceil(bucket_count as u128).max(1)
}

pub(crate) fn bucket_sort_in(
    pool: &rayon::ThreadPool,
    pairs: &mut [KeyPair],
    key_bits: u32,
    bucket_count: usize,
    workers: usize,
) {
    if pairs.is_empty() {
        return;
    }
    let bucket_count = bucket_count.max(1);
    let width = bucket_width(key_bits, bucket_count);
    let bucket_of = |code: u64| ((code as u128 / width) as usize).min(bucket_count - 1);

    let counts: Vec<AtomicUsize> = (0..bucket_count).map(|_| AtomicUsize::new(0)).collect();
    let batch = pairs.len().div_ceil(workers.max(1)).max(1);

    // Phase 1: scatter
    let scattered: Vec<Vec<Vec<KeyPair>>> = pool.install(|| {
        pairs
            .par_chunks(batch)
            .map(|chunk| {
                let mut buckets = vec![Vec::new(); bucket_count];
                for pair in chunk {
                    let b = bucket_of(pair.code);
                    buckets[b].push(*pair);
                    counts[b].fetch_add(1, Ordering::Relaxed);
                }
                buckets
            })
            .collect()
    });

    // Phase 2: carve disjoint output ranges, then gather and sort each
    let mut ranges = Vec::with_capacity(bucket_count);
    let mut rest = &mut *pairs;
    for (bucket, count) in counts.into_iter().enumerate() {
        let (range, tail) = mem::take(&mut rest).split_at_mut(count.into_inner());
        rest = tail;
        ranges.push((bucket, range));
    }
    debug_assert!(rest.is_empty());

    pool.install(|| {
        ranges.into_par_iter().for_each(|(bucket, range)| {
            let sources = scattered.iter().flat_map(|worker| worker[bucket].iter());
            for (slot, pair) in range.iter_mut().zip(sources) {
                *slot = *pair;
            }
            range.sort_unstable_by_key(|p| p.code);
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn pool(workers: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(workers).build().unwrap()
    }

    fn assert_sorted_permutation(sorted: &[KeyPair], original: &[KeyPair]) {
        assert!(sorted.windows(2).all(|w| w[0].code <= w[1].code));
        let mut a: Vec<_> = sorted.iter().map(|p| (p.primitive, p.code)).collect();
        let mut b: Vec<_> = original.iter().map(|p| (p.primitive, p.code)).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bucket_width() {
        assert_eq!(bucket_width(6, 4), 16);
        assert_eq!(bucket_width(6, 5), 13);
        assert_eq!(bucket_width(2, 100), 1);
        assert_eq!(bucket_width(64, 1), 1u128 << 64);
    }

    #[test]
    fn test_empty_and_single() {
        let mut empty: Vec<KeyPair> = Vec::new();
        bucket_sort_in(&pool(2), &mut empty, 60, 16, 2);
        assert!(empty.is_empty());

        let mut one = vec![KeyPair::new(0, 42)];
        bucket_sort_in(&pool(2), &mut one, 60, 16, 2);
        assert_eq!(one, vec![KeyPair::new(0, 42)]);
    }

    #[test]
    fn test_all_equal_keys() {
        let original: Vec<_> = (0..500).map(|i| KeyPair::new(i, 7)).collect();
        let mut pairs = original.clone();
        bucket_sort_in(&pool(4), &mut pairs, 60, 64, 4);
        assert_sorted_permutation(&pairs, &original);
    }

    #[test]
    fn test_distinct_reversed() {
        let original: Vec<_> = (0..1000u32).map(|i| KeyPair::new(i, (1000 - i) as u64 * 3)).collect();
        let mut pairs = original.clone();
        bucket_sort_in(&pool(3), &mut pairs, 12, 10, 3);
        assert_sorted_permutation(&pairs, &original);
        assert_eq!(pairs[0].primitive, 999);
    }

    #[test]
    fn test_random_full_width() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for workers in [1, 2, 5] {
            let original: Vec<_> = (0..10_000).map(|i| KeyPair::new(i, rng.gen())).collect();
            let mut pairs = original.clone();
            bucket_sort(&mut pairs, 64, 256, workers).unwrap();
            assert_sorted_permutation(&pairs, &original);
        }
    }

    #[test]
    fn test_random_sizes() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        for len in [0, 1, 2, 17, 4096, 1_000_000] {
            let original: Vec<_> = (0..len as u32).map(|i| KeyPair::new(i, rng.gen_range(0..1u64 << 60))).collect();
            let mut pairs = original.clone();
            bucket_sort(&mut pairs, 60, 4096, 4).unwrap();
            assert_sorted_permutation(&pairs, &original);
        }
    }

    #[test]
    fn test_codes_above_key_width() {
        let original = vec![
            KeyPair::new(0, u64::MAX),
            KeyPair::new(1, 3),
            KeyPair::new(2, 1 << 40),
            KeyPair::new(3, 0),
        ];
        let mut pairs = original.clone();
        bucket_sort_in(&pool(2), &mut pairs, 6, 4, 2);
        assert_sorted_permutation(&pairs, &original);
    }
}
