//! Build, sort and traversal benchmarks over a random sphere scene.
//!
//! Run with `cargo bench`; `SCENE_SIZE` overrides the primitive count.

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use phr_bvh::lbvh::{bucket_sort, KeyPair};
use phr_bvh::prelude::*;
use rand::{Rng, SeedableRng};

use common::{random_rays, random_spheres, Sphere};

const PHR_FAST: PhrParams = PhrParams {
    alpha: 0.5,
    delta: 6.0,
    branching_factor: 2,
};

const PHR_HQ: PhrParams = PhrParams {
    alpha: 0.55,
    delta: 9.0,
    branching_factor: 2,
};

fn scene() -> Vec<Sphere> {
    let size = std::env::var("SCENE_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100_000);
    random_spheres(size, 42)
}

fn bench_linear_build(c: &mut Criterion) {
    let spheres = scene();
    let bounds = enclosing(&spheres).unwrap();
    let config = BuildConfig::default();

    let mut group = c.benchmark_group("lbvh");
    group.sample_size(10);
    group.throughput(Throughput::Elements(spheres.len() as u64));
    group.bench_function("build", |b| {
        b.iter(|| black_box(linear_build(&spheres, bounds, &config).unwrap()))
    });
    group.finish();
}

fn bench_phr_build(c: &mut Criterion) {
    let spheres = scene();
    let config = BuildConfig::default();
    let aux = linear_build(&spheres, enclosing(&spheres).unwrap(), &config).unwrap();

    let mut group = c.benchmark_group("phr");
    group.sample_size(10);
    group.throughput(Throughput::Elements(spheres.len() as u64));
    for (name, params) in [("fast", PHR_FAST), ("hq", PHR_HQ)] {
        let builder = PhrBuilder::with_config(&spheres, params, config.clone());
        let bvh = builder.build_from_auxiliary(&aux).unwrap();
        eprintln!("phr {name}: cost {:.3} (lbvh {:.3})", bvh.cost(), aux.cost());
        group.bench_function(format!("build_{name}"), |b| {
            b.iter(|| black_box(builder.build_from_auxiliary(&aux).unwrap()))
        });
    }
    let builder = PhrBuilder::with_config(&spheres, PHR_FAST, config);
    group.bench_function("initial_cut", |b| {
        b.iter(|| black_box(builder.initial_cut_size(&aux).unwrap()))
    });
    group.finish();
}

fn bench_bucket_sort(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let pairs: Vec<KeyPair> = (0..1_000_000u32)
        .map(|i| KeyPair::new(i, rng.gen_range(0..1u64 << 60)))
        .collect();
    let config = BuildConfig::default();

    let mut group = c.benchmark_group("sort");
    group.throughput(Throughput::Elements(pairs.len() as u64));
    group.bench_function("bucket_sort", |b| {
        b.iter_batched_ref(
            || pairs.clone(),
            |pairs| bucket_sort(pairs, config.key_bits(), config.bucket_count, config.workers).unwrap(),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let spheres = scene();
    let rays = random_rays(10_000, 43);
    let lbvh = default_linear_build(&spheres).unwrap();
    let phr = PhrBuilder::with_config(&spheres, PHR_FAST, BuildConfig::default())
        .build_from_auxiliary(&lbvh)
        .unwrap();

    let mut group = c.benchmark_group("traversal");
    group.throughput(Throughput::Elements(rays.len() as u64));
    for (name, bvh) in [("lbvh", &lbvh), ("phr", &phr)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                rays.iter()
                    .filter(|ray| bvh.intersect(ray, 0.001, f64::MAX).is_some())
                    .count()
            })
        });
        group.bench_function(format!("{name}_cost"), |b| b.iter(|| black_box(bvh.cost())));
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_linear_build,
    bench_phr_build,
    bench_bucket_sort,
    bench_traversal
);
criterion_main!(benches);
