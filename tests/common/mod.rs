//! Shared scenes, primitives and tree checks for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use phr_bvh::prelude::*;
use rand::{Rng, SeedableRng};

/// Route `tracing` output through the test harness; set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Unit cube that counts how often it is tested and never reports a hit,
/// so the traversal interval never shrinks.
#[derive(Debug)]
pub struct RecordingCube {
    pub min: DVec3,
    pub visits: AtomicUsize,
}

impl RecordingCube {
    pub fn new(min: DVec3) -> Self {
        Self {
            min,
            visits: AtomicUsize::new(0),
        }
    }

    pub fn visited(&self) -> bool {
        self.visits.load(Ordering::Relaxed) > 0
    }
}

impl Primitive for RecordingCube {
    fn bounds(&self) -> Aabb {
        Aabb::new(self.min, self.min + DVec3::ONE)
    }

    fn intersect(&self, _ray: &Ray, _t_min: f64, _t_max: f64) -> Option<Hit> {
        self.visits.fetch_add(1, Ordering::Relaxed);
        None
    }
}

/// Eight unit cubes filling `[0, 2]^3`.
pub fn cube_block() -> Vec<RecordingCube> {
    let mut cubes = Vec::new();
    for x in 0..2 {
        for y in 0..2 {
            for z in 0..2 {
                cubes.push(RecordingCube::new(DVec3::new(x as f64, y as f64, z as f64)));
            }
        }
    }
    cubes
}

#[derive(Debug, Clone)]
pub struct Sphere {
    pub center: DVec3,
    pub radius: f64,
}

impl Primitive for Sphere {
    fn bounds(&self) -> Aabb {
        let r = DVec3::splat(self.radius);
        Aabb::new(self.center - r, self.center + r)
    }

    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        let oc = ray.origin - self.center;
        let a = ray.direction.length_squared();
        let half_b = oc.dot(ray.direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();
        let mut t = (-half_b - sqrtd) / a;
        if t <= t_min || t >= t_max {
            t = (-half_b + sqrtd) / a;
            if t <= t_min || t >= t_max {
                return None;
            }
        }
        let normal = (ray.at(t) - self.center) / self.radius;
        Some(Hit::new(ray, t, normal))
    }
}

/// Zero-thickness rectangle in the plane `z = z`, spanning `min..=max` in x and y.
#[derive(Debug, Clone)]
pub struct Quad {
    pub min: [f64; 2],
    pub max: [f64; 2],
    pub z: f64,
}

impl Quad {
    pub fn new(x: [f64; 2], y: [f64; 2], z: f64) -> Self {
        Self {
            min: [x[0], y[0]],
            max: [x[1], y[1]],
            z,
        }
    }
}

impl Primitive for Quad {
    fn bounds(&self) -> Aabb {
        Aabb::new(
            DVec3::new(self.min[0], self.min[1], self.z),
            DVec3::new(self.max[0], self.max[1], self.z),
        )
    }

    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        if ray.direction.z == 0.0 {
            return None;
        }
        let t = (self.z - ray.origin.z) / ray.direction.z;
        if t <= t_min || t >= t_max {
            return None;
        }
        let p = ray.at(t);
        let inside = (self.min[0]..=self.max[0]).contains(&p.x) && (self.min[1]..=self.max[1]).contains(&p.y);
        inside.then(|| Hit::new(ray, t, DVec3::Z))
    }
}

/// Two quads touching along the edge `x = 1`, one behind the other.
pub fn quad_steps() -> Vec<Quad> {
    vec![
        Quad::new([0.0, 1.0], [0.0, 1.0], 2.0),
        Quad::new([1.0, 2.0], [0.0, 1.0], 3.0),
    ]
}

/// `count` small spheres scattered through `[-10, 10]^3`.
pub fn random_spheres(count: usize, seed: u64) -> Vec<Sphere> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Sphere {
            center: DVec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            ),
            radius: rng.gen_range(0.05..0.6),
        })
        .collect()
}

/// Rays from a shell around the scene toward random points inside it.
pub fn random_rays(count: usize, seed: u64) -> Vec<Ray> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let origin = DVec3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
            );
            let target = DVec3::new(
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
            );
            Ray::new(origin, (target - origin).normalize())
        })
        .collect()
}

/// Closest hit by testing every primitive.
pub fn brute_force<P: Primitive>(primitives: &[P], ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
    let mut closest = t_max;
    let mut result = None;
    for (index, p) in primitives.iter().enumerate() {
        if let Some(mut hit) = p.intersect(ray, t_min, closest) {
            closest = hit.t;
            hit.primitive = index;
            result = Some(hit);
        }
    }
    result
}

/// Every primitive index appears in exactly one leaf.
pub fn assert_complete<P: Primitive>(bvh: &Bvh<'_, P>) {
    let mut seen = vec![0usize; bvh.primitives().len()];
    let mut stack = vec![bvh.root()];
    while let Some(id) = stack.pop() {
        let node = bvh.node(id);
        if node.is_leaf() {
            assert!(!node.primitives().is_empty(), "empty leaf {id}");
        } else {
            assert!(!node.children().is_empty(), "branch {id} without children");
        }
        for &p in node.primitives() {
            seen[p as usize] += 1;
        }
        stack.extend_from_slice(node.children());
    }
    for (index, count) in seen.iter().enumerate() {
        assert_eq!(*count, 1, "primitive {index} appears {count} times");
    }
    assert_eq!(bvh.node(bvh.root()).primitive_count() as usize, bvh.primitives().len());
}

/// Every node's box contains its children's boxes and its primitives' boxes.
pub fn assert_boxes_sound<P: Primitive>(bvh: &Bvh<'_, P>) {
    for (id, node) in bvh.nodes().iter().enumerate() {
        for &child in node.children() {
            assert!(
                node.bounds().contains(bvh.node(child).bounds(), 1e-9),
                "node {id} does not contain child {child}"
            );
        }
        for &p in node.primitives() {
            assert!(
                node.bounds().contains(&bvh.primitives()[p as usize].bounds(), 1e-9),
                "leaf {id} does not contain primitive {p}"
            );
        }
    }
}

/// Every box is exactly the union of what lies below it.
pub fn assert_boxes_tight<P: Primitive>(bvh: &Bvh<'_, P>) {
    for (id, node) in bvh.nodes().iter().enumerate() {
        let expected = match node {
            Node::Leaf { primitives, .. } => {
                Aabb::union_all(primitives.iter().map(|&p| bvh.primitives()[p as usize].bounds()))
            }
            Node::Branch { children, .. } => Aabb::union_all(children.iter().map(|&c| *bvh.node(c).bounds())),
        };
        assert_eq!(Some(*node.bounds()), expected, "node {id} box is not tight");
    }
}
