//! The contract between the engine and the scene layer.
//!
//! The scene hands builders a flat slice of [`Primitive`]s. The engine only
//! needs each primitive's bounding box and a closest-hit ray test; the
//! geometry behind them (triangles, spheres, instanced meshes) stays with
//! the caller.

use std::sync::Arc;

use crate::util::{Aabb, DVec3, Ray};

/// Anything a BVH can be built over.
///
/// Implementations are shared read-only across every build worker and every
/// rendering thread, hence `Send + Sync`.
pub trait Primitive: Send + Sync {
    /// Bounding box of the primitive.
    fn bounds(&self) -> Aabb;

    /// Closest intersection with `ray` strictly inside `(t_min, t_max)`.
    ///
    /// The returned [`Hit::primitive`] is overwritten by the traversal with
    /// the primitive's index in the slice the tree was built over.
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit>;
}

impl<P: Primitive + ?Sized> Primitive for &P {
    #[inline]
    fn bounds(&self) -> Aabb {
        (**self).bounds()
    }

    #[inline]
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        (**self).intersect(ray, t_min, t_max)
    }
}

impl<P: Primitive + ?Sized> Primitive for Box<P> {
    #[inline]
    fn bounds(&self) -> Aabb {
        (**self).bounds()
    }

    #[inline]
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        (**self).intersect(ray, t_min, t_max)
    }
}

impl<P: Primitive + ?Sized> Primitive for Arc<P> {
    #[inline]
    fn bounds(&self) -> Aabb {
        (**self).bounds()
    }

    #[inline]
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit> {
        (**self).intersect(ray, t_min, t_max)
    }
}

/// Ray/primitive intersection record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Distance along the ray.
    pub t: f64,
    /// Intersection point.
    pub point: DVec3,
    /// Surface normal, always facing against the ray.
    pub normal: DVec3,
    /// Whether the ray hit the outside of the surface.
    pub front_face: bool,
    /// Index of the primitive in the slice the tree was built over.
    pub primitive: usize,
}

impl Hit {
    /// Build a hit at `t` from the geometric (outward) normal.
    pub fn new(ray: &Ray, t: f64, outward_normal: DVec3) -> Self {
        let front_face = ray.direction.dot(outward_normal) < 0.0;
        Self {
            t,
            point: ray.at(t),
            normal: if front_face { outward_normal } else { -outward_normal },
            front_face,
            primitive: 0,
        }
    }
}

/// Box enclosing every primitive, `None` for an empty slice.
pub fn enclosing<P: Primitive>(primitives: &[P]) -> Option<Aabb> {
    Aabb::union_all(primitives.iter().map(|p| p.bounds()))
}
