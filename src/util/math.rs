//! Math type re-exports and the geometric primitives of the BVH.
//!
//! Re-exports the double precision types from `glam` and provides the
//! axis-aligned box and ray types every layer of the engine works with.

pub use glam::DVec3;

use std::fmt;

/// Axis-aligned bounding box with cached derived quantities.
///
/// Extent, surface area and centroid are computed once on construction.
/// A box is never mutated in place; [`Aabb::union`] returns a new box.
#[derive(Clone, Copy, PartialEq)]
pub struct Aabb {
    min: DVec3,
    max: DVec3,
    extent: DVec3,
    surface_area: f64,
    centroid: DVec3,
}

impl Aabb {
    /// Create a new bounding box from min and max points.
    #[inline]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        debug_assert!(
            min.cmple(max).all(),
            "Aabb min must not exceed max: {min:?} > {max:?}"
        );
        let extent = max - min;
        Self {
            min,
            max,
            extent,
            surface_area: 2.0 * (extent.x * extent.y + extent.y * extent.z + extent.z * extent.x),
            centroid: (min + max) * 0.5,
        }
    }

    /// Degenerate box around a single point.
    #[inline]
    pub fn from_point(p: DVec3) -> Self {
        Self::new(p, p)
    }

    /// Union of all boxes yielded by `boxes`, `None` if there are none.
    pub fn union_all<I>(boxes: I) -> Option<Self>
    where
        I: IntoIterator<Item = Aabb>,
    {
        boxes.into_iter().reduce(|acc, b| acc.union(&b))
    }

    /// Smallest box enclosing both `self` and `other`.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    #[inline]
    pub fn min(&self) -> DVec3 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> DVec3 {
        self.max
    }

    /// Size along each axis (width, height, depth).
    #[inline]
    pub fn extent(&self) -> DVec3 {
        self.extent
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.extent.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.extent.y
    }

    #[inline]
    pub fn depth(&self) -> f64 {
        self.extent.z
    }

    /// Surface area (for SAH cost).
    #[inline]
    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }

    /// Centroid of the box.
    #[inline]
    pub fn centroid(&self) -> DVec3 {
        self.centroid
    }

    /// `min` for sign 0, `max` for sign 1.
    #[inline]
    fn bound(&self, sign: usize) -> DVec3 {
        if sign == 0 {
            self.min
        } else {
            self.max
        }
    }

    /// Whether `other` lies inside this box, allowing `eps` of slack per axis.
    pub fn contains(&self, other: &Self, eps: f64) -> bool {
        (other.min - self.min).cmpge(DVec3::splat(-eps)).all()
            && (self.max - other.max).cmpge(DVec3::splat(-eps)).all()
    }

    /// Slab test against `ray` within `[t_min, t_max]`.
    ///
    /// Uses the ray's reciprocal direction and per-axis sign so each axis
    /// needs one subtraction and one multiplication per slab plane.
    ///
    /// A ray parallel to an axis whose origin lies on that slab's plane
    /// produces `0 * inf = NaN` bounds. `f64::max`/`f64::min` drop a NaN
    /// operand and the rejection tests are false for NaN, so such a slab
    /// never rejects the box.
    #[inline]
    pub fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> bool {
        let sign = ray.sign;
        let mut t0 = (self.bound(sign[0]).x - ray.origin.x) * ray.inv_direction.x;
        let mut t1 = (self.bound(1 - sign[0]).x - ray.origin.x) * ray.inv_direction.x;
        let ty0 = (self.bound(sign[1]).y - ray.origin.y) * ray.inv_direction.y;
        let ty1 = (self.bound(1 - sign[1]).y - ray.origin.y) * ray.inv_direction.y;

        if t0 > ty1 || ty0 > t1 {
            return false;
        }
        t0 = t0.max(ty0);
        t1 = t1.min(ty1);

        let tz0 = (self.bound(sign[2]).z - ray.origin.z) * ray.inv_direction.z;
        let tz1 = (self.bound(1 - sign[2]).z - ray.origin.z) * ray.inv_direction.z;

        if t0 > tz1 || tz0 > t1 {
            return false;
        }
        t0 = t0.max(tz0);
        t1 = t1.min(tz1);

        !(t1 < t_min || t0 > t_max)
    }
}

impl fmt::Debug for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aabb({:?} - {:?})", self.min, self.max)
    }
}

/// Ray with precomputed reciprocal direction for slab tests.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
    pub inv_direction: DVec3,
    /// 1 where the direction component is negative, 0 otherwise.
    pub sign: [usize; 3],
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        let inv_direction = direction.recip();
        Self {
            origin,
            direction,
            inv_direction,
            sign: [
                (inv_direction.x < 0.0) as usize,
                (inv_direction.y < 0.0) as usize,
                (inv_direction.z < 0.0) as usize,
            ],
        }
    }

    /// Point at parameter `t` along the ray.
    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}
