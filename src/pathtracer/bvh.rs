//! Bounding volume hierarchy over [`Primitive`]s.
//!
//! Flat node array, index 0 is the root. Children of an internal node are
//! allocated next to each other, so only the left index is stored.

use smallvec::SmallVec;

use super::primitives::{Hittable, Primitive};
use super::ray::{HitRecord, Interval, Ray};
use crate::util::DVec3;

/// Extent below which a box axis is widened.
const MIN_EXTENT: f64 = 1e-6;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    #[inline]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn grow_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Longest axis (0=x, 1=y, 2=z).
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Widen axes thinner than `MIN_EXTENT` so axis-aligned flat shapes
    /// still have a volume the slab test can enter.
    pub fn pad_flat_axes(mut self) -> Self {
        if self.is_empty() {
            return self;
        }
        for axis in 0..3 {
            if self.max[axis] - self.min[axis] < MIN_EXTENT {
                self.min[axis] -= MIN_EXTENT * 0.5;
                self.max[axis] += MIN_EXTENT * 0.5;
            }
        }
        self
    }

    /// Slab test.
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> bool {
        let mut t_min = ray_t.min;
        let mut t_max = ray_t.max;
        for axis in 0..3 {
            let inv = 1.0 / ray.direction[axis];
            let mut t0 = (self.min[axis] - ray.origin[axis]) * inv;
            let mut t1 = (self.max[axis] - ray.origin[axis]) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max <= t_min {
                return false;
            }
        }
        true
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Internal node: `left_or_prim` = left child, `count` = 0.
/// Leaf node: `left_or_prim` = primitive index, `count` = 1.
#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    pub bbox: Aabb,
    pub left_or_prim: u32,
    pub count: u32,
}

impl BvhNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// Built hierarchy. Owns its primitives, reordered by the build.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    pub(super) nodes: Vec<BvhNode>,
    pub(super) primitives: Vec<Primitive>,
}

impl Bvh {
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((i, d)) = stack.pop() {
            let node = &self.nodes[i];
            if node.is_leaf() {
                deepest = deepest.max(d);
            } else {
                let left = node.left_or_prim as usize;
                stack.push((left, d + 1));
                stack.push((left + 1, d + 1));
            }
        }
        deepest
    }
}

impl Hittable for Bvh {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut closest = ray_t.max;
        let mut best = None;
        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        stack.push(0);

        while let Some(i) = stack.pop() {
            let node = &self.nodes[i as usize];
            let range = ray_t.with_max(closest);
            if !node.bbox.hit(ray, range) {
                continue;
            }
            if node.is_leaf() {
                if let Some(rec) = self.primitives[node.left_or_prim as usize].hit(ray, range) {
                    closest = rec.t;
                    best = Some(rec);
                }
            } else {
                // left popped first
                stack.push(node.left_or_prim + 1);
                stack.push(node.left_or_prim);
            }
        }
        best
    }

    fn bounding_box(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |n| n.bbox)
    }
}
