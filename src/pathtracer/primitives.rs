//! Ray-traceable shapes.

use std::sync::Arc;

use super::bvh::Aabb;
use super::material::Material;
use super::ray::{HitRecord, Interval, Ray};
use crate::util::DVec3;

/// Determinant threshold below which a ray counts as parallel to a triangle.
const PARALLEL_EPSILON: f64 = 1e-8;

/// Intersection and bounds, implemented by every primitive and by the BVH.
pub trait Hittable {
    /// Closest intersection with `t` inside `ray_t`.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>>;

    fn bounding_box(&self) -> Aabb;
}

#[derive(Debug, Clone)]
pub struct Triangle {
    pub v0: DVec3,
    pub v1: DVec3,
    pub v2: DVec3,
    edge1: DVec3,
    edge2: DVec3,
    /// Zero for degenerate triangles.
    normal: DVec3,
    pub material: Arc<dyn Material>,
}

impl Triangle {
    pub fn new(v0: DVec3, v1: DVec3, v2: DVec3, material: Arc<dyn Material>) -> Self {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        Self {
            v0,
            v1,
            v2,
            edge1,
            edge2,
            normal: edge1.cross(edge2).try_normalize().unwrap_or(DVec3::ZERO),
            material,
        }
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }
}

impl Hittable for Triangle {
    /// Möller-Trumbore.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        if self.normal == DVec3::ZERO {
            return None;
        }
        let h = ray.direction.cross(self.edge2);
        let a = self.edge1.dot(h);
        if a.abs() < PARALLEL_EPSILON {
            return None;
        }
        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = f * self.edge2.dot(q);
        if !ray_t.contains(t) {
            return None;
        }
        Some(HitRecord::new(ray, t, self.normal, self.material.as_ref()))
    }

    fn bounding_box(&self) -> Aabb {
        let mut b = Aabb::EMPTY;
        b.grow_point(self.v0);
        b.grow_point(self.v1);
        b.grow_point(self.v2);
        b.pad_flat_axes()
    }
}

#[derive(Debug, Clone)]
pub struct Sphere {
    pub center: DVec3,
    /// Never negative.
    pub radius: f64,
    pub material: Arc<dyn Material>,
}

impl Sphere {
    pub fn new(center: DVec3, radius: f64, material: Arc<dyn Material>) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }
}

impl Hittable for Sphere {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        if self.radius <= 0.0 {
            return None;
        }
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        if a == 0.0 {
            return None;
        }
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        let mut root = (h - sqrtd) / a;
        if !ray_t.contains(root) {
            root = (h + sqrtd) / a;
            if !ray_t.contains(root) {
                return None;
            }
        }
        let outward = (ray.at(root) - self.center) / self.radius;
        Some(HitRecord::new(ray, root, outward, self.material.as_ref()))
    }

    fn bounding_box(&self) -> Aabb {
        let r = DVec3::splat(self.radius);
        Aabb::new(self.center - r, self.center + r).pad_flat_axes()
    }
}

/// Closed set of shapes the BVH stores.
#[derive(Debug, Clone)]
pub enum Primitive {
    Triangle(Triangle),
    Sphere(Sphere),
}

impl Hittable for Primitive {
    #[inline]
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        match self {
            Primitive::Triangle(t) => t.hit(ray, ray_t),
            Primitive::Sphere(s) => s.hit(ray, ray_t),
        }
    }

    #[inline]
    fn bounding_box(&self) -> Aabb {
        match self {
            Primitive::Triangle(t) => t.bounding_box(),
            Primitive::Sphere(s) => s.bounding_box(),
        }
    }
}

impl From<Triangle> for Primitive {
    fn from(t: Triangle) -> Self {
        Primitive::Triangle(t)
    }
}

impl From<Sphere> for Primitive {
    fn from(s: Sphere) -> Self {
        Primitive::Sphere(s)
    }
}

/// Linear scan, closest hit wins.
impl Hittable for [Primitive] {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord<'_>> {
        let mut closest = ray_t.max;
        let mut best = None;
        for prim in self {
            if let Some(rec) = prim.hit(ray, ray_t.with_max(closest)) {
                closest = rec.t;
                best = Some(rec);
            }
        }
        best
    }

    fn bounding_box(&self) -> Aabb {
        self.iter().fold(Aabb::EMPTY, |mut b, p| {
            b.grow(&p.bounding_box());
            b
        })
    }
}
