//! Surface scattering.

use rand::{Rng, RngCore};

use super::ray::{HitRecord, Ray};
use crate::util::DVec3;

/// Outgoing ray and its color attenuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scatter {
    pub attenuation: DVec3,
    pub ray: Ray,
}

/// Anything a ray can bounce off.
pub trait Material: Send + Sync + std::fmt::Debug {
    /// `None` absorbs the ray.
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord<'_>, rng: &mut dyn RngCore) -> Option<Scatter>;
}

/// Diffuse surface: normal plus a uniform unit vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lambertian {
    pub albedo: DVec3,
}

impl Lambertian {
    pub fn new(albedo: DVec3) -> Self {
        Self { albedo }
    }
}

impl Material for Lambertian {
    fn scatter(&self, _ray_in: &Ray, rec: &HitRecord<'_>, rng: &mut dyn RngCore) -> Option<Scatter> {
        let mut direction = rec.normal + random_unit_vector(rng);
        if near_zero(direction) {
            direction = rec.normal;
        }
        Some(Scatter {
            attenuation: self.albedo,
            ray: Ray::new(rec.point, direction),
        })
    }
}

/// Uniform direction on the unit sphere, rejection sampled from the cube.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> DVec3 {
    loop {
        let p = DVec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let lensq = p.length_squared();
        if 1e-160 < lensq && lensq <= 1.0 {
            return p / lensq.sqrt();
        }
    }
}

#[inline]
fn near_zero(v: DVec3) -> bool {
    const S: f64 = 1e-8;
    v.x.abs() < S && v.y.abs() < S && v.z.abs() < S
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_unit_vectors_are_unit() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let v = random_unit_vector(&mut rng);
            assert!((v.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lambertian_scatters_into_hemisphere() {
        let mut rng = StdRng::seed_from_u64(1);
        let mat = Lambertian::new(DVec3::new(0.7, 0.3, 0.3));
        let ray = Ray::new(DVec3::new(0.0, 1.0, 0.0), DVec3::NEG_Y);
        let rec = HitRecord::new(&ray, 1.0, DVec3::Y, &mat);
        for _ in 0..200 {
            let s = mat.scatter(&ray, &rec, &mut rng).unwrap();
            assert_eq!(s.attenuation, mat.albedo);
            assert_eq!(s.ray.origin, rec.point);
            assert!(s.ray.direction.dot(DVec3::Y) >= 0.0);
        }
    }

    #[test]
    fn test_near_zero() {
        assert!(near_zero(DVec3::splat(1e-9)));
        assert!(!near_zero(DVec3::new(0.0, 1e-3, 0.0)));
    }
}
