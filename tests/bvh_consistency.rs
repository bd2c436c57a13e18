//! The BVH must report the same closest hit as a linear scan.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use softrender::pathtracer::{
    build_bvh, Hittable, Interval, Lambertian, Material, Primitive, Ray, Sphere, Triangle,
};
use softrender::util::DVec3;

fn random_point(rng: &mut StdRng, extent: f64) -> DVec3 {
    DVec3::new(
        rng.random_range(-extent..extent),
        rng.random_range(-extent..extent),
        rng.random_range(-extent..extent),
    )
}

fn random_world(rng: &mut StdRng, triangles: usize, spheres: usize) -> Vec<Primitive> {
    let material: Arc<dyn Material> = Arc::new(Lambertian::new(DVec3::splat(0.5)));
    let mut prims = Vec::with_capacity(triangles + spheres);
    for _ in 0..triangles {
        let base = random_point(rng, 10.0);
        let a = base + random_point(rng, 1.0);
        let b = base + random_point(rng, 1.0);
        prims.push(Triangle::new(base, a, b, material.clone()).into());
    }
    for _ in 0..spheres {
        let center = random_point(rng, 10.0);
        let radius = rng.random_range(0.1..1.0);
        prims.push(Sphere::new(center, radius, material.clone()).into());
    }
    prims
}

fn check_against_scan(seed: u64, triangles: usize, spheres: usize, rays: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let prims = random_world(&mut rng, triangles, spheres);
    let bvh = build_bvh(prims.clone());
    let interval = Interval::new(0.001, f64::INFINITY);

    let mut hits = 0;
    let mut misses = 0;
    for _ in 0..rays {
        let origin = random_point(&mut rng, 15.0);
        // aim near the cloud half the time, anywhere otherwise
        let direction = if rng.random::<bool>() {
            random_point(&mut rng, 8.0) - origin
        } else {
            random_point(&mut rng, 1.0)
        };
        let ray = Ray::new(origin, direction);

        let scan = prims.as_slice().hit(&ray, interval);
        let tree = bvh.hit(&ray, interval);
        match (scan, tree) {
            (None, None) => misses += 1,
            (Some(a), Some(b)) => {
                hits += 1;
                assert!(
                    (a.t - b.t).abs() < 1e-9,
                    "seed {seed}: scan t {} vs bvh t {}",
                    a.t,
                    b.t
                );
                assert!((a.point - b.point).length() < 1e-6);
            }
            (a, b) => panic!(
                "seed {seed}: scan {:?} vs bvh {:?} for {ray:?}",
                a.map(|h| h.t),
                b.map(|h| h.t)
            ),
        }
    }
    assert!(hits > 0, "no ray hit anything");
    assert!(misses > 0, "no ray missed");
}

#[test]
fn bvh_matches_linear_scan_triangles_and_spheres() {
    check_against_scan(7, 200, 50, 2000);
}

#[test]
fn bvh_matches_linear_scan_small_worlds() {
    for seed in 0..20 {
        check_against_scan(seed, 3, 2, 200);
    }
}

#[test]
fn bvh_root_bounds_cover_every_primitive() {
    let mut rng = StdRng::seed_from_u64(11);
    let prims = random_world(&mut rng, 64, 16);
    let bvh = build_bvh(prims.clone());
    let root = bvh.bounding_box();
    for p in &prims {
        let b = p.bounding_box();
        assert!(b.min.cmpge(root.min).all() && b.max.cmple(root.max).all());
    }
    assert_eq!(bvh.primitives().len(), prims.len());
    assert_eq!(bvh.nodes().len(), 2 * prims.len() - 1);
}

#[test]
fn empty_bvh_never_hits() {
    let bvh = build_bvh(Vec::new());
    let ray = Ray::new(DVec3::ZERO, DVec3::X);
    assert!(bvh.hit(&ray, Interval::new(0.001, f64::INFINITY)).is_none());
}

fn assert_same_hits(prims: &[Primitive], rays: &[Ray]) -> usize {
    let bvh = build_bvh(prims.to_vec());
    let interval = Interval::new(0.001, f64::INFINITY);
    let mut hits = 0;
    for ray in rays {
        let scan = prims.hit(ray, interval).map(|h| h.t);
        let tree = bvh.hit(ray, interval).map(|h| h.t);
        match (scan, tree) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                hits += 1;
                assert!((a - b).abs() < 1e-9, "scan t {a} vs bvh t {b} for {ray:?}");
            }
            (a, b) => panic!("scan {a:?} vs bvh {b:?} for {ray:?}"),
        }
    }
    hits
}

#[test]
fn bvh_handles_coincident_primitives() {
    let material: Arc<dyn Material> = Arc::new(Lambertian::new(DVec3::splat(0.5)));
    let center = DVec3::new(1.0, 2.0, 3.0);
    let mut prims: Vec<Primitive> = (0..256)
        .map(|_| Sphere::new(center, 0.5, material.clone()).into())
        .collect();
    // identical triangles share one AABB too
    for _ in 0..64 {
        prims.push(
            Triangle::new(
                DVec3::new(-1.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                material.clone(),
            )
            .into(),
        );
    }

    let bvh = build_bvh(prims.clone());
    assert_eq!(bvh.nodes().len(), 2 * prims.len() - 1);
    // index-median splits stay balanced whatever the box distribution
    assert!(bvh.depth() <= 10, "depth {}", bvh.depth());

    let rays = [
        Ray::new(DVec3::new(1.0, 2.0, 10.0), DVec3::NEG_Z),
        Ray::new(DVec3::new(1.2, 2.1, -10.0), DVec3::Z),
        Ray::new(DVec3::new(0.0, 0.3, 5.0), DVec3::NEG_Z),
        Ray::new(DVec3::new(0.0, 0.3, -5.0), DVec3::Z),
        Ray::new(DVec3::new(5.0, 5.0, 5.0), DVec3::X),
    ];
    assert_eq!(assert_same_hits(&prims, &rays), 4);
}

#[test]
fn bvh_handles_collinear_primitives() {
    let material: Arc<dyn Material> = Arc::new(Lambertian::new(DVec3::splat(0.5)));
    // spheres strung along X, some stacked on the same spot
    let prims: Vec<Primitive> = (0..300)
        .map(|i| {
            let x = (i / 3) as f64 * 0.5;
            Sphere::new(DVec3::new(x, 0.0, 0.0), 0.2, material.clone()).into()
        })
        .collect();

    let mut rays: Vec<Ray> = (0..100)
        .map(|i| Ray::new(DVec3::new(i as f64 * 0.5, 0.0, 4.0), DVec3::NEG_Z))
        .collect();
    rays.push(Ray::new(DVec3::new(-5.0, 0.0, 0.0), DVec3::X));
    rays.push(Ray::new(DVec3::new(0.25, 0.0, 4.0), DVec3::NEG_Z));

    let hits = assert_same_hits(&prims, &rays);
    assert_eq!(hits, 101);
}
