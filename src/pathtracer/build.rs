//! Median-split BVH builder.
//!
//! Each range is sorted along the longest axis of its combined box (by box
//! minimum) and cut at the middle index. Leaves hold a single primitive.

use tracing::debug;

use super::bvh::{Aabb, Bvh, BvhNode};
use super::primitives::{Hittable, Primitive};

/// Build a BVH, taking ownership of (and reordering) `primitives`.
#[tracing::instrument(skip_all, fields(prim_count = primitives.len()))]
pub fn build_bvh(mut primitives: Vec<Primitive>) -> Bvh {
    let n = primitives.len();
    if n == 0 {
        return Bvh::default();
    }

    let placeholder = BvhNode {
        bbox: Aabb::EMPTY,
        left_or_prim: 0,
        count: 0,
    };
    // a full binary tree with n leaves has 2n - 1 nodes
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n - 1);
    nodes.push(placeholder);

    struct Task {
        node_idx: usize,
        start: usize,
        end: usize, // exclusive
    }

    let mut stack = vec![Task {
        node_idx: 0,
        start: 0,
        end: n,
    }];

    while let Some(task) = stack.pop() {
        let Task {
            node_idx,
            start,
            end,
        } = task;

        let mut bbox = Aabb::EMPTY;
        for prim in &primitives[start..end] {
            bbox.grow(&prim.bounding_box());
        }

        if end - start == 1 {
            nodes[node_idx] = BvhNode {
                bbox,
                left_or_prim: start as u32,
                count: 1,
            };
            continue;
        }

        let axis = bbox.longest_axis();
        primitives[start..end].sort_unstable_by(|a, b| {
            a.bounding_box().min[axis].total_cmp(&b.bounding_box().min[axis])
        });
        let mid = start + (end - start) / 2;

        let left_idx = nodes.len();
        nodes.push(placeholder);
        nodes.push(placeholder);
        nodes[node_idx] = BvhNode {
            bbox,
            left_or_prim: left_idx as u32,
            count: 0,
        };

        stack.push(Task {
            node_idx: left_idx + 1,
            start: mid,
            end,
        });
        stack.push(Task {
            node_idx: left_idx,
            start,
            end: mid,
        });
    }

    debug!(nodes = nodes.len(), "bvh built");
    Bvh { nodes, primitives }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pathtracer::material::{Lambertian, Material};
    use crate::pathtracer::primitives::{Sphere, Triangle};
    use crate::pathtracer::ray::{Interval, Ray};
    use crate::util::DVec3;

    fn mat() -> Arc<dyn Material> {
        Arc::new(Lambertian::new(DVec3::splat(0.5)))
    }

    fn make_tri(cx: f64, cy: f64, cz: f64) -> Primitive {
        Triangle::new(
            DVec3::new(cx - 0.5, cy - 0.5, cz),
            DVec3::new(cx + 0.5, cy - 0.5, cz),
            DVec3::new(cx, cy + 0.5, cz),
            mat(),
        )
        .into()
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = build_bvh(Vec::new());
        assert!(bvh.nodes().is_empty());
        assert!(bvh.is_empty());
    }

    #[test]
    fn test_single_primitive_is_leaf() {
        let bvh = build_bvh(vec![make_tri(0.0, 0.0, 0.0)]);
        assert_eq!(bvh.nodes().len(), 1);
        assert!(bvh.nodes()[0].is_leaf());
    }

    #[test]
    fn test_many_primitives_build_full_tree() {
        let prims: Vec<Primitive> = (0..100).map(|i| make_tri(i as f64 * 2.0, 0.0, 0.0)).collect();
        let bvh = build_bvh(prims);
        assert_eq!(bvh.nodes().len(), 2 * 100 - 1);
        let leaves = bvh.nodes().iter().filter(|n| n.is_leaf()).count();
        assert_eq!(leaves, 100);
        // midpoint splits keep the tree balanced
        assert!(bvh.depth() <= 8);

        let root = bvh.bounding_box();
        assert!(root.min.x < 0.0);
        assert!(root.max.x > 198.0);

        // a hit deep inside the tree
        let ray = Ray::new(DVec3::new(50.0, 0.0, 5.0), DVec3::NEG_Z);
        let rec = bvh.hit(&ray, Interval::new(0.001, f64::INFINITY)).unwrap();
        assert!((rec.t - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_primitives() {
        let prims = vec![
            make_tri(0.0, 0.0, -5.0),
            Sphere::new(DVec3::new(0.0, 0.0, -2.0), 0.5, mat()).into(),
        ];
        let bvh = build_bvh(prims);
        let ray = Ray::new(DVec3::ZERO, DVec3::NEG_Z);
        let rec = bvh.hit(&ray, Interval::new(0.001, f64::INFINITY)).unwrap();
        assert!((rec.t - 1.5).abs() < 1e-9);
    }
}
