//! Binary space partition by axis-aligned mid-planes cycling X -> Y -> Z
//! with depth (C4). Elements that straddle a split either descend to both
//! children or, when the straddling set is large relative to the whole,
//! stay at the current node while only the purely one-sided elements
//! continue downward.

use crate::math::{BoundingBox, Ray};
use crate::tree::{BuildError, ElementProcessor, PlaneSide, TreeBuildLimits, TreeHit, EPS_BOX};

/// If the straddling ("both") set exceeds this fraction of the incoming
/// element count, the node keeps those elements rather than pushing them
/// into both children (avoids combinatorial blowup from repeated splits).
const STRADDLE_RETENTION_FRACTION: f64 = 0.66;

enum Node<E> {
    Leaf(Vec<E>),
    Split {
        axis: usize,
        plane: f64,
        retained: Vec<E>,
        left: Box<Node<E>>,
        right: Box<Node<E>>,
    },
}

pub struct BspTree<E> {
    root: Node<E>,
    bbox: BoundingBox,
    limits: TreeBuildLimits,
}

impl<E: Clone> BspTree<E> {
    pub fn build<P: ElementProcessor<E>>(
        ep: &P,
        elements: Vec<E>,
        bbox: BoundingBox,
        limits: TreeBuildLimits,
    ) -> Result<Self, BuildError> {
        if elements.is_empty() {
            return Err(BuildError::EmptyElementSet);
        }
        let root = Self::build_node(ep, elements, &bbox, limits, 0);
        Ok(Self { root, bbox, limits })
    }

    fn build_node<P: ElementProcessor<E>>(
        ep: &P,
        elements: Vec<E>,
        bbox: &BoundingBox,
        limits: TreeBuildLimits,
        depth: u8,
    ) -> Node<E> {
        let extents = bbox.extents();
        let stop = elements.len() <= limits.max_per_node
            || depth >= limits.max_recursion_level
            || extents.x <= EPS_BOX
            || extents.y <= EPS_BOX
            || extents.z <= EPS_BOX;
        if stop {
            return Node::Leaf(elements);
        }

        let axis = (depth as usize) % 3;
        let plane = bbox.center()[axis];

        let mut left_only = Vec::new();
        let mut right_only = Vec::new();
        let mut both = Vec::new();
        for e in &elements {
            match ep.plane_side(e, axis, plane) {
                PlaneSide::Negative => left_only.push(e.clone()),
                PlaneSide::Positive => right_only.push(e.clone()),
                PlaneSide::Straddle => both.push(e.clone()),
            }
        }

        let total = elements.len();
        let quarter_depth = limits.max_recursion_level / 4;
        let retain_straddlers = both.len() as f64 > STRADDLE_RETENTION_FRACTION * total as f64
            || (depth > quarter_depth && left_only.is_empty() && right_only.is_empty());

        let (retained, left_extra, right_extra) = if retain_straddlers {
            (both, Vec::new(), Vec::new())
        } else {
            (Vec::new(), both.clone(), both)
        };

        let mut left_set = left_only;
        left_set.extend(left_extra);
        let mut right_set = right_only;
        right_set.extend(right_extra);

        if left_set.is_empty() && right_set.is_empty() {
            // Splitting changed nothing; keep everything here.
            return Node::Leaf(elements);
        }

        let mut left_box = *bbox;
        left_box.ur.set(axis, plane);
        let mut right_box = *bbox;
        right_box.ll.set(axis, plane);

        let left = Box::new(if left_set.is_empty() {
            Node::Leaf(Vec::new())
        } else {
            Self::build_node(ep, left_set, &left_box, limits, depth + 1)
        });
        let right = Box::new(if right_set.is_empty() {
            Node::Leaf(Vec::new())
        } else {
            Self::build_node(ep, right_set, &right_box, limits, depth + 1)
        });

        Node::Split {
            axis,
            plane,
            retained,
            left,
            right,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn intersect<P: ElementProcessor<E>>(
        &self,
        ep: &P,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
    ) -> Option<(TreeHit, &E)> {
        if !self.bbox.hit(ray, t_min, t_max) && !self.bbox.contains_point(ray.origin) {
            return None;
        }
        Self::intersect_node(ep, &self.root, ray, t_min, t_max)
    }

    fn intersect_node<'a, P: ElementProcessor<E>>(
        ep: &P,
        node: &'a Node<E>,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
    ) -> Option<(TreeHit, &'a E)> {
        match node {
            Node::Leaf(elements) => {
                let mut best: Option<(TreeHit, &E)> = None;
                let mut closest = t_max;
                for e in elements {
                    if let Some(hit) = ep.intersect(e, ray, t_min, closest) {
                        closest = hit.t;
                        best = Some((hit, e));
                    }
                }
                best
            }
            Node::Split {
                axis,
                plane,
                retained,
                left,
                right,
            } => {
                // Determine which side the ray enters first by the sign of
                // its direction on the split axis.
                let (near, far) = if ray.direction[*axis] >= 0.0 {
                    (left.as_ref(), right.as_ref())
                } else {
                    (right.as_ref(), left.as_ref())
                };
                let denom = ray.direction[*axis];
                let t_plane = if denom.abs() > 1e-12 {
                    (*plane - ray.origin[*axis]) / denom
                } else {
                    f64::INFINITY
                };

                let mut best: Option<(TreeHit, &E)> = None;
                let mut closest = t_max;

                if let Some((hit, e)) = Self::intersect_node(ep, near, ray, t_min, closest) {
                    closest = hit.t;
                    best = Some((hit, e));
                }

                for e in retained {
                    if let Some(hit) = ep.intersect(e, ray, t_min, closest) {
                        closest = hit.t;
                        best = Some((hit, e));
                    }
                }

                if t_plane < closest {
                    if let Some((hit, e)) = Self::intersect_node(ep, far, ray, t_min, closest) {
                        closest = hit.t;
                        best = Some((hit, e));
                    }
                }
                let _ = closest;
                best
            }
        }
    }

    pub fn intersect_any<P: ElementProcessor<E>>(&self, ep: &P, ray: &Ray, max_dist: f64) -> bool {
        if !self.bbox.hit(ray, 1e-8, max_dist) && !self.bbox.contains_point(ray.origin) {
            return false;
        }
        Self::intersect_any_node(ep, &self.root, ray, max_dist)
    }

    fn intersect_any_node<P: ElementProcessor<E>>(
        ep: &P,
        node: &Node<E>,
        ray: &Ray,
        max_dist: f64,
    ) -> bool {
        match node {
            Node::Leaf(elements) => elements
                .iter()
                .any(|e| ep.intersect_shadow(e, ray, max_dist)),
            Node::Split {
                retained,
                left,
                right,
                ..
            } => {
                retained.iter().any(|e| ep.intersect_shadow(e, ray, max_dist))
                    || Self::intersect_any_node(ep, left, ray, max_dist)
                    || Self::intersect_any_node(ep, right, ray, max_dist)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn check_leaf_invariant(&self) -> bool {
        fn walk(node: &Node<impl Clone>, limits: TreeBuildLimits, depth: u8) -> bool {
            match node {
                Node::Leaf(es) => es.len() <= limits.max_per_node || depth >= limits.max_recursion_level,
                Node::Split { left, right, .. } => {
                    walk(left, limits, depth + 1) && walk(right, limits, depth + 1)
                }
            }
        }
        walk(&self.root, self.limits, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vec3};
    use crate::tree::test_support::{SphereProcessor, TestSphere};

    fn make_spheres(n: usize) -> Vec<TestSphere> {
        let mut v = Vec::new();
        for i in 0..n {
            let t = i as f64;
            v.push(TestSphere {
                center: Point3::new((t * 3.7) % 20.0 - 10.0, (t * 1.3) % 20.0 - 10.0, (t * 2.1) % 20.0 - 10.0),
                radius: 0.4,
            });
        }
        v
    }

    #[test]
    fn empty_element_set_is_build_error() {
        let ep = SphereProcessor;
        let bbox = BoundingBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let err = BspTree::<TestSphere>::build(&ep, vec![], bbox, TreeBuildLimits::default());
        assert!(matches!(err, Err(BuildError::EmptyElementSet)));
    }

    #[test]
    fn tree_never_skips_a_closer_linear_hit() {
        let ep = SphereProcessor;
        let spheres = make_spheres(150);
        let bbox = BoundingBox::new(
            Point3::new(-12.0, -12.0, -12.0),
            Point3::new(12.0, 12.0, 12.0),
        );
        let tree = BspTree::build(&ep, spheres.clone(), bbox, TreeBuildLimits::default()).unwrap();

        let rays = [
            Ray::new(Point3::new(-20.0, 0.3, 0.1), Vec3::new(1.0, 0.0, 0.0)),
            Ray::new(Point3::new(0.0, -20.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
        ];

        for ray in rays {
            let tree_hit = tree.intersect(&ep, &ray, 1e-6, f64::INFINITY).map(|(h, _)| h.t);
            let mut linear_best: Option<f64> = None;
            for s in &spheres {
                if let Some(h) = ep.intersect(s, &ray, 1e-6, f64::INFINITY) {
                    linear_best = Some(linear_best.map_or(h.t, |b: f64| b.min(h.t)));
                }
            }
            match (tree_hit, linear_best) {
                (Some(t), Some(l)) => assert!(t <= l + 1e-9),
                (None, None) => {}
                (None, Some(_)) => panic!("bsp tree missed a hit the linear scan found"),
                (Some(_), None) => {}
            }
        }
    }
}
