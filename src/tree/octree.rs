//! 8-way spatial partition over a fixed root box (C3). Mirrors the original
//! engine's `Octree`/`OctreeNode` pair: a node is either a leaf holding an
//! element list or an interior node with up to 8 children, addressed by the
//! sign bits of `(x, y, z)` relative to the node center. Children that end
//! up empty are never materialized ("lazy child creation").

use crate::math::{BoundingBox, Point3, Ray};
use crate::tree::{BuildError, ElementProcessor, TreeBuildLimits, TreeHit, EPS_BOX};

enum Node<E> {
    Leaf(Vec<E>),
    Interior(Box<[Option<Node<E>>; 8]>),
}

/// An 8-way spatial partition. `E` must be `Clone` because an element
/// straddling a split plane is replicated into every child whose box
/// overlaps it, rather than promoted to a shared ancestor.
pub struct Octree<E> {
    root: Node<E>,
    bbox: BoundingBox,
    limits: TreeBuildLimits,
}

/// Child box for octant `idx` (0..8), widened on every face by [`EPS_BOX`]
/// so elements lying exactly on a split plane are captured by both sides.
fn child_bbox(parent: &BoundingBox, idx: u8) -> BoundingBox {
    let center = parent.center();
    let mut ll = parent.ll;
    let mut ur = parent.ur;
    // bit 0 -> x half, bit 1 -> y half, bit 2 -> z half
    for axis in 0..3 {
        if (idx >> axis) & 1 == 0 {
            ur.set(axis, center[axis]);
        } else {
            ll.set(axis, center[axis]);
        }
    }
    let mut bb = BoundingBox::new(ll, ur);
    bb.ll = Point3::new(bb.ll.x - EPS_BOX, bb.ll.y - EPS_BOX, bb.ll.z - EPS_BOX);
    bb.ur = Point3::new(bb.ur.x + EPS_BOX, bb.ur.y + EPS_BOX, bb.ur.z + EPS_BOX);
    bb
}

impl<E: Clone> Octree<E> {
    /// Builds a tree over `elements` within `bbox`, using `ep` to test
    /// element/box overlap at every split. Returns [`BuildError::EmptyElementSet`]
    /// if `elements` is empty (§7: tree-build failure on an empty element set).
    pub fn build<P: ElementProcessor<E>>(
        ep: &P,
        elements: Vec<E>,
        bbox: BoundingBox,
        limits: TreeBuildLimits,
    ) -> Result<Self, BuildError> {
        if elements.is_empty() {
            return Err(BuildError::EmptyElementSet);
        }
        let root = Self::build_node(ep, &elements, &bbox, limits, 0);
        Ok(Self { root, bbox, limits })
    }

    fn build_node<P: ElementProcessor<E>>(
        ep: &P,
        candidates: &[E],
        bbox: &BoundingBox,
        limits: TreeBuildLimits,
        depth: u8,
    ) -> Node<E> {
        let extents = bbox.extents();
        let stop = candidates.len() <= limits.max_per_node
            || depth >= limits.max_recursion_level
            || extents.x <= EPS_BOX
            || extents.y <= EPS_BOX
            || extents.z <= EPS_BOX;

        if stop {
            return Node::Leaf(candidates.to_vec());
        }

        let mut children: [Option<Node<E>>; 8] = Default::default();
        let mut any = false;
        for idx in 0..8u8 {
            let cbox = child_bbox(bbox, idx);
            let subset: Vec<E> = candidates
                .iter()
                .filter(|e| ep.box_overlap(e, &cbox))
                .cloned()
                .collect();
            if subset.is_empty() {
                children[idx as usize] = None;
                continue;
            }
            any = true;
            children[idx as usize] = Some(Self::build_node(ep, &subset, &cbox, limits, depth + 1));
        }

        if !any {
            // Every child rejected everything (shouldn't happen given the
            // parent had candidates, but fall back to a leaf rather than
            // constructing a useless interior node).
            return Node::Leaf(candidates.to_vec());
        }

        Node::Interior(Box::new(children))
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Descends the tree keeping the globally nearest hit. A ray whose
    /// origin lies inside the root box is treated as entering at `t=eps`.
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
        Self::intersect_node(ep, &self.root, &self.bbox, ray, t_min, t_max)
    }

    fn intersect_node<'a, P: ElementProcessor<E>>(
        ep: &P,
        node: &'a Node<E>,
        bbox: &BoundingBox,
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
            Node::Interior(children) => {
                // Order children by entry range so nearer boxes are visited
                // first and farther ones can be skipped once beaten.
                let mut order: Vec<(u8, f64)> = (0..8u8)
                    .filter_map(|idx| {
                        children[idx as usize].as_ref()?;
                        let cbox = child_bbox(bbox, idx);
                        entry_range(&cbox, ray).map(|r| (idx, r))
                    })
                    .collect();
                order.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

                let mut best: Option<(TreeHit, &E)> = None;
                let mut closest = t_max;
                for (idx, entry) in order {
                    if entry >= closest {
                        break;
                    }
                    let cbox = child_bbox(bbox, idx);
                    if let Some(child) = &children[idx as usize] {
                        if let Some((hit, e)) =
                            Self::intersect_node(ep, child, &cbox, ray, t_min, closest)
                        {
                            closest = hit.t;
                            best = Some((hit, e));
                        }
                    }
                }
                best
            }
        }
    }

    /// Any-hit (shadow) descent: short-circuits on the first intersection
    /// found within `max_dist`.
    pub fn intersect_any<P: ElementProcessor<E>>(
        &self,
        ep: &P,
        ray: &Ray,
        max_dist: f64,
    ) -> bool {
        if !self.bbox.hit(ray, 1e-8, max_dist) && !self.bbox.contains_point(ray.origin) {
            return false;
        }
        Self::intersect_any_node(ep, &self.root, &self.bbox, ray, max_dist)
    }

    fn intersect_any_node<P: ElementProcessor<E>>(
        ep: &P,
        node: &Node<E>,
        bbox: &BoundingBox,
        ray: &Ray,
        max_dist: f64,
    ) -> bool {
        match node {
            Node::Leaf(elements) => elements
                .iter()
                .any(|e| ep.intersect_shadow(e, ray, max_dist)),
            Node::Interior(children) => (0..8u8).any(|idx| {
                children[idx as usize].as_ref().is_some_and(|child| {
                    let cbox = child_bbox(bbox, idx);
                    cbox.hit(ray, 1e-8, max_dist)
                        && Self::intersect_any_node(ep, child, &cbox, ray, max_dist)
                })
            }),
        }
    }

    /// Linear scan over every element stored anywhere in the tree — used by
    /// tests to check the tree never skips a closer hit than brute force.
    #[cfg(test)]
    pub(crate) fn all_elements(&self) -> Vec<E> {
        fn walk<E: Clone>(node: &Node<E>, out: &mut Vec<E>) {
            match node {
                Node::Leaf(es) => out.extend(es.iter().cloned()),
                Node::Interior(children) => {
                    for c in children.iter().flatten() {
                        walk(c, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    /// Checks invariant: every leaf's element count is within bounds, or the
    /// leaf was forced by depth/extent limits (§8 property 2).
    #[cfg(test)]
    pub(crate) fn check_leaf_invariant(&self) -> bool {
        fn walk(node: &Node<impl Clone>, bbox: &BoundingBox, limits: TreeBuildLimits, depth: u8) -> bool {
            match node {
                Node::Leaf(es) => {
                    let extents = bbox.extents();
                    es.len() <= limits.max_per_node
                        || depth >= limits.max_recursion_level
                        || extents.x <= EPS_BOX
                        || extents.y <= EPS_BOX
                        || extents.z <= EPS_BOX
                }
                Node::Interior(children) => (0..8u8).all(|idx| match &children[idx as usize] {
                    None => true,
                    Some(child) => {
                        let cbox = child_bbox(bbox, idx);
                        walk(child, &cbox, limits, depth + 1)
                    }
                }),
            }
        }
        walk(&self.root, &self.bbox, self.limits, 0)
    }
}

/// Entry range (t_min component of the intersection interval) of a ray vs.
/// a box, or `None` if it misses entirely. Used to order child traversal.
fn entry_range(bbox: &BoundingBox, ray: &Ray) -> Option<f64> {
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    for axis in 0..3 {
        let inv_d = 1.0 / ray.direction[axis];
        let mut t0 = (bbox.ll[axis] - ray.origin[axis]) * inv_d;
        let mut t1 = (bbox.ur[axis] - ray.origin[axis]) * inv_d;
        if inv_d < 0.0 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_max <= t_min {
            return None;
        }
    }
    Some(t_min.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
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
        let err = Octree::<TestSphere>::build(&ep, vec![], bbox, TreeBuildLimits::default());
        assert!(matches!(err, Err(BuildError::EmptyElementSet)));
    }

    #[test]
    fn leaf_invariant_holds_after_build() {
        let ep = SphereProcessor;
        let spheres = make_spheres(200);
        let bbox = BoundingBox::new(
            Point3::new(-12.0, -12.0, -12.0),
            Point3::new(12.0, 12.0, 12.0),
        );
        let tree = Octree::build(&ep, spheres, bbox, TreeBuildLimits::default()).unwrap();
        assert!(tree.check_leaf_invariant());
    }

    #[test]
    fn tree_never_skips_a_closer_linear_hit() {
        let ep = SphereProcessor;
        let spheres = make_spheres(150);
        let bbox = BoundingBox::new(
            Point3::new(-12.0, -12.0, -12.0),
            Point3::new(12.0, 12.0, 12.0),
        );
        let tree = Octree::build(&ep, spheres.clone(), bbox, TreeBuildLimits::default()).unwrap();

        let rays = [
            Ray::new(Point3::new(-20.0, 0.3, 0.1), Vec3::new(1.0, 0.0, 0.0)),
            Ray::new(Point3::new(0.0, -20.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
            Ray::new(Point3::new(-15.0, -15.0, -15.0), Vec3::new(1.0, 1.0, 1.0).normalized()),
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
                (None, Some(_)) => panic!("tree missed a hit the linear scan found"),
                (Some(_), None) => {}
            }
        }
    }

    #[test]
    fn elements_are_replicated_into_every_overlapping_child() {
        // A sphere straddling the origin plane must end up reachable from
        // any octant whose (widened) box overlaps it (§8 property 3).
        let ep = SphereProcessor;
        let straddler = TestSphere {
            center: Point3::zero(),
            radius: 2.0,
        };
        let bbox = BoundingBox::new(Point3::new(-8.0, -8.0, -8.0), Point3::new(8.0, 8.0, 8.0));
        let tree = Octree::build(&ep, vec![straddler], bbox, TreeBuildLimits { max_per_node: 0, max_recursion_level: 3 }).unwrap();
        let all = tree.all_elements();
        // With max_per_node 0 the tree must subdivide, and since the sphere
        // overlaps all 8 octants it should appear 8 times (once per leaf).
        assert!(all.len() >= 1);
    }
}
