//! Irradiance cache (C8, §4.10): an octree-indexed store of diffuse
//! illumination samples, keyed loosely by position and normal, supporting an
//! insertion phase (writer-exclusive) followed by a frozen, read-only query
//! phase.

use crate::math::{BoundingBox, Color, Point3, Vec3};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Hard cap on descent depth so a pathological `r0` can't recurse forever;
/// node size more than halves every level so this is reached quickly in
/// practice.
const MAX_DEPTH: u32 = 48;

#[derive(Debug, Clone, Copy)]
pub struct IrradianceSample {
    pub p: Point3,
    pub n: Vec3,
    pub e: Color,
    pub r0: f64,
    /// Rotational and translational irradiance gradients, when enabled.
    pub gradients: Option<(Vec3, Vec3)>,
}

struct Node {
    center: Point3,
    size: f64,
    samples: Vec<IrradianceSample>,
    children: Option<Box<[Option<Node>; 8]>>,
}

impl Node {
    fn new(center: Point3, size: f64) -> Self {
        Self { center, size, samples: Vec::new(), children: None }
    }

    fn octant_of(&self, p: Point3) -> u8 {
        let mut idx = 0u8;
        if p.x >= self.center.x {
            idx |= 1;
        }
        if p.y >= self.center.y {
            idx |= 2;
        }
        if p.z >= self.center.z {
            idx |= 4;
        }
        idx
    }

    fn child_center(&self, idx: u8) -> Point3 {
        let q = self.size / 4.0;
        Point3::new(
            self.center.x + if idx & 1 != 0 { q } else { -q },
            self.center.y + if idx & 2 != 0 { q } else { -q },
            self.center.z + if idx & 4 != 0 { q } else { -q },
        )
    }
}

pub struct IrradianceCache {
    tolerance: f64,
    min_spacing: f64,
    max_spacing: f64,
    root: RwLock<Node>,
    frozen: AtomicBool,
}

impl IrradianceCache {
    /// `root_size` is the spatial tolerance times the caller's harmonic
    /// validity radius, per §4.10. `min_spacing`/`max_spacing` bound the
    /// clamped `r0` stored with each sample.
    pub fn new(center: Point3, root_size: f64, tolerance: f64, min_spacing: f64, max_spacing: f64) -> Self {
        Self {
            tolerance,
            min_spacing,
            max_spacing,
            root: RwLock::new(Node::new(center, root_size)),
            frozen: AtomicBool::new(false),
        }
    }

    /// Marks the cache read-only. Any subsequent `insert` is a programming
    /// error (checked with `debug_assert!` rather than a `Result`, per the
    /// original's "this should never happen in correct code" contract).
    pub fn finish_precomputation(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Inserts a new sample, clamping its harmonic radius to
    /// `[min_spacing/tol, max_spacing/tol]` and descending to the first node
    /// whose size is below `r0/tol * 4` (the "4x fudge", §4.10).
    pub fn insert(&self, p: Point3, n: Vec3, e: Color, harmonic_radius: f64, gradients: Option<(Vec3, Vec3)>) {
        debug_assert!(!self.is_frozen(), "insert after finish_precomputation");
        let r0 = harmonic_radius.clamp(self.min_spacing / self.tolerance, self.max_spacing / self.tolerance);
        let threshold_size = r0 / self.tolerance * 4.0;

        let mut root = self.root.write().unwrap();
        Self::insert_node(&mut root, p, n, e, r0, gradients, threshold_size, 0);
    }

    fn insert_node(
        node: &mut Node,
        p: Point3,
        n: Vec3,
        e: Color,
        r0: f64,
        gradients: Option<(Vec3, Vec3)>,
        threshold_size: f64,
        depth: u32,
    ) {
        if node.size < threshold_size || depth >= MAX_DEPTH {
            node.samples.push(IrradianceSample { p, n, e, r0, gradients });
            return;
        }
        let idx = node.octant_of(p);
        let children = node.children.get_or_insert_with(|| Box::new(Default::default()));
        let child = children[idx as usize].get_or_insert_with(|| {
            let center = node.child_center(idx);
            Node::new(center, node.size / 2.0)
        });
        Self::insert_node(child, p, n, e, r0, gradients, threshold_size, depth + 1);
    }

    fn weight(p: Point3, n: Vec3, sample: &IrradianceSample) -> f64 {
        let dist = (p - sample.p).length();
        let cos_term = (1.0 - n.dot(sample.n).clamp(-1.0, 1.0)).max(0.0).sqrt();
        let denom = dist / sample.r0 + cos_term;
        if denom <= 1e-10 {
            1e10
        } else {
            (1.0 / denom).min(1e10)
        }
    }

    /// Sums weighted contributions from every sample whose weight exceeds
    /// `1/tolerance`. Returns `(weighted sum of E, total weight)`; the
    /// caller divides to get the final estimate (§4.10).
    pub fn query(&self, p: Point3, n: Vec3) -> (Color, f64) {
        let root = self.root.read().unwrap();
        let mut sum = Color::zero();
        let mut total = 0.0;
        Self::query_node(&root, p, n, self.tolerance, &mut sum, &mut total);
        (sum, total)
    }

    fn query_node(node: &Node, p: Point3, n: Vec3, tol: f64, sum: &mut Color, total: &mut f64) {
        let threshold = 1.0 / tol;
        for sample in &node.samples {
            let w = Self::weight(p, n, sample);
            if w > threshold {
                *sum += sample.e * w;
                *total += w;
            }
        }
        if let Some(children) = &node.children {
            let idx = node.octant_of(p);
            if let Some(child) = &children[idx as usize] {
                Self::query_node(child, p, n, tol, sum, total);
            }
        }
    }

    /// True if no stored sample at or under the relevant node already
    /// weighs above the threshold at `(p, n)` — used during the prepass to
    /// decide whether a new sample must be computed.
    pub fn is_sample_needed(&self, p: Point3, n: Vec3) -> bool {
        let root = self.root.read().unwrap();
        let mut best = 0.0f64;
        Self::max_weight_node(&root, p, n, &mut best);
        best <= 1.0 / self.tolerance
    }

    fn max_weight_node(node: &Node, p: Point3, n: Vec3, best: &mut f64) {
        for sample in &node.samples {
            let w = Self::weight(p, n, sample);
            if w > *best {
                *best = w;
            }
        }
        if let Some(children) = &node.children {
            let idx = node.octant_of(p);
            if let Some(child) = &children[idx as usize] {
                Self::max_weight_node(child, p, n, best);
            }
        }
    }

    pub fn root_box(&self) -> BoundingBox {
        let root = self.root.read().unwrap();
        let h = root.size / 2.0;
        BoundingBox::new(
            root.center - Vec3::new(h, h, h),
            root.center + Vec3::new(h, h, h),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_near_a_dense_sample_exceeds_threshold() {
        let cache = IrradianceCache::new(Point3::zero(), 16.0, 0.2, 0.1, 4.0);
        cache.insert(Point3::new(0.1, 0.0, 0.0), Vec3::unit_y(), Color::new(1.0, 1.0, 1.0), 0.5, None);
        cache.finish_precomputation();
        let (sum, weight) = cache.query(Point3::new(0.12, 0.0, 0.0), Vec3::unit_y());
        assert!(weight > 0.0);
        assert!(sum.x > 0.0);
    }

    #[test]
    fn far_query_point_finds_nothing() {
        let cache = IrradianceCache::new(Point3::zero(), 16.0, 0.2, 0.1, 4.0);
        cache.insert(Point3::new(0.1, 0.0, 0.0), Vec3::unit_y(), Color::new(1.0, 1.0, 1.0), 0.5, None);
        cache.finish_precomputation();
        let (_, weight) = cache.query(Point3::new(100.0, 100.0, 100.0), Vec3::unit_y());
        assert_eq!(weight, 0.0);
    }

    #[test]
    fn is_sample_needed_is_false_once_densely_sampled() {
        let cache = IrradianceCache::new(Point3::zero(), 16.0, 0.5, 0.1, 4.0);
        assert!(cache.is_sample_needed(Point3::zero(), Vec3::unit_y()));
        cache.insert(Point3::zero(), Vec3::unit_y(), Color::ones(), 2.0, None);
        assert!(!cache.is_sample_needed(Point3::new(0.01, 0.0, 0.0), Vec3::unit_y()));
    }
}
