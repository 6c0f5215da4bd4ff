//! Spatial acceleration structures (C2, C3, C4): the element-processor
//! indirection that lets the same tree code index triangles, patches, or
//! whole objects, plus the octree and BSP tree built on top of it.

pub mod bsp;
pub mod octree;

use crate::math::{BoundingBox, Ray};

/// Which side of a splitting plane an element falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Negative,
    Positive,
    Straddle,
}

/// A geometric hit produced by descending a tree, carrying just enough to
/// let the caller re-derive a full shading record (point, normal, UV) from
/// the winning element without the tree needing to know those details.
#[derive(Debug, Clone, Copy)]
pub struct TreeHit {
    pub t: f64,
}

/// Adapts an arbitrary element type `E` for storage and traversal in a tree.
/// This indirection (C2) is what lets [`octree::Octree`] and [`bsp::BspTree`]
/// index triangles, bilinear/Bézier patches, or whole objects without
/// knowing anything about their concrete representation.
pub trait ElementProcessor<E> {
    /// Ray-vs-element intersection. Returns the hit distance `t` along the
    /// ray if the element is struck within `(t_min, t_max)`.
    fn intersect(&self, element: &E, ray: &Ray, t_min: f64, t_max: f64) -> Option<TreeHit>;

    /// Shadow-only (any-hit) intersection — callers only care whether
    /// *something* blocks the ray within `max_dist`, not what or where.
    fn intersect_shadow(&self, element: &E, ray: &Ray, max_dist: f64) -> bool {
        self.intersect(element, ray, 1e-8, max_dist).is_some()
    }

    /// Whether the element's bounding box overlaps `bbox`.
    fn box_overlap(&self, element: &E, bbox: &BoundingBox) -> bool;

    /// The element's own bounding box.
    fn bounding_box(&self, element: &E) -> BoundingBox;

    /// Which side of an axis-aligned plane through `plane_point` on `axis`
    /// (0=x, 1=y, 2=z) the element lies on.
    fn plane_side(&self, element: &E, axis: usize, plane_point: f64) -> PlaneSide {
        let bbox = self.bounding_box(element);
        let lo = bbox.ll[axis];
        let hi = bbox.ur[axis];
        if hi <= plane_point {
            PlaneSide::Negative
        } else if lo >= plane_point {
            PlaneSide::Positive
        } else {
            PlaneSide::Straddle
        }
    }
}

/// Depth/element-count limits shared by octree and BSP construction.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuildLimits {
    pub max_per_node: usize,
    pub max_recursion_level: u8,
}

impl Default for TreeBuildLimits {
    fn default() -> Self {
        Self {
            max_per_node: 4,
            max_recursion_level: 20,
        }
    }
}

/// Box-widening epsilon applied on every face of a child box so elements
/// lying exactly on a split plane are still captured by both sides (§4.3).
pub const EPS_BOX: f64 = 1e-4;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("cannot build a tree from an empty element set")]
    EmptyElementSet,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::math::{Point3, Vec3};

    /// A sphere element used purely to exercise tree construction/traversal
    /// in unit tests without pulling in the full intersection kernels.
    #[derive(Debug, Clone, Copy)]
    pub struct TestSphere {
        pub center: Point3,
        pub radius: f64,
    }

    pub struct SphereProcessor;

    impl ElementProcessor<TestSphere> for SphereProcessor {
        fn intersect(
            &self,
            element: &TestSphere,
            ray: &Ray,
            t_min: f64,
            t_max: f64,
        ) -> Option<TreeHit> {
            let oc = ray.origin - element.center;
            let a = ray.direction.length_squared();
            let half_b = oc.dot(ray.direction);
            let c = oc.length_squared() - element.radius * element.radius;
            let disc = half_b * half_b - a * c;
            if disc < 0.0 {
                return None;
            }
            let sqrtd = disc.sqrt();
            let mut root = (-half_b - sqrtd) / a;
            if root < t_min || root > t_max {
                root = (-half_b + sqrtd) / a;
                if root < t_min || root > t_max {
                    return None;
                }
            }
            Some(TreeHit { t: root })
        }

        fn box_overlap(&self, element: &TestSphere, bbox: &BoundingBox) -> bool {
            self.bounding_box(element).overlaps(bbox)
        }

        fn bounding_box(&self, element: &TestSphere) -> BoundingBox {
            let r = Vec3::new(element.radius, element.radius, element.radius);
            BoundingBox::new(element.center - r, element.center + r)
        }
    }
}
