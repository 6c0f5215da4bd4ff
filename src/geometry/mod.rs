//! Geometry that an object can reference: triangle meshes (C5) and tessellated
//! Bézier patches (C6). Both eventually route ray tests through the
//! intersection kernels (`crate::intersect`) via a spatial index (`crate::tree`).

pub mod bezier;
pub mod trimesh;

use crate::math::{BoundingBox, Point3, Ray};

/// A single geometric hit as seen by the object manager, before the object's
/// transform and material/shader pointers are attached (§4.7 step 3).
#[derive(Debug, Clone, Copy)]
pub struct GeometryHit {
    pub t: f64,
    pub point: Point3,
    pub normal: crate::math::Vec3,
    pub uv: (f64, f64),
}

/// Shared surface for anything an `Object` (C7) can wrap.
pub trait Geometry: Send + Sync {
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<GeometryHit>;
    fn intersect_shadow(&self, ray: &Ray, max_dist: f64) -> bool {
        self.intersect(ray, 1e-6, max_dist).is_some()
    }
    fn bounding_box(&self) -> BoundingBox;
    /// Whether the object manager should pre-reject using the local AABB
    /// before dispatching into this geometry (§4.7 step 2).
    fn wants_bbox_preflight(&self) -> bool {
        true
    }
}
