//! Object registry (C7, §4.7): each object composes a geometry, a cached
//! transform, a BSDF, an optional modifier/shader/radiance map. Ray tests go
//! through the object's inverse transform into its local frame; above a
//! configurable count the manager indexes objects in an octree built lazily
//! under a mutex, mirroring the teacher's lazy-construction pattern used for
//! other shared caches in this repo.

use crate::geometry::Geometry;
use crate::math::{BoundingBox, Matrix4, Point3, Ray, Vec3};
use crate::shading::bsdf::Bsdf;
use crate::tree::octree::Octree;
use crate::tree::{ElementProcessor, PlaneSide, TreeBuildLimits, TreeHit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Per-pixel perturbation of a BSDF's parameters before shading — e.g. a
/// bump map or procedural albedo variation. Stubbed here since scene/texture
/// loading is out of scope; objects are free to omit one.
pub trait Modifier: Send + Sync {
    fn modify_normal(&self, point: Point3, normal: Vec3, uv: (f64, f64)) -> Vec3 {
        let _ = (point, uv);
        normal
    }
}

/// A non-mesh light contribution sampled directly by its radiance map
/// (e.g. an environment light), distinct from the mesh/luminary lights
/// §4.8 also sums over.
pub trait RadianceMap: Send + Sync {
    fn radiance(&self, direction: Vec3) -> crate::math::Color;
}

/// Per-object subsurface-scattering parameters (§4.9): sample-cloud size and
/// placement radius, plus the extinction/irradiance-scale knobs `sss::
/// evaluate`/`build_sample_set` take. Absent on objects with no subsurface
/// response.
#[derive(Debug, Clone, Copy)]
pub struct SubsurfaceConfig {
    pub sample_count: usize,
    pub sample_radius: f64,
    pub irradiance_scale: f64,
    pub sigma_tr: f64,
}

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

pub struct Object {
    pub id: u64,
    pub geometry: Arc<dyn Geometry>,
    pub material: Arc<dyn Bsdf>,
    pub modifier: Option<Arc<dyn Modifier>>,
    pub radiance_map: Option<Arc<dyn RadianceMap>>,
    pub casts_shadow: bool,
    pub subsurface: Option<SubsurfaceConfig>,
    to_world: Matrix4,
    to_local: Matrix4,
    to_local_transpose: Matrix4,
    world_bbox: BoundingBox,
}

/// The fully resolved hit an object test returns: world-space point/normal,
/// plus the owning object for material/modifier/shader lookup (§4.7 step 3).
pub struct ObjectHit<'a> {
    pub t: f64,
    pub point: Point3,
    pub normal: Vec3,
    pub uv: (f64, f64),
    pub object: &'a Object,
}

impl Object {
    pub fn new(
        geometry: Arc<dyn Geometry>,
        to_world: Matrix4,
        material: Arc<dyn Bsdf>,
    ) -> Self {
        let to_local = to_world.inverse().expect("object transform must be invertible");
        let to_local_transpose = to_local.transpose();
        let local_bbox = geometry.bounding_box();
        let world_bbox = Self::transform_bbox(&to_world, &local_bbox);
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            geometry,
            material,
            modifier: None,
            radiance_map: None,
            casts_shadow: true,
            subsurface: None,
            to_world,
            to_local,
            to_local_transpose,
            world_bbox,
        }
    }

    pub fn with_subsurface(mut self, config: SubsurfaceConfig) -> Self {
        self.subsurface = Some(config);
        self
    }

    fn transform_bbox(to_world: &Matrix4, local: &BoundingBox) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for dx in [local.ll.x, local.ur.x] {
            for dy in [local.ll.y, local.ur.y] {
                for dz in [local.ll.z, local.ur.z] {
                    bbox.include_point(to_world.transform_point(Point3::new(dx, dy, dz)));
                }
            }
        }
        bbox.ensure_has_volume();
        bbox
    }

    pub fn world_bbox(&self) -> BoundingBox {
        self.world_bbox
    }

    /// Transforms `ray` into local space, tests the geometry, and transforms
    /// the result back to world space (§4.7 steps 1-3).
    pub fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<ObjectHit<'_>> {
        let local_origin = self.to_local.transform_point(ray.origin);
        let local_dir = self.to_local.transform_vector(ray.direction);
        let scale = local_dir.length() / ray.direction.length().max(1e-300);
        let local_ray = Ray::new(local_origin, local_dir);

        if self.geometry.wants_bbox_preflight() {
            let local_bbox = self.geometry.bounding_box();
            if !local_bbox.hit(&local_ray, t_min * scale, t_max * scale) {
                return None;
            }
        }

        let hit = self.geometry.intersect(&local_ray, t_min * scale, t_max * scale)?;
        let world_t = hit.t / scale;
        if world_t < t_min || world_t > t_max {
            return None;
        }

        let mut world_normal = self.to_local_transpose.transform_vector(hit.normal).normalized();
        if let Some(modifier) = &self.modifier {
            world_normal = modifier.modify_normal(ray.at(world_t), world_normal, hit.uv);
        }
        // Advance slightly off the surface along the normal to reduce
        // self-intersection on the next bounce (§4.7 step 3).
        const EPS_ADVANCE: f64 = 1e-8;
        let side = if world_normal.dot(ray.direction) < 0.0 { 1.0 } else { -1.0 };
        let point = ray.at(world_t) + world_normal * (EPS_ADVANCE * side);

        Some(ObjectHit { t: world_t, point, normal: world_normal, uv: hit.uv, object: self })
    }

    pub fn intersect_shadow(&self, ray: &Ray, max_dist: f64) -> bool {
        if !self.casts_shadow {
            return false;
        }
        let local_origin = self.to_local.transform_point(ray.origin);
        let local_dir = self.to_local.transform_vector(ray.direction);
        let scale = local_dir.length() / ray.direction.length().max(1e-300);
        let local_ray = Ray::new(local_origin, local_dir);
        self.geometry.intersect_shadow(&local_ray, max_dist * scale)
    }
}

struct ObjectIndexProcessor<'a> {
    objects: &'a [Object],
}

impl<'a> ElementProcessor<usize> for ObjectIndexProcessor<'a> {
    fn intersect(&self, element: &usize, ray: &Ray, t_min: f64, t_max: f64) -> Option<TreeHit> {
        self.objects[*element].intersect(ray, t_min, t_max).map(|h| TreeHit { t: h.t })
    }

    fn intersect_shadow(&self, element: &usize, ray: &Ray, max_dist: f64) -> bool {
        self.objects[*element].intersect_shadow(ray, max_dist)
    }

    fn box_overlap(&self, element: &usize, bbox: &BoundingBox) -> bool {
        self.objects[*element].world_bbox().overlaps(bbox)
    }

    fn bounding_box(&self, element: &usize) -> BoundingBox {
        self.objects[*element].world_bbox()
    }

    fn plane_side(&self, element: &usize, axis: usize, plane: f64) -> PlaneSide {
        let bbox = self.bounding_box(element);
        if bbox.ur[axis] <= plane {
            PlaneSide::Negative
        } else if bbox.ll[axis] >= plane {
            PlaneSide::Positive
        } else {
            PlaneSide::Straddle
        }
    }
}

/// Above this many registered objects, [`ObjectManager`] builds a spatial
/// index instead of scanning linearly (§4.7).
pub const INDEX_THRESHOLD: usize = 32;

pub struct ObjectManager {
    objects: Vec<Object>,
    index: Mutex<Option<Octree<usize>>>,
}

impl ObjectManager {
    pub fn new(objects: Vec<Object>) -> Self {
        Self { objects, index: Mutex::new(None) }
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    fn ensure_index(&self) {
        if self.objects.len() <= INDEX_THRESHOLD {
            return;
        }
        let mut guard = self.index.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let mut bbox = BoundingBox::empty();
        for o in &self.objects {
            bbox.include_box(&o.world_bbox());
        }
        bbox.ensure_has_volume();
        let elements: Vec<usize> = (0..self.objects.len()).collect();
        let processor = ObjectIndexProcessor { objects: &self.objects };
        *guard = Octree::build(&processor, elements, bbox, TreeBuildLimits::default()).ok();
    }

    pub fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<ObjectHit<'_>> {
        if self.objects.len() > INDEX_THRESHOLD {
            self.ensure_index();
            let guard = self.index.lock().unwrap();
            if let Some(tree) = guard.as_ref() {
                let processor = ObjectIndexProcessor { objects: &self.objects };
                let (_, idx) = tree.intersect(&processor, ray, t_min, t_max)?;
                return self.objects[*idx].intersect(ray, t_min, t_max);
            }
        }
        let mut best: Option<ObjectHit<'_>> = None;
        let mut closest = t_max;
        for object in &self.objects {
            if let Some(hit) = object.intersect(ray, t_min, closest) {
                closest = hit.t;
                best = Some(hit);
            }
        }
        best
    }

    pub fn intersect_shadow(&self, ray: &Ray, max_dist: f64) -> bool {
        if self.objects.len() > INDEX_THRESHOLD {
            self.ensure_index();
            let guard = self.index.lock().unwrap();
            if let Some(tree) = guard.as_ref() {
                let processor = ObjectIndexProcessor { objects: &self.objects };
                return tree.intersect_any(&processor, ray, max_dist);
            }
        }
        self.objects
            .iter()
            .filter(|o| o.casts_shadow)
            .any(|o| o.intersect_shadow(ray, max_dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryHit;
    use crate::shading::bsdf::Lambertian;
    use crate::math::Color;

    struct UnitSphere;
    impl Geometry for UnitSphere {
        fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<GeometryHit> {
            crate::intersect::sphere::intersect(ray, Point3::zero(), 1.0, t_min, t_max).map(|h| GeometryHit {
                t: h.near,
                point: h.point,
                normal: h.normal,
                uv: h.uv,
            })
        }
        fn bounding_box(&self) -> BoundingBox {
            BoundingBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
        }
    }

    #[test]
    fn ray_hits_translated_sphere_in_world_space() {
        let geometry: Arc<dyn Geometry> = Arc::new(UnitSphere);
        let material: Arc<dyn Bsdf> = Arc::new(Lambertian::new(Color::new(0.8, 0.8, 0.8)));
        let to_world = Matrix4::translation(Vec3::new(5.0, 0.0, 0.0));
        let object = Object::new(geometry, to_world, material);

        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::unit_x());
        let hit = object.intersect(&ray, 1e-6, f64::INFINITY).expect("should hit");
        assert!((hit.t - 4.0).abs() < 1e-6);
    }

    #[test]
    fn linear_manager_finds_nearest_of_several_objects() {
        let material: Arc<dyn Bsdf> = Arc::new(Lambertian::new(Color::ones()));
        let near = Object::new(Arc::new(UnitSphere), Matrix4::translation(Vec3::new(3.0, 0.0, 0.0)), material.clone());
        let far = Object::new(Arc::new(UnitSphere), Matrix4::translation(Vec3::new(8.0, 0.0, 0.0)), material);
        let manager = ObjectManager::new(vec![far, near]);

        let ray = Ray::new(Point3::zero(), Vec3::unit_x());
        let hit = manager.intersect(&ray, 1e-6, f64::INFINITY).expect("should hit");
        assert!((hit.t - 2.0).abs() < 1e-6);
    }
}
