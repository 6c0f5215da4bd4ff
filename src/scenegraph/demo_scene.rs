//! A small procedural scene used only by `drise-worker` to exercise C1-C9
//! end to end. Scene loading from a file is explicitly out of scope (§1);
//! this stands in for it with a fixed, deterministic layout.

use crate::camera::{Camera, CameraConfig};
use crate::geometry::trimesh::{TriIndex, TriMeshBuilder};
use crate::geometry::Geometry;
use crate::math::{BoundingBox, Color, Matrix4, Point3, Ray, Vec3};
use crate::scenegraph::object_manager::{Object, ObjectManager, SubsurfaceConfig};
use crate::shading::bsdf::{Bsdf, Dielectric, Emissive, Lambertian, Metal};
use crate::shading::ops::PointLight;
use std::sync::Arc;

struct Sphere {
    radius: f64,
}

impl Geometry for Sphere {
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<crate::geometry::GeometryHit> {
        crate::intersect::sphere::intersect(ray, Point3::zero(), self.radius, t_min, t_max).map(|h| {
            crate::geometry::GeometryHit { t: h.near, point: h.point, normal: h.normal, uv: h.uv }
        })
    }

    fn bounding_box(&self) -> BoundingBox {
        let r = self.radius;
        BoundingBox::new(Point3::new(-r, -r, -r), Point3::new(r, r, r))
    }
}

fn ground_plane(half_extent: f64) -> Arc<dyn Geometry> {
    let positions = vec![
        Point3::new(-half_extent, 0.0, -half_extent),
        Point3::new(half_extent, 0.0, -half_extent),
        Point3::new(half_extent, 0.0, half_extent),
        Point3::new(-half_extent, 0.0, half_extent),
    ];
    let indices = vec![TriIndex { v: [0, 1, 2] }, TriIndex { v: [0, 2, 3] }];
    Arc::new(
        TriMeshBuilder::new(positions, indices)
            .compute_vertex_normals()
            .build(),
    )
}

/// Builds the demo scene's object registry: a checkerboard-ish ground plane,
/// three spheres (diffuse, metal, glass) in the classic layout used by many
/// ray tracer teaching examples, and a small emissive sphere standing in for
/// an area light, adapted here to exercise every BSDF kind, both mesh and
/// analytic-sphere geometry, and subsurface scattering on the diffuse
/// sphere.
pub fn build_objects() -> ObjectManager {
    let ground: Arc<dyn Geometry> = ground_plane(40.0);
    let ground_material: Arc<dyn Bsdf> = Arc::new(Lambertian::new(Color::new(0.5, 0.5, 0.5)));
    let ground_obj = Object::new(ground, Matrix4::identity(), ground_material);

    let sphere_geom: Arc<dyn Geometry> = Arc::new(Sphere { radius: 1.0 });

    let diffuse: Arc<dyn Bsdf> = Arc::new(Lambertian::new(Color::new(0.8, 0.3, 0.3)));
    let diffuse_obj = Object::new(
        sphere_geom.clone(),
        Matrix4::translation(Vec3::new(-2.2, 1.0, 0.0)),
        diffuse,
    )
    .with_subsurface(SubsurfaceConfig {
        sample_count: 24,
        sample_radius: 0.6,
        irradiance_scale: 1.0,
        sigma_tr: 2.0,
    });

    let metal: Arc<dyn Bsdf> = Arc::new(Metal::new(Color::new(0.8, 0.8, 0.9), 0.05));
    let metal_obj = Object::new(sphere_geom.clone(), Matrix4::translation(Vec3::new(0.0, 1.0, 0.0)), metal);

    let glass: Arc<dyn Bsdf> = Arc::new(Dielectric::new(1.5));
    let glass_obj = Object::new(sphere_geom.clone(), Matrix4::translation(Vec3::new(2.2, 1.0, 0.0)), glass);

    let light_geom: Arc<dyn Geometry> = Arc::new(Sphere { radius: 0.4 });
    let light_material: Arc<dyn Bsdf> = Arc::new(Emissive::new(Color::new(1.0, 0.95, 0.85), 12.0));
    let light_obj = Object::new(light_geom, Matrix4::translation(Vec3::new(-1.0, 4.5, 1.5)), light_material);

    ObjectManager::new(vec![ground_obj, diffuse_obj, metal_obj, glass_obj, light_obj])
}

/// A single point light above the scene, summed by `direct_lighting`
/// alongside the emissive sphere `build_objects` places (§4.8).
pub fn build_point_lights() -> Vec<PointLight> {
    vec![PointLight { position: Point3::new(3.0, 6.0, 4.0), intensity: Color::new(18.0, 18.0, 16.0) }]
}

pub fn build_camera(aspect_ratio: f64) -> Camera {
    Camera::new(&CameraConfig {
        look_from: Point3::new(0.0, 2.0, 8.0),
        look_at: Point3::new(0.0, 1.0, 0.0),
        vup: Vec3::unit_y(),
        vfov_degrees: 35.0,
        aspect_ratio,
        aperture: 0.0,
        focus_dist: 8.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_ray_toward_scene_center_hits_an_object() {
        use rand::SeedableRng;
        let objects = build_objects();
        let camera = build_camera(1.0);
        let mut rng = rand::rngs::SmallRng::from_seed([0u8; 32]);
        let ray = camera.get_ray(0.5, 0.35, &mut rng);
        assert!(objects.intersect(&ray, 1e-6, f64::INFINITY).is_some());
    }
}
