//! Ray/plane intersection (§4.1): the linear equation `dot(p - origin, n) = 0`
//! solved for the ray parameter. Rejected when the ray runs (near-)parallel
//! to the plane, i.e. `|dot(direction, n)| < EPS_MATH`.

use crate::intersect::{RayHit, EPS_MATH};
use crate::math::{Plane, Ray};

pub fn intersect(ray: &Ray, plane: &Plane, t_min: f64, t_max: f64) -> Option<RayHit> {
    let denom = ray.direction.dot(plane.normal);
    if denom.abs() < EPS_MATH {
        return None;
    }
    let t = (plane.origin - ray.origin).dot(plane.normal) / denom;
    if t < t_min || t > t_max {
        return None;
    }
    let point = ray.at(t);
    let normal = if denom > 0.0 { -plane.normal } else { plane.normal };
    Some(RayHit::new(t, t, point, normal, (0.0, 0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vec3};

    #[test]
    fn hits_plane_head_on() {
        let plane = Plane { origin: Point3::zero(), normal: Vec3::unit_y() };
        let ray = Ray::new(Point3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        let hit = intersect(&ray, &plane, 1e-8, f64::INFINITY).expect("should hit");
        assert!((hit.near - 5.0).abs() < 1e-9);
    }

    #[test]
    fn misses_when_parallel() {
        let plane = Plane { origin: Point3::zero(), normal: Vec3::unit_y() };
        let ray = Ray::new(Point3::new(0.0, 5.0, 0.0), Vec3::unit_x());
        assert!(intersect(&ray, &plane, 1e-8, f64::INFINITY).is_none());
    }

    #[test]
    fn normal_faces_against_the_incoming_ray() {
        let plane = Plane { origin: Point3::zero(), normal: Vec3::unit_y() };
        let ray = Ray::new(Point3::new(0.0, -5.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let hit = intersect(&ray, &plane, 1e-8, f64::INFINITY).expect("should hit");
        assert!(hit.normal.dot(ray.direction) < 0.0);
    }
}
