//! Ray/cylinder intersection (§4.1): a finite, axis-aligned (local Y) right
//! circular cylinder. The infinite-cylinder quadratic is solved first, then
//! each root is clipped against the `[y_min, y_max]` extent; if the nearer
//! root falls outside the extent the corresponding end cap is tried instead.

use crate::intersect::{RayHit, EPS_MATH};
use crate::math::{Point3, Ray, Vec3};

pub struct Cylinder {
    pub radius: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Intersects `ray` (already in the cylinder's local frame, axis along Y)
/// against a finite cylinder of the given radius and y-extent.
pub fn intersect(ray: &Ray, cyl: &Cylinder, t_min: f64, t_max: f64) -> Option<RayHit> {
    let a = ray.direction.x * ray.direction.x + ray.direction.z * ray.direction.z;
    let half_b = ray.origin.x * ray.direction.x + ray.origin.z * ray.direction.z;
    let c = ray.origin.x * ray.origin.x + ray.origin.z * ray.origin.z - cyl.radius * cyl.radius;

    let mut candidates: Vec<(f64, bool)> = Vec::new(); // (t, is_cap)

    if a.abs() > EPS_MATH {
        let disc = half_b * half_b - a * c;
        if disc >= 0.0 {
            let sqrtd = disc.sqrt();
            let t0 = (-half_b - sqrtd) / a;
            let t1 = (-half_b + sqrtd) / a;
            for t in [t0, t1] {
                let y = ray.origin.y + t * ray.direction.y;
                if y >= cyl.y_min && y <= cyl.y_max {
                    candidates.push((t, false));
                }
            }
        }
    }

    if ray.direction.y.abs() > EPS_MATH {
        for cap_y in [cyl.y_min, cyl.y_max] {
            let t = (cap_y - ray.origin.y) / ray.direction.y;
            let x = ray.origin.x + t * ray.direction.x;
            let z = ray.origin.z + t * ray.direction.z;
            if x * x + z * z <= cyl.radius * cyl.radius {
                candidates.push((t, true));
            }
        }
    }

    candidates.retain(|&(t, _)| t >= t_min && t <= t_max);
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let (near, near_is_cap) = candidates[0];
    let (far, far_is_cap) = *candidates.last().unwrap();

    let point = ray.at(near);
    let normal = if near_is_cap {
        Vec3::new(0.0, point.y.signum(), 0.0)
    } else {
        Vec3::new(point.x, 0.0, point.z).normalized()
    };
    let exit_point = ray.at(far);
    let exit_normal = if far_is_cap {
        Vec3::new(0.0, exit_point.y.signum(), 0.0)
    } else {
        Vec3::new(exit_point.x, 0.0, exit_point.z).normalized()
    };

    let theta = point.z.atan2(point.x);
    let u = (theta + std::f64::consts::PI) / (2.0 * std::f64::consts::PI);
    let v = (point.y - cyl.y_min) / (cyl.y_max - cyl.y_min).max(EPS_MATH);

    Some(RayHit::new(near, far, point, normal, (u, v)).with_exit(exit_point, exit_normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_side_of_finite_cylinder() {
        let cyl = Cylinder { radius: 1.0, y_min: -1.0, y_max: 1.0 };
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::unit_x());
        let hit = intersect(&ray, &cyl, 1e-8, f64::INFINITY).expect("should hit");
        assert!((hit.near - 4.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn hits_end_cap_when_ray_passes_over_the_top() {
        let cyl = Cylinder { radius: 1.0, y_min: -1.0, y_max: 1.0 };
        let ray = Ray::new(Point3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        let hit = intersect(&ray, &cyl, 1e-8, f64::INFINITY).expect("should hit cap");
        assert!((hit.near - 4.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn misses_when_radius_too_small() {
        let cyl = Cylinder { radius: 0.5, y_min: -1.0, y_max: 1.0 };
        let ray = Ray::new(Point3::new(-5.0, 0.0, 2.0), Vec3::unit_x());
        assert!(intersect(&ray, &cyl, 1e-8, f64::INFINITY).is_none());
    }
}
