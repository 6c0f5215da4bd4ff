//! Ray/sphere and ray/ellipsoid intersection (§4.1). The sphere case solves
//! a quadratic in the ray parameter directly; the ellipsoid case goes
//! through the general 4x4 quadric matrix form.

use crate::intersect::RayHit;
use crate::math::{Matrix4, Point3, Ray, Vec3};

/// Ray vs. sphere. Both positive roots of the quadratic become the near and
/// far range of the hit record (§8 scenario S3).
pub fn intersect(ray: &Ray, center: Point3, radius: f64, t_min: f64, t_max: f64) -> Option<RayHit> {
    let oc = ray.origin - center;
    let a = ray.direction.length_squared();
    let half_b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let disc = half_b * half_b - a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrtd = disc.sqrt();
    let mut near = (-half_b - sqrtd) / a;
    let mut far = (-half_b + sqrtd) / a;
    if near > far {
        std::mem::swap(&mut near, &mut far);
    }
    if far < t_min || near > t_max {
        return None;
    }

    let hit_t = if near >= t_min { near } else { far };
    if hit_t < t_min || hit_t > t_max {
        return None;
    }

    let point = ray.at(hit_t);
    let normal = (point - center) / radius;
    let exit_point = ray.at(far);
    let exit_normal = (exit_point - center) / radius;

    let theta = (normal.y).acos();
    let phi = normal.z.atan2(normal.x);
    let uv = (
        (phi + std::f64::consts::PI) / (2.0 * std::f64::consts::PI),
        theta / std::f64::consts::PI,
    );

    Some(RayHit::new(near, far, point, normal, uv).with_exit(exit_point, exit_normal))
}

/// Ray vs. ellipsoid via the 4x4 quadric matrix form: a point `p` lies on
/// the surface when `p^T Q p = 0` in homogeneous coordinates, where `Q`
/// encodes the axis-aligned ellipsoid `(x/a)^2 + (y/b)^2 + (z/c)^2 = 1`
/// transformed by `to_world`.
pub fn intersect_ellipsoid(
    ray: &Ray,
    to_world: &Matrix4,
    radii: Vec3,
    t_min: f64,
    t_max: f64,
) -> Option<RayHit> {
    let inv = to_world.inverse()?;
    let local_origin = inv.transform_point(ray.origin);
    let local_dir = inv.transform_vector(ray.direction);

    let inv_a2 = 1.0 / (radii.x * radii.x);
    let inv_b2 = 1.0 / (radii.y * radii.y);
    let inv_c2 = 1.0 / (radii.z * radii.z);

    let a = local_dir.x * local_dir.x * inv_a2
        + local_dir.y * local_dir.y * inv_b2
        + local_dir.z * local_dir.z * inv_c2;
    let half_b = local_origin.x * local_dir.x * inv_a2
        + local_origin.y * local_dir.y * inv_b2
        + local_origin.z * local_dir.z * inv_c2;
    let c = local_origin.x * local_origin.x * inv_a2
        + local_origin.y * local_origin.y * inv_b2
        + local_origin.z * local_origin.z * inv_c2
        - 1.0;

    let disc = half_b * half_b - a * c;
    if disc < 0.0 || a.abs() < 1e-19 {
        return None;
    }
    let sqrtd = disc.sqrt();
    let mut near = (-half_b - sqrtd) / a;
    let mut far = (-half_b + sqrtd) / a;
    if near > far {
        std::mem::swap(&mut near, &mut far);
    }
    if far < t_min || near > t_max {
        return None;
    }
    let hit_t = if near >= t_min { near } else { far };
    if hit_t < t_min || hit_t > t_max {
        return None;
    }

    let point = ray.at(hit_t);
    let local_point = inv.transform_point(point);
    let local_normal = Vec3::new(
        local_point.x * inv_a2,
        local_point.y * inv_b2,
        local_point.z * inv_c2,
    );
    let normal = to_world.transpose().inverse()?.transform_vector(local_normal).normalized();
    let uv = (0.0, 0.0);

    Some(RayHit::new(near, far, point, normal, uv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s3_unit_sphere_from_behind() {
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = intersect(&ray, Point3::zero(), 1.0, 1e-8, f64::INFINITY).expect("should hit");
        assert!((hit.near - 4.0).abs() < 1e-9);
        assert!((hit.far - 6.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-9);
    }

    #[test]
    fn ellipsoid_reduces_to_sphere_when_radii_equal() {
        let to_world = Matrix4::identity();
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = intersect_ellipsoid(&ray, &to_world, Vec3::new(1.0, 1.0, 1.0), 1e-8, f64::INFINITY)
            .expect("should hit");
        assert!((hit.near - 4.0).abs() < 1e-6);
    }
}
