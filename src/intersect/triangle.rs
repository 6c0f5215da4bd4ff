//! Ray/triangle intersection via Cramer's rule on the 3x3 system
//! `[ray.dir, edge1, edge2]` (§4.1), solving for `(t, alpha, beta)`.

use crate::intersect::EPS_MATH;
use crate::math::{Point3, Ray, Vec3};

/// Result of a bare geometric triangle test: the ray parameter plus the two
/// barycentric weights, leaving normal/UV interpolation to the caller (the
/// mesh holds per-vertex normals/UVs that this kernel has no knowledge of).
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub t: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// Intersects a ray against the triangle `(v0, v1, v2)`. Returns `None` on
/// a near-singular determinant or barycentric coordinates outside the
/// (epsilon-widened) unit triangle.
pub fn intersect(ray: &Ray, v0: Point3, v1: Point3, v2: Point3) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    // Cramer's rule: solve [-dir, edge1, edge2] * (t, alpha, beta)^T = v0 - origin
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < EPS_MATH {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray.origin - v0;
    let alpha = tvec.dot(pvec) * inv_det;
    const EPS: f64 = 1e-8;
    if alpha < -EPS || alpha > 1.0 + EPS {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let beta = ray.direction.dot(qvec) * inv_det;
    if beta < -EPS || alpha + beta > 1.0 + EPS {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    Some(TriangleHit { t, alpha, beta })
}

/// Interpolates a per-vertex quantity (normal, UV-as-vec) at `(alpha, beta)`
/// using the same barycentric weighting as the position test:
/// weights `(1 - alpha - beta, alpha, beta)` on `(v0, v1, v2)`.
pub fn interpolate(v0: Vec3, v1: Vec3, v2: Vec3, alpha: f64, beta: f64) -> Vec3 {
    v0 * (1.0 - alpha - beta) + v1 * alpha + v2 * beta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_triangle_head_on() {
        let v0 = Point3::new(-1.0, -1.0, 0.0);
        let v1 = Point3::new(1.0, -1.0, 0.0);
        let v2 = Point3::new(0.0, 1.0, 0.0);
        let ray = Ray::new(Point3::new(0.0, -0.2, -5.0), Vec3::unit_z());
        let hit = intersect(&ray, v0, v1, v2).expect("should hit");
        assert!((hit.t - 5.0).abs() < 1e-9);
    }

    #[test]
    fn misses_outside_triangle() {
        let v0 = Point3::new(-1.0, -1.0, 0.0);
        let v1 = Point3::new(1.0, -1.0, 0.0);
        let v2 = Point3::new(0.0, 1.0, 0.0);
        let ray = Ray::new(Point3::new(5.0, 5.0, -5.0), Vec3::unit_z());
        assert!(intersect(&ray, v0, v1, v2).is_none());
    }

    #[test]
    fn rejects_edge_on_rays_via_singular_determinant() {
        let v0 = Point3::new(-1.0, 0.0, 0.0);
        let v1 = Point3::new(1.0, 0.0, 0.0);
        let v2 = Point3::new(0.0, 1.0, 0.0);
        // Ray direction lies in the triangle's own plane -> zero determinant.
        let ray = Ray::new(Point3::new(0.0, -5.0, 0.0), Vec3::unit_y());
        assert!(intersect(&ray, v0, v1, v2).is_none());
    }
}
