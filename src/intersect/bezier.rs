//! Ray/bicubic-Bézier-patch intersection (§4.1). The closed-form pathway
//! here solves for a hit directly by Newton iteration on the patch's `(u,v)`
//! parametrization, seeded from a coarse recursive bounding-box subdivision;
//! this is the fallback used only when a caller bypasses tessellation. The
//! primary path (§4.6) converts the patch to an indexed triangle mesh via
//! [`crate::geometry::bezier`] and intersects that through the ordinary
//! triangle kernel, so this module sees little traffic in practice.

use crate::intersect::{RayHit, EPS_MATH};
use crate::math::{BoundingBox, Point3, Ray, Vec3};

/// A 4x4 grid of control points defining one bicubic Bézier patch.
#[derive(Debug, Clone, Copy)]
pub struct BicubicPatch {
    pub control: [[Point3; 4]; 4],
}

fn bernstein3(t: f64) -> [f64; 4] {
    let mt = 1.0 - t;
    [mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t]
}

fn bernstein3_deriv(t: f64) -> [f64; 4] {
    let mt = 1.0 - t;
    [
        -3.0 * mt * mt,
        3.0 * mt * mt - 6.0 * mt * t,
        6.0 * mt * t - 3.0 * t * t,
        3.0 * t * t,
    ]
}

impl BicubicPatch {
    pub fn eval(&self, u: f64, v: f64) -> Point3 {
        let bu = bernstein3(u);
        let bv = bernstein3(v);
        let mut p = Vec3::zero();
        for i in 0..4 {
            for j in 0..4 {
                p += self.control[i][j] * (bu[i] * bv[j]);
            }
        }
        p
    }

    fn partials(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let bu = bernstein3(u);
        let bv = bernstein3(v);
        let dbu = bernstein3_deriv(u);
        let dbv = bernstein3_deriv(v);
        let mut dpdu = Vec3::zero();
        let mut dpdv = Vec3::zero();
        for i in 0..4 {
            for j in 0..4 {
                dpdu += self.control[i][j] * (dbu[i] * bv[j]);
                dpdv += self.control[i][j] * (bu[i] * dbv[j]);
            }
        }
        (dpdu, dpdv)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for row in &self.control {
            for p in row {
                bbox.include_point(*p);
            }
        }
        bbox.ensure_has_volume();
        bbox
    }

    fn sub_patch(&self, u0: f64, u1: f64, v0: f64, v1: f64) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for iu in 0..4 {
            let u = u0 + (u1 - u0) * (iu as f64 / 3.0);
            for iv in 0..4 {
                let v = v0 + (v1 - v0) * (iv as f64 / 3.0);
                bbox.include_point(self.eval(u, v));
            }
        }
        bbox.ensure_has_volume();
        bbox
    }
}

const NEWTON_ITERATIONS: usize = 12;
const GRID_SUBDIVISIONS: usize = 6;

/// Finds a ray/patch hit by seeding a Newton solve at the `(u,v)` cell of a
/// coarse grid whose bounding box the ray crosses, refining each candidate
/// to convergence, and keeping the closest valid root.
pub fn intersect(ray: &Ray, patch: &BicubicPatch, t_min: f64, t_max: f64) -> Option<RayHit> {
    if !patch.bounding_box().hit(ray, t_min, t_max) {
        return None;
    }

    let mut best: Option<(f64, f64, f64)> = None; // (t, u, v)
    let step = 1.0 / GRID_SUBDIVISIONS as f64;

    for iu in 0..GRID_SUBDIVISIONS {
        let u0 = iu as f64 * step;
        for iv in 0..GRID_SUBDIVISIONS {
            let v0 = iv as f64 * step;
            let cell = patch.sub_patch(u0, u0 + step, v0, v0 + step);
            if !cell.hit(ray, t_min, best.map_or(t_max, |(t, _, _)| t)) {
                continue;
            }
            if let Some((t, u, v)) = newton_refine(ray, patch, u0 + step * 0.5, v0 + step * 0.5, t_min, t_max)
            {
                if best.map_or(true, |(bt, _, _)| t < bt) {
                    best = Some((t, u, v));
                }
            }
        }
    }

    let (t, u, v) = best?;
    let point = ray.at(t);
    let (dpdu, dpdv) = patch.partials(u, v);
    let mut normal = dpdu.cross(dpdv);
    if normal.length_squared() < EPS_MATH {
        return None;
    }
    normal = normal.normalized();
    Some(RayHit::new(t, t, point, normal, (u, v)))
}

fn newton_refine(
    ray: &Ray,
    patch: &BicubicPatch,
    mut u: f64,
    mut v: f64,
    t_min: f64,
    t_max: f64,
) -> Option<(f64, f64, f64)> {
    for _ in 0..NEWTON_ITERATIONS {
        let p = patch.eval(u, v);
        let (dpdu, dpdv) = patch.partials(u, v);

        // Project the surface point onto the plane perpendicular to the ray
        // through its origin, then solve the 2x2 linear system that zeroes
        // the perpendicular component's du/dv correction.
        let to_p = p - ray.origin;
        let t = to_p.dot(ray.direction);
        let perp = to_p - ray.direction * t;

        let a = dpdu - ray.direction * dpdu.dot(ray.direction);
        let b = dpdv - ray.direction * dpdv.dot(ray.direction);

        // Solve [a b][du dv]^T = -perp in least-squares sense via normal equations.
        let aa = a.dot(a);
        let ab = a.dot(b);
        let bb = b.dot(b);
        let pa = perp.dot(a);
        let pb = perp.dot(b);
        let det = aa * bb - ab * ab;
        if det.abs() < EPS_MATH {
            break;
        }
        let du = -(pa * bb - pb * ab) / det;
        let dv = -(pb * aa - pa * ab) / det;

        u = (u + du).clamp(0.0, 1.0);
        v = (v + dv).clamp(0.0, 1.0);

        if du.abs() < 1e-10 && dv.abs() < 1e-10 {
            if t < t_min || t > t_max {
                return None;
            }
            return Some((t, u, v));
        }
    }

    let p = patch.eval(u, v);
    let t = (p - ray.origin).dot(ray.direction);
    let residual = (p - ray.at(t)).length();
    if residual < 1e-4 && t >= t_min && t <= t_max {
        Some((t, u, v))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_patch(z: f64) -> BicubicPatch {
        let mut control = [[Point3::zero(); 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                let x = -1.5 + i as f64 * 1.0;
                let y = -1.5 + j as f64 * 1.0;
                control[i][j] = Point3::new(x, y, z);
            }
        }
        BicubicPatch { control }
    }

    #[test]
    fn hits_flat_patch_head_on() {
        let patch = flat_patch(0.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::unit_z());
        let hit = intersect(&ray, &patch, 1e-6, f64::INFINITY).expect("should hit");
        assert!((hit.near - 5.0).abs() < 1e-3);
    }

    #[test]
    fn misses_patch_off_to_the_side() {
        let patch = flat_patch(0.0);
        let ray = Ray::new(Point3::new(10.0, 10.0, -5.0), Vec3::unit_z());
        assert!(intersect(&ray, &patch, 1e-6, f64::INFINITY).is_none());
    }
}
