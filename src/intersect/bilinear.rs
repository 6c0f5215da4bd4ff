//! Ray/bilinear-patch intersection (§4.1), after the Ramsey/Kensler/Shirley
//! form: eliminate `t` by crossing the implicit surface equation with the
//! ray direction, reduce the resulting vector equation to a quadratic in
//! `v`, recover `u` from whichever of the two equivalent linear formulas is
//! better conditioned (larger-magnitude denominator), then recover `t` from
//! the ray axis with the largest-magnitude direction component.

use crate::intersect::{RayHit, EPS_MATH};
use crate::math::{Point3, Ray, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct BilinearPatch {
    pub p00: Point3,
    pub p10: Point3,
    pub p01: Point3,
    pub p11: Point3,
}

impl BilinearPatch {
    fn eval(&self, u: f64, v: f64) -> Point3 {
        self.p00 * ((1.0 - u) * (1.0 - v))
            + self.p10 * (u * (1.0 - v))
            + self.p01 * ((1.0 - u) * v)
            + self.p11 * (u * v)
    }

    fn partials(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let dpdu = (self.p10 - self.p00) * (1.0 - v) + (self.p11 - self.p01) * v;
        let dpdv = (self.p01 - self.p00) * (1.0 - u) + (self.p11 - self.p10) * u;
        (dpdu, dpdv)
    }
}

fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < EPS_MATH {
        if b.abs() < EPS_MATH {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sqrtd = disc.sqrt();
    vec![(-b - sqrtd) / (2.0 * a), (-b + sqrtd) / (2.0 * a)]
}

pub fn intersect(ray: &Ray, patch: &BilinearPatch, t_min: f64, t_max: f64) -> Option<RayHit> {
    let a = patch.p00 - ray.origin;
    let b = patch.p10 - patch.p00;
    let c = patch.p01 - patch.p00;
    let d = patch.p11 - patch.p10 - patch.p01 + patch.p00;

    let a1 = a.cross(ray.direction);
    let b1 = b.cross(ray.direction);
    let c1 = c.cross(ray.direction);
    let d1 = d.cross(ray.direction);

    // Eliminate u between the x and y component equations to get a
    // quadratic in v: qa*v^2 + qb*v + qc = 0.
    let qa = c1.y * d1.x - c1.x * d1.y;
    let qb = a1.y * d1.x - a1.x * d1.y + c1.y * b1.x - c1.x * b1.y;
    let qc = a1.y * b1.x - a1.x * b1.y;

    let mut best: Option<RayHit> = None;
    let mut best_t = t_max;

    for v in solve_quadratic(qa, qb, qc) {
        if !(-EPS_MATH..=1.0 + 1e-6).contains(&v) {
            continue;
        }
        let v = v.clamp(0.0, 1.0);

        let denom_x = b1.x + v * d1.x;
        let denom_y = b1.y + v * d1.y;
        let u = if denom_x.abs() >= denom_y.abs() {
            if denom_x.abs() < EPS_MATH {
                continue;
            }
            (-a1.x - v * c1.x) / denom_x
        } else {
            if denom_y.abs() < EPS_MATH {
                continue;
            }
            (-a1.y - v * c1.y) / denom_y
        };
        if !(-1e-6..=1.0 + 1e-6).contains(&u) {
            continue;
        }
        let u = u.clamp(0.0, 1.0);

        let surface = a + b * u + c * v + d * (u * v);
        let axis = if ray.direction.x.abs() >= ray.direction.y.abs()
            && ray.direction.x.abs() >= ray.direction.z.abs()
        {
            0
        } else if ray.direction.y.abs() >= ray.direction.z.abs() {
            1
        } else {
            2
        };
        if ray.direction[axis].abs() < EPS_MATH {
            continue;
        }
        let t = surface[axis] / ray.direction[axis];
        if t < t_min || t > best_t {
            continue;
        }

        let point = ray.at(t);
        let (dpdu, dpdv) = patch.partials(u, v);
        let mut normal = dpdu.cross(dpdv);
        if normal.length_squared() < EPS_MATH {
            continue;
        }
        normal = normal.normalized();

        best_t = t;
        best = Some(RayHit::new(t, t, point, normal, (u, v)));
    }

    best
}
