//! Ray/torus intersection (§4.1): the implicit surface
//! `(x^2+y^2+z^2 + R^2 - r^2)^2 = 4R^2(x^2+y^2)` (torus axis along local Y,
//! major radius `R`, minor (tube) radius `r`) reduces, after substituting
//! the ray parametrization, to a quartic in `t`. The smallest positive real
//! root within `[t_min, t_max]` is the hit.

use crate::intersect::{RayHit, EPS_MATH};
use crate::math::{Point3, Ray, Vec3};

pub struct Torus {
    pub major_radius: f64,
    pub minor_radius: f64,
}

/// Solves a quartic `x^4 + b x^3 + c x^2 + d x + e = 0` via Ferrari's method,
/// returning all real roots (unsorted, may contain duplicates).
fn solve_quartic(b: f64, c: f64, d: f64, e: f64) -> Vec<f64> {
    // Depress: x = y - b/4
    let b2 = b * b;
    let p = c - 3.0 * b2 / 8.0;
    let q = d - b * c / 2.0 + b2 * b / 8.0;
    let r = e - b * d / 4.0 + b2 * c / 16.0 - 3.0 * b2 * b2 / 256.0;

    let shift = -b / 4.0;

    if q.abs() < EPS_MATH {
        // Biquadratic: y^4 + p y^2 + r = 0
        let roots2 = solve_quadratic(1.0, p, r);
        let mut out = Vec::new();
        for y2 in roots2 {
            if y2 >= 0.0 {
                let y = y2.sqrt();
                out.push(y + shift);
                out.push(-y + shift);
            }
        }
        return out;
    }

    // Resolvent cubic: m^3 + 2p m^2 + (p^2-4r) m - q^2 = 0
    let cubic_roots = solve_cubic(2.0 * p, p * p - 4.0 * r, -q * q);
    let m = cubic_roots
        .into_iter()
        .filter(|&m| m > EPS_MATH)
        .fold(None, |acc: Option<f64>, m| match acc {
            None => Some(m),
            Some(a) => Some(a.max(m)),
        });
    let Some(m) = m else { return Vec::new() };

    let sqrt_m = m.sqrt();
    let mut out = Vec::new();
    for sign_outer in [1.0, -1.0] {
        let term = -(m + p) + sign_outer * (2.0 * q) / sqrt_m;
        if term >= 0.0 {
            let half = term.sqrt() * 0.5;
            let center = sign_outer * sqrt_m * 0.5;
            out.push(center + half + shift);
            out.push(center - half + shift);
        }
    }
    out
}

fn solve_cubic(a: f64, b: f64, c: f64) -> Vec<f64> {
    // x^3 + a x^2 + b x + c = 0, via Cardano with trig form for 3 real roots.
    let p = b - a * a / 3.0;
    let q = 2.0 * a * a * a / 27.0 - a * b / 3.0 + c;
    let shift = -a / 3.0;
    let disc = (q * q) / 4.0 + (p * p * p) / 27.0;

    if disc > EPS_MATH {
        let sqrt_disc = disc.sqrt();
        let u = (-q / 2.0 + sqrt_disc).cbrt();
        let v = (-q / 2.0 - sqrt_disc).cbrt();
        vec![u + v + shift]
    } else if disc.abs() <= EPS_MATH {
        let u = (-q / 2.0).cbrt();
        vec![2.0 * u + shift, -u + shift]
    } else {
        let r = (-(p * p * p) / 27.0).sqrt();
        let phi = (-q / (2.0 * r)).clamp(-1.0, 1.0).acos();
        let m = 2.0 * r.cbrt();
        (0..3)
            .map(|k| m * ((phi + 2.0 * std::f64::consts::PI * k as f64) / 3.0).cos() + shift)
            .collect()
    }
}

fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sqrtd = disc.sqrt();
    vec![(-b - sqrtd) / (2.0 * a), (-b + sqrtd) / (2.0 * a)]
}

pub fn intersect(ray: &Ray, torus: &Torus, t_min: f64, t_max: f64) -> Option<RayHit> {
    let o = ray.origin;
    let d = ray.direction;
    let rr = torus.major_radius * torus.major_radius;
    let r2 = torus.minor_radius * torus.minor_radius;

    let d2 = d.length_squared();
    let od = o.dot(d);
    let o2 = o.length_squared();
    let alpha = o2 - r2 - rr;

    // Coefficients of the monic quartic t^4 + b t^3 + c t^2 + d t + e.
    let four_rr = 4.0 * rr;
    let a4 = d2 * d2;
    let a3 = 4.0 * d2 * od;
    let a2 = 2.0 * d2 * alpha + 4.0 * od * od + four_rr * d.y * d.y;
    let a1 = 4.0 * od * alpha + 2.0 * four_rr * o.y * d.y;
    let e = alpha * alpha - four_rr * (r2 - o.y * o.y);

    if a4.abs() < EPS_MATH {
        return None;
    }
    let roots = solve_quartic(a3 / a4, a2 / a4, a1 / a4, e / a4);
    let mut valid: Vec<f64> = roots.into_iter().filter(|t| *t >= t_min && *t <= t_max).collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let near = valid[0];
    let far = *valid.last().unwrap();

    let point = ray.at(near);
    let normal = torus_normal(point, torus);
    let exit_point = ray.at(far);
    let exit_normal = torus_normal(exit_point, torus);

    let theta = point.z.atan2(point.x);
    let u = (theta + std::f64::consts::PI) / (2.0 * std::f64::consts::PI);
    let tube_x = (point.x * point.x + point.z * point.z).sqrt() - torus.major_radius;
    let phi = point.y.atan2(tube_x);
    let v = (phi + std::f64::consts::PI) / (2.0 * std::f64::consts::PI);

    Some(RayHit::new(near, far, point, normal, (u, v)).with_exit(exit_point, exit_normal))
}

fn torus_normal(p: Point3, torus: &Torus) -> Vec3 {
    let l = (p.x * p.x + p.z * p.z).sqrt();
    if l < EPS_MATH {
        return Vec3::unit_y();
    }
    let k = 1.0 - torus.major_radius / l;
    Vec3::new(p.x * k, p.y, p.z * k).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_torus_through_the_tube() {
        let torus = Torus { major_radius: 2.0, minor_radius: 0.5 };
        let ray = Ray::new(Point3::new(2.0, 0.0, -5.0), Vec3::unit_z());
        let hit = intersect(&ray, &torus, 1e-6, f64::INFINITY);
        assert!(hit.is_some(), "ray through the tube center should hit the torus");
    }

    #[test]
    fn misses_torus_through_the_hole() {
        let torus = Torus { major_radius: 2.0, minor_radius: 0.5 };
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::unit_z());
        assert!(intersect(&ray, &torus, 1e-6, f64::INFINITY).is_none());
    }
}
