//! Closed-form ray/primitive intersection kernels (C1). Each kernel consumes
//! a ray and primitive parameters and writes a hit record; math degeneracies
//! (singular determinants, negative discriminants, flat denominators) are
//! reported as "no hit" rather than as errors, per §7's propagation policy.

pub mod bezier;
pub mod bilinear;
pub mod box_;
pub mod cylinder;
pub mod plane;
pub mod sphere;
pub mod torus;
pub mod triangle;

use crate::math::{OrthonormalBasis3D, Point3, Vec3};

/// Epsilon used for arithmetic comparisons near zero (singular determinants,
/// flat denominators). Named `EPS_MATH` to distinguish from [`EPS_ADVANCE`].
pub const EPS_MATH: f64 = 1e-19;

/// Epsilon used when advancing a ray origin off a surface to avoid
/// self-intersection on the next bounce.
pub const EPS_ADVANCE: f64 = 1e-8;

/// The full geometric intersection record populated on a hit (§3): entry
/// and exit range, the hit point/normal, a texture coordinate, the local
/// orthonormal basis, and the exit point/normal for primitives (box,
/// sphere, cylinder) whose ray interval has two sides.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub near: f64,
    pub far: f64,
    pub point: Point3,
    pub normal: Vec3,
    pub uv: (f64, f64),
    pub onb: OrthonormalBasis3D,
    pub exit_point: Point3,
    pub exit_normal: Vec3,
}

impl RayHit {
    pub fn new(near: f64, far: f64, point: Point3, normal: Vec3, uv: (f64, f64)) -> Self {
        let onb = OrthonormalBasis3D::create_from_w(normal);
        Self {
            near,
            far,
            point,
            normal,
            uv,
            onb,
            exit_point: point,
            exit_normal: normal,
        }
    }

    pub fn with_exit(mut self, exit_point: Point3, exit_normal: Vec3) -> Self {
        self.exit_point = exit_point;
        self.exit_normal = exit_normal;
        self
    }
}
