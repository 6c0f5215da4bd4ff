use rand::Rng;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, Mul, MulAssign, Neg, Sub};

/// A 3-component vector used for positions, directions, and colors in the ray tracer.
///
/// This type implements all standard arithmetic operations with operator overloading,
/// and provides geometric utilities (dot product, cross product, reflection, refraction)
/// needed for physically-based light transport simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub type Point3 = Vec3;
pub type Color = Vec3;

impl Vec3 {
    #[inline(always)]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline(always)]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub const fn ones() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    #[inline(always)]
    pub const fn unit_x() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub const fn unit_y() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    #[inline(always)]
    pub const fn unit_z() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Squared Euclidean length — avoids the sqrt for performance-critical paths
    /// such as BVH traversal and intersection culling.
    #[inline(always)]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[inline(always)]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns the unit vector. Panics on zero-length vectors in debug mode.
    #[inline(always)]
    pub fn normalized(self) -> Self {
        let len = self.length();
        debug_assert!(len > 1e-12, "Attempted to normalize a zero-length vector");
        self / len
    }

    /// The standard Euclidean inner product, fundamental to all geometric queries
    /// in the ray tracer (projection, angle computation, Lambertian shading).
    #[inline(always)]
    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product — used for constructing orthonormal camera bases and computing
    /// surface tangent frames for normal mapping.
    #[inline(always)]
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Specular reflection of `self` about the surface normal `n`.
    /// Implements the GLSL `reflect` formula: I - 2·dot(I, N)·N
    #[inline(always)]
    pub fn reflect(self, normal: Self) -> Self {
        self - normal * 2.0 * self.dot(normal)
    }

    /// Snell's law refraction. Returns `None` for total internal reflection (TIR)
    /// when the discriminant is negative, which occurs at grazing angles when
    /// transitioning from a denser to a rarer medium (η > 1).
    #[inline]
    pub fn refract(self, normal: Self, eta_ratio: f64) -> Option<Self> {
        let cos_theta = (-self).dot(normal).min(1.0);
        let r_perp = (self + normal * cos_theta) * eta_ratio;
        let discriminant = 1.0 - r_perp.length_squared();
        if discriminant < 0.0 {
            return None;
        }
        let r_parallel = normal * -(discriminant.sqrt());
        Some(r_perp + r_parallel)
    }

    /// Component-wise (Hadamard) product — used for color modulation where each
    /// channel is attenuated independently by the surface albedo.
    #[inline(always)]
    pub fn hadamard(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    /// Component-wise linear interpolation: self·(1-t) + other·t
    #[inline(always)]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self * (1.0 - t) + other * t
    }

    /// Clamps each component to [0, 1] — used before quantizing HDR radiance values
    /// to 8-bit sRGB for terminal display.
    #[inline(always)]
    pub fn saturate(self) -> Self {
        Self::new(
            self.x.clamp(0.0, 1.0),
            self.y.clamp(0.0, 1.0),
            self.z.clamp(0.0, 1.0),
        )
    }

    /// Applies the sRGB gamma curve (γ = 2.2 approximated as sqrt) for perceptually
    /// correct display on standard monitors / terminals with true-color support.
    #[inline(always)]
    pub fn gamma_correct(self) -> Self {
        Self::new(self.x.sqrt(), self.y.sqrt(), self.z.sqrt())
    }

    /// Checks if the vector is near-zero in all components, used to avoid
    /// degenerate scatter directions that would produce NaN in subsequent math.
    #[inline(always)]
    pub fn near_zero(self) -> bool {
        const EPS: f64 = 1e-8;
        self.x.abs() < EPS && self.y.abs() < EPS && self.z.abs() < EPS
    }

    /// Generates a uniformly distributed random point inside the unit sphere
    /// via rejection sampling. Used for Lambertian diffuse scattering.
    pub fn random_in_unit_sphere(rng: &mut dyn rand::RngCore) -> Self {
        loop {
            let v = Self::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if v.length_squared() < 1.0 {
                return v;
            }
        }
    }

    /// Cosine-weighted hemisphere sampling via rejection + normalization.
    /// Produces directions distributed proportionally to cos(θ), which is
    /// the optimal importance sampling strategy for Lambertian BRDFs.
    /// Generates a random unit vector via rejection sampling on the unit sphere.
    pub fn random_unit_vector(rng: &mut dyn rand::RngCore) -> Self {
        Self::random_in_unit_sphere(rng).normalized()
    }

    /// Random point on the unit disk — used for depth-of-field simulation
    /// by jittering the camera ray origin across the lens aperture.
    pub fn random_in_unit_disk(rng: &mut dyn rand::RngCore) -> Self {
        loop {
            let v = Self::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
            if v.length_squared() < 1.0 {
                return v;
            }
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, t: f64) -> Self {
        Self::new(self.x * t, self.y * t, self.z * t)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    #[inline(always)]
    fn mul(self, v: Vec3) -> Vec3 {
        v * self
    }
}

impl MulAssign<f64> for Vec3 {
    #[inline(always)]
    fn mul_assign(&mut self, t: f64) {
        self.x *= t;
        self.y *= t;
        self.z *= t;
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn div(self, t: f64) -> Self {
        let inv = 1.0 / t;
        Self::new(self.x * inv, self.y * inv, self.z * inv)
    }
}

impl DivAssign<f64> for Vec3 {
    #[inline(always)]
    fn div_assign(&mut self, t: f64) {
        let inv = 1.0 / t;
        self.x *= inv;
        self.y *= inv;
        self.z *= inv;
    }
}

impl Index<usize> for Vec3 {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3 index out of bounds: {i}"),
        }
    }
}

impl Vec3 {
    /// Sets component `i` (0=x, 1=y, 2=z) by value. A plain index-assign
    /// isn't available since `Index` only hands out shared references here.
    #[inline(always)]
    pub fn set(&mut self, i: usize, value: f64) {
        match i {
            0 => self.x = value,
            1 => self.y = value,
            2 => self.z = value,
            _ => panic!("Vec3 index out of bounds: {i}"),
        }
    }
}

// ─── Ray ────────────────────────────────────────────────────────────────────

/// A parametric ray R(t) = origin + t · direction, the fundamental geometric
/// primitive for all intersection queries in the path tracer.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vec3,
}

impl Ray {
    #[inline(always)]
    pub const fn new(origin: Point3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Evaluates the ray at parameter t. Positive t gives points ahead of the origin.
    #[inline(always)]
    pub fn at(self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }
}

// ─── Axis-Aligned Bounding Box ──────────────────────────────────────────────

/// An axis-aligned bounding box carried through the tree/geometry core as
/// `(ll, ur)` corners. `sanity_check` restores the invariant `ll[i] <= ur[i]`
/// after construction from unordered extrema (e.g. a displaced vertex set).
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub ll: Point3,
    pub ur: Point3,
}

impl BoundingBox {
    pub const fn new(ll: Point3, ur: Point3) -> Self {
        Self { ll, ur }
    }

    /// An inverted box (`ll` = +inf, `ur` = -inf) suitable as the seed of an
    /// `Include` fold over a point/box stream.
    pub fn empty() -> Self {
        Self::new(
            Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        )
    }

    /// Widens the box, if necessary, to include `p`.
    pub fn include_point(&mut self, p: Point3) {
        self.ll = Point3::new(self.ll.x.min(p.x), self.ll.y.min(p.y), self.ll.z.min(p.z));
        self.ur = Point3::new(self.ur.x.max(p.x), self.ur.y.max(p.y), self.ur.z.max(p.z));
    }

    /// Widens the box, if necessary, to include `other` — used to build a
    /// parent box from children (§8 property 1: `ll <= ur` on every axis
    /// holds after any sequence of `Include` calls).
    pub fn include_box(&mut self, other: &BoundingBox) {
        self.include_point(other.ll);
        self.include_point(other.ur);
    }

    /// Restores `ll[i] <= ur[i]` per axis by swapping any inverted pair.
    /// Needed after building a box from two arbitrary (possibly swapped)
    /// corners, e.g. a displaced-vertex min/max sweep.
    pub fn sanity_check(&mut self) {
        for axis in 0..3 {
            if self.ll[axis] > self.ur[axis] {
                let ll = self.ll[axis];
                self.ll.set(axis, self.ur[axis]);
                self.ur.set(axis, ll);
            }
        }
    }

    /// Widens any axis whose extent is (near) zero by a small epsilon so that
    /// degenerate boxes (a single point, a planar polygon) still have a
    /// nonzero volume for slab tests.
    pub fn ensure_has_volume(&mut self) {
        const EPS: f64 = 1e-6;
        for axis in 0..3 {
            if (self.ur[axis] - self.ll[axis]).abs() < EPS {
                let ll = self.ll[axis];
                let ur = self.ur[axis];
                self.ll.set(axis, ll - EPS);
                self.ur.set(axis, ur + EPS);
            }
        }
    }

    pub fn extents(&self) -> Vec3 {
        self.ur - self.ll
    }

    pub fn center(&self) -> Point3 {
        (self.ll + self.ur) * 0.5
    }

    /// Slab-method ray-box intersection test. Returns true if the ray hits the
    /// box within `[t_min, t_max]`. The branchless min/max formulation handles
    /// NaN and axis-aligned rays correctly.
    pub fn hit(&self, ray: &Ray, mut t_min: f64, mut t_max: f64) -> bool {
        for axis in 0..3 {
            let inv_d = 1.0 / ray.direction[axis];
            let mut t0 = (self.ll[axis] - ray.origin[axis]) * inv_d;
            let mut t1 = (self.ur[axis] - ray.origin[axis]) * inv_d;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t0.max(t_min);
            t_max = t1.min(t_max);
            if t_max <= t_min {
                return false;
            }
        }
        true
    }

    pub fn contains_point(&self, p: Point3) -> bool {
        (0..3).all(|axis| p[axis] >= self.ll[axis] && p[axis] <= self.ur[axis])
    }

    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        (0..3).all(|axis| self.ll[axis] <= other.ur[axis] && self.ur[axis] >= other.ll[axis])
    }

    /// Computes the union of two boxes — used while building tree nodes and
    /// BVH-style hierarchies from children.
    pub fn surrounding(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
        let mut r = *a;
        r.include_box(b);
        r
    }

    /// Returns the index of the longest axis (0=x, 1=y, 2=z) — used as the
    /// split dimension for top-down hierarchy construction.
    pub fn longest_axis(&self) -> usize {
        let e = self.extents();
        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }
}

// ─── Orthonormal Basis ──────────────────────────────────────────────────────

/// Three mutually orthogonal unit vectors (u, v, w). Used to build local
/// shading frames at a ray-hit point and to jitter camera rays.
#[derive(Debug, Clone, Copy)]
pub struct OrthonormalBasis3D {
    pub u: Vec3,
    pub v: Vec3,
    pub w: Vec3,
}

impl OrthonormalBasis3D {
    /// Builds a basis whose `w` axis is `dir`. When `dir` coincides with the
    /// global up axis (±Y) the canonical cross-product construction is
    /// degenerate (u would be zero-length); the canonical-fallback rule uses
    /// the global X axis as the auxiliary vector in that case instead.
    pub fn create_from_w(dir: Vec3) -> Self {
        let w = dir.normalized();
        const DEGENERACY_EPS: f64 = 1e-3;
        let aux = if w.x.abs() < DEGENERACY_EPS && w.z.abs() < DEGENERACY_EPS {
            Vec3::unit_x()
        } else {
            Vec3::unit_y()
        };
        let u = aux.cross(w).normalized();
        let v = w.cross(u);
        Self { u, v, w }
    }

    pub fn create_from_u(dir: Vec3) -> Self {
        let u = dir.normalized();
        const DEGENERACY_EPS: f64 = 1e-3;
        let aux = if u.x.abs() < DEGENERACY_EPS && u.z.abs() < DEGENERACY_EPS {
            Vec3::unit_x()
        } else {
            Vec3::unit_y()
        };
        let v = aux.cross(u).normalized();
        let w = u.cross(v);
        Self { u, v, w }
    }

    pub fn create_from_v(dir: Vec3) -> Self {
        let v = dir.normalized();
        const DEGENERACY_EPS: f64 = 1e-3;
        let aux = if v.x.abs() < DEGENERACY_EPS && v.z.abs() < DEGENERACY_EPS {
            Vec3::unit_x()
        } else {
            Vec3::unit_y()
        };
        let w = aux.cross(v).normalized();
        let u = v.cross(w);
        Self { u, v, w }
    }

    /// Transforms a vector given in canonical (world) coordinates into this
    /// basis's local frame.
    pub fn to_local(&self, a: Vec3) -> Vec3 {
        Vec3::new(a.dot(self.u), a.dot(self.v), a.dot(self.w))
    }

    /// Transforms a vector given in this basis's local frame back to
    /// canonical (world) coordinates.
    pub fn to_canonical(&self, a: Vec3) -> Vec3 {
        self.u * a.x + self.v * a.y + self.w * a.z
    }
}

// ─── Plane ──────────────────────────────────────────────────────────────────

/// An infinite plane defined by a point on the plane and a unit normal.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub origin: Point3,
    pub normal: Vec3,
}

impl Plane {
    pub fn new(origin: Point3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: normal.normalized(),
        }
    }

    /// Signed distance from `p` to the plane: positive on the side the
    /// normal points toward.
    pub fn distance(&self, p: Point3) -> f64 {
        (p - self.origin).dot(self.normal)
    }
}

// ─── Affine transformation matrix ───────────────────────────────────────────

/// A 4x4 affine transformation matrix stored row-major. Only the upper-left
/// 3x3 plus translation column are meaningful; the bottom row is implicitly
/// `[0, 0, 0, 1]` as this core never needs projective transforms.
#[derive(Debug, Clone, Copy)]
pub struct Matrix4 {
    pub m: [[f64; 4]; 4],
}

impl Matrix4 {
    pub const fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub const fn translation(t: Vec3) -> Self {
        let mut m = Self::identity().m;
        m[0][3] = t.x;
        m[1][3] = t.y;
        m[2][3] = t.z;
        Self { m }
    }

    pub const fn scale(s: Vec3) -> Self {
        let mut m = Self::identity().m;
        m[0][0] = s.x;
        m[1][1] = s.y;
        m[2][2] = s.z;
        Self { m }
    }

    pub fn mul(&self, rhs: &Matrix4) -> Matrix4 {
        let mut out = [[0.0; 4]; 4];
        for r in 0..4 {
            for c in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += self.m[r][k] * rhs.m[k][c];
                }
                out[r][c] = sum;
            }
        }
        Matrix4 { m: out }
    }

    /// Transforms a point (implicit homogeneous w=1, translation applied).
    pub fn transform_point(&self, p: Point3) -> Point3 {
        Point3::new(
            self.m[0][0] * p.x + self.m[0][1] * p.y + self.m[0][2] * p.z + self.m[0][3],
            self.m[1][0] * p.x + self.m[1][1] * p.y + self.m[1][2] * p.z + self.m[1][3],
            self.m[2][0] * p.x + self.m[2][1] * p.y + self.m[2][2] * p.z + self.m[2][3],
        )
    }

    /// Transforms a direction vector (implicit homogeneous w=0, no translation).
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }

    /// Full 4x4 inverse via Gauss-Jordan elimination with partial pivoting.
    /// Returns `None` for a singular matrix (degenerate transform).
    pub fn inverse(&self) -> Option<Matrix4> {
        let mut a = self.m;
        let mut inv = Matrix4::identity().m;

        for col in 0..4 {
            let mut pivot_row = col;
            let mut pivot_val = a[col][col].abs();
            for row in (col + 1)..4 {
                if a[row][col].abs() > pivot_val {
                    pivot_val = a[row][col].abs();
                    pivot_row = row;
                }
            }
            if pivot_val < 1e-14 {
                return None;
            }
            a.swap(col, pivot_row);
            inv.swap(col, pivot_row);

            let pivot = a[col][col];
            for c in 0..4 {
                a[col][c] /= pivot;
                inv[col][c] /= pivot;
            }

            for row in 0..4 {
                if row == col {
                    continue;
                }
                let factor = a[row][col];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..4 {
                    a[row][c] -= factor * a[col][c];
                    inv[row][c] -= factor * inv[col][c];
                }
            }
        }

        Some(Matrix4 { m: inv })
    }

    /// Transpose, used to transform normals by the inverse-transpose of the
    /// object-to-world matrix so that non-uniform scale doesn't skew them.
    pub fn transpose(&self) -> Matrix4 {
        let mut out = [[0.0; 4]; 4];
        for r in 0..4 {
            for c in 0..4 {
                out[r][c] = self.m[c][r];
            }
        }
        Matrix4 { m: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onb_round_trip_through_canonical() {
        let basis = OrthonormalBasis3D::create_from_w(Vec3::new(0.3, 0.8, 0.1));
        let z = Vec3::unit_z();
        let world = basis.to_canonical(z);
        let back = basis.to_local(world);
        assert!((back - z).length() < 1e-9);
    }

    #[test]
    fn onb_handles_up_axis_degeneracy() {
        // Regression for the canonical-fallback rule: w coinciding with
        // global up must not produce a zero-length u.
        let basis = OrthonormalBasis3D::create_from_w(Vec3::unit_y());
        assert!(basis.u.length() > 0.5);
        assert!((basis.u.dot(basis.v)).abs() < 1e-9);
        assert!((basis.u.dot(basis.w)).abs() < 1e-9);

        let basis_neg = OrthonormalBasis3D::create_from_w(-Vec3::unit_y());
        assert!(basis_neg.u.length() > 0.5);
    }

    #[test]
    fn bounding_box_include_keeps_ll_le_ur() {
        let mut bb = BoundingBox::empty();
        bb.include_point(Point3::new(1.0, -2.0, 5.0));
        bb.include_point(Point3::new(-3.0, 4.0, 0.0));
        for axis in 0..3 {
            assert!(bb.ll[axis] <= bb.ur[axis]);
        }
        assert_eq!(bb.ll, Point3::new(-3.0, -2.0, 0.0));
        assert_eq!(bb.ur, Point3::new(1.0, 4.0, 5.0));
    }

    #[test]
    fn bounding_box_sanity_check_fixes_swapped_corners() {
        let mut bb = BoundingBox::new(Point3::new(5.0, 0.0, 0.0), Point3::new(-5.0, 1.0, 1.0));
        bb.sanity_check();
        assert!(bb.ll.x <= bb.ur.x);
    }

    #[test]
    fn bounding_box_ensure_has_volume_widens_flat_axis() {
        let mut bb = BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0));
        bb.ensure_has_volume();
        assert!(bb.ur.x - bb.ll.x > 0.0);
    }

    #[test]
    fn matrix4_inverse_round_trip() {
        let m = Matrix4::translation(Vec3::new(1.0, 2.0, 3.0))
            .mul(&Matrix4::scale(Vec3::new(2.0, 0.5, 4.0)));
        let inv = m.inverse().expect("invertible");
        let p = Point3::new(3.0, -1.0, 2.0);
        let round = inv.transform_point(m.transform_point(p));
        assert!((round - p).length() < 1e-9);
    }
}
