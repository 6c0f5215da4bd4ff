//! Surface scattering models (BSDFs) attached to an `Object` (C7) and
//! consumed by the reflection/refraction shader op (C9, §4.8). Adapted from
//! the teacher's `Material` trait: same scatter-direction/attenuation shape,
//! generalized to also report a BSDF evaluation used by direct lighting.

use crate::math::{Color, Ray, Vec3};
use rand::{Rng, RngCore};

/// One ray scattered off a surface, with the path-throughput weight it
/// carries (§4.8: "iterate scattered rays... cast with depth+1 and
/// importance multiplied by the scatter weight").
#[derive(Debug, Clone, Copy)]
pub struct ScatteredRay {
    pub ray: Ray,
    pub weight: Color,
    pub specular: bool,
}

pub trait Bsdf: Send + Sync {
    /// Importance-samples one outgoing direction at a hit with outward
    /// normal `normal` and incoming ray `ray_in`.
    fn sample(&self, ray_in: &Ray, point: crate::math::Point3, normal: Vec3, rng: &mut dyn RngCore) -> Option<ScatteredRay>;

    /// Evaluates the BSDF for a fixed (incoming, outgoing) pair, used by
    /// direct lighting to weight a light sample.
    fn evaluate(&self, _normal: Vec3, _wi: Vec3, _wo: Vec3) -> Color {
        Color::zero()
    }

    fn emitted(&self) -> Color {
        Color::zero()
    }

    /// Whether this surface should be treated as specular (skips some
    /// direct-lighting terms per §4.8's "specular flag").
    fn is_specular(&self) -> bool {
        false
    }
}

pub struct Lambertian {
    pub albedo: Color,
}

impl Lambertian {
    pub const fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Bsdf for Lambertian {
    fn sample(&self, _ray_in: &Ray, point: crate::math::Point3, normal: Vec3, rng: &mut dyn RngCore) -> Option<ScatteredRay> {
        let mut dir = normal + Vec3::random_unit_vector(rng);
        if dir.near_zero() {
            dir = normal;
        }
        Some(ScatteredRay { ray: Ray::new(point, dir), weight: self.albedo, specular: false })
    }

    fn evaluate(&self, normal: Vec3, _wi: Vec3, wo: Vec3) -> Color {
        let cos = normal.dot(wo).max(0.0);
        self.albedo * (cos / std::f64::consts::PI)
    }
}

pub struct Metal {
    pub albedo: Color,
    pub fuzz: f64,
}

impl Metal {
    pub fn new(albedo: Color, fuzz: f64) -> Self {
        Self { albedo, fuzz: fuzz.min(1.0) }
    }
}

impl Bsdf for Metal {
    fn sample(&self, ray_in: &Ray, point: crate::math::Point3, normal: Vec3, rng: &mut dyn RngCore) -> Option<ScatteredRay> {
        let reflected = ray_in.direction.normalized().reflect(normal);
        let dir = reflected + Vec3::random_in_unit_sphere(rng) * self.fuzz;
        if dir.dot(normal) > 0.0 {
            Some(ScatteredRay { ray: Ray::new(point, dir), weight: self.albedo, specular: true })
        } else {
            None
        }
    }

    fn is_specular(&self) -> bool {
        true
    }
}

pub struct Dielectric {
    pub ior: f64,
}

impl Dielectric {
    pub const fn new(ior: f64) -> Self {
        Self { ior }
    }

    fn schlick_reflectance(cosine: f64, ref_idx: f64) -> f64 {
        let r0 = ((1.0 - ref_idx) / (1.0 + ref_idx)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }
}

impl Bsdf for Dielectric {
    fn sample(&self, ray_in: &Ray, point: crate::math::Point3, normal: Vec3, rng: &mut dyn RngCore) -> Option<ScatteredRay> {
        let front_face = ray_in.direction.dot(normal) < 0.0;
        let (n, eta_ratio) = if front_face { (normal, 1.0 / self.ior) } else { (-normal, self.ior) };
        let unit_dir = ray_in.direction.normalized();
        let cos_theta = (-unit_dir).dot(n).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

        let cannot_refract = eta_ratio * sin_theta > 1.0;
        let direction = if cannot_refract || Self::schlick_reflectance(cos_theta, eta_ratio) > rng.gen_range(0.0..1.0) {
            unit_dir.reflect(n)
        } else {
            unit_dir.refract(n, eta_ratio).unwrap_or_else(|| unit_dir.reflect(n))
        };

        Some(ScatteredRay { ray: Ray::new(point, direction), weight: Color::ones(), specular: true })
    }

    fn is_specular(&self) -> bool {
        true
    }
}

pub struct Emissive {
    pub emit_color: Color,
    pub intensity: f64,
}

impl Emissive {
    pub const fn new(emit_color: Color, intensity: f64) -> Self {
        Self { emit_color, intensity }
    }
}

impl Bsdf for Emissive {
    fn sample(&self, _ray_in: &Ray, _point: crate::math::Point3, _normal: Vec3, _rng: &mut dyn RngCore) -> Option<ScatteredRay> {
        None
    }

    fn emitted(&self) -> Color {
        self.emit_color * self.intensity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn lambertian_scatter_stays_on_the_hemisphere() {
        let bsdf = Lambertian::new(Color::new(0.5, 0.5, 0.5));
        let mut rng = SmallRng::seed_from_u64(7);
        let ray_in = Ray::new(crate::math::Point3::zero(), Vec3::new(0.0, -1.0, 0.0));
        for _ in 0..20 {
            let scattered = bsdf
                .sample(&ray_in, crate::math::Point3::zero(), Vec3::unit_y(), &mut rng)
                .unwrap();
            assert!(scattered.ray.direction.dot(Vec3::unit_y()) > -1e-9);
        }
    }

    #[test]
    fn emissive_never_scatters() {
        let bsdf = Emissive::new(Color::ones(), 4.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let ray_in = Ray::new(crate::math::Point3::zero(), Vec3::unit_z());
        assert!(bsdf.sample(&ray_in, crate::math::Point3::zero(), Vec3::unit_y(), &mut rng).is_none());
        assert_eq!(bsdf.emitted(), Color::new(4.0, 4.0, 4.0));
    }
}
