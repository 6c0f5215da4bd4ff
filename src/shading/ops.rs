//! Shader operations (C9, §4.8): independent units invoked in a fixed chain
//! at a ray hit. Each receives the pass kind, the hit record, a ray caster
//! for recursive/shadow rays, the current ray state, and an RNG; each
//! accumulates into the caller's running radiance total rather than
//! returning a final color, mirroring the original's "output accumulator"
//! design so ops can be composed freely.

use crate::math::{Color, Point3, Vec3};
use crate::photon::PhotonMap;
use crate::scenegraph::object_manager::ObjectHit;
use crate::shading::bsdf::ScatteredRay;
use rand::RngCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Runs the full op chain.
    Normal,
    /// Skips every op except direct lighting, photon-map estimation,
    /// emission, and SSS (§4.8).
    FinalGatherOnly,
}

/// Per-ray state threaded through the op chain.
#[derive(Debug, Clone, Copy)]
pub struct RayState {
    pub depth: u32,
    pub importance: f64,
    pub specular: bool,
    pub include_emission: bool,
    pub pass: PassKind,
}

impl RayState {
    pub fn primary() -> Self {
        Self { depth: 0, importance: 1.0, specular: false, include_emission: true, pass: PassKind::Normal }
    }

    pub fn bounced(&self, scatter: &ScatteredRay) -> Self {
        Self {
            depth: self.depth + 1,
            importance: self.importance * scatter.weight.length() / 3f64.sqrt().max(1e-12),
            specular: scatter.specular,
            include_emission: true,
            pass: self.pass,
        }
    }
}

/// Index-of-refraction stack tracked across nested dielectric boundaries.
#[derive(Debug, Default)]
pub struct IorStack(Vec<f64>);

impl IorStack {
    pub fn new() -> Self {
        Self(vec![1.0])
    }

    pub fn current(&self) -> f64 {
        *self.0.last().unwrap_or(&1.0)
    }

    pub fn push(&mut self, ior: f64) {
        self.0.push(ior);
    }

    pub fn pop(&mut self) {
        if self.0.len() > 1 {
            self.0.pop();
        }
    }
}

/// A minimal, non-mesh point or directional light.
pub struct PointLight {
    pub position: Point3,
    pub intensity: Color,
}

/// Everything a shader op needs to cast further rays without depending on
/// the concrete integrator implementation. `trace` takes the RNG explicitly
/// rather than letting implementors stash one behind interior mutability —
/// `reflection_refraction` below recurses into `trace` on the same call
/// stack, and a `RefCell`-backed RNG would double-borrow on that recursion.
pub trait RayCaster {
    fn trace(&self, ray: &crate::math::Ray, state: RayState, rng: &mut dyn RngCore) -> Color;
    fn occluded(&self, ray: &crate::math::Ray, max_dist: f64) -> bool;
}

/// Accumulates `emitter.emittedRadiance()` (§4.8).
pub fn emission(hit: &ObjectHit, state: &RayState, accum: &mut Color) {
    if !state.include_emission {
        return;
    }
    *accum += hit.object.material.emitted();
}

/// Sums contributions from point lights and mesh/luminary lights, each
/// weighted by the surface BSDF and checked against a shadow ray (§4.8).
/// `view_dir` is the outgoing direction back toward the viewer (i.e. the
/// negated incoming ray direction), passed through to `Bsdf::evaluate`.
pub fn direct_lighting(
    hit: &ObjectHit,
    view_dir: Vec3,
    point_lights: &[PointLight],
    mesh_lights: &[(std::sync::Arc<crate::geometry::trimesh::TriMesh>, Color)],
    caster: &dyn RayCaster,
    rng: &mut dyn RngCore,
    accum: &mut Color,
) {
    for light in point_lights {
        let to_light = light.position - hit.point;
        let dist = to_light.length();
        if dist < 1e-9 {
            continue;
        }
        let wi = to_light / dist;
        let shadow_ray = crate::math::Ray::new(hit.point, wi);
        if caster.occluded(&shadow_ray, dist - 1e-4) {
            continue;
        }
        let bsdf_value = hit.object.material.evaluate(hit.normal, wi, view_dir);
        let cos = hit.normal.dot(wi).max(0.0);
        let falloff = 1.0 / (dist * dist).max(1e-6);
        *accum += light.intensity.hadamard(bsdf_value) * (cos * falloff);
    }

    for (mesh, radiance) in mesh_lights {
        use rand::Rng;
        let (sample_point, sample_normal, _uv) = mesh.sample_surface(rng.gen(), rng.gen(), rng.gen());
        let to_light = sample_point - hit.point;
        let dist = to_light.length();
        if dist < 1e-9 {
            continue;
        }
        let wi = to_light / dist;
        let facing = sample_normal.dot(-wi).max(0.0);
        if facing <= 0.0 {
            continue;
        }
        let shadow_ray = crate::math::Ray::new(hit.point, wi);
        if caster.occluded(&shadow_ray, dist - 1e-4) {
            continue;
        }
        let bsdf_value = hit.object.material.evaluate(hit.normal, wi, view_dir);
        let cos = hit.normal.dot(wi).max(0.0);
        let area = mesh.total_area().max(1e-9);
        let solid_angle_pdf = (dist * dist) / (facing * area).max(1e-9);
        *accum += radiance.hadamard(bsdf_value) * (cos / solid_angle_pdf.max(1e-9));
    }
}

/// Iterates the BSDF's scattered rays, casting each with `depth+1` and
/// importance scaled by its weight, accumulating the weighted result
/// (§4.8). Terminates via Russian roulette once importance drops below a
/// fixed floor rather than a hard bounce limit, matching typical path
/// tracers built on the teacher's scatter-and-recurse shape.
pub fn reflection_refraction(
    hit: &ObjectHit,
    incoming_dir: Vec3,
    state: &RayState,
    caster: &dyn RayCaster,
    rng: &mut dyn RngCore,
    max_depth: u32,
    accum: &mut Color,
) {
    if state.depth >= max_depth || state.importance < 1e-4 {
        return;
    }
    let incoming = crate::math::Ray::new(hit.point, incoming_dir);
    if let Some(scatter) = hit.object.material.sample(&incoming, hit.point, hit.normal, rng) {
        let next_state = state.bounced(&scatter);
        let radiance = caster.trace(&scatter.ray, next_state, rng);
        *accum += radiance.hadamard(scatter.weight);
    }
}

/// Photon-map radiance estimate for the caustic or global map, weighted by
/// the surface BSDF evaluated at normal incidence as a diffuse-albedo
/// stand-in (the density estimate itself already integrates over incoming
/// directions, so there is no single `wi` to evaluate against).
pub fn photon_map_estimate(
    hit: &ObjectHit,
    map: &PhotonMap,
    max_photons: usize,
    max_dist: f64,
    accum: &mut Color,
) {
    if map.is_empty() {
        return;
    }
    let estimate = map.estimate(hit.point, hit.normal, max_photons, max_dist);
    let albedo = hit.object.material.evaluate(hit.normal, hit.normal, hit.normal);
    let weight = if albedo == Color::zero() { Color::ones() } else { albedo };
    *accum += estimate.hadamard(weight);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowDensity {
    NoShadow,
    Partial,
    FullShadow,
}

/// Classifies shadow-photon density near the hit into none/partial/full
/// (§4.8's "shade 0/partial/bright").
pub fn shadow_photon_density(shadow_photons: &[crate::photon::ShadowPhoton], point: Point3, radius: f64) -> ShadowDensity {
    let mut total = 0usize;
    let mut shadowed = 0usize;
    for p in shadow_photons {
        if (p.position - point).length() <= radius {
            total += 1;
            if p.in_shadow {
                shadowed += 1;
            }
        }
    }
    if total == 0 {
        return ShadowDensity::NoShadow;
    }
    let frac = shadowed as f64 / total as f64;
    if frac < 0.05 {
        ShadowDensity::NoShadow
    } else if frac > 0.95 {
        ShadowDensity::FullShadow
    } else {
        ShadowDensity::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ior_stack_starts_at_vacuum_and_pops_to_it() {
        let mut stack = IorStack::new();
        assert_eq!(stack.current(), 1.0);
        stack.push(1.5);
        assert_eq!(stack.current(), 1.5);
        stack.pop();
        assert_eq!(stack.current(), 1.0);
        stack.pop(); // popping the vacuum floor is a no-op
        assert_eq!(stack.current(), 1.0);
    }

    #[test]
    fn shadow_density_classifies_extremes() {
        let point = Point3::zero();
        let all_lit: Vec<_> = (0..10)
            .map(|_| crate::photon::ShadowPhoton { position: point, in_shadow: false })
            .collect();
        assert_eq!(shadow_photon_density(&all_lit, point, 1.0), ShadowDensity::NoShadow);

        let all_dark: Vec<_> = (0..10)
            .map(|_| crate::photon::ShadowPhoton { position: point, in_shadow: true })
            .collect();
        assert_eq!(shadow_photon_density(&all_dark, point, 1.0), ShadowDensity::FullShadow);
    }
}
