//! The production [`RayCaster`](super::ops::RayCaster): ties every shader op
//! in `ops.rs`, the irradiance cache (C8), and subsurface scattering (§4.9)
//! together into the fixed chain §4.8 describes, instead of each op only
//! being reachable from its own unit tests.
//!
//! Op order at a hit: emission, then a shadow-photon-density gate around
//! direct lighting, then subsurface (if the object carries a config), then
//! the photon-map estimates, then — unless the ray is final-gather-only —
//! either `reflection_refraction` (specular surfaces) or a final-gather pass
//! against the irradiance cache (diffuse surfaces).

use crate::math::{Color, OrthonormalBasis3D, Point3, Ray, Vec3};
use crate::photon::{PhotonMap, ShadowPhoton};
use crate::cache::irradiance::IrradianceCache;
use crate::scenegraph::object_manager::{Object, ObjectHit, ObjectManager, SubsurfaceConfig};
use crate::shading::ops::{
    direct_lighting, emission, photon_map_estimate, reflection_refraction, shadow_photon_density,
    PassKind, PointLight, RayCaster, RayState, ShadowDensity,
};
use crate::shading::sss::{self, SubsurfaceCache};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

const PHOTON_GATHER_COUNT: usize = 50;

/// Deterministic hash of a probe point, used to seed a throwaway RNG for
/// each subsurface sample's direct-lighting shade — avoids threading a
/// shared `&mut` RNG through a closure that `sss::build_sample_set` also
/// hands a *different* RNG to for sample placement.
fn hash_point(p: Point3) -> u64 {
    let mut h = 0xcbf2_9ce4_8422_2325u64;
    for v in [p.x, p.y, p.z] {
        h ^= v.to_bits();
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

pub struct PathTracer<'a> {
    pub objects: &'a ObjectManager,
    pub point_lights: &'a [PointLight],
    pub mesh_lights: &'a [(std::sync::Arc<crate::geometry::trimesh::TriMesh>, Color)],
    pub caustic_map: &'a PhotonMap,
    pub global_map: &'a PhotonMap,
    pub shadow_photons: &'a [ShadowPhoton],
    pub shadow_photon_radius: f64,
    pub irradiance: &'a IrradianceCache,
    pub subsurface: &'a SubsurfaceCache,
    pub background: Color,
    pub max_depth: u32,
    pub final_gather_rays: u32,
    /// Distance assigned to a final-gather ray that leaves the scene, used
    /// only to weight that sample's contribution to the harmonic radius.
    pub miss_distance: f64,
}

impl<'a> RayCaster for PathTracer<'a> {
    fn trace(&self, ray: &Ray, state: RayState, rng: &mut dyn RngCore) -> Color {
        match self.objects.intersect(ray, 1e-4, f64::INFINITY) {
            Some(hit) => self.shade_hit(&hit, ray.direction, state, rng),
            None => self.background,
        }
    }

    fn occluded(&self, ray: &Ray, max_dist: f64) -> bool {
        self.objects.intersect_shadow(ray, max_dist)
    }
}

impl<'a> PathTracer<'a> {
    fn shade_hit(&self, hit: &ObjectHit, incoming_dir: Vec3, state: RayState, rng: &mut dyn RngCore) -> Color {
        let mut accum = Color::zero();
        emission(hit, &state, &mut accum);

        let density = shadow_photon_density(self.shadow_photons, hit.point, self.shadow_photon_radius);
        if density != ShadowDensity::FullShadow {
            let view_dir = -incoming_dir.normalized();
            direct_lighting(hit, view_dir, self.point_lights, self.mesh_lights, self, rng, &mut accum);
        }

        if let Some(cfg) = hit.object.subsurface {
            accum += self.subsurface_contribution(hit, cfg);
        }

        photon_map_estimate(hit, self.caustic_map, PHOTON_GATHER_COUNT, 1.0, &mut accum);
        photon_map_estimate(hit, self.global_map, PHOTON_GATHER_COUNT, 1.0, &mut accum);

        if state.pass == PassKind::FinalGatherOnly {
            return accum;
        }

        if hit.object.material.is_specular() {
            reflection_refraction(hit, incoming_dir, &state, self, rng, self.max_depth, &mut accum);
        } else if state.depth < self.max_depth {
            accum += self.indirect_diffuse(hit, &state, rng);
        }

        accum
    }

    /// Diffuse-albedo stand-in for a hit with no single incoming direction —
    /// the same idiom `photon_map_estimate` uses, evaluated at normal
    /// incidence and falling back to unit weight for a zero-albedo BSDF.
    fn weighted_albedo(&self, hit: &ObjectHit) -> Color {
        let albedo = hit.object.material.evaluate(hit.normal, hit.normal, hit.normal);
        if albedo == Color::zero() { Color::ones() } else { albedo }
    }

    /// Diffuse indirect lighting via the irradiance cache: reuse a nearby
    /// sample if the cache already has one dense enough, otherwise shoot
    /// `final_gather_rays` cosine-weighted final-gather rays, insert the
    /// resulting irradiance estimate, and return this hit's contribution.
    fn indirect_diffuse(&self, hit: &ObjectHit, state: &RayState, rng: &mut dyn RngCore) -> Color {
        let albedo = self.weighted_albedo(hit);
        let frozen = self.irradiance.is_frozen();
        if frozen || !self.irradiance.is_sample_needed(hit.point, hit.normal) {
            let (sum, weight) = self.irradiance.query(hit.point, hit.normal);
            if weight > 0.0 {
                return albedo.hadamard(sum / weight);
            }
            if frozen {
                return Color::zero();
            }
        }

        let n = self.final_gather_rays.max(1);
        let basis = OrthonormalBasis3D::create_from_w(hit.normal);
        let mut radiance_sum = Color::zero();
        let mut inv_dist_sum = 0.0;
        for _ in 0..n {
            let r1: f64 = rng.gen();
            let r2: f64 = rng.gen();
            let phi = std::f64::consts::TAU * r1;
            let cos_theta = (1.0 - r2).sqrt();
            let sin_theta = r2.sqrt();
            let local = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
            let dir = basis.to_canonical(local);
            let gather_ray = Ray::new(hit.point, dir);
            let fg_state = RayState {
                depth: state.depth + 1,
                importance: state.importance,
                specular: false,
                include_emission: true,
                pass: PassKind::FinalGatherOnly,
            };
            let (radiance, dist) = match self.objects.intersect(&gather_ray, 1e-4, f64::INFINITY) {
                Some(sample_hit) => {
                    let d = (sample_hit.point - hit.point).length();
                    (self.shade_hit(&sample_hit, dir, fg_state, rng), d)
                }
                None => (self.background, self.miss_distance),
            };
            radiance_sum += radiance;
            inv_dist_sum += 1.0 / dist.max(1e-3);
        }

        let irradiance = radiance_sum * (std::f64::consts::PI / n as f64);
        let harmonic_radius = n as f64 / inv_dist_sum.max(1e-6);
        self.irradiance.insert(hit.point, hit.normal, irradiance, harmonic_radius, None);
        albedo.hadamard(irradiance)
    }

    /// Builds (once, via [`SubsurfaceCache`]) a point cloud over a disc
    /// around the hit on the object's local tangent plane, then evaluates
    /// the cloud's contribution at the hit point (§4.9).
    fn subsurface_contribution(&self, hit: &ObjectHit, cfg: SubsurfaceConfig) -> Color {
        let object: &Object = hit.object;
        let basis = OrthonormalBasis3D::create_from_w(hit.normal);
        let origin = hit.point;
        let normal = hit.normal;
        let radius = cfg.sample_radius;
        let point_lights = self.point_lights;
        let mesh_lights = self.mesh_lights;

        let mut build_rng = SmallRng::seed_from_u64(object.id ^ 0x5355_5353_u64);
        let set = self.subsurface.get_or_build(object.id, || {
            sss::build_sample_set(
                cfg.sample_count,
                cfg.irradiance_scale,
                |r: &mut dyn RngCore| {
                    let u = r.gen::<f64>().sqrt() * radius;
                    let theta = r.gen::<f64>() * std::f64::consts::TAU;
                    let offset = basis.u * (u * theta.cos()) + basis.v * (u * theta.sin());
                    (origin + offset, normal)
                },
                |probe_point, probe_normal| {
                    let mut probe_rng = SmallRng::seed_from_u64(hash_point(probe_point));
                    let synthetic = ObjectHit { t: 0.0, point: probe_point, normal: probe_normal, uv: (0.0, 0.0), object };
                    let mut accum = Color::zero();
                    direct_lighting(&synthetic, probe_normal, point_lights, mesh_lights, self, &mut probe_rng, &mut accum);
                    accum
                },
                &mut build_rng,
            )
        });

        let extinction = sss::exponential_extinction(cfg.sigma_tr);
        let bsdf_weight = self.weighted_albedo(hit);
        sss::evaluate(&set, hit.point, cfg.sample_count, extinction, Some(bsdf_weight))
    }
}
