//! Photon variants stored in the spectral/shadow/irradiance photon maps
//! (§3). Incoming direction is quantized to two bytes (θ, φ) the way the
//! original packs it, trading precision for a compact on-disk/in-memory
//! representation when millions of photons are stored.

use crate::math::{Color, Point3, Vec3};

fn quantize_angle(value: f64, max: f64) -> u8 {
    ((value / max).clamp(0.0, 1.0) * 255.0).round() as u8
}

fn dequantize_angle(q: u8, max: f64) -> f64 {
    (q as f64 / 255.0) * max
}

/// Incoming direction quantized as `(theta, phi)` across the full sphere,
/// one byte each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizedDirection {
    pub theta: u8,
    pub phi: u8,
}

impl QuantizedDirection {
    pub fn from_vec3(dir: Vec3) -> Self {
        let d = dir.normalized();
        let theta = d.y.clamp(-1.0, 1.0).acos(); // [0, pi]
        let phi = d.z.atan2(d.x) + std::f64::consts::PI; // [0, 2pi]
        Self {
            theta: quantize_angle(theta, std::f64::consts::PI),
            phi: quantize_angle(phi, 2.0 * std::f64::consts::PI),
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        let theta = dequantize_angle(self.theta, std::f64::consts::PI);
        let phi = dequantize_angle(self.phi, 2.0 * std::f64::consts::PI) - std::f64::consts::PI;
        let sin_theta = theta.sin();
        Vec3::new(sin_theta * phi.cos(), theta.cos(), sin_theta * phi.sin())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Photon {
    pub position: Point3,
    pub incoming: QuantizedDirection,
    pub power: Color,
}

#[derive(Debug, Clone, Copy)]
pub struct SpectralPhoton {
    pub position: Point3,
    pub incoming: QuantizedDirection,
    pub power: Color,
    pub wavelength_nm: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ShadowPhoton {
    pub position: Point3,
    pub in_shadow: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct IrradiancePhoton {
    pub position: Point3,
    pub normal: Vec3,
    pub irradiance: Color,
}

/// A flat photon store queried by brute-force nearest-neighbor scan. A
/// production photon map would index photons in a kd-tree for logarithmic
/// nearest-neighbor queries; this core keeps the simpler linear form since
/// photon-tracing itself (populating the map) is out of scope and the
/// shader ops only need *a* density estimate, not a fast one.
pub struct PhotonMap {
    photons: Vec<Photon>,
}

impl PhotonMap {
    pub fn new(photons: Vec<Photon>) -> Self {
        Self { photons }
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    /// Radiance estimate at `point` with surface normal `normal`: averages
    /// the power of the `max_photons` nearest photons within `max_dist`,
    /// divided by the disc area they span (standard photon-map density
    /// estimate), ignoring photons whose incoming direction is on the far
    /// side of the surface.
    pub fn estimate(&self, point: Point3, normal: Vec3, max_photons: usize, max_dist: f64) -> Color {
        if self.photons.is_empty() {
            return Color::zero();
        }
        let mut nearby: Vec<(f64, &Photon)> = self
            .photons
            .iter()
            .filter(|p| normal.dot(p.incoming.to_vec3()) < 0.0)
            .map(|p| ((p.position - point).length_squared(), p))
            .filter(|(d2, _)| *d2 <= max_dist * max_dist)
            .collect();
        if nearby.is_empty() {
            return Color::zero();
        }
        nearby.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        nearby.truncate(max_photons);

        let radius2 = nearby.last().map(|(d2, _)| *d2).unwrap_or(max_dist * max_dist).max(1e-12);
        let mut sum = Color::zero();
        for (_, p) in &nearby {
            sum += p.power;
        }
        sum / (std::f64::consts::PI * radius2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_quantization_round_trips_approximately() {
        let dirs = [Vec3::unit_y(), Vec3::unit_x(), Vec3::new(1.0, 1.0, 1.0).normalized()];
        for d in dirs {
            let q = QuantizedDirection::from_vec3(d);
            let back = q.to_vec3();
            // One-byte-per-angle quantization is coarse; allow a generous
            // tolerance rather than asserting near-exact round trip.
            assert!(back.dot(d) > 0.95);
        }
    }
}
