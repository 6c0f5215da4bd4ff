//! Bézier-patch geometry with tessellation-on-demand (C6, §4.6). A patch is
//! stored as a 4x4 control grid plus a precomputed bounding box; a ray test
//! tessellates it into an indexed [`TriMesh`] at a fixed subdivision density
//! and delegates to that mesh, routing the generated mesh through an
//! [`crate::cache::mru`] cache keyed by patch identity so repeated hits on
//! the same patch don't re-tessellate every time.

use crate::cache::mru::{MruCache, ProxyGenerator};
use crate::geometry::trimesh::{TriIndex, TriMesh, TriMeshBuilder};
use crate::geometry::{Geometry, GeometryHit};
use crate::intersect::bezier::BicubicPatch;
use crate::math::{BoundingBox, Point3, Ray};

/// Number of subdivisions per edge when a patch is tessellated into a mesh.
pub const TESSELLATION_DENSITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchId(pub u64);

fn tessellate_surface(surface: &BicubicPatch, double_sided: bool) -> TriMesh {
    let n = TESSELLATION_DENSITY;
    let mut positions = Vec::with_capacity((n + 1) * (n + 1));
    let mut uvs = Vec::with_capacity((n + 1) * (n + 1));
    for i in 0..=n {
        let u = i as f64 / n as f64;
        for j in 0..=n {
            let v = j as f64 / n as f64;
            positions.push(surface.eval(u, v));
            uvs.push((u, v));
        }
    }
    let mut indices = Vec::with_capacity(n * n * 2);
    let stride = n + 1;
    for i in 0..n {
        for j in 0..n {
            let a = (i * stride + j) as u32;
            let b = ((i + 1) * stride + j) as u32;
            let c = ((i + 1) * stride + j + 1) as u32;
            let d = (i * stride + j + 1) as u32;
            indices.push(TriIndex { v: [a, b, c] });
            indices.push(TriIndex { v: [a, c, d] });
        }
    }
    TriMeshBuilder::new(positions, indices)
        .with_uvs(uvs)
        .compute_vertex_normals()
        .double_sided(double_sided)
        .build()
}

/// Generates the tessellated mesh on a cache miss. Each [`BezierPatch`] owns
/// a one-entry cache keyed by its own (constant) id, so `generate` only ever
/// runs once per patch no matter how many rays hit it.
struct PatchGenerator {
    surface: BicubicPatch,
    double_sided: bool,
}

impl ProxyGenerator<PatchId, TriMesh> for PatchGenerator {
    fn generate(&self, _key: &PatchId) -> TriMesh {
        tessellate_surface(&self.surface, self.double_sided)
    }
}

pub struct BezierPatch {
    pub id: PatchId,
    pub surface: BicubicPatch,
    bbox: BoundingBox,
    double_sided: bool,
    cache: MruCache<PatchId, TriMesh, PatchGenerator>,
}

impl BezierPatch {
    pub fn new(id: PatchId, control: [[Point3; 4]; 4], double_sided: bool) -> Self {
        let surface = BicubicPatch { control };
        let bbox = surface.bounding_box();
        let cache = MruCache::new(1, PatchGenerator { surface, double_sided });
        Self { id, surface, bbox, double_sided, cache }
    }

    /// Tessellates this patch into a fresh indexed triangle mesh at
    /// [`TESSELLATION_DENSITY`] subdivisions per edge, bypassing the cache.
    /// Kept for standalone callers that want a mesh without paying for (or
    /// polluting) the patch's own cache entry.
    pub fn tessellate(&self) -> TriMesh {
        tessellate_surface(&self.surface, self.double_sided)
    }
}

impl Geometry for BezierPatch {
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<GeometryHit> {
        let mesh = self.cache.get(self.id);
        mesh.intersect(ray, t_min, t_max)
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_patch() -> BezierPatch {
        let mut control = [[Point3::zero(); 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                control[i][j] = Point3::new(-1.5 + i as f64, -1.5 + j as f64, 0.0);
            }
        }
        BezierPatch::new(PatchId(1), control, false)
    }

    #[test]
    fn tessellated_mesh_is_hit_head_on() {
        let patch = flat_patch();
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), crate::math::Vec3::unit_z());
        let hit = patch.intersect(&ray, 1e-6, f64::INFINITY).expect("should hit");
        assert!((hit.t - 5.0).abs() < 1e-3);
    }
}
