//! Indexed triangle-mesh geometry (C5, §4.5): vertex/normal/UV pools plus
//! index triplets, spatially indexed by an octree over pointer-triangles
//! (element = triangle index into the mesh's own pools), with an area-CDF
//! for uniform surface sampling.

use crate::geometry::{Geometry, GeometryHit};
use crate::intersect::triangle;
use crate::math::{BoundingBox, Point3, Ray, Vec3};
use crate::tree::octree::Octree;
use crate::tree::{ElementProcessor, PlaneSide, TreeBuildLimits, TreeHit};

/// Raw mesh data as received from a loader: one triple of vertex indices per
/// triangle, shared across the vertex/normal/UV pools.
#[derive(Debug, Clone, Copy)]
pub struct TriIndex {
    pub v: [u32; 3],
}

pub struct TriMeshBuilder {
    positions: Vec<Point3>,
    normals: Vec<Vec3>,
    uvs: Vec<(f64, f64)>,
    indices: Vec<TriIndex>,
    double_sided: bool,
}

impl TriMeshBuilder {
    pub fn new(positions: Vec<Point3>, indices: Vec<TriIndex>) -> Self {
        let n = positions.len();
        Self {
            positions,
            normals: vec![Vec3::zero(); n],
            uvs: vec![(0.0, 0.0); n],
            indices,
            double_sided: false,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<(f64, f64)>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn double_sided(mut self, v: bool) -> Self {
        self.double_sided = v;
        self
    }

    /// Area-weighted averaging of incident face normals onto each vertex
    /// (§4.5 step 2) — overwrites any normals supplied via `with_normals`.
    pub fn compute_vertex_normals(mut self) -> Self {
        let mut accum = vec![Vec3::zero(); self.positions.len()];
        for tri in &self.indices {
            let [a, b, c] = tri.v.map(|i| self.positions[i as usize]);
            let face_normal = (b - a).cross(c - a); // magnitude = 2 * area
            for &vi in &tri.v {
                accum[vi as usize] += face_normal;
            }
        }
        for n in &mut accum {
            if n.length_squared() > 1e-18 {
                *n = n.normalized();
            }
        }
        self.normals = accum;
        self
    }

    /// Remaps UVs for mirroring: domains `[0, 0.5]` and `[0.5, 1]` both map
    /// to `[0, 1]` independently on each axis (§4.5 step 3).
    pub fn mirror_uvs(mut self) -> Self {
        for uv in &mut self.uvs {
            uv.0 = if uv.0 <= 0.5 { uv.0 * 2.0 } else { (uv.0 - 0.5) * 2.0 };
            uv.1 = if uv.1 <= 0.5 { uv.1 * 2.0 } else { (uv.1 - 0.5) * 2.0 };
        }
        self
    }

    /// Displaces every unique vertex along its normal by `displacement(uv)`,
    /// using a done-bitset so a shared vertex is only displaced once even
    /// though it is referenced by multiple triangles (§4.5 step 4).
    pub fn displace(mut self, displacement: impl Fn((f64, f64)) -> f64) -> Self {
        let mut done = vec![false; self.positions.len()];
        for tri in &self.indices {
            for &vi in &tri.v {
                let vi = vi as usize;
                if done[vi] {
                    continue;
                }
                done[vi] = true;
                let d = displacement(self.uvs[vi]);
                self.positions[vi] += self.normals[vi] * d;
            }
        }
        self
    }

    pub fn build(self) -> TriMesh {
        let mut bbox = BoundingBox::empty();
        for p in &self.positions {
            bbox.include_point(*p);
        }
        bbox.ensure_has_volume();

        let mut areas = Vec::with_capacity(self.indices.len());
        let mut total_area = 0.0;
        for tri in &self.indices {
            let [a, b, c] = tri.v.map(|i| self.positions[i as usize]);
            let area = 0.5 * (b - a).cross(c - a).length();
            total_area += area;
            areas.push(total_area);
        }

        let elements: Vec<u32> = (0..self.indices.len() as u32).collect();
        let processor = MeshProcessor {
            positions: &self.positions,
            indices: &self.indices,
        };
        let index = Octree::build(&processor, elements, bbox, TreeBuildLimits::default())
            .expect("mesh with at least one triangle");

        TriMesh {
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            indices: self.indices,
            double_sided: self.double_sided,
            bbox,
            area_cdf: areas,
            total_area,
            index,
        }
    }
}

pub struct TriMesh {
    positions: Vec<Point3>,
    normals: Vec<Vec3>,
    uvs: Vec<(f64, f64)>,
    indices: Vec<TriIndex>,
    double_sided: bool,
    bbox: BoundingBox,
    area_cdf: Vec<f64>,
    total_area: f64,
    index: Octree<u32>,
}

struct MeshProcessor<'a> {
    positions: &'a [Point3],
    indices: &'a [TriIndex],
}

impl<'a> MeshProcessor<'a> {
    fn verts(&self, tri: u32) -> (Point3, Point3, Point3) {
        let idx = self.indices[tri as usize].v;
        (
            self.positions[idx[0] as usize],
            self.positions[idx[1] as usize],
            self.positions[idx[2] as usize],
        )
    }
}

impl<'a> ElementProcessor<u32> for MeshProcessor<'a> {
    fn intersect(&self, element: &u32, ray: &Ray, t_min: f64, t_max: f64) -> Option<TreeHit> {
        let (v0, v1, v2) = self.verts(*element);
        let hit = triangle::intersect(ray, v0, v1, v2)?;
        if hit.t < t_min || hit.t > t_max {
            return None;
        }
        Some(TreeHit { t: hit.t })
    }

    fn box_overlap(&self, element: &u32, bbox: &BoundingBox) -> bool {
        self.bounding_box(element).overlaps(bbox)
    }

    fn bounding_box(&self, element: &u32) -> BoundingBox {
        let (v0, v1, v2) = self.verts(*element);
        let mut b = BoundingBox::empty();
        b.include_point(v0);
        b.include_point(v1);
        b.include_point(v2);
        b.ensure_has_volume();
        b
    }

    fn plane_side(&self, element: &u32, axis: usize, plane: f64) -> PlaneSide {
        let (v0, v1, v2) = self.verts(*element);
        let lo = v0[axis].min(v1[axis]).min(v2[axis]);
        let hi = v0[axis].max(v1[axis]).max(v2[axis]);
        if hi <= plane {
            PlaneSide::Negative
        } else if lo >= plane {
            PlaneSide::Positive
        } else {
            PlaneSide::Straddle
        }
    }
}

impl TriMesh {
    fn processor(&self) -> MeshProcessor<'_> {
        MeshProcessor { positions: &self.positions, indices: &self.indices }
    }

    fn hit_at(&self, tri: u32, t: f64, ray: &Ray) -> GeometryHit {
        let idx = self.indices[tri as usize].v;
        let (v0, v1, v2) = (
            self.positions[idx[0] as usize],
            self.positions[idx[1] as usize],
            self.positions[idx[2] as usize],
        );
        let th = triangle::intersect(ray, v0, v1, v2).expect("recomputed hit must still hit");
        let (n0, n1, n2) = (
            self.normals[idx[0] as usize],
            self.normals[idx[1] as usize],
            self.normals[idx[2] as usize],
        );
        let mut normal = triangle::interpolate(n0, n1, n2, th.alpha, th.beta);
        if normal.length_squared() > 1e-18 {
            normal = normal.normalized();
        } else {
            normal = (v1 - v0).cross(v2 - v0).normalized();
        }
        if self.double_sided && normal.dot(ray.direction) > 0.0 {
            normal = -normal;
        }
        let (u0, v0uv) = self.uvs[idx[0] as usize];
        let (u1, v1uv) = self.uvs[idx[1] as usize];
        let (u2, v2uv) = self.uvs[idx[2] as usize];
        let uv_vec = triangle::interpolate(
            Vec3::new(u0, v0uv, 0.0),
            Vec3::new(u1, v1uv, 0.0),
            Vec3::new(u2, v2uv, 0.0),
            th.alpha,
            th.beta,
        );

        GeometryHit {
            t,
            point: ray.at(t),
            normal,
            uv: (uv_vec.x, uv_vec.y),
        }
    }

    /// Uniform surface sampling (§4.5): binary-search the area-CDF by `w` to
    /// pick a triangle, then map `(u, v)` to barycentric weights via
    /// `a = sqrt(1-u); (alpha, beta) = (1-a, a*v)` on vertices `(1, 2, 0)`.
    pub fn sample_surface(&self, u: f64, v: f64, w: f64) -> (Point3, Vec3, (f64, f64)) {
        let target = w.clamp(0.0, 1.0) * self.total_area;
        let idx = match self.area_cdf.partition_point(|&cdf| cdf < target) {
            i if i >= self.area_cdf.len() => self.area_cdf.len() - 1,
            i => i,
        };
        let tri = self.indices[idx].v;
        let (v1p, v2p, v0p) = (
            self.positions[tri[0] as usize],
            self.positions[tri[1] as usize],
            self.positions[tri[2] as usize],
        );
        let a = (1.0 - u).max(0.0).sqrt();
        let alpha = 1.0 - a;
        let beta = a * v;
        let w0 = 1.0 - alpha - beta;
        let point = v0p * w0 + v1p * alpha + v2p * beta;

        let (n1, n2, n0) = (
            self.normals[tri[0] as usize],
            self.normals[tri[1] as usize],
            self.normals[tri[2] as usize],
        );
        let normal = (n0 * w0 + n1 * alpha + n2 * beta).normalized();

        let (u1, uv1y) = self.uvs[tri[0] as usize];
        let (u2, uv2y) = self.uvs[tri[1] as usize];
        let (u0, uv0y) = self.uvs[tri[2] as usize];
        let uv = (u0 * w0 + u1 * alpha + u2 * beta, uv0y * w0 + uv1y * alpha + uv2y * beta);

        (point, normal, uv)
    }

    pub fn total_area(&self) -> f64 {
        self.total_area
    }
}

impl Geometry for TriMesh {
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<GeometryHit> {
        let ep = self.processor();
        let (hit, tri) = self.index.intersect(&ep, ray, t_min, t_max)?;
        Some(self.hit_at(*tri, hit.t, ray))
    }

    fn intersect_shadow(&self, ray: &Ray, max_dist: f64) -> bool {
        let ep = self.processor();
        self.index.intersect_any(&ep, ray, max_dist)
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> TriMesh {
        let positions = vec![
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
        ];
        let indices = vec![
            TriIndex { v: [0, 1, 2] },
            TriIndex { v: [0, 2, 3] },
        ];
        TriMeshBuilder::new(positions, indices)
            .compute_vertex_normals()
            .build()
    }

    #[test]
    fn area_weighted_normals_point_along_z() {
        let mesh = quad_mesh();
        for n in &mesh.normals {
            assert!((n.z.abs() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn hits_quad_through_its_center() {
        let mesh = quad_mesh();
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::unit_z());
        let hit = mesh.intersect(&ray, 1e-6, f64::INFINITY).expect("should hit");
        assert!((hit.t - 5.0).abs() < 1e-9);
    }

    #[test]
    fn total_area_of_unit_quad_is_four() {
        let mesh = quad_mesh();
        assert!((mesh.total_area() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn uniform_sampling_stays_on_the_quad() {
        let mesh = quad_mesh();
        for i in 0..20 {
            let t = i as f64 / 20.0;
            let (p, n, _uv) = mesh.sample_surface(t, 1.0 - t, t);
            assert!(p.x >= -1.0 - 1e-9 && p.x <= 1.0 + 1e-9);
            assert!(p.y >= -1.0 - 1e-9 && p.y <= 1.0 + 1e-9);
            assert!((n.z.abs() - 1.0).abs() < 1e-9);
        }
    }
}
