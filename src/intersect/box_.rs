//! Ray/box (AABB) intersection via the slab method (§4.1), tracking the
//! larger entry and smaller exit across all three axes along with which
//! face index is the entry (side A) and exit (side B).

use crate::math::{BoundingBox, Point3, Ray, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct BoxHit {
    pub range: f64,
    pub range2: f64,
    /// Entry face: 0=-x, 1=+x, 2=-y, 3=+y, 4=-z, 5=+z.
    pub side_a: u8,
    pub side_b: u8,
}

impl BoxHit {
    pub fn entry_normal(&self) -> Vec3 {
        face_normal(self.side_a)
    }

    pub fn exit_normal(&self) -> Vec3 {
        face_normal(self.side_b)
    }
}

fn face_normal(side: u8) -> Vec3 {
    match side {
        0 => Vec3::new(-1.0, 0.0, 0.0),
        1 => Vec3::new(1.0, 0.0, 0.0),
        2 => Vec3::new(0.0, -1.0, 0.0),
        3 => Vec3::new(0.0, 1.0, 0.0),
        4 => Vec3::new(0.0, 0.0, -1.0),
        _ => Vec3::new(0.0, 0.0, 1.0),
    }
}

/// Slab-method ray-box intersection that additionally reports which face
/// was entered/exited. `bHit == true` implies `range <= range2` and the
/// entry face's normal faces opposite to the ray direction (§8 property 5).
pub fn intersect(ray: &Ray, bbox: &BoundingBox) -> Option<BoxHit> {
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    let mut side_a = 0u8;
    let mut side_b = 0u8;

    for axis in 0..3 {
        let inv_d = 1.0 / ray.direction[axis];
        let mut t0 = (bbox.ll[axis] - ray.origin[axis]) * inv_d;
        let mut t1 = (bbox.ur[axis] - ray.origin[axis]) * inv_d;
        let (mut near_face, mut far_face) = (axis as u8 * 2, axis as u8 * 2 + 1);
        if inv_d < 0.0 {
            std::mem::swap(&mut t0, &mut t1);
            std::mem::swap(&mut near_face, &mut far_face);
        }
        if t0 > t_min {
            t_min = t0;
            side_a = near_face;
        }
        if t1 < t_max {
            t_max = t1;
            side_b = far_face;
        }
        if t_max <= t_min {
            return None;
        }
    }

    Some(BoxHit {
        range: t_min,
        range2: t_max,
        side_a,
        side_b,
    })
}

pub fn unit_cube_at(origin: Point3, half_extent: f64) -> BoundingBox {
    let h = Vec3::new(half_extent, half_extent, half_extent);
    BoundingBox::new(origin - h, origin + h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s4_axis_aligned_box() {
        let bbox = BoundingBox::new(Point3::new(1.0, -1.0, -1.0), Point3::new(2.0, 1.0, 1.0));
        let ray = Ray::new(Point3::zero(), Vec3::new(1.0, 0.0, 0.0));
        let hit = intersect(&ray, &bbox).expect("should hit");
        assert!((hit.range - 1.0).abs() < 1e-9);
        assert_eq!(hit.side_a, 0);
        assert!((hit.range2 - 2.0).abs() < 1e-9);
        assert_eq!(hit.side_b, 1);
    }

    #[test]
    fn property_5_entry_normal_opposes_ray_direction() {
        let bbox = unit_cube_at(Point3::zero(), 1.0);
        let directions = [
            Vec3::new(1.0, 0.3, 0.1),
            Vec3::new(-1.0, 0.2, -0.4),
            Vec3::new(0.1, 1.0, 0.2),
        ];
        for d in directions {
            let ray = Ray::new(Point3::new(-5.0, -5.0, -5.0) + d * -1.0 * 0.0 + d * -5.0, d.normalized());
            if let Some(hit) = intersect(&ray, &bbox) {
                assert!(hit.range <= hit.range2);
                assert!(hit.entry_normal().dot(ray.direction) <= 1e-9);
            }
        }
    }
}
