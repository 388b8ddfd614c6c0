//! Triangle mesh and heightfield collision data
//!
//! Both structures are shared read-only between a blueprint and all of its
//! instantiations, so they live behind an `Arc` inside the shape variant.

use crate::foundation::math::Vec3;

use super::primitives::Ray;

/// A triangle in world or model space.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Calculates the normal of the triangle (right-hand rule)
    pub fn normal(&self) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).normalize()
    }

    /// Möller-Trumbore ray-triangle intersection.
    /// Returns the distance along the ray if hit.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        const EPSILON: f32 = 1e-6;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle?
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (t >= 0.0).then_some(t)
    }

    /// Get the closest point on the triangle to a given point
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let v0_to_point = point - self.v0;

        let d1 = edge1.dot(&v0_to_point);
        let d2 = edge2.dot(&v0_to_point);
        if d1 <= 0.0 && d2 <= 0.0 {
            return self.v0;
        }

        let v1_to_point = point - self.v1;
        let d3 = edge1.dot(&v1_to_point);
        let d4 = edge2.dot(&v1_to_point);
        if d3 >= 0.0 && d4 <= d3 {
            return self.v1;
        }

        let v2_to_point = point - self.v2;
        let d5 = edge1.dot(&v2_to_point);
        let d6 = edge2.dot(&v2_to_point);
        if d6 >= 0.0 && d5 <= d6 {
            return self.v2;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let t = d1 / (d1 - d3);
            return self.v0 + edge1 * t;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let t = d2 / (d2 - d6);
            return self.v0 + edge2 * t;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return self.v1 + (self.v2 - self.v1) * t;
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        self.v0 + edge1 * v + edge2 * w
    }
}

/// Triangle mesh collision data in model space.
///
/// Only valid in static bodies; the loader rejects anything else.
#[derive(Debug, Clone)]
pub struct TriMeshData {
    /// Vertex positions in model space
    pub vertices: Vec<Vec3>,
    /// Triangle faces as vertex indices
    pub faces: Vec<[u32; 3]>,
    /// Radius of the model-space bounding sphere
    pub bounding_radius: f32,
}

impl TriMeshData {
    /// Build mesh data from vertices and faces, dropping degenerate
    /// (near-zero-area) triangles with a warning.
    pub fn new(vertices: Vec<Vec3>, mut faces: Vec<[u32; 3]>) -> Self {
        let before = faces.len();
        faces.retain(|f| {
            let ab = vertices[f[1] as usize] - vertices[f[0] as usize];
            let ac = vertices[f[2] as usize] - vertices[f[0] as usize];
            ab.cross(&ac).norm_squared() >= 1e-14
        });
        if faces.len() != before {
            log::warn!("removed {} degenerate triangles from mesh", before - faces.len());
        }

        let bounding_radius = vertices
            .iter()
            .map(|v| v.norm_squared())
            .fold(0.0f32, f32::max)
            .sqrt();

        Self {
            vertices,
            faces,
            bounding_radius,
        }
    }

    /// Iterate the mesh triangles in model space.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|f| {
            Triangle::new(
                self.vertices[f[0] as usize],
                self.vertices[f[1] as usize],
                self.vertices[f[2] as usize],
            )
        })
    }
}

/// Regular-grid heightfield collision data.
///
/// The field occupies `[0, dim_x] x [0, dim_z]` in its local XZ plane with
/// height along Y, matching how terrain tiles are authored.
#[derive(Debug, Clone)]
pub struct HeightfieldData {
    /// Samples along X
    pub res_x: usize,
    /// Samples along Z
    pub res_z: usize,
    /// Distance between adjacent samples
    pub horizontal_scale: f32,
    /// Lower height bound
    pub min_height: f32,
    /// Upper height bound
    pub max_height: f32,
    /// Row-major height samples, `res_x * res_z` entries
    pub heights: Vec<f32>,
}

impl HeightfieldData {
    /// Extent of the field along local X
    pub fn dim_x(&self) -> f32 {
        self.horizontal_scale * (self.res_x as f32 - 1.0)
    }

    /// Extent of the field along local Z
    pub fn dim_z(&self) -> f32 {
        self.horizontal_scale * (self.res_z as f32 - 1.0)
    }

    /// Bilinearly sampled height at local coordinates (x, z).
    ///
    /// Coordinates outside the field are clamped to the border.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let fx = (x / self.horizontal_scale).clamp(0.0, self.res_x as f32 - 1.0);
        let fz = (z / self.horizontal_scale).clamp(0.0, self.res_z as f32 - 1.0);

        let x0 = fx.floor() as usize;
        let z0 = fz.floor() as usize;
        let x1 = (x0 + 1).min(self.res_x - 1);
        let z1 = (z0 + 1).min(self.res_z - 1);
        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let h = |ix: usize, iz: usize| self.heights[iz * self.res_x + ix];
        let h0 = h(x0, z0) * (1.0 - tx) + h(x1, z0) * tx;
        let h1 = h(x0, z1) * (1.0 - tx) + h(x1, z1) * tx;
        h0 * (1.0 - tz) + h1 * tz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn ray_hits_triangle_center() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let t = unit_triangle().intersect_ray(&ray).unwrap();
        assert_relative_eq!(t, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_misses_outside_triangle() {
        let ray = Ray::new(Vec3::new(0.9, 0.9, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(unit_triangle().intersect_ray(&ray).is_none());
    }

    #[test]
    fn closest_point_clamps_to_edge() {
        let p = unit_triangle().closest_point(Vec3::new(2.0, -1.0, 0.5));
        assert_relative_eq!(p, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn degenerate_faces_removed() {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [0, 1, 1]];
        let mesh = TriMeshData::new(vertices, faces);
        assert_eq!(mesh.faces.len(), 1);
    }

    #[test]
    fn heightfield_bilinear_sample() {
        let field = HeightfieldData {
            res_x: 2,
            res_z: 2,
            horizontal_scale: 1.0,
            min_height: 0.0,
            max_height: 1.0,
            heights: vec![0.0, 1.0, 0.0, 1.0],
        };
        assert_relative_eq!(field.height_at(0.5, 0.5), 0.5, epsilon = 1e-6);
        assert_relative_eq!(field.height_at(1.0, 0.0), 1.0, epsilon = 1e-6);
    }
}
