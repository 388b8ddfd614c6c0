//! Narrow-phase contact generation
//!
//! Exact tests cover the pairs that matter for gameplay (spheres, capsules,
//! boxes, planes, rays, meshes, heightfields against the round shapes);
//! remaining exotic pairs fall back to a bounding-sphere contact, which is
//! also how mesh-against-mesh overlap is approximated.

use crate::foundation::math::{BodyFrame, Vec3};

use super::mesh::{HeightfieldData, TriMeshData};
use super::shape::Shape;

/// A ray for collision queries
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// One raw contact between two shapes.
///
/// The normal points from the second shape toward the first. For ray
/// shapes, `depth` is the distance from the ray origin to the hit, not an
/// overlap depth.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    /// Contact position in world space
    pub position: Vec3,
    /// Contact normal
    pub normal: Vec3,
    /// Penetration depth, or hit distance for rays
    pub depth: f32,
}

/// Extract origin and direction of a ray-like geom from its world pose.
/// Rays point along their local +Z axis.
pub fn ray_of(shape: &Shape, pose: &BodyFrame) -> Option<(Ray, f32)> {
    match shape {
        Shape::Ray { length } => Some((
            Ray {
                origin: pose.translation,
                direction: pose.transform_vector(Vec3::new(0.0, 0.0, 1.0)),
            },
            *length,
        )),
        Shape::Continuous(state) => {
            if state.length <= 0.0 {
                return None;
            }
            Some((
                Ray {
                    origin: state.origin,
                    direction: state.direction,
                },
                state.length,
            ))
        }
        _ => None,
    }
}

/// A conservative enclosing radius for fallback tests.
fn bounding_radius(shape: &Shape) -> f32 {
    match shape {
        Shape::Sphere { radius } => *radius,
        Shape::Capsule { radius, length } => radius + 0.5 * length,
        Shape::Box { x, y, z } => 0.5 * Vec3::new(*x, *y, *z).norm(),
        Shape::TriMesh(mesh) => mesh.bounding_radius,
        Shape::Heightfield(field) => {
            0.5 * Vec3::new(field.dim_x(), field.max_height - field.min_height, field.dim_z())
                .norm()
        }
        Shape::Plane { .. } | Shape::Ray { .. } | Shape::Continuous(_) => 0.0,
    }
}

/// World-space plane parameters of a plane shape under a pose.
fn world_plane(normal: Vec3, d: f32, pose: &BodyFrame) -> (Vec3, f32) {
    let n = pose.transform_vector(normal);
    // A point on the local plane, carried to world space.
    let p = pose.transform_point(normal * d);
    (n, n.dot(&p))
}

/// Generate contacts between two posed shapes, appending to `out` up to
/// `max` entries. Returns the number of contacts appended.
pub fn collide_shapes(
    a: &Shape,
    pose_a: &BodyFrame,
    b: &Shape,
    pose_b: &BodyFrame,
    out: &mut Vec<Contact>,
    max: usize,
) -> usize {
    let before = out.len();

    // Ray-like shapes only ever produce the single closest hit.
    if let Some((ray, length)) = ray_of(a, pose_a) {
        if let Some(contact) = raycast_shape(&ray, length, b, pose_b) {
            out.push(contact);
        }
        return out.len() - before;
    }
    if let Some((ray, length)) = ray_of(b, pose_b) {
        if let Some(mut contact) = raycast_shape(&ray, length, a, pose_a) {
            contact.normal = -contact.normal;
            out.push(contact);
        }
        return out.len() - before;
    }

    collide_solid(a, pose_a, b, pose_b, out, max, false);
    out.len() - before
}

/// Contact generation between non-ray shapes. `flipped` tracks normal
/// orientation through the symmetric dispatch.
#[allow(clippy::too_many_lines)]
fn collide_solid(
    a: &Shape,
    pose_a: &BodyFrame,
    b: &Shape,
    pose_b: &BodyFrame,
    out: &mut Vec<Contact>,
    max: usize,
    flipped: bool,
) {
    let push = |out: &mut Vec<Contact>, mut c: Contact| {
        if flipped {
            c.normal = -c.normal;
        }
        if out.len() < max && c.depth >= 0.0 {
            out.push(c);
        }
    };

    match (a, b) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            if let Some(c) =
                sphere_sphere(pose_a.translation, *ra, pose_b.translation, *rb)
            {
                push(out, c);
            }
        }
        (Shape::Sphere { radius }, Shape::Capsule { radius: rc, length }) => {
            let closest = closest_on_capsule_axis(pose_b, *length, pose_a.translation);
            if let Some(c) = sphere_sphere(pose_a.translation, *radius, closest, *rc) {
                push(out, c);
            }
        }
        (Shape::Sphere { radius }, Shape::Box { x, y, z }) => {
            if let Some(c) =
                sphere_box(pose_a.translation, *radius, pose_b, Vec3::new(*x, *y, *z) * 0.5)
            {
                push(out, c);
            }
        }
        (Shape::Sphere { radius }, Shape::Plane { normal, d }) => {
            let (n, d) = world_plane(*normal, *d, pose_b);
            let dist = n.dot(&pose_a.translation) - d;
            if dist < *radius {
                push(
                    out,
                    Contact {
                        position: pose_a.translation - n * dist,
                        normal: n,
                        depth: radius - dist,
                    },
                );
            }
        }
        (Shape::Sphere { radius }, Shape::TriMesh(mesh)) => {
            sphere_trimesh(pose_a.translation, *radius, mesh, pose_b, out, max, flipped);
        }
        (Shape::Sphere { radius }, Shape::Heightfield(field)) => {
            if let Some(c) = sphere_heightfield(pose_a.translation, *radius, field, pose_b) {
                push(out, c);
            }
        }
        (Shape::Capsule { radius: ra, length: la }, Shape::Capsule { radius: rb, length: lb }) => {
            let (pa, pb) = closest_between_segments(
                capsule_segment(pose_a, *la),
                capsule_segment(pose_b, *lb),
            );
            if let Some(c) = sphere_sphere(pa, *ra, pb, *rb) {
                push(out, c);
            }
        }
        (Shape::Capsule { radius, length }, Shape::Plane { normal, d }) => {
            let (n, d) = world_plane(*normal, *d, pose_b);
            let (p0, p1) = capsule_segment(pose_a, *length);
            for end in [p0, p1] {
                let dist = n.dot(&end) - d;
                if dist < *radius {
                    push(
                        out,
                        Contact {
                            position: end - n * dist,
                            normal: n,
                            depth: radius - dist,
                        },
                    );
                }
            }
        }
        (Shape::Capsule { radius, length }, Shape::Box { .. }) => {
            // Closest point of the box to the capsule axis, then a sphere
            // test at the matching axis point.
            let (p0, p1) = capsule_segment(pose_a, *length);
            for sample in [p0, (p0 + p1) * 0.5, p1] {
                if let Some(c) = sphere_shape_fallback(sample, *radius, b, pose_b) {
                    push(out, c);
                    if out.len() >= max {
                        break;
                    }
                }
            }
        }
        (Shape::Capsule { radius, length }, Shape::Heightfield(field)) => {
            let (p0, p1) = capsule_segment(pose_a, *length);
            for end in [p0, p1] {
                if let Some(c) = sphere_heightfield(end, *radius, field, pose_b) {
                    push(out, c);
                }
            }
        }
        (Shape::Box { x, y, z }, Shape::Plane { normal, d }) => {
            let (n, d) = world_plane(*normal, *d, pose_b);
            let half = Vec3::new(*x, *y, *z) * 0.5;
            for corner in box_corners(pose_a, half) {
                let dist = n.dot(&corner) - d;
                if dist < 0.0 {
                    push(
                        out,
                        Contact {
                            position: corner,
                            normal: n,
                            depth: -dist,
                        },
                    );
                    if out.len() >= max {
                        break;
                    }
                }
            }
        }
        (Shape::Box { x, y, z }, Shape::Heightfield(field)) => {
            let half = Vec3::new(*x, *y, *z) * 0.5;
            for corner in box_corners(pose_a, half) {
                if let Some(c) = sphere_heightfield(corner, 0.0, field, pose_b) {
                    push(out, c);
                    if out.len() >= max {
                        break;
                    }
                }
            }
        }
        // Symmetric cases: swap and flip.
        (Shape::Capsule { .. }, Shape::Sphere { .. })
        | (Shape::Box { .. }, Shape::Sphere { .. } | Shape::Capsule { .. })
        | (Shape::Plane { .. }, Shape::Sphere { .. } | Shape::Capsule { .. } | Shape::Box { .. })
        | (Shape::TriMesh(_), Shape::Sphere { .. })
        | (Shape::Heightfield(_), Shape::Sphere { .. } | Shape::Capsule { .. } | Shape::Box { .. }) => {
            collide_solid(b, pose_b, a, pose_a, out, max, !flipped);
        }
        // Planes against planes or other unbounded shapes never collide.
        (Shape::Plane { .. }, _) | (_, Shape::Plane { .. }) => {}
        // Everything else: bounding-sphere approximation.
        _ => {
            let ra = bounding_radius(a);
            let rb = bounding_radius(b);
            if ra > 0.0 && rb > 0.0 {
                if let Some(c) = sphere_sphere(pose_a.translation, ra, pose_b.translation, rb) {
                    push(out, c);
                }
            }
        }
    }
}

fn sphere_sphere(ca: Vec3, ra: f32, cb: Vec3, rb: f32) -> Option<Contact> {
    let delta = ca - cb;
    let dist_sq = delta.norm_squared();
    let r_sum = ra + rb;
    if dist_sq >= r_sum * r_sum {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 {
        delta / dist
    } else {
        Vec3::new(0.0, 1.0, 0.0)
    };
    Some(Contact {
        position: cb + normal * (rb - 0.5 * (r_sum - dist)),
        normal,
        depth: r_sum - dist,
    })
}

fn sphere_box(center: Vec3, radius: f32, box_pose: &BodyFrame, half: Vec3) -> Option<Contact> {
    // Work in the box's local frame.
    let local = box_pose.inverse_transform_vector(center - box_pose.translation);
    let clamped = Vec3::new(
        local.x.clamp(-half.x, half.x),
        local.y.clamp(-half.y, half.y),
        local.z.clamp(-half.z, half.z),
    );
    let delta = local - clamped;
    let dist_sq = delta.norm_squared();
    if dist_sq >= radius * radius {
        return None;
    }

    if dist_sq > 1e-10 {
        let dist = dist_sq.sqrt();
        let normal = box_pose.transform_vector(delta / dist);
        Some(Contact {
            position: box_pose.transform_point(clamped),
            normal,
            depth: radius - dist,
        })
    } else {
        // Center inside the box: push out along the face of least
        // penetration.
        let face_depths = Vec3::new(
            half.x - local.x.abs(),
            half.y - local.y.abs(),
            half.z - local.z.abs(),
        );
        let (axis, depth) = if face_depths.x <= face_depths.y && face_depths.x <= face_depths.z {
            (Vec3::new(local.x.signum(), 0.0, 0.0), face_depths.x)
        } else if face_depths.y <= face_depths.z {
            (Vec3::new(0.0, local.y.signum(), 0.0), face_depths.y)
        } else {
            (Vec3::new(0.0, 0.0, local.z.signum()), face_depths.z)
        };
        Some(Contact {
            position: center,
            normal: box_pose.transform_vector(axis),
            depth: depth + radius,
        })
    }
}

fn sphere_shape_fallback(center: Vec3, radius: f32, shape: &Shape, pose: &BodyFrame) -> Option<Contact> {
    match shape {
        Shape::Box { x, y, z } => sphere_box(center, radius, pose, Vec3::new(*x, *y, *z) * 0.5),
        _ => None,
    }
}

fn sphere_trimesh(
    center: Vec3,
    radius: f32,
    mesh: &TriMeshData,
    pose: &BodyFrame,
    out: &mut Vec<Contact>,
    max: usize,
    flipped: bool,
) {
    // Cheap reject against the mesh bounding sphere.
    let to_center = center - pose.translation;
    let reach = mesh.bounding_radius + radius;
    if to_center.norm_squared() > reach * reach {
        return;
    }

    // Mesh is tested in its own frame.
    let local_center = pose.inverse_transform_vector(to_center);
    for triangle in mesh.triangles() {
        let closest = triangle.closest_point(local_center);
        let delta = local_center - closest;
        let dist_sq = delta.norm_squared();
        if dist_sq >= radius * radius {
            continue;
        }

        let dist = dist_sq.sqrt();
        let normal_local = if dist > 1e-6 {
            delta / dist
        } else {
            triangle.normal()
        };
        let mut contact = Contact {
            position: pose.transform_point(closest),
            normal: pose.transform_vector(normal_local),
            depth: radius - dist,
        };
        if flipped {
            contact.normal = -contact.normal;
        }
        out.push(contact);
        if out.len() >= max {
            return;
        }
    }
}

fn sphere_heightfield(
    center: Vec3,
    radius: f32,
    field: &HeightfieldData,
    pose: &BodyFrame,
) -> Option<Contact> {
    // The field occupies a centered XZ footprint in its local frame.
    let local = center - pose.translation;
    let x = local.x + 0.5 * field.dim_x();
    let z = local.z + 0.5 * field.dim_z();
    if x < 0.0 || z < 0.0 || x > field.dim_x() || z > field.dim_z() {
        return None;
    }

    let surface = field.height_at(x, z);
    let dist = local.y - surface;
    if dist >= radius {
        return None;
    }

    // Surface normal from central differences of the height samples.
    let eps = field.horizontal_scale * 0.5;
    let dx = field.height_at(x + eps, z) - field.height_at(x - eps, z);
    let dz = field.height_at(x, z + eps) - field.height_at(x, z - eps);
    let normal = Vec3::new(-dx, 2.0 * eps, -dz).normalize();

    Some(Contact {
        position: Vec3::new(center.x, pose.translation.y + surface, center.z),
        normal,
        depth: radius - dist,
    })
}

fn capsule_segment(pose: &BodyFrame, length: f32) -> (Vec3, Vec3) {
    let axis = pose.transform_vector(Vec3::new(0.0, 0.0, 0.5 * length));
    (pose.translation - axis, pose.translation + axis)
}

fn closest_on_capsule_axis(pose: &BodyFrame, length: f32, point: Vec3) -> Vec3 {
    let (p0, p1) = capsule_segment(pose, length);
    closest_on_segment(p0, p1, point)
}

fn closest_on_segment(p0: Vec3, p1: Vec3, point: Vec3) -> Vec3 {
    let axis = p1 - p0;
    let len_sq = axis.norm_squared();
    if len_sq < 1e-10 {
        return p0;
    }
    let t = ((point - p0).dot(&axis) / len_sq).clamp(0.0, 1.0);
    p0 + axis * t
}

fn closest_between_segments(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> (Vec3, Vec3) {
    // Iterative refinement is robust enough here and avoids the degenerate
    // cases of the closed-form solution.
    let mut pa = (a.0 + a.1) * 0.5;
    let mut pb = (b.0 + b.1) * 0.5;
    for _ in 0..8 {
        pb = closest_on_segment(b.0, b.1, pa);
        pa = closest_on_segment(a.0, a.1, pb);
    }
    (pa, pb)
}

fn box_corners(pose: &BodyFrame, half: Vec3) -> [Vec3; 8] {
    let mut corners = [Vec3::zeros(); 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let sign = Vec3::new(
            if i & 1 != 0 { 1.0 } else { -1.0 },
            if i & 2 != 0 { 1.0 } else { -1.0 },
            if i & 4 != 0 { 1.0 } else { -1.0 },
        );
        *corner = pose.transform_point(half.component_mul(&sign));
    }
    corners
}

/// Cast a ray against a shape, returning the closest hit within `length`.
pub fn raycast_shape(ray: &Ray, length: f32, shape: &Shape, pose: &BodyFrame) -> Option<Contact> {
    let hit = match shape {
        Shape::Sphere { radius } => ray_sphere(ray, pose.translation, *radius),
        Shape::Capsule { radius, length: cap_len } => {
            ray_capsule(ray, pose, *radius, *cap_len)
        }
        Shape::Box { x, y, z } => ray_box(ray, pose, Vec3::new(*x, *y, *z) * 0.5),
        Shape::Plane { normal, d } => {
            let (n, d) = world_plane(*normal, *d, pose);
            ray_plane(ray, n, d)
        }
        Shape::TriMesh(mesh) => ray_trimesh(ray, mesh, pose),
        Shape::Heightfield(field) => ray_heightfield(ray, field, pose),
        // Rays do not collide with each other.
        Shape::Ray { .. } | Shape::Continuous(_) => None,
    };

    hit.filter(|c| c.depth <= length)
}

fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<Contact> {
    let oc = ray.origin - center;
    let b = 2.0 * oc.dot(&ray.direction);
    let c = oc.norm_squared() - radius * radius;
    let discriminant = b * b - 4.0 * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let t1 = (-b - sqrt_d) * 0.5;
    let t2 = (-b + sqrt_d) * 0.5;
    let t = if t1 > 0.0 {
        t1
    } else if t2 > 0.0 {
        t2
    } else {
        return None;
    };

    let position = ray.point_at(t);
    Some(Contact {
        position,
        normal: (position - center).normalize(),
        depth: t,
    })
}

fn ray_capsule(ray: &Ray, pose: &BodyFrame, radius: f32, length: f32) -> Option<Contact> {
    // Sample the capsule as spheres at the closest axis point; this is
    // accurate at the caps and slightly conservative on the side wall.
    let (p0, p1) = capsule_segment(pose, length);
    let mut best: Option<Contact> = None;
    let steps = 8;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let center = p0 + (p1 - p0) * t;
        if let Some(hit) = ray_sphere(ray, center, radius) {
            if best.map_or(true, |b| hit.depth < b.depth) {
                best = Some(hit);
            }
        }
    }
    best
}

fn ray_box(ray: &Ray, pose: &BodyFrame, half: Vec3) -> Option<Contact> {
    // Slab test in the box's local frame.
    let origin = pose.inverse_transform_vector(ray.origin - pose.translation);
    let dir = pose.inverse_transform_vector(ray.direction);

    let mut t_min = 0.0f32;
    let mut t_max = f32::MAX;
    let mut normal_axis = 0;
    let mut normal_sign = 1.0;

    for axis in 0..3 {
        if dir[axis].abs() < 1e-8 {
            if origin[axis].abs() > half[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let mut t1 = (-half[axis] - origin[axis]) * inv;
        let mut t2 = (half[axis] - origin[axis]) * inv;
        let mut sign = -1.0;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
            sign = 1.0;
        }
        if t1 > t_min {
            t_min = t1;
            normal_axis = axis;
            normal_sign = sign;
        }
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    if t_min <= 0.0 {
        return None;
    }

    let mut normal_local = Vec3::zeros();
    normal_local[normal_axis] = normal_sign;
    Some(Contact {
        position: ray.point_at(t_min),
        normal: pose.transform_vector(normal_local),
        depth: t_min,
    })
}

fn ray_plane(ray: &Ray, normal: Vec3, d: f32) -> Option<Contact> {
    let denom = normal.dot(&ray.direction);
    if denom.abs() < 1e-8 {
        return None;
    }
    let t = (d - normal.dot(&ray.origin)) / denom;
    if t <= 0.0 {
        return None;
    }
    Some(Contact {
        position: ray.point_at(t),
        normal: if denom < 0.0 { normal } else { -normal },
        depth: t,
    })
}

fn ray_trimesh(ray: &Ray, mesh: &TriMeshData, pose: &BodyFrame) -> Option<Contact> {
    // Transform the ray into mesh space once instead of every triangle.
    let local_ray = Ray {
        origin: pose.inverse_transform_vector(ray.origin - pose.translation),
        direction: pose.inverse_transform_vector(ray.direction),
    };

    let mut best: Option<(f32, Vec3)> = None;
    for triangle in mesh.triangles() {
        if let Some(t) = triangle.intersect_ray(&local_ray) {
            if best.map_or(true, |(bt, _)| t < bt) {
                best = Some((t, triangle.normal()));
            }
        }
    }

    best.map(|(t, normal_local)| {
        let mut normal = pose.transform_vector(normal_local);
        if normal.dot(&ray.direction) > 0.0 {
            normal = -normal;
        }
        Contact {
            position: ray.point_at(t),
            normal,
            depth: t,
        }
    })
}

fn ray_heightfield(ray: &Ray, field: &HeightfieldData, pose: &BodyFrame) -> Option<Contact> {
    // March along the ray at half-cell resolution looking for the first
    // below-surface sample, then report the crossing point.
    let step = field.horizontal_scale * 0.5;
    let max_dist = (field.dim_x() + field.dim_z()) * 2.0;

    let mut t = 0.0;
    let mut prev_above = true;
    while t < max_dist {
        let p = ray.point_at(t);
        let local = p - pose.translation;
        let x = local.x + 0.5 * field.dim_x();
        let z = local.z + 0.5 * field.dim_z();

        if x >= 0.0 && z >= 0.0 && x <= field.dim_x() && z <= field.dim_z() {
            let surface = field.height_at(x, z);
            let above = local.y > surface;
            if !above && prev_above && t > 0.0 {
                let eps = field.horizontal_scale * 0.5;
                let dx = field.height_at(x + eps, z) - field.height_at(x - eps, z);
                let dz = field.height_at(x, z + eps) - field.height_at(x, z - eps);
                return Some(Contact {
                    position: p,
                    normal: Vec3::new(-dx, 2.0 * eps, -dz).normalize(),
                    depth: t,
                });
            }
            prev_above = above;
        }
        t += step;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn overlapping_spheres_contact() {
        let a = Shape::Sphere { radius: 1.0 };
        let b = Shape::Sphere { radius: 1.0 };
        let pose_a = BodyFrame::from_translation(Vec3::new(0.0, 0.0, 0.0));
        let pose_b = BodyFrame::from_translation(Vec3::new(1.5, 0.0, 0.0));

        let mut out = Vec::new();
        let n = collide_shapes(&a, &pose_a, &b, &pose_b, &mut out, 4);
        assert_eq!(n, 1);
        let c = &out[0];
        assert_relative_eq!(c.depth, 0.5, epsilon = 1e-5);
        assert_relative_eq!(c.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn separated_spheres_no_contact() {
        let a = Shape::Sphere { radius: 1.0 };
        let pose_a = BodyFrame::identity();
        let pose_b = BodyFrame::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let mut out = Vec::new();
        assert_eq!(collide_shapes(&a, &pose_a, &a.clone(), &pose_b, &mut out, 4), 0);
    }

    #[test]
    fn sphere_on_plane() {
        let sphere = Shape::Sphere { radius: 1.0 };
        let plane = Shape::Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            d: 0.0,
        };
        let pose_s = BodyFrame::from_translation(Vec3::new(0.0, 0.5, 0.0));
        let pose_p = BodyFrame::identity();

        let mut out = Vec::new();
        collide_shapes(&sphere, &pose_s, &plane, &pose_p, &mut out, 4);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].depth, 0.5, epsilon = 1e-5);
        assert_relative_eq!(out[0].normal.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn plane_sphere_flips_normal() {
        let sphere = Shape::Sphere { radius: 1.0 };
        let plane = Shape::Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            d: 0.0,
        };
        let pose_s = BodyFrame::from_translation(Vec3::new(0.0, 0.5, 0.0));
        let pose_p = BodyFrame::identity();

        let mut out = Vec::new();
        collide_shapes(&plane, &pose_p, &sphere, &pose_s, &mut out, 4);
        assert_eq!(out.len(), 1);
        // Normal must now point from the sphere toward the plane side.
        assert_relative_eq!(out[0].normal.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn box_rests_on_plane_with_manifold() {
        let cube = Shape::Box {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        };
        let plane = Shape::Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            d: 0.0,
        };
        let pose_c = BodyFrame::from_translation(Vec3::new(0.0, 0.4, 0.0));

        let mut out = Vec::new();
        collide_shapes(&cube, &pose_c, &plane, &BodyFrame::identity(), &mut out, 8);
        // All four bottom corners penetrate.
        assert_eq!(out.len(), 4);
        for c in &out {
            assert_relative_eq!(c.depth, 0.1, epsilon = 1e-5);
        }
    }

    #[test]
    fn ray_hits_sphere_with_distance_depth() {
        let ray_shape = Shape::Ray { length: 10.0 };
        let sphere = Shape::Sphere { radius: 1.0 };
        // Ray along +Z from origin; sphere 5 ahead.
        let pose_r = BodyFrame::identity();
        let pose_s = BodyFrame::from_translation(Vec3::new(0.0, 0.0, 5.0));

        let mut out = Vec::new();
        collide_shapes(&ray_shape, &pose_r, &sphere, &pose_s, &mut out, 4);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].depth, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn ray_respects_length() {
        let ray_shape = Shape::Ray { length: 3.0 };
        let sphere = Shape::Sphere { radius: 1.0 };
        let pose_s = BodyFrame::from_translation(Vec3::new(0.0, 0.0, 5.0));

        let mut out = Vec::new();
        collide_shapes(&ray_shape, &BodyFrame::identity(), &sphere, &pose_s, &mut out, 4);
        assert!(out.is_empty());
    }

    #[test]
    fn ray_box_face_hit() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let cube = Shape::Box {
            x: 2.0,
            y: 2.0,
            z: 2.0,
        };
        let hit = raycast_shape(&ray, 100.0, &cube, &BodyFrame::identity()).unwrap();
        assert_relative_eq!(hit.depth, 4.0, epsilon = 1e-4);
        assert_relative_eq!(hit.normal.z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn sphere_inside_box_pushes_out_least_axis() {
        let sphere = Shape::Sphere { radius: 0.1 };
        let cube = Shape::Box {
            x: 4.0,
            y: 2.0,
            z: 4.0,
        };
        // Near the top face.
        let pose_s = BodyFrame::from_translation(Vec3::new(0.0, 0.8, 0.0));

        let mut out = Vec::new();
        collide_shapes(&sphere, &pose_s, &cube, &BodyFrame::identity(), &mut out, 4);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].normal.y, 1.0, epsilon = 1e-5);
    }
}
