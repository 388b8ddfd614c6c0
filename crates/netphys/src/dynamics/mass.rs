//! Mass and inertia aggregation

use crate::foundation::math::{Mat3, Vec3};

/// Mass and rotational inertia of a body or shape, expressed about its
/// center of gravity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Total mass in kg
    pub mass: f32,
    /// Inertia tensor about the center of gravity
    pub inertia: Mat3,
}

impl MassProperties {
    /// A zero mass, contributed by volumeless shapes.
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            inertia: Mat3::zeros(),
        }
    }

    /// Solid sphere of the given total mass.
    pub fn sphere(mass: f32, radius: f32) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Mat3::from_diagonal(&Vec3::new(i, i, i)),
        }
    }

    /// Solid cuboid with full side lengths `x`, `y`, `z`.
    pub fn cuboid(mass: f32, x: f32, y: f32, z: f32) -> Self {
        let k = mass / 12.0;
        Self {
            mass,
            inertia: Mat3::from_diagonal(&Vec3::new(
                k * (y * y + z * z),
                k * (x * x + z * z),
                k * (x * x + y * y),
            )),
        }
    }

    /// Capsule aligned with the local Z axis: cylinder of `length` plus two
    /// hemispherical caps of `radius`.
    pub fn capsule(mass: f32, radius: f32, length: f32) -> Self {
        // Split the total mass between cylinder and caps by volume.
        let r2 = radius * radius;
        let cyl_vol = std::f32::consts::PI * r2 * length;
        let cap_vol = 4.0 / 3.0 * std::f32::consts::PI * r2 * radius;
        let total_vol = cyl_vol + cap_vol;
        if total_vol <= 0.0 {
            return Self::zero();
        }
        let m_cyl = mass * cyl_vol / total_vol;
        let m_cap = mass * cap_vol / total_vol;

        let i_axis = 0.5 * m_cyl * r2 + 0.4 * m_cap * r2;
        let half = 0.5 * length;
        let i_perp = m_cyl * (0.25 * r2 + length * length / 12.0)
            + m_cap * (0.4 * r2 + half * half + 0.75 * radius * half);

        Self {
            mass,
            inertia: Mat3::from_diagonal(&Vec3::new(i_perp, i_perp, i_axis)),
        }
    }

    /// Rotate the inertia tensor by `rot`: `I' = R I R^T`.
    pub fn rotated(&self, rot: &Mat3) -> Self {
        Self {
            mass: self.mass,
            inertia: rot * self.inertia * rot.transpose(),
        }
    }

    /// Accumulate another mass into this one.
    pub fn add(&mut self, other: &MassProperties) {
        self.mass += other.mass;
        self.inertia += other.inertia;
    }

    /// Scale the total mass to `new_mass`, leaving the inertia distribution
    /// intact.
    pub fn adjusted(&self, new_mass: f32) -> Self {
        if self.mass <= 0.0 {
            return Self {
                mass: new_mass,
                inertia: self.inertia,
            };
        }
        let scale = new_mass / self.mass;
        Self {
            mass: new_mass,
            inertia: self.inertia * scale,
        }
    }

    /// Inverse mass, zero for immovable bodies.
    pub fn inv_mass(&self) -> f32 {
        if self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    /// Inverse inertia tensor, zero if not invertible.
    pub fn inv_inertia(&self) -> Mat3 {
        self.inertia.try_inverse().unwrap_or_else(Mat3::zeros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_inertia_is_isotropic() {
        let props = MassProperties::sphere(10.0, 2.0);
        assert_relative_eq!(props.inertia[(0, 0)], 16.0, epsilon = 1e-5);
        assert_relative_eq!(props.inertia[(1, 1)], props.inertia[(2, 2)], epsilon = 1e-6);
    }

    #[test]
    fn rotation_preserves_trace() {
        let props = MassProperties::cuboid(4.0, 1.0, 2.0, 3.0);
        let rot = nalgebra::Rotation3::from_euler_angles(0.5, 0.2, 1.0)
            .matrix()
            .clone_owned();
        let rotated = props.rotated(&rot);
        assert_relative_eq!(rotated.inertia.trace(), props.inertia.trace(), epsilon = 1e-4);
        assert_eq!(rotated.mass, props.mass);
    }

    #[test]
    fn accumulation_sums_mass() {
        let mut a = MassProperties::sphere(1.0, 1.0);
        let b = MassProperties::cuboid(2.0, 1.0, 1.0, 1.0);
        a.add(&b);
        assert_relative_eq!(a.mass, 3.0);
    }

    #[test]
    fn adjusted_rescales_inertia() {
        let props = MassProperties::sphere(2.0, 1.0);
        let adjusted = props.adjusted(4.0);
        assert_relative_eq!(adjusted.inertia[(0, 0)], 2.0 * props.inertia[(0, 0)]);
    }
}
