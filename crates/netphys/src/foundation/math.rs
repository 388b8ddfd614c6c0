//! Math utilities and types
//!
//! Provides fundamental math types for rigid body simulation, plus the
//! [`BodyFrame`] rigid transform used by both the solver layer and the
//! body handles.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Test whether a value is close enough to zero to be treated as zero
    pub fn equals_zero(v: f32) -> bool {
        v.abs() < 1e-6
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// A rigid transform: rotation and translation, no scale.
///
/// This is the single place where the center-of-gravity correction lives.
/// The solver stores body state at the center of gravity; everything above
/// it addresses bodies by their reference point. [`BodyFrame::from_solver`]
/// and [`BodyFrame::solver_position`] convert between the two, so no other
/// code needs to know about the offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyFrame {
    /// Rotation of the body as a 3x3 matrix
    pub rotation: Mat3,
    /// Translation of the body's reference point in world space
    pub translation: Vec3,
}

impl Default for BodyFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl BodyFrame {
    /// The identity frame
    pub fn identity() -> Self {
        Self {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Create a frame from a translation only
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Mat3::identity(),
            translation,
        }
    }

    /// Create a frame from rotation and translation
    pub fn new(rotation: Mat3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build the reference-point frame from solver state.
    ///
    /// `solver_position` is the world position of the center of gravity;
    /// `cog` is the body-local offset of the center of gravity from the
    /// reference point.
    pub fn from_solver(rotation: Mat3, solver_position: Vec3, cog: Vec3) -> Self {
        Self {
            rotation,
            translation: solver_position - rotation * cog,
        }
    }

    /// World position of the center of gravity for this frame.
    pub fn solver_position(&self, cog: Vec3) -> Vec3 {
        self.translation + self.rotation * cog
    }

    /// Transform a point from body space to world space
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * p + self.translation
    }

    /// Rotate a vector from body space to world space
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation * v
    }

    /// Rotate a vector from world space to body space
    pub fn inverse_transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.transpose() * v
    }

    /// Compose two frames: `self * other` (other is expressed in self's space)
    pub fn combine(&self, other: &BodyFrame) -> BodyFrame {
        BodyFrame {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Build the equivalent homogeneous 4x4 matrix.
    ///
    /// Assembled by hand from the rotation block and translation column;
    /// the bottom row is always (0, 0, 0, 1).
    pub fn to_matrix(&self) -> Mat4 {
        let r = &self.rotation;
        let t = &self.translation;
        Mat4::new(
            r[(0, 0)], r[(0, 1)], r[(0, 2)], t.x,
            r[(1, 0)], r[(1, 1)], r[(1, 2)], t.y,
            r[(2, 0)], r[(2, 1)], r[(2, 2)], t.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Extract a frame from the rotation block and translation column of a
    /// homogeneous matrix. Any scale or shear in the input is kept as-is.
    pub fn from_matrix(m: &Mat4) -> Self {
        Self {
            rotation: m.fixed_view::<3, 3>(0, 0).into_owned(),
            translation: Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]),
        }
    }

    /// Re-orthonormalize the rotation block with a Gram-Schmidt pass.
    ///
    /// Needed after blending rotation matrices component-wise, which does
    /// not preserve orthonormality.
    pub fn orthonormalize(&mut self) {
        let mut x = self.rotation.column(0).into_owned();
        let mut y = self.rotation.column(1).into_owned();

        x.normalize_mut();
        y -= x * x.dot(&y);
        y.normalize_mut();
        let z = x.cross(&y);

        self.rotation = Mat3::from_columns(&[x, y, z]);
    }

    /// Blend this frame toward `target` by `rot_rate`/`pos_rate` and
    /// re-orthonormalize the rotation.
    pub fn blend_toward(&mut self, target: &BodyFrame, pos_rate: f32, rot_rate: f32) {
        self.translation += (target.translation - self.translation) * pos_rate;
        self.rotation += (target.rotation - self.rotation) * rot_rate;
        self.orthonormalize();
    }

    /// Apply a finite rotation of `angle` radians about `axis` to the
    /// orientation, leaving the translation unchanged.
    pub fn rotate_about_axis(&mut self, axis: Vec3, angle: f32) {
        if let Some(axis) = Unit::try_new(axis, 1e-6) {
            let rot = nalgebra::Rotation3::from_axis_angle(&axis, angle);
            self.rotation = rot.matrix() * self.rotation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cog_correction_round_trip() {
        let cog = Vec3::new(0.0, -0.5, 0.2);
        let rot = nalgebra::Rotation3::from_euler_angles(0.3, 1.1, -0.4)
            .matrix()
            .clone_owned();
        let solver_pos = Vec3::new(10.0, 2.0, -3.0);

        let frame = BodyFrame::from_solver(rot, solver_pos, cog);
        assert_relative_eq!(frame.solver_position(cog), solver_pos, epsilon = 1e-5);
    }

    #[test]
    fn orthonormalize_restores_unit_columns() {
        let mut frame = BodyFrame::identity();
        // Perturb the rotation the way interpolation does.
        frame.rotation += Mat3::from_element(0.05);
        frame.orthonormalize();

        for c in 0..3 {
            assert_relative_eq!(frame.rotation.column(c).norm(), 1.0, epsilon = 1e-5);
        }
        let x = frame.rotation.column(0).into_owned();
        let y = frame.rotation.column(1).into_owned();
        assert_relative_eq!(x.dot(&y), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn matrix_round_trip() {
        let frame = BodyFrame::new(
            nalgebra::Rotation3::from_euler_angles(0.1, 0.2, 0.3)
                .matrix()
                .clone_owned(),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let restored = BodyFrame::from_matrix(&frame.to_matrix());
        assert_relative_eq!(restored.translation, frame.translation, epsilon = 1e-6);
        assert_relative_eq!(restored.rotation, frame.rotation, epsilon = 1e-6);
    }
}
