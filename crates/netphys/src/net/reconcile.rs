//! Reconciliation policy for predicted/presented entity pairs
//!
//! The policy is plain data about *how* a presentation state chases an
//! authoritative one: per-channel convergence rates, plus the drift
//! threshold beyond which smoothing gives way to a hard snap. It knows
//! nothing about bodies or the simulator, so the same scheme can drive any
//! authoritative/presentation pair.

use crate::config::PhysicsConfig;
use crate::foundation::math::Vec3;

/// Per-channel convergence rates and the warp threshold.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilePolicy {
    /// Per-tick blend rate for position
    pub pos_rate: f32,
    /// Per-tick blend rate for orientation
    pub orientation_rate: f32,
    /// Per-tick blend rate for linear velocity
    pub vel_rate: f32,
    /// Per-tick blend rate for angular velocity
    pub ang_vel_rate: f32,
    /// Squared positional drift beyond which the presentation snaps
    pub warp_threshold_sqr: f32,
}

impl ReconcilePolicy {
    /// Build the policy from the physics configuration.
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            pos_rate: config.proxy_interpolation_speed_pos,
            orientation_rate: config.proxy_interpolation_speed_orientation,
            vel_rate: config.proxy_interpolation_speed_vel,
            ang_vel_rate: config.proxy_interpolation_speed_ang_vel,
            warp_threshold_sqr: config.proxy_warp_threshold,
        }
    }
}

/// Blend a presentation velocity toward the authoritative one.
///
/// If the presentation is already faster than the authority, snap straight
/// to the authoritative value instead of blending: catching up is smooth,
/// overshooting is not allowed to diverge.
pub fn approach_velocity(current: Vec3, target: Vec3, rate: f32) -> Vec3 {
    if current.norm_squared() > target.norm_squared() {
        target
    } else {
        current + (target - current) * rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn slower_presentation_blends() {
        let blended = approach_velocity(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
            0.5,
        );
        assert_relative_eq!(blended, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn faster_presentation_snaps() {
        let snapped = approach_velocity(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            0.5,
        );
        assert_relative_eq!(snapped, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn blend_never_exceeds_target_magnitude() {
        let mut v = Vec3::new(0.0, 0.0, 0.0);
        let target = Vec3::new(5.0, 0.0, 0.0);
        for _ in 0..100 {
            v = approach_velocity(v, target, 0.3);
            assert!(v.norm() <= target.norm() + 1e-4);
        }
    }
}
