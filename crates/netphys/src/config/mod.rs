//! Configuration system

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Tunable parameters of the simulation and the proxy reconciliation.
///
/// Defaults are the values the simulation was tuned with; individual games
/// override them from a `.toml` or `.ron` file via the [`Config`] trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravitational acceleration, applied along -Y
    pub gravity: f32,
    /// Error reduction parameter for contact resolution
    pub erp: f32,
    /// Constraint force mixing (softness) for contact resolution
    pub cfm: f32,

    /// Linear speed below which a body is a sleep candidate
    pub auto_disable_lin_threshold: f32,
    /// Angular speed below which a body is a sleep candidate
    pub auto_disable_ang_threshold: f32,
    /// Seconds a body must stay below both thresholds before sleeping
    pub auto_disable_time: f32,
    /// Simulation steps a body must stay below both thresholds before sleeping
    pub auto_disable_steps: u32,

    /// Linear velocity damping coefficient
    pub lin_dampening: f32,
    /// Angular velocity damping coefficient
    pub ang_dampening: f32,
    /// Damping multiplier applied while a body is below water
    pub water_dampening_factor: f32,

    /// Component-wise cap on linear velocity
    pub max_velocity_component: f32,
    /// Component-wise cap on angular velocity
    pub max_ang_velocity_component: f32,

    /// Fixed simulation rate in steps per second; also the dead reckoning
    /// integration step
    pub fps: f32,

    /// Per-tick blend rate of proxy position toward the target
    pub proxy_interpolation_speed_pos: f32,
    /// Per-tick blend rate of proxy orientation toward the target
    pub proxy_interpolation_speed_orientation: f32,
    /// Per-tick blend rate of proxy linear velocity toward the target
    pub proxy_interpolation_speed_vel: f32,
    /// Per-tick blend rate of proxy angular velocity toward the target
    pub proxy_interpolation_speed_ang_vel: f32,
    /// Squared positional drift beyond which the proxy is warped
    pub proxy_warp_threshold: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            erp: 0.2,
            cfm: 1e-4,
            auto_disable_lin_threshold: 0.05,
            auto_disable_ang_threshold: 0.05,
            auto_disable_time: 0.5,
            auto_disable_steps: 10,
            lin_dampening: 0.05,
            ang_dampening: 0.05,
            water_dampening_factor: 2.0,
            max_velocity_component: 50.0,
            max_ang_velocity_component: 20.0,
            fps: 60.0,
            proxy_interpolation_speed_pos: 0.2,
            proxy_interpolation_speed_orientation: 0.2,
            proxy_interpolation_speed_vel: 0.3,
            proxy_interpolation_speed_ang_vel: 0.3,
            proxy_warp_threshold: 4.0,
        }
    }
}

impl Config for PhysicsConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_round_trip() {
        let config = PhysicsConfig {
            gravity: 3.7,
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let restored: PhysicsConfig = toml::from_str(&text).unwrap();
        assert_eq!(restored.gravity, 3.7);
        assert_eq!(restored.fps, config.fps);
    }

    #[test]
    fn partial_document_uses_defaults() {
        let restored: PhysicsConfig = toml::from_str("gravity = 1.6").unwrap();
        assert_eq!(restored.gravity, 1.6);
        assert_eq!(restored.erp, PhysicsConfig::default().erp);
    }
}
