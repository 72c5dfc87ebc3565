//! Simulation Configuration
//!
//! Every tunable constant of the kernel, grouped by subsystem. Defaults are
//! the shipped tuning; a JSON document may override any subset of fields.

use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// =============================================================================
// PHYSICS
// =============================================================================

/// Character physics tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Vertical acceleration (negative = down), units/s².
    pub gravity: f32,
    /// Upward velocity applied by a jump.
    pub jump_force: f32,
    /// Seconds between ground jumps.
    pub jump_cooldown: f32,
    /// Fraction of `jump_force` applied by a double jump.
    pub double_jump_factor: f32,
    /// Upward acceleration while levitating at full ramp.
    pub levitation_force: f32,
    /// Maximum levitation time per activation.
    pub levitation_duration: f32,
    /// Cooldown after a full-duration levitation.
    pub levitation_max_cooldown: f32,
    /// Time to reach full levitation force.
    pub levitation_ramp_up: f32,
    /// Horizontal walking speed.
    pub move_speed: f32,
    /// Speed multiplier while sprinting.
    pub sprint_multiplier: f32,
    /// Character body height.
    pub character_height: f32,
    /// Character footprint width.
    pub character_size: f32,
    /// Health of a freshly spawned character.
    pub max_health: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -30.0,
            jump_force: 12.0,
            jump_cooldown: 0.25,
            double_jump_factor: 0.8,
            levitation_force: 45.0,
            levitation_duration: 2.0,
            levitation_max_cooldown: 3.0,
            levitation_ramp_up: 0.3,
            move_speed: 6.0,
            sprint_multiplier: 1.6,
            character_height: 2.0,
            character_size: 1.0,
            max_health: 100.0,
        }
    }
}

// =============================================================================
// PROJECTILES
// =============================================================================

/// Projectile system constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    /// Mortar gravity magnitude.
    pub mortar_gravity: f32,
    /// Mortar lifetime before expiry (seconds).
    pub mortar_lifetime: f32,
    /// Horizontal radius of a mid-air mortar detonation.
    pub explosion_radius: f32,
    /// Horizontal distance to target that counts as arrival.
    pub impact_tolerance: f32,
    /// Height above ground at which near-ground direct hits are checked.
    pub near_ground_band: f32,
    /// Extra reach added to mortar size for near-ground direct hits.
    pub near_ground_margin: f32,
    /// FireArea expand phase duration.
    pub fire_expand_duration: f32,
    /// FireArea shrink phase duration.
    pub fire_shrink_duration: f32,
    /// FireArea damage ticks per second.
    pub fire_ticks_per_second: f32,
    /// Cursor homing steering rate.
    pub homing_rate: f32,
    /// Cursor distance mapped to full Herald control input.
    pub cursor_control_span: f32,
    /// Distance of the right-stick aim point from the shooter.
    pub stick_aim_range: f32,
    /// Minimum direction length accepted for a firebolt.
    pub min_direction: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            mortar_gravity: 20.0,
            mortar_lifetime: 5.0,
            explosion_radius: 2.0,
            impact_tolerance: 1.0,
            near_ground_band: 0.5,
            near_ground_margin: 0.8,
            fire_expand_duration: 0.2,
            fire_shrink_duration: 0.6,
            fire_ticks_per_second: 5.0,
            homing_rate: 5.0,
            cursor_control_span: 20.0,
            stick_aim_range: 12.0,
            min_direction: 1e-3,
        }
    }
}

// =============================================================================
// REPLICATION
// =============================================================================

/// Remote entity replication tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Seconds without an update before a remote entity is evicted.
    pub stale_timeout: f32,
    /// Seconds a spawn may stay in flight before it is abandoned.
    pub spawn_timeout: f32,
    /// Texture load timeout during spawn preparation.
    pub texture_timeout: f32,
    /// Interval between outgoing `player-state` messages.
    pub sync_interval: f32,
    /// Age of the last update below which we interpolate.
    pub interpolation_window: f32,
    /// Maximum extrapolation horizon.
    pub extrapolation_cap: f32,
    /// Distance below which the entity snaps to its target.
    pub snap_distance: f32,
    /// Weight of the previous smoothed velocity.
    pub velocity_smoothing: f32,
    /// Per-tick rotation lerp factor.
    pub rotation_lerp: f32,
    /// Gravity applied to knockback impulses.
    pub impulse_gravity: f32,
    /// Per-tick multiplicative decay of horizontal impulses.
    pub velocity_decay: f32,
    /// Seconds between running smoke puffs.
    pub smoke_interval: f32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            stale_timeout: 5.0,
            spawn_timeout: 5.0,
            texture_timeout: 5.0,
            sync_interval: 0.05,
            interpolation_window: 0.3,
            extrapolation_cap: 0.15,
            snap_distance: 0.005,
            velocity_smoothing: 0.7,
            rotation_lerp: 0.1,
            impulse_gravity: -25.0,
            velocity_decay: 0.9,
            smoke_interval: 0.15,
        }
    }
}

// =============================================================================
// SCORING
// =============================================================================

/// Points awarded by game modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points for collecting an item.
    pub item_points: u32,
    /// Points for activating a checkpoint.
    pub checkpoint_points: u32,
    /// Points for a shooting-mode kill.
    pub kill_points: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            item_points: 10,
            checkpoint_points: 20,
            kill_points: 10,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Session coordinator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Health restored per second while the heal button is held.
    pub heal_rate: f32,
    /// Bot limit for the standard arena.
    pub max_bots_standard: u32,
    /// Bot limit for the large arena.
    pub max_bots_large: u32,
    /// Bot count when nothing is persisted.
    pub default_bot_count: u32,
    /// Fade overlay duration before a respawn.
    pub respawn_fade_duration: f32,
    /// Height below which a falling character is respawned.
    pub kill_height: f32,
    /// Delay before survival restarts after a hazard hit.
    pub survival_restart_delay: f32,
    /// Delay between room join attempts (milliseconds).
    pub join_retry_delay_ms: u64,
    /// Number of room join attempts.
    pub join_retry_attempts: u32,
    /// Capacity of bounded event streams.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heal_rate: 15.0,
            max_bots_standard: 10,
            max_bots_large: 25,
            default_bot_count: 3,
            respawn_fade_duration: 0.5,
            kill_height: -30.0,
            survival_restart_delay: 1.5,
            join_retry_delay_ms: 1500,
            join_retry_attempts: 5,
            event_capacity: 256,
        }
    }
}

// =============================================================================
// ROOT
// =============================================================================

/// Complete kernel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Character physics.
    pub physics: PhysicsConfig,
    /// Projectiles and fire areas.
    pub projectiles: ProjectileConfig,
    /// Remote replication.
    pub replication: ReplicationConfig,
    /// Game mode scoring.
    pub scoring: ScoringConfig,
    /// Session coordinator.
    pub session: SessionConfig,
}

impl SimConfig {
    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values that would stall or invert the simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("physics.jump_force", self.physics.jump_force),
            ("physics.levitation_duration", self.physics.levitation_duration),
            ("physics.levitation_ramp_up", self.physics.levitation_ramp_up),
            ("physics.character_height", self.physics.character_height),
            ("physics.max_health", self.physics.max_health),
            ("projectiles.mortar_gravity", self.projectiles.mortar_gravity),
            ("projectiles.fire_ticks_per_second", self.projectiles.fire_ticks_per_second),
            ("replication.sync_interval", self.replication.sync_interval),
            ("replication.stale_timeout", self.replication.stale_timeout),
            ("session.respawn_fade_duration", self.session.respawn_fade_duration),
        ];

        for (name, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }

        if self.physics.gravity >= 0.0 {
            return Err(ConfigError::Invalid("physics.gravity must be negative".into()));
        }

        if !(0.0..=1.0).contains(&self.replication.velocity_smoothing) {
            return Err(ConfigError::Invalid(
                "replication.velocity_smoothing must be within [0, 1]".into(),
            ));
        }

        if self.session.event_capacity == 0 {
            return Err(ConfigError::Invalid("session.event_capacity must be non-zero".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config = SimConfig::from_json_str(r#"{ "physics": { "jump_force": 20.0 } }"#).unwrap();
        assert_eq!(config.physics.jump_force, 20.0);
        // Untouched fields keep their defaults
        assert_eq!(config.physics.gravity, -30.0);
        assert_eq!(config.scoring.item_points, 10);
    }

    #[test]
    fn test_rejects_positive_gravity() {
        let err = SimConfig::from_json_str(r#"{ "physics": { "gravity": 5.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_json() {
        let err = SimConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
