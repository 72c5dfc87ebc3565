//! Shared State Definitions
//!
//! Identifiers and the local character record that every subsystem reads.

use std::fmt;
use std::str::FromStr;

use glam::{Vec2, Vec3};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::PhysicsConfig;
use crate::game::animation::{AnimKey, Facing};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID).
///
/// Implements Ord so tables keyed by player iterate in a stable order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[derive(Default)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Id from a fixed integer (bots, tests).
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Parse from a UUID string.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// First eight hex digits, for logs.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CHARACTER NAME
// =============================================================================

/// Unknown character name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown character: {0}")]
pub struct UnknownCharacter(pub String);

/// Playable characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum CharacterName {
    /// Fast constant-speed firebolts, poison melee.
    #[default]
    Lucy,
    /// Steerable accelerating firebolts.
    Herald,
}

impl CharacterName {
    /// All playable characters.
    pub const ALL: [CharacterName; 2] = [CharacterName::Lucy, CharacterName::Herald];

    /// Wire / storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            CharacterName::Lucy => "lucy",
            CharacterName::Herald => "herald",
        }
    }

    /// Character selected by the swap button.
    pub fn next(self) -> Self {
        match self {
            CharacterName::Lucy => CharacterName::Herald,
            CharacterName::Herald => CharacterName::Lucy,
        }
    }

    /// Does sprinting switch this character to its hovering alternate form
    /// (idle strip instead of walk)?
    pub fn sprint_uses_idle(self) -> bool {
        matches!(self, CharacterName::Herald)
    }
}

impl fmt::Display for CharacterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CharacterName {
    type Err = UnknownCharacter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lucy" => Ok(CharacterName::Lucy),
            "herald" => Ok(CharacterName::Herald),
            _ => Err(UnknownCharacter(s.to_string())),
        }
    }
}

// =============================================================================
// CHARACTER
// =============================================================================

/// Levitation sub-state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Levitation {
    /// Currently levitating.
    pub active: bool,
    /// Seconds of levitation left in this activation.
    pub time_remaining: f32,
    /// Duration granted at activation.
    pub initial_duration: f32,
    /// Seconds until levitation may start again.
    pub cooldown: f32,
    /// Seconds spent ramping up in this activation.
    pub ramp_up_time: f32,
}

/// Vertical physics state of a character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsState {
    /// Vertical velocity.
    pub velocity_y: f32,
    /// On the ground this tick.
    pub is_grounded: bool,
    /// On the ground last tick.
    pub was_grounded: bool,
    /// Seconds until a ground jump is allowed.
    pub jump_cooldown: f32,
    /// Double jump consumed since leaving the ground.
    pub has_double_jumped: bool,
    /// Levitation state.
    pub levitation: Levitation,
}

/// The local player's character. Exclusively owned by its session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    /// Owning player.
    pub id: PlayerId,
    /// Which character is being played.
    pub name: CharacterName,
    /// Center of the body.
    pub position: Vec3,
    /// Horizontal velocity (x, z) from the last movement step.
    pub velocity_xz: Vec2,
    /// Sprite facing.
    pub facing: Facing,
    /// Animation currently shown.
    pub anim_key: AnimKey,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Body height.
    pub height: f32,
    /// Footprint width.
    pub size: f32,
    /// Sprinting this tick.
    pub is_running: bool,
    /// Vertical physics.
    pub physics: PhysicsState,
}

impl Character {
    /// Create a grounded character at `position`.
    pub fn new(id: PlayerId, name: CharacterName, position: Vec3, config: &PhysicsConfig) -> Self {
        Self {
            id,
            name,
            position,
            velocity_xz: Vec2::ZERO,
            facing: Facing::Front,
            anim_key: AnimKey::idle(Facing::Front),
            health: config.max_health,
            max_health: config.max_health,
            height: config.character_height,
            size: config.character_size,
            is_running: false,
            physics: PhysicsState {
                is_grounded: true,
                was_grounded: true,
                ..PhysicsState::default()
            },
        }
    }

    /// Y of the character's feet.
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.position.y - self.height * 0.5
    }

    /// Half extents of the collision box.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.size * 0.5, self.height * 0.5, self.size * 0.5)
    }

    /// Is the character alive?
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Did the character move horizontally this tick?
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.velocity_xz.length_squared() > 1e-6
    }

    /// Apply damage, clamping at zero. Returns the damage actually taken.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        let before = self.health;
        self.health = (self.health - amount.max(0.0)).max(0.0);
        before - self.health
    }

    /// Restore health, clamping at max. Returns the amount healed.
    pub fn heal(&mut self, amount: f32) -> f32 {
        let before = self.health;
        self.health = (self.health + amount.max(0.0)).min(self.max_health);
        self.health - before
    }
}
