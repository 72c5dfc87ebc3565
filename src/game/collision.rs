//! Collision World
//!
//! Height-field and wall queries for characters and projectiles. The world is
//! built once per arena and is read-only to every subsystem.

use std::fmt;
use std::str::FromStr;

use glam::{Vec2, Vec3};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::config::SessionConfig;

/// Obstacles whose top is within this distance of a body's bottom can be
/// stepped onto rather than blocking.
pub const STEP_TOLERANCE: f32 = 0.1;

/// Ground queries every subsystem relies on.
pub trait CollisionWorld {
    /// Highest walkable surface under a square footprint of width `size`
    /// centered at (x, z). `f32::NEG_INFINITY` outside the arena or over a pit.
    fn ground_height(&self, x: f32, z: f32, size: f32) -> f32;

    /// Does an axis-aligned box intersect a wall?
    fn will_collide_box(&self, center: Vec3, half_extents: Vec3) -> bool;

    /// Arena bounds, if the arena has a size.
    fn bounds(&self) -> Option<ArenaBounds>;

    /// Is the footprint standing on something raised above the base floor?
    fn is_on_obstacle(&self, x: f32, z: f32, size: f32) -> bool;

    /// Cube wall check used by projectiles and simple bodies.
    fn will_collide(&self, position: Vec3, size: f32) -> bool {
        self.will_collide_box(position, Vec3::splat(size * 0.5))
    }
}

// =============================================================================
// ARENA GEOMETRY
// =============================================================================

/// Rectangular arena extent centered on the origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    /// Half width along X.
    pub half_x: f32,
    /// Half depth along Z.
    pub half_z: f32,
}

impl ArenaBounds {
    /// Create bounds from half extents.
    pub const fn new(half_x: f32, half_z: f32) -> Self {
        Self { half_x, half_z }
    }

    /// Is (x, z) inside the arena?
    pub fn contains(&self, x: f32, z: f32) -> bool {
        x.abs() <= self.half_x && z.abs() <= self.half_z
    }

    /// Clamp a point into the arena.
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(-self.half_x, self.half_x),
            p.y.clamp(-self.half_z, self.half_z),
        )
    }

    /// Bounds scaled by `factor` (e.g. 0.8 for spawn regions).
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.half_x * factor, self.half_z * factor)
    }
}

/// Axis-aligned solid block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Obstacle {
    /// Create from corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    fn overlaps_footprint(&self, x: f32, z: f32, half_x: f32, half_z: f32) -> bool {
        x - half_x < self.max.x
            && x + half_x > self.min.x
            && z - half_z < self.max.z
            && z + half_z > self.min.z
    }
}

/// Rectangular hole in the floor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeathPit {
    /// Minimum XZ corner.
    pub min: Vec2,
    /// Maximum XZ corner.
    pub max: Vec2,
}

impl DeathPit {
    fn contains(&self, x: f32, z: f32) -> bool {
        x > self.min.x && x < self.max.x && z > self.min.y && z < self.max.y
    }
}

/// Flat floor with box obstacles and pits.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArenaWorld {
    /// Base floor height.
    pub floor_height: f32,
    /// Optional arena size; without it the floor is infinite.
    pub bounds: Option<ArenaBounds>,
    /// Solid blocks.
    pub obstacles: Vec<Obstacle>,
    /// Holes in the floor.
    pub pits: Vec<DeathPit>,
}

impl ArenaWorld {
    /// An unbounded flat floor at height 0.
    pub fn flat() -> Self {
        Self::default()
    }

    /// A bounded flat floor.
    pub fn bounded(half_x: f32, half_z: f32) -> Self {
        Self {
            bounds: Some(ArenaBounds::new(half_x, half_z)),
            ..Self::default()
        }
    }

    /// Add an obstacle (builder style).
    pub fn with_obstacle(mut self, min: Vec3, max: Vec3) -> Self {
        self.obstacles.push(Obstacle::new(min, max));
        self
    }

    /// Add a death pit (builder style).
    pub fn with_pit(mut self, min: Vec2, max: Vec2) -> Self {
        self.pits.push(DeathPit { min, max });
        self
    }
}

impl CollisionWorld for ArenaWorld {
    fn ground_height(&self, x: f32, z: f32, size: f32) -> f32 {
        if let Some(bounds) = self.bounds {
            if !bounds.contains(x, z) {
                return f32::NEG_INFINITY;
            }
        }

        if self.pits.iter().any(|pit| pit.contains(x, z)) {
            return f32::NEG_INFINITY;
        }

        let half = size * 0.5;
        self.obstacles
            .iter()
            .filter(|o| o.overlaps_footprint(x, z, half, half))
            .map(|o| o.max.y)
            .fold(self.floor_height, f32::max)
    }

    fn will_collide_box(&self, center: Vec3, half_extents: Vec3) -> bool {
        let bottom = center.y - half_extents.y;
        let top = center.y + half_extents.y;

        self.obstacles.iter().any(|o| {
            o.overlaps_footprint(center.x, center.z, half_extents.x, half_extents.z)
                && o.max.y > bottom + STEP_TOLERANCE
                && o.min.y < top
        })
    }

    fn bounds(&self) -> Option<ArenaBounds> {
        self.bounds
    }

    fn is_on_obstacle(&self, x: f32, z: f32, size: f32) -> bool {
        let gh = self.ground_height(x, z, size);
        gh.is_finite() && gh > self.floor_height + 0.01
    }
}

// =============================================================================
// ARENA CATALOG
// =============================================================================

/// Unknown arena code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown arena: {0}")]
pub struct UnknownArena(pub String);

/// Named play area. Keys records and bot counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Arena {
    /// Default 40x40 arena.
    #[default]
    Standard,
    /// 80x80 arena.
    Large,
}

impl Arena {
    /// Storage / URL code.
    pub fn as_str(self) -> &'static str {
        match self {
            Arena::Standard => "standard",
            Arena::Large => "large",
        }
    }

    /// Maximum practice bots for this arena.
    pub fn max_bots(self, config: &SessionConfig) -> u32 {
        match self {
            Arena::Standard => config.max_bots_standard,
            Arena::Large => config.max_bots_large,
        }
    }

    /// Build the collision world for this arena.
    pub fn world(self) -> ArenaWorld {
        match self {
            Arena::Standard => ArenaWorld::bounded(20.0, 20.0)
                .with_obstacle(Vec3::new(-8.0, 0.0, -8.0), Vec3::new(-5.0, 1.5, -5.0))
                .with_obstacle(Vec3::new(4.0, 0.0, -2.0), Vec3::new(7.0, 3.0, 2.0))
                .with_obstacle(Vec3::new(-3.0, 0.0, 8.0), Vec3::new(3.0, 0.8, 10.0))
                .with_pit(Vec2::new(12.0, 12.0), Vec2::new(16.0, 16.0)),
            Arena::Large => ArenaWorld::bounded(40.0, 40.0)
                .with_obstacle(Vec3::new(-16.0, 0.0, -16.0), Vec3::new(-10.0, 2.0, -10.0))
                .with_obstacle(Vec3::new(10.0, 0.0, -4.0), Vec3::new(14.0, 4.0, 4.0))
                .with_obstacle(Vec3::new(-6.0, 0.0, 18.0), Vec3::new(6.0, 1.0, 22.0))
                .with_obstacle(Vec3::new(20.0, 0.0, 20.0), Vec3::new(26.0, 2.5, 26.0))
                .with_pit(Vec2::new(-30.0, 24.0), Vec2::new(-22.0, 32.0))
                .with_pit(Vec2::new(28.0, -32.0), Vec2::new(34.0, -26.0)),
        }
    }
}

impl fmt::Display for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arena {
    type Err = UnknownArena;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Arena::Standard),
            "large" => Ok(Arena::Large),
            _ => Err(UnknownArena(s.to_string())),
        }
    }
}

// =============================================================================
// RESPAWN SENTINEL
// =============================================================================

/// Fade overlay progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FadeState {
    /// No overlay.
    Clear,
    /// Fading to black before respawn (0..1).
    FadingOut(f32),
    /// Fading back in after respawn (1..0).
    FadingIn(f32),
}

/// Detects falls and deaths and drives the respawn fade.
#[derive(Clone, Debug)]
pub struct RespawnMonitor {
    state: FadeState,
    fade_duration: f32,
    kill_height: f32,
}

impl RespawnMonitor {
    /// Create a monitor.
    pub fn new(fade_duration: f32, kill_height: f32) -> Self {
        Self {
            state: FadeState::Clear,
            fade_duration: fade_duration.max(1e-3),
            kill_height,
        }
    }

    /// Current fade state.
    pub fn state(&self) -> FadeState {
        self.state
    }

    /// Overlay opacity in [0, 1] for the renderer.
    pub fn overlay_alpha(&self) -> f32 {
        match self.state {
            FadeState::Clear => 0.0,
            FadeState::FadingOut(t) | FadeState::FadingIn(t) => t,
        }
    }

    /// Is a respawn fade-out in progress?
    pub fn is_respawning(&self) -> bool {
        matches!(self.state, FadeState::FadingOut(_))
    }

    /// Advance the sentinel. Returns `true` exactly once per death, when the
    /// fade-out completes and the session must respawn the character.
    pub fn update_respawn_system(
        &mut self,
        position: Vec3,
        health: f32,
        world: &dyn CollisionWorld,
        dt: f32,
    ) -> bool {
        let step = dt / self.fade_duration;

        match self.state {
            FadeState::Clear | FadeState::FadingIn(_) => {
                let fell = position.y < self.kill_height;
                let outside = world
                    .bounds()
                    .is_some_and(|b| !b.contains(position.x, position.z) && position.y < world_floor(world));
                if fell || outside || health <= 0.0 {
                    self.state = FadeState::FadingOut(0.0);
                } else if let FadeState::FadingIn(t) = self.state {
                    let t = t - step;
                    self.state = if t <= 0.0 { FadeState::Clear } else { FadeState::FadingIn(t) };
                }
                false
            }
            FadeState::FadingOut(t) => {
                let t = t + step;
                if t >= 1.0 {
                    self.state = FadeState::FadingIn(1.0);
                    true
                } else {
                    self.state = FadeState::FadingOut(t);
                    false
                }
            }
        }
    }
}

/// Reference floor used to decide that an out-of-bounds body has dropped.
fn world_floor(world: &dyn CollisionWorld) -> f32 {
    let gh = world.ground_height(0.0, 0.0, 0.0);
    if gh.is_finite() { gh - 2.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_height_flat_and_obstacle() {
        let world = ArenaWorld::bounded(10.0, 10.0)
            .with_obstacle(Vec3::new(2.0, 0.0, 2.0), Vec3::new(4.0, 1.5, 4.0));

        assert_eq!(world.ground_height(0.0, 0.0, 1.0), 0.0);
        assert_eq!(world.ground_height(3.0, 3.0, 1.0), 1.5);
        // Footprint straddling the obstacle edge still reports its top
        assert_eq!(world.ground_height(1.8, 3.0, 1.0), 1.5);
    }

    #[test]
    fn test_ground_height_outside_bounds_is_neg_infinity() {
        let world = ArenaWorld::bounded(10.0, 10.0);
        assert_eq!(world.ground_height(11.0, 0.0, 1.0), f32::NEG_INFINITY);
    }

    #[test]
    fn test_unbounded_world_has_floor_everywhere() {
        let world = ArenaWorld::flat();
        assert_eq!(world.ground_height(1000.0, -500.0, 1.0), 0.0);
        assert!(world.bounds().is_none());
    }

    #[test]
    fn test_pit_is_neg_infinity() {
        let world = ArenaWorld::bounded(10.0, 10.0)
            .with_pit(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        assert_eq!(world.ground_height(2.0, 2.0, 1.0), f32::NEG_INFINITY);
        assert_eq!(world.ground_height(5.0, 5.0, 1.0), 0.0);
    }

    #[test]
    fn test_will_collide_wall_but_not_step() {
        let world = ArenaWorld::flat()
            .with_obstacle(Vec3::new(2.0, 0.0, -1.0), Vec3::new(3.0, 3.0, 1.0))
            .with_obstacle(Vec3::new(-3.0, 0.0, -1.0), Vec3::new(-2.0, 0.05, 1.0));

        // Body standing on the floor, overlapping the tall wall
        assert!(world.will_collide_box(Vec3::new(2.2, 1.0, 0.0), Vec3::new(0.5, 1.0, 0.5)));
        // Same body over the low step
        assert!(!world.will_collide_box(Vec3::new(-2.2, 1.0, 0.0), Vec3::new(0.5, 1.0, 0.5)));
        // Projectile cube flying over the wall
        assert!(!world.will_collide(Vec3::new(2.5, 4.0, 0.0), 0.5));
    }

    #[test]
    fn test_is_on_obstacle() {
        let world = Arena::Standard.world();
        assert!(world.is_on_obstacle(-6.5, -6.5, 1.0));
        assert!(!world.is_on_obstacle(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_arena_parse() {
        assert_eq!("standard".parse::<Arena>(), Ok(Arena::Standard));
        assert_eq!("LARGE".parse::<Arena>(), Ok(Arena::Large));
        assert!("moon".parse::<Arena>().is_err());
    }

    #[test]
    fn test_arena_bot_limits() {
        let config = SessionConfig::default();
        assert_eq!(Arena::Standard.max_bots(&config), 10);
        assert_eq!(Arena::Large.max_bots(&config), 25);
    }

    #[test]
    fn test_respawn_monitor_fall() {
        let world = ArenaWorld::bounded(10.0, 10.0);
        let mut monitor = RespawnMonitor::new(0.5, -30.0);

        // Standing: nothing happens
        assert!(!monitor.update_respawn_system(Vec3::new(0.0, 1.0, 0.0), 100.0, &world, 0.1));
        assert_eq!(monitor.state(), FadeState::Clear);

        // Fell below kill height: fade starts
        assert!(!monitor.update_respawn_system(Vec3::new(0.0, -40.0, 0.0), 100.0, &world, 0.1));
        assert!(monitor.is_respawning());

        let mut fired = 0;
        for _ in 0..10 {
            if monitor.update_respawn_system(Vec3::new(0.0, -50.0, 0.0), 100.0, &world, 0.1) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_respawn_monitor_death() {
        let world = ArenaWorld::flat();
        let mut monitor = RespawnMonitor::new(0.2, -30.0);
        monitor.update_respawn_system(Vec3::ZERO, 0.0, &world, 0.05);
        assert!(monitor.is_respawning());
        assert!(monitor.overlay_alpha() < 0.01);
    }
}
