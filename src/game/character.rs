//! Character Physics
//!
//! Gravity, jumps, double jumps and levitation for the local character.
//! The per-tick order is fixed: cooldowns, gravity, levitation, integration,
//! ground resolution.

use glam::{Vec2, Vec3};
use tracing::debug;

use crate::config::PhysicsConfig;
use crate::core::rng::SimRng;
use crate::game::collision::CollisionWorld;
use crate::game::mode::GameMode;
use crate::game::state::Character;

/// Fraction of the arena used for random shooting-mode spawns.
pub const SPAWN_REGION_FACTOR: f32 = 0.8;

/// Random spawn picks before falling back to the arena center.
const SPAWN_ATTEMPTS: u32 = 16;

/// Outcome of one physics step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhysicsStep {
    /// Touched down this tick after being airborne.
    pub landed: bool,
    /// Levitation began this tick.
    pub levitation_started: bool,
    /// Levitation ended this tick; carries the resulting cooldown.
    pub levitation_ended: Option<f32>,
}

/// Character physics integrator.
#[derive(Clone, Debug, Default)]
pub struct CharacterPhysics {
    config: PhysicsConfig,
}

impl CharacterPhysics {
    /// Create with tuning.
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Tuning in use.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Advance vertical physics by `dt`.
    pub fn step(
        &self,
        ch: &mut Character,
        wants_levitation: bool,
        world: &dyn CollisionWorld,
        dt: f32,
    ) -> PhysicsStep {
        let mut out = PhysicsStep::default();
        let cfg = &self.config;
        let phys = &mut ch.physics;

        // 1. Cooldowns
        phys.jump_cooldown = (phys.jump_cooldown - dt).max(0.0);
        phys.levitation.cooldown = (phys.levitation.cooldown - dt).max(0.0);

        // 2. Gravity
        phys.velocity_y += cfg.gravity * dt;

        // 3. Levitation gate
        let lev = &mut phys.levitation;
        if wants_levitation && lev.cooldown <= 0.0 && !lev.active {
            lev.active = true;
            lev.initial_duration = cfg.levitation_duration;
            lev.time_remaining = cfg.levitation_duration;
            lev.ramp_up_time = 0.0;
            out.levitation_started = true;
        }

        if lev.active {
            if wants_levitation && lev.time_remaining > 0.0 {
                lev.ramp_up_time += dt;
                let ramp = (lev.ramp_up_time / cfg.levitation_ramp_up).min(1.0);
                phys.velocity_y += cfg.levitation_force * ramp * dt;
                lev.time_remaining -= dt;
            } else {
                let used = (lev.initial_duration - lev.time_remaining.max(0.0)).max(0.0);
                lev.cooldown = (used / lev.initial_duration) * cfg.levitation_max_cooldown;
                lev.active = false;
                lev.time_remaining = 0.0;
                out.levitation_ended = Some(lev.cooldown);
                debug!(used, cooldown = lev.cooldown, "levitation ended");
            }
        }

        // 4. Integrate
        ch.position.y += phys.velocity_y * dt;

        // 5. Ground
        let gh = world.ground_height(ch.position.x, ch.position.z, ch.size);
        let bottom = ch.position.y - ch.height * 0.5;
        let phys = &mut ch.physics;
        phys.was_grounded = phys.is_grounded;

        if gh != f32::NEG_INFINITY && bottom <= gh {
            ch.position.y = gh + ch.height * 0.5;
            phys.velocity_y = 0.0;
            phys.is_grounded = true;
            phys.has_double_jumped = false;
            if !phys.was_grounded {
                out.landed = true;
            }
        } else {
            phys.is_grounded = false;
        }

        out
    }

    /// Ground jump. Succeeds iff grounded and off cooldown.
    pub fn jump(&self, ch: &mut Character) -> bool {
        let phys = &mut ch.physics;
        if !phys.is_grounded || phys.jump_cooldown > 0.0 {
            return false;
        }
        phys.velocity_y = self.config.jump_force;
        phys.jump_cooldown = self.config.jump_cooldown;
        phys.is_grounded = false;
        true
    }

    /// Air jump. Succeeds iff airborne and not yet used; ignores jump cooldown.
    pub fn double_jump(&self, ch: &mut Character) -> bool {
        let phys = &mut ch.physics;
        if phys.is_grounded || phys.has_double_jumped {
            return false;
        }
        phys.velocity_y = self.config.double_jump_factor * self.config.jump_force;
        phys.has_double_jumped = true;
        true
    }

    /// Move horizontally along `direction` (x, z), resolving each axis
    /// separately against walls so the character slides along them.
    pub fn move_horizontal(
        &self,
        ch: &mut Character,
        direction: Vec2,
        sprint: bool,
        world: &dyn CollisionWorld,
        dt: f32,
    ) {
        let dir = if direction.length_squared() > 1.0 {
            direction.normalize()
        } else {
            direction
        };

        let speed = if sprint {
            self.config.move_speed * self.config.sprint_multiplier
        } else {
            self.config.move_speed
        };

        let delta = dir * speed * dt;
        let half = ch.half_extents();
        let start = ch.position;

        let try_x = ch.position + Vec3::new(delta.x, 0.0, 0.0);
        if !world.will_collide_box(try_x, half) {
            ch.position = try_x;
        }

        let try_z = ch.position + Vec3::new(0.0, 0.0, delta.y);
        if !world.will_collide_box(try_z, half) {
            ch.position = try_z;
        }

        ch.velocity_xz = if dt > 0.0 {
            Vec2::new(ch.position.x - start.x, ch.position.z - start.z) / dt
        } else {
            Vec2::ZERO
        };
        ch.is_running = sprint && ch.is_moving();
    }

    /// Place the character at a spawn point with full health and reset
    /// physics. Shooting mode picks a random point within 80 % of the arena,
    /// skipping points over a pit.
    pub fn respawn(
        &self,
        ch: &mut Character,
        mode: GameMode,
        world: &dyn CollisionWorld,
        rng: &mut SimRng,
    ) {
        let spawn_xz = match (mode, world.bounds()) {
            (GameMode::Shooting, Some(bounds)) => {
                let region = bounds.scaled(SPAWN_REGION_FACTOR);
                (0..SPAWN_ATTEMPTS)
                    .map(|_| region.clamp(rng.point_in_rect(region.half_x, region.half_z)))
                    .find(|p| world.ground_height(p.x, p.y, ch.size).is_finite())
                    .unwrap_or(Vec2::ZERO)
            }
            _ => Vec2::ZERO,
        };

        let gh = world.ground_height(spawn_xz.x, spawn_xz.y, ch.size);
        let floor = if gh.is_finite() { gh } else { 0.0 };

        ch.position = Vec3::new(spawn_xz.x, floor + ch.height * 0.5, spawn_xz.y);
        ch.velocity_xz = Vec2::ZERO;
        ch.health = ch.max_health;
        ch.is_running = false;
        ch.physics = crate::game::state::PhysicsState {
            is_grounded: true,
            was_grounded: true,
            ..Default::default()
        };

        debug!(x = spawn_xz.x, z = spawn_xz.y, ?mode, "character respawned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::collision::ArenaWorld;
    use crate::game::state::{CharacterName, PlayerId};

    fn grounded_character() -> (CharacterPhysics, Character) {
        let physics = CharacterPhysics::default();
        let ch = Character::new(
            PlayerId::from_u128(1),
            CharacterName::Lucy,
            Vec3::new(0.0, 1.0, 0.0),
            physics.config(),
        );
        (physics, ch)
    }

    #[test]
    fn test_standing_stays_grounded() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::flat();

        for _ in 0..30 {
            let step = physics.step(&mut ch, false, &world, 1.0 / 60.0);
            assert!(!step.landed);
        }
        assert!(ch.physics.is_grounded);
        assert!((ch.bottom() - 0.0).abs() < 1e-5);
    }

    #[test]
    fn test_double_jump_consumes_once() {
        let (physics, mut ch) = grounded_character();
        let jump_force = physics.config().jump_force;

        assert!(physics.jump(&mut ch));
        assert_eq!(ch.physics.velocity_y, jump_force);
        assert!(!ch.physics.is_grounded);
        assert!(!ch.physics.has_double_jumped);

        assert!(physics.double_jump(&mut ch));
        assert!((ch.physics.velocity_y - 0.8 * jump_force).abs() < 1e-6);
        assert!(ch.physics.has_double_jumped);

        let vy = ch.physics.velocity_y;
        assert!(!physics.double_jump(&mut ch));
        assert!(!physics.jump(&mut ch));
        assert_eq!(ch.physics.velocity_y, vy);
    }

    #[test]
    fn test_jump_respects_cooldown_and_landing_event() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::flat();

        assert!(physics.jump(&mut ch));

        let mut landed = 0;
        for _ in 0..120 {
            if physics.step(&mut ch, false, &world, 1.0 / 60.0).landed {
                landed += 1;
            }
        }
        assert_eq!(landed, 1);
        assert!(ch.physics.is_grounded);
        assert!(!ch.physics.has_double_jumped);

        // Cooldown elapsed during the flight
        assert!(physics.jump(&mut ch));
        // Immediately re-grounded jump attempt is blocked by cooldown
        ch.physics.is_grounded = true;
        assert!(!physics.jump(&mut ch));
    }

    #[test]
    fn test_levitation_proportional_cooldown() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::flat();
        let cfg = physics.config().clone();

        let first = physics.step(&mut ch, true, &world, 0.1);
        assert!(first.levitation_started);
        for _ in 0..4 {
            physics.step(&mut ch, true, &world, 0.1);
        }
        assert!(ch.physics.levitation.active);

        let end = physics.step(&mut ch, false, &world, 0.1);
        let expected = (0.5 / cfg.levitation_duration) * cfg.levitation_max_cooldown;
        let cooldown = end.levitation_ended.unwrap();
        assert!((cooldown - expected).abs() < 1e-4, "cooldown {cooldown} != {expected}");
        assert!(!ch.physics.levitation.active);

        // Cannot restart while cooling down
        let again = physics.step(&mut ch, true, &world, 0.1);
        assert!(!again.levitation_started);
    }

    #[test]
    fn test_levitation_full_duration_gives_max_cooldown() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::flat();
        let cfg = physics.config().clone();

        let mut ended = None;
        for _ in 0..100 {
            let step = physics.step(&mut ch, true, &world, 0.05);
            if let Some(cd) = step.levitation_ended {
                ended = Some(cd);
                break;
            }
        }
        let cd = ended.unwrap();
        assert!((cd - cfg.levitation_max_cooldown).abs() < 1e-3);
    }

    #[test]
    fn test_levitation_lifts_character() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::flat();
        for _ in 0..30 {
            physics.step(&mut ch, true, &world, 1.0 / 60.0);
        }
        assert!(ch.bottom() > 0.0);
        assert!(!ch.physics.is_grounded);
    }

    #[test]
    fn test_free_fall_outside_arena() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::bounded(5.0, 5.0);
        ch.position.x = 8.0;

        for _ in 0..30 {
            physics.step(&mut ch, false, &world, 1.0 / 60.0);
        }
        assert!(!ch.physics.is_grounded);
        assert!(ch.bottom() < 0.0);
    }

    #[test]
    fn test_walls_block_horizontal_movement() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::flat()
            .with_obstacle(Vec3::new(1.0, 0.0, -5.0), Vec3::new(2.0, 3.0, 5.0));

        for _ in 0..60 {
            physics.move_horizontal(&mut ch, Vec2::new(1.0, 0.0), false, &world, 1.0 / 60.0);
        }
        assert!(ch.position.x + ch.size * 0.5 <= 1.0 + 1e-4);
    }

    #[test]
    fn test_shooting_respawn_within_region() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::bounded(20.0, 10.0);
        let mut rng = SimRng::new(3);

        for _ in 0..200 {
            ch.health = 0.0;
            physics.respawn(&mut ch, GameMode::Shooting, &world, &mut rng);
            assert!(ch.position.x.abs() <= 16.0 + 1e-4);
            assert!(ch.position.z.abs() <= 8.0 + 1e-4);
            assert_eq!(ch.health, ch.max_health);
            assert!(ch.physics.is_grounded);
        }
    }

    #[test]
    fn test_shooting_respawn_skips_pits() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::bounded(10.0, 10.0).with_pit(Vec2::new(-8.0, -8.0), Vec2::new(8.0, -1.0));
        let mut rng = SimRng::new(11);

        for _ in 0..100 {
            physics.respawn(&mut ch, GameMode::Shooting, &world, &mut rng);
            assert!(world.ground_height(ch.position.x, ch.position.z, ch.size).is_finite());
        }
    }

    #[test]
    fn test_other_modes_respawn_at_origin() {
        let (physics, mut ch) = grounded_character();
        let world = ArenaWorld::bounded(20.0, 20.0);
        let mut rng = SimRng::new(3);
        ch.position = Vec3::new(5.0, -40.0, 5.0);
        physics.respawn(&mut ch, GameMode::TimeTrial, &world, &mut rng);
        assert_eq!(ch.position.x, 0.0);
        assert_eq!(ch.position.z, 0.0);
        assert!((ch.bottom()).abs() < 1e-5);
    }
}
