//! Firebolt: direct-fire projectile with optional homing and a
//! character-specific speed profile.

use glam::{Vec2, Vec3};
use serde::{Serialize, Deserialize};

use crate::config::ProjectileConfig;
use crate::core::math::{lerp, xz};
use crate::game::collision::CollisionWorld;
use crate::game::stats::{FireboltStats, SpeedProfile};

use super::{AimContext, ProjectileCommon, VictimBody};

/// Control input at or above this engages overdrive.
const FULL_CONTROL: f32 = 0.999;

/// Outcome of advancing a firebolt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FireboltStep {
    /// Still flying.
    Flying,
    /// Lifetime ran out.
    Expired,
    /// Would enter a wall; removed.
    HitWall,
}

/// A firebolt in flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Firebolt {
    /// Shared projectile data.
    pub common: ProjectileCommon,
    /// Current position.
    pub position: Vec3,
    /// Launch point on the ground plane.
    pub origin: Vec2,
    /// Horizontal velocity (x, z).
    pub velocity: Vec2,
    /// Resolved base speed.
    pub base_speed: f32,
    /// Speed at launch.
    pub start_speed: f32,
    /// Highest reachable speed.
    pub end_speed: f32,
    /// Speed reached so far; never decreases.
    pub current_max_speed: f32,
    /// Collision box size.
    pub size: f32,
    /// Last adopted homing target.
    pub target: Option<Vec2>,
    /// Normalized launch direction.
    pub initial_direction: Vec2,
    /// Homing strength in [0, 1].
    pub follow_strength: f32,
    /// A victim was hit; no further damage.
    pub has_hit: bool,
    /// Speed policy.
    pub profile: SpeedProfile,
}

impl Firebolt {
    /// Launch from `origin` along `direction`. `None` if the direction is
    /// too short to normalize.
    pub fn launch(
        common: ProjectileCommon,
        origin: Vec3,
        direction: Vec2,
        stats: &FireboltStats,
        min_direction: f32,
    ) -> Option<Self> {
        if direction.length() < min_direction {
            return None;
        }
        let dir = direction.normalize_or_zero();
        if dir == Vec2::ZERO {
            return None;
        }

        let base = stats.speed;
        let (start_speed, end_speed) = match stats.profile {
            SpeedProfile::Constant => (base, base),
            SpeedProfile::Accelerating { min, max, overdrive, .. } => {
                (base * min, base * max * overdrive.max(1.0))
            }
        };

        Some(Self {
            common,
            position: origin,
            origin: xz(origin),
            velocity: dir * start_speed,
            base_speed: base,
            start_speed,
            end_speed,
            current_max_speed: start_speed,
            size: stats.size,
            target: None,
            initial_direction: dir,
            follow_strength: stats.follow_strength,
            has_hit: false,
            profile: stats.profile,
        })
    }

    /// Current speed.
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Distance along the launch axis from the launch point.
    fn along_axis(&self, p: Vec2) -> f32 {
        (p - self.origin).dot(self.initial_direction)
    }

    /// Pick a live homing target from the aim context.
    fn live_target(&self, aim: &AimContext, config: &ProjectileConfig) -> Option<Vec2> {
        if let Some(point) = aim.stick_target(config.stick_aim_range) {
            return Some(point);
        }
        let cursor = aim.cursor?;
        // Never steer back toward the shooter
        (self.along_axis(cursor) > self.along_axis(xz(self.position))).then_some(cursor)
    }

    /// Speed the profile asks for this tick.
    fn desired_speed(&self, aim: Option<&AimContext>, config: &ProjectileConfig) -> f32 {
        match self.profile {
            SpeedProfile::Constant => self.base_speed,
            SpeedProfile::Accelerating { min, max, overdrive, .. } => {
                match aim.and_then(|a| a.control_input(config.cursor_control_span)) {
                    Some(c) if c >= FULL_CONTROL => self.base_speed * max * overdrive.max(1.0),
                    Some(c) => self.base_speed * lerp(min, max, c),
                    None => self.base_speed * min,
                }
            }
        }
    }

    /// Advance one tick. `aim` is only supplied for bolts the local player
    /// owns; `shooter_y` pins flight height to the shooter.
    pub fn advance(
        &mut self,
        dt: f32,
        aim: Option<&AimContext>,
        shooter_y: Option<f32>,
        world: &dyn CollisionWorld,
        config: &ProjectileConfig,
    ) -> FireboltStep {
        // 1. Lifetime
        self.common.age += dt;
        if self.common.age >= self.common.max_lifetime {
            return FireboltStep::Expired;
        }

        // 2. Homing
        if self.follow_strength > 0.0 {
            if let Some(target) = aim.and_then(|a| self.live_target(a, config)) {
                self.target = Some(target);
                let speed = self.speed();
                let dir = self.velocity.normalize_or(self.initial_direction);
                let to_target = (target - xz(self.position)).normalize_or_zero();
                if to_target != Vec2::ZERO {
                    let t = (self.follow_strength * dt * config.homing_rate).min(1.0);
                    let steered = dir.lerp(to_target, t).normalize_or(dir);
                    self.velocity = steered * speed;
                }
            }
        }

        // 3. Speed policy
        let target_speed = match self.profile {
            SpeedProfile::Constant => self.base_speed,
            SpeedProfile::Accelerating { acceleration, .. } => {
                let desired = self.desired_speed(aim, config).min(self.end_speed);
                let approached = (self.current_max_speed + acceleration * dt).min(desired);
                self.current_max_speed = self.current_max_speed.max(approached);
                self.current_max_speed
            }
        };
        self.velocity = self.velocity.normalize_or(self.initial_direction) * target_speed;

        // 4. Integrate
        let mut next = self.position;
        next.x += self.velocity.x * dt;
        next.z += self.velocity.y * dt;
        if let Some(y) = shooter_y {
            next.y = y;
        }

        // 5. Walls
        if world.will_collide(next, self.size) {
            return FireboltStep::HitWall;
        }
        self.position = next;
        FireboltStep::Flying
    }

    /// Does this bolt strike `victim`? Self hits and spent bolts never do.
    pub fn hits(&self, victim: &VictimBody) -> bool {
        if self.has_hit || victim.id == self.common.owner {
            return false;
        }
        let half = self.size * 0.5;
        let v_half = victim.size * 0.5;
        let v_bottom = victim.position.y - victim.height * 0.5;
        let v_top = victim.position.y + victim.height * 0.5;

        (self.position.x - victim.position.x).abs() < half + v_half
            && (self.position.z - victim.position.z).abs() < half + v_half
            && self.position.y + half > v_bottom
            && self.position.y - half < v_top
    }
}
