//! Mortar: ballistic arc toward a fixed ground target, splashing into a fire
//! area on arrival. A direct hit on the way never cancels the splash.

use glam::{Vec2, Vec3};
use serde::{Serialize, Deserialize};

use crate::config::ProjectileConfig;
use crate::core::math::{distance_xz, xz};
use crate::game::collision::CollisionWorld;
use crate::game::stats::MortarStats;

use super::{ProjectileCommon, VictimBody};

/// Launch velocity for an arc of apex `arc_height` that lands at `target`
/// after `2·√(2h/g)` seconds.
pub fn launch_velocity(origin: Vec3, target: Vec2, arc_height: f32, gravity: f32) -> Vec3 {
    let g = gravity.abs().max(1e-3);
    let h = arc_height.max(1e-3);
    let time_to_peak = (2.0 * h / g).sqrt();
    let total_time = 2.0 * time_to_peak;

    let delta = target - xz(origin);
    let dist = delta.length();
    let horizontal = if dist > 1e-4 {
        delta / dist * (dist / total_time)
    } else {
        Vec2::ZERO
    };

    Vec3::new(horizontal.x, g * time_to_peak, horizontal.y)
}

/// Outcome of advancing a mortar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MortarStep {
    /// Still in the air.
    Flying,
    /// Reached the ground at its target; carries the splash center.
    Impact(Vec3),
    /// Lifetime ran out without an impact.
    Expired,
}

/// A mortar shell in flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mortar {
    /// Shared projectile data.
    pub common: ProjectileCommon,
    /// Current position (shell center).
    pub position: Vec3,
    /// Velocity.
    pub velocity: Vec3,
    /// Ground target (x, z).
    pub target: Vec2,
    /// Apex height.
    pub arc_height: f32,
    /// Radius of the fire area produced on impact.
    pub splash_radius: f32,
    /// Lifetime of the fire area.
    pub fire_duration: f32,
    /// Fire area damage per tick.
    pub area_damage: f32,
    /// Shell size.
    pub size: f32,
    /// A direct hit was delivered.
    pub has_exploded: bool,
    /// The direct hit struck a player.
    pub hit_player: bool,
}

impl Mortar {
    /// Launch from `origin` toward `target`.
    pub fn launch(
        common: ProjectileCommon,
        origin: Vec3,
        target: Vec2,
        stats: &MortarStats,
        config: &ProjectileConfig,
    ) -> Self {
        Self {
            common,
            position: origin,
            velocity: launch_velocity(origin, target, stats.arc_height, config.mortar_gravity),
            target,
            arc_height: stats.arc_height,
            splash_radius: stats.splash_radius,
            fire_duration: stats.fire_duration,
            area_damage: stats.area_damage,
            size: stats.size,
            has_exploded: false,
            hit_player: false,
        }
    }

    /// Bottom of the shell.
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.position.y - self.size * 0.5
    }

    /// Advance one tick.
    pub fn advance(
        &mut self,
        dt: f32,
        world: &dyn CollisionWorld,
        config: &ProjectileConfig,
    ) -> MortarStep {
        self.common.age += dt;
        if self.common.age >= self.common.max_lifetime {
            return MortarStep::Expired;
        }

        self.velocity.y -= config.mortar_gravity * dt;
        self.position += self.velocity * dt;

        if self.velocity.y >= 0.0 {
            return MortarStep::Flying;
        }

        // Long arcs come down past the target; the splash still lands on it
        let gh = world.ground_height(self.target.x, self.target.y, self.size);
        let to_target = self.target - xz(self.position);
        let heading = Vec2::new(self.velocity.x, self.velocity.z);
        let at_target = to_target.length() < config.impact_tolerance;
        let overshot = heading.length_squared() > 1e-8 && to_target.dot(heading) <= 0.0;
        if gh.is_finite() && self.bottom() <= gh && (at_target || overshot) {
            return MortarStep::Impact(Vec3::new(self.target.x, gh, self.target.y));
        }

        MortarStep::Flying
    }

    /// Mid-air detonation against a victim within the explosion radius
    /// (horizontal). Latches; the shell keeps flying to its target.
    pub fn check_direct_hit(&mut self, victim: &VictimBody, config: &ProjectileConfig) -> bool {
        if self.has_exploded || victim.id == self.common.owner {
            return false;
        }
        if distance_xz(self.position, victim.position) <= config.explosion_radius {
            self.has_exploded = true;
            self.hit_player = true;
            return true;
        }
        false
    }

    /// Direct hit while descending close to the ground. Latches like
    /// `check_direct_hit`.
    pub fn check_ground_hit(
        &mut self,
        victim: &VictimBody,
        world: &dyn CollisionWorld,
        config: &ProjectileConfig,
    ) -> bool {
        if self.has_exploded || victim.id == self.common.owner || self.velocity.y >= 0.0 {
            return false;
        }
        let gh = world.ground_height(self.position.x, self.position.z, self.size);
        if !gh.is_finite() || self.bottom() - gh > config.near_ground_band {
            return false;
        }
        if distance_xz(self.position, victim.position) <= self.size + config.near_ground_margin {
            self.has_exploded = true;
            self.hit_player = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::collision::ArenaWorld;
    use crate::game::state::{CharacterName, PlayerId};
    use crate::game::stats::StatsResolver;
    use proptest::prelude::*;

    fn mortar(origin: Vec3, target: Vec2) -> Mortar {
        let stats = StatsResolver::default().mortar_stats(CharacterName::Lucy);
        let common = ProjectileCommon {
            id: 1,
            owner: PlayerId::from_u128(1),
            character: CharacterName::Lucy,
            spawn_time: 0.0,
            age: 0.0,
            max_lifetime: 5.0,
            damage: stats.damage,
            color: 0,
        };
        Mortar::launch(common, origin, target, &stats, &ProjectileConfig::default())
    }

    fn fly(m: &mut Mortar, world: &dyn CollisionWorld) -> MortarStep {
        let cfg = ProjectileConfig::default();
        for _ in 0..600 {
            match m.advance(1.0 / 60.0, world, &cfg) {
                MortarStep::Flying => continue,
                other => return other,
            }
        }
        MortarStep::Flying
    }

    #[test]
    fn test_launch_velocity_formula() {
        let v = launch_velocity(Vec3::ZERO, Vec2::new(8.0, 0.0), 5.0, 20.0);
        // time_to_peak = sqrt(0.5), total = 2·sqrt(0.5)
        let ttp = 0.5f32.sqrt();
        assert!((v.y - 20.0 * ttp).abs() < 1e-4);
        assert!((v.x - 8.0 / (2.0 * ttp)).abs() < 1e-4);
        assert_eq!(v.z, 0.0);
    }

    #[test]
    fn test_impacts_at_target() {
        let world = ArenaWorld::flat();
        let mut m = mortar(Vec3::new(0.0, 1.0, 0.0), Vec2::new(5.0, 0.0));
        match fly(&mut m, &world) {
            MortarStep::Impact(center) => assert_eq!(center, Vec3::new(5.0, 0.0, 0.0)),
            other => panic!("expected impact, got {other:?}"),
        }
    }

    #[test]
    fn test_expires_over_pit() {
        let world = ArenaWorld::flat().with_pit(Vec2::new(4.0, -1.0), Vec2::new(6.0, 1.0));
        let mut m = mortar(Vec3::new(0.0, 1.0, 0.0), Vec2::new(5.0, 0.0));
        assert_eq!(fly(&mut m, &world), MortarStep::Expired);
    }

    #[test]
    fn test_direct_hit_latches_and_keeps_flying() {
        let world = ArenaWorld::flat();
        let cfg = ProjectileConfig::default();
        let mut m = mortar(Vec3::new(0.0, 1.0, 0.0), Vec2::new(5.0, 0.0));
        let victim = VictimBody {
            id: PlayerId::from_u128(2),
            position: Vec3::new(2.0, 1.0, 0.0),
            size: 1.0,
            height: 2.0,
        };

        m.advance(1.0 / 60.0, &world, &cfg);
        assert!(m.check_direct_hit(&victim, &cfg));
        assert!(m.has_exploded && m.hit_player);
        assert!(!m.check_direct_hit(&victim, &cfg));

        assert!(matches!(fly(&mut m, &world), MortarStep::Impact(_)));
    }

    #[test]
    fn test_owner_is_never_hit() {
        let cfg = ProjectileConfig::default();
        let mut m = mortar(Vec3::new(0.0, 1.0, 0.0), Vec2::new(5.0, 0.0));
        let owner = VictimBody {
            id: PlayerId::from_u128(1),
            position: Vec3::new(0.0, 1.0, 0.0),
            size: 1.0,
            height: 2.0,
        };
        assert!(!m.check_direct_hit(&owner, &cfg));
    }

    #[test]
    fn test_ground_hit_requires_descent_near_ground() {
        let world = ArenaWorld::flat();
        let cfg = ProjectileConfig::default();
        let mut m = mortar(Vec3::new(0.0, 1.0, 0.0), Vec2::new(5.0, 0.0));
        let victim = VictimBody {
            id: PlayerId::from_u128(2),
            position: Vec3::new(5.0, 1.0, 0.0),
            size: 1.0,
            height: 2.0,
        };

        // Rising at launch
        assert!(!m.check_ground_hit(&victim, &world, &cfg));

        let mut hit = false;
        for _ in 0..600 {
            if m.check_ground_hit(&victim, &world, &cfg) {
                hit = true;
                break;
            }
            if m.advance(1.0 / 60.0, &world, &cfg) != MortarStep::Flying {
                break;
            }
        }
        assert!(hit);
        assert!(m.velocity.y < 0.0);
    }

    #[test]
    fn test_long_range_shots_splash_on_target() {
        let world = ArenaWorld::bounded(40.0, 40.0);
        for dist in [10.0, 20.0, 25.0, 30.0, 35.0, 39.0] {
            let mut m = mortar(Vec3::new(0.0, 1.0, 0.0), Vec2::new(dist, 0.0));
            match fly(&mut m, &world) {
                MortarStep::Impact(center) => assert_eq!(center, Vec3::new(dist, 0.0, 0.0)),
                other => panic!("dist {dist}: expected impact, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_launch_from_raised_ground_splashes() {
        let world = ArenaWorld::bounded(40.0, 40.0);
        let mut m = mortar(Vec3::new(0.0, 6.0, 0.0), Vec2::new(-30.0, 12.0));
        match fly(&mut m, &world) {
            MortarStep::Impact(center) => assert_eq!(center, Vec3::new(-30.0, 0.0, 12.0)),
            other => panic!("expected impact, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn test_splash_lands_on_target(tx in -39.0f32..39.0, tz in -39.0f32..39.0) {
            let world = ArenaWorld::bounded(40.0, 40.0);
            let mut m = mortar(Vec3::new(0.0, 1.0, 0.0), Vec2::new(tx, tz));
            let step = fly(&mut m, &world);
            prop_assert!(
                matches!(step, MortarStep::Impact(c) if (c.x - tx).abs() < 1e-5 && (c.z - tz).abs() < 1e-5),
                "target ({}, {}) gave {:?}", tx, tz, step
            );
        }
    }
}
