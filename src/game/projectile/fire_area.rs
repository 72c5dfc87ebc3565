//! Fire area left by a mortar splash.

use std::collections::BTreeSet;

use glam::Vec3;
use serde::{Serialize, Deserialize};

use crate::core::math::distance_xz;
use crate::game::state::PlayerId;

use super::{ProjectileCommon, VictimBody};

/// Lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirePhase {
    /// Growing from nothing to full radius.
    Expand,
    /// Full radius.
    Hold,
    /// Shrinking to nothing.
    Shrink,
}

/// Time-windowed damage circle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FireArea {
    /// Shared projectile data (`damage` is per tick).
    pub common: ProjectileCommon,
    /// Center on the ground.
    pub center: Vec3,
    /// Full radius.
    pub initial_radius: f32,
    /// Radius this tick.
    pub current_radius: f32,
    /// Phase this tick.
    pub phase: FirePhase,
    /// Expand phase length.
    pub expand_duration: f32,
    /// Age at which shrinking starts.
    pub shrink_delay: f32,
    /// Shrink phase length.
    pub shrink_duration: f32,
    /// Damage ticks per second.
    pub ticks_per_second: f32,
    /// `(victim, bucket)` pairs already damaged.
    pub damaged: BTreeSet<(PlayerId, u32)>,
}

impl FireArea {
    /// Create at `center`. `common.max_lifetime` is the total duration.
    pub fn new(
        common: ProjectileCommon,
        center: Vec3,
        radius: f32,
        expand_duration: f32,
        shrink_duration: f32,
        ticks_per_second: f32,
    ) -> Self {
        let lifetime = common.max_lifetime;
        let expand_duration = expand_duration.clamp(1e-3, lifetime);
        let shrink_duration = shrink_duration.clamp(1e-3, (lifetime - expand_duration).max(1e-3));
        Self {
            common,
            center,
            initial_radius: radius,
            current_radius: 0.0,
            phase: FirePhase::Expand,
            expand_duration,
            shrink_delay: (lifetime - shrink_duration).max(expand_duration),
            shrink_duration,
            ticks_per_second: ticks_per_second.max(1e-3),
            damaged: BTreeSet::new(),
        }
    }

    /// Radius scale for an age.
    fn scale_at(&self, age: f32) -> (FirePhase, f32) {
        if age < self.expand_duration {
            (FirePhase::Expand, age / self.expand_duration)
        } else if age < self.shrink_delay {
            (FirePhase::Hold, 1.0)
        } else {
            let t = (age - self.shrink_delay) / self.shrink_duration;
            (FirePhase::Shrink, (1.0 - t).clamp(0.0, 1.0))
        }
    }

    /// Advance one tick. Returns `false` once the area has burned out.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.common.age += dt;
        if self.common.age >= self.common.max_lifetime {
            self.current_radius = 0.0;
            return false;
        }
        let (phase, scale) = self.scale_at(self.common.age);
        self.phase = phase;
        self.current_radius = self.initial_radius * scale;
        true
    }

    /// Damage bucket for the current age.
    pub fn bucket(&self) -> u32 {
        (self.common.age * self.ticks_per_second).floor() as u32
    }

    /// Apply a damage tick to `victim` if inside and not yet damaged in the
    /// current bucket. The owner is immune.
    pub fn try_damage(&mut self, victim: &VictimBody) -> Option<f32> {
        if victim.id == self.common.owner || self.current_radius <= 0.0 {
            return None;
        }
        let bottom = victim.position.y - victim.height * 0.5;
        if (bottom - self.center.y).abs() > victim.height {
            return None;
        }
        if distance_xz(self.center, victim.position) > self.current_radius + victim.size * 0.5 {
            return None;
        }

        let bucket = self.bucket();
        if !self.damaged.insert((victim.id, bucket)) {
            return None;
        }
        // Keep only this bucket and the previous one per victim
        let id = victim.id;
        self.damaged.retain(|(v, b)| *v != id || b + 1 >= bucket);
        Some(self.common.damage)
    }
}
