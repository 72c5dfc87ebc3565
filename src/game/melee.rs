//! Melee Swings and Poison
//!
//! A swing is a damage circle centered on the attacker that ticks for the
//! length of the swing animation. Characters with a poison stat leave a
//! damage-over-time effect on every victim the swing touched.

use std::collections::BTreeMap;

use glam::Vec3;
use tracing::debug;

use crate::core::math::distance_xz;
use crate::game::events::DamageSource;
use crate::game::projectile::{CooldownTable, VictimBody};
use crate::game::state::PlayerId;
use crate::game::stats::{MeleeStats, PoisonStats};

/// Poison damage ticks per second.
pub const POISON_TICKS_PER_SECOND: f32 = 5.0;

/// An active swing.
#[derive(Clone, Debug, PartialEq)]
pub struct MeleeSwing {
    /// Attacker.
    pub owner: PlayerId,
    /// Resolved stats at swing time.
    pub stats: MeleeStats,
    /// Seconds since the swing started.
    pub elapsed: f32,
    /// Seconds until the next damage tick.
    pub next_tick: f32,
}

/// Damage-over-time on one victim.
#[derive(Clone, Debug, PartialEq)]
pub struct PoisonEffect {
    /// Player credited with the damage.
    pub source: PlayerId,
    /// Damage per tick.
    pub damage_per_tick: f32,
    /// Seconds left.
    pub remaining: f32,
    /// Time banked toward the next tick.
    pub accumulator: f32,
}

impl PoisonEffect {
    fn new(source: PlayerId, stats: PoisonStats) -> Self {
        Self {
            source,
            damage_per_tick: stats.damage_per_tick,
            remaining: stats.duration,
            accumulator: 0.0,
        }
    }
}

/// One melee or poison damage application.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeleeHit {
    /// Attacker.
    pub attacker: PlayerId,
    /// Victim.
    pub victim: PlayerId,
    /// Damage dealt.
    pub damage: f32,
    /// Melee or poison.
    pub source: DamageSource,
}

/// Swings, their cooldowns and the poison effects they leave.
#[derive(Clone, Debug, Default)]
pub struct MeleeSystem {
    swings: BTreeMap<PlayerId, MeleeSwing>,
    cooldowns: CooldownTable,
    poisons: BTreeMap<PlayerId, PoisonEffect>,
}

impl MeleeSystem {
    /// Empty system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a swing. Refused while a swing is in progress or cooling down.
    pub fn try_swing(&mut self, owner: PlayerId, stats: MeleeStats) -> bool {
        if self.swings.contains_key(&owner) || !self.cooldowns.can_shoot(owner) {
            return false;
        }
        self.swings.insert(owner, MeleeSwing { owner, stats, elapsed: 0.0, next_tick: 0.0 });
        self.cooldowns.start(owner, stats.cooldown.max(stats.duration));
        true
    }

    /// Is `owner` mid-swing?
    pub fn is_swinging(&self, owner: PlayerId) -> bool {
        self.swings.contains_key(&owner)
    }

    /// Active swing of `owner`.
    pub fn swing(&self, owner: PlayerId) -> Option<&MeleeSwing> {
        self.swings.get(&owner)
    }

    /// Poison on `victim`, if any.
    pub fn poison(&self, victim: PlayerId) -> Option<&PoisonEffect> {
        self.poisons.get(&victim)
    }

    /// Drop everything tied to a player (left, respawned or swapped).
    pub fn clear_player(&mut self, player: PlayerId) {
        self.swings.remove(&player);
        self.cooldowns.reset(player);
        self.poisons.remove(&player);
    }

    /// Advance swings and poisons. `attacker_position` locates swing owners;
    /// `victims` are every damageable body this tick.
    pub fn update(
        &mut self,
        dt: f32,
        attacker_position: impl Fn(PlayerId) -> Option<Vec3>,
        victims: &[VictimBody],
    ) -> Vec<MeleeHit> {
        let mut hits = Vec::new();
        self.cooldowns.tick(dt);

        // 1. Swings
        let mut finished = Vec::new();
        for (owner, swing) in self.swings.iter_mut() {
            let Some(center) = attacker_position(*owner) else {
                finished.push(*owner);
                continue;
            };

            while swing.next_tick <= 0.0 && swing.elapsed < swing.stats.duration {
                swing.next_tick += swing.stats.tick_interval;
                for victim in victims.iter().filter(|v| v.id != *owner) {
                    let reach = swing.stats.radius + victim.size * 0.5;
                    if distance_xz(center, victim.position) > reach {
                        continue;
                    }
                    hits.push(MeleeHit {
                        attacker: *owner,
                        victim: victim.id,
                        damage: swing.stats.damage,
                        source: DamageSource::Melee,
                    });
                    if let Some(poison) = swing.stats.poison {
                        self.poisons.insert(victim.id, PoisonEffect::new(*owner, poison));
                    }
                }
            }

            swing.next_tick -= dt;
            swing.elapsed += dt;
            if swing.elapsed >= swing.stats.duration {
                finished.push(*owner);
            }
        }
        for owner in finished {
            self.swings.remove(&owner);
        }

        // 2. Poison
        let interval = 1.0 / POISON_TICKS_PER_SECOND;
        self.poisons.retain(|victim, effect| {
            let step = dt.min(effect.remaining);
            effect.remaining -= dt;
            effect.accumulator += step;
            while effect.accumulator >= interval {
                effect.accumulator -= interval;
                hits.push(MeleeHit {
                    attacker: effect.source,
                    victim: *victim,
                    damage: effect.damage_per_tick,
                    source: DamageSource::Poison,
                });
            }
            if effect.remaining <= 0.0 {
                debug!(victim = %victim.short(), "poison wore off");
                return false;
            }
            true
        });

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::CharacterName;
    use crate::game::stats::StatsResolver;

    const DT: f32 = 1.0 / 60.0;

    fn attacker() -> PlayerId {
        PlayerId::from_u128(1)
    }

    fn victim(x: f32) -> VictimBody {
        VictimBody {
            id: PlayerId::from_u128(2),
            position: Vec3::new(x, 1.0, 0.0),
            size: 1.0,
            height: 2.0,
        }
    }

    fn run(system: &mut MeleeSystem, seconds: f32, victims: &[VictimBody]) -> Vec<MeleeHit> {
        let mut hits = Vec::new();
        let steps = (seconds / DT).round() as usize;
        for _ in 0..steps {
            hits.extend(system.update(DT, |_| Some(Vec3::new(0.0, 1.0, 0.0)), victims));
        }
        hits
    }

    #[test]
    fn test_swing_ticks_through_duration() {
        let stats = MeleeStats {
            damage: 5.0,
            radius: 2.0,
            duration: 0.5,
            tick_interval: 0.25,
            cooldown: 0.6,
            poison: None,
        };
        let mut melee = MeleeSystem::new();
        assert!(melee.try_swing(attacker(), stats));
        assert!(!melee.try_swing(attacker(), stats));

        // Exact binary step: ticks land at 0.0 and 0.25
        let mut hits = Vec::new();
        for _ in 0..12 {
            hits.extend(melee.update(0.0625, |_| Some(Vec3::ZERO), &[victim(1.0)]));
        }
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.source == DamageSource::Melee && h.damage == 5.0));
        assert!(!melee.is_swinging(attacker()));
        assert!(melee.poison(PlayerId::from_u128(2)).is_none());
    }

    #[test]
    fn test_swing_misses_outside_radius() {
        let stats = StatsResolver::default().melee_stats(CharacterName::Herald);
        let mut melee = MeleeSystem::new();
        melee.try_swing(attacker(), stats);
        let hits = run(&mut melee, stats.duration, &[victim(stats.radius + 2.0)]);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_attacker_never_hits_self() {
        let stats = StatsResolver::default().melee_stats(CharacterName::Herald);
        let mut melee = MeleeSystem::new();
        melee.try_swing(attacker(), stats);
        let own = VictimBody { id: attacker(), ..victim(0.0) };
        assert!(run(&mut melee, stats.duration, &[own]).is_empty());
    }

    #[test]
    fn test_poison_ticks_at_five_hz() {
        let stats = StatsResolver::default().melee_stats(CharacterName::Lucy);
        let poison = stats.poison.expect("lucy carries poison");
        let mut melee = MeleeSystem::new();
        melee.try_swing(attacker(), stats);

        // One update lands the first swing tick and applies poison
        melee.update(DT, |_| Some(Vec3::ZERO), &[victim(0.5)]);
        assert!(melee.poison(PlayerId::from_u128(2)).is_some());
        melee.clear_player(attacker());

        // Victim walks away; only poison keeps ticking
        let hits = run(&mut melee, poison.duration + 0.5, &[victim(50.0)]);
        let poison_ticks = hits.iter().filter(|h| h.source == DamageSource::Poison).count();
        let expected = (poison.duration * POISON_TICKS_PER_SECOND).round() as usize;
        assert!(poison_ticks.abs_diff(expected) <= 1);
        assert!(melee.poison(PlayerId::from_u128(2)).is_none());
    }

    #[test]
    fn test_cooldown_blocks_rapid_swings() {
        let stats = StatsResolver::default().melee_stats(CharacterName::Herald);
        let mut melee = MeleeSystem::new();
        assert!(melee.try_swing(attacker(), stats));
        run(&mut melee, stats.duration + DT, &[]);
        assert!(!melee.try_swing(attacker(), stats));
        run(&mut melee, stats.cooldown, &[]);
        assert!(melee.try_swing(attacker(), stats));
    }
}
