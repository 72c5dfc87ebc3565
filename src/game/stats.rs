//! Character Stats
//!
//! Tuning is a base table combined with per-character multipliers. A stat
//! without a multiplier passes the base through. Exact targets are written as
//! `target / base` so that retuning a base keeps the derived value pinned.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::game::state::CharacterName;

/// Base firebolt cooldown; Lucy's exact cooldown is expressed against it.
pub const BASE_FIREBOLT_COOLDOWN: f32 = 0.3;

/// Tunable stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    FireboltDamage,
    FireboltCooldown,
    FireboltSpeed,
    FireboltLifetime,
    FireboltSize,
    FireboltFollowStrength,
    /// Fraction of base speed a steerable bolt starts at.
    FireboltMinSpeed,
    /// Fraction of base speed reached at full control input.
    FireboltMaxSpeed,
    /// Speed gain per second toward the desired speed.
    FireboltAcceleration,
    /// Extra factor beyond max speed at full control input.
    FireboltOverdrive,
    MortarDamage,
    MortarCooldown,
    MortarArcHeight,
    MortarSize,
    MortarSplashRadius,
    MortarFireDuration,
    MortarAreaDamage,
    MeleeDamage,
    MeleeRadius,
    MeleeDuration,
    MeleeTickInterval,
    MeleeCooldown,
    PoisonDamage,
    PoisonDuration,
}

/// How a firebolt's speed evolves.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpeedProfile {
    /// Always `speed`.
    Constant,
    /// Starts at `min · speed`, accelerates under control input.
    Accelerating {
        /// Start / fallback fraction of base speed.
        min: f32,
        /// Fraction of base speed at full control.
        max: f32,
        /// Speed gain per second.
        acceleration: f32,
        /// Factor beyond `max` at full control.
        overdrive: f32,
    },
}

/// Resolved firebolt stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FireboltStats {
    /// Damage per hit.
    pub damage: f32,
    /// Seconds between casts.
    pub cooldown: f32,
    /// Base speed.
    pub speed: f32,
    /// Seconds before expiry.
    pub lifetime: f32,
    /// Collision box size.
    pub size: f32,
    /// Homing strength in [0, 1].
    pub follow_strength: f32,
    /// Speed policy.
    pub profile: SpeedProfile,
}

/// Resolved mortar stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MortarStats {
    /// Direct-hit damage.
    pub damage: f32,
    /// Seconds between launches.
    pub cooldown: f32,
    /// Apex height above the launch point.
    pub arc_height: f32,
    /// Collision size.
    pub size: f32,
    /// Fire area radius.
    pub splash_radius: f32,
    /// Fire area lifetime.
    pub fire_duration: f32,
    /// Fire area damage per tick.
    pub area_damage: f32,
}

/// Damage-over-time applied after a melee swing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoisonStats {
    /// Damage per poison tick.
    pub damage_per_tick: f32,
    /// Seconds of poison.
    pub duration: f32,
}

/// Resolved melee stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeleeStats {
    /// Damage per swing tick.
    pub damage: f32,
    /// Swing circle radius.
    pub radius: f32,
    /// Swing animation duration.
    pub duration: f32,
    /// Seconds between damage ticks during the swing.
    pub tick_interval: f32,
    /// Seconds between swings.
    pub cooldown: f32,
    /// Poison applied to victims, if the character has one.
    pub poison: Option<PoisonStats>,
}

/// Base × multiplier stat tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsResolver {
    base: BTreeMap<Stat, f32>,
    multipliers: BTreeMap<CharacterName, BTreeMap<Stat, f32>>,
}

impl Default for StatsResolver {
    fn default() -> Self {
        use Stat::*;

        let base = BTreeMap::from([
            (FireboltDamage, 10.0),
            (FireboltCooldown, BASE_FIREBOLT_COOLDOWN),
            (FireboltSpeed, 20.0),
            (FireboltLifetime, 2.0),
            (FireboltSize, 0.5),
            (FireboltFollowStrength, 1.0),
            (FireboltMinSpeed, 0.4),
            (FireboltMaxSpeed, 1.0),
            (FireboltAcceleration, 30.0),
            (FireboltOverdrive, 1.5),
            (MortarDamage, 20.0),
            (MortarCooldown, 1.5),
            (MortarArcHeight, 4.0),
            (MortarSize, 0.6),
            (MortarSplashRadius, 2.5),
            (MortarFireDuration, 3.0),
            (MortarAreaDamage, 5.0),
            (MeleeDamage, 8.0),
            (MeleeRadius, 2.0),
            (MeleeDuration, 0.4),
            (MeleeTickInterval, 0.2),
            (MeleeCooldown, 0.6),
            (PoisonDamage, 2.0),
            (PoisonDuration, 2.0),
        ]);

        let lucy = BTreeMap::from([
            // Exactly 0.15 s regardless of the base
            (FireboltCooldown, 0.15 / BASE_FIREBOLT_COOLDOWN),
            (FireboltSpeed, 1.25),
            (FireboltFollowStrength, 0.3),
            (FireboltDamage, 0.8),
            (MortarSplashRadius, 1.2),
        ]);

        let herald = BTreeMap::from([
            (FireboltDamage, 1.2),
            (MortarDamage, 1.25),
            (MeleeRadius, 1.25),
            (PoisonDamage, 0.0),
        ]);

        Self {
            base,
            multipliers: BTreeMap::from([
                (CharacterName::Lucy, lucy),
                (CharacterName::Herald, herald),
            ]),
        }
    }
}

impl StatsResolver {
    /// Effective value of `stat` for `character`.
    pub fn resolve(&self, character: CharacterName, stat: Stat) -> f32 {
        let base = self.base.get(&stat).copied().unwrap_or(0.0);
        let multiplier = self
            .multipliers
            .get(&character)
            .and_then(|m| m.get(&stat))
            .copied()
            .unwrap_or(1.0);
        base * multiplier
    }

    /// Override a base value (builder style).
    pub fn with_base(mut self, stat: Stat, value: f32) -> Self {
        self.base.insert(stat, value);
        self
    }

    /// Override a multiplier (builder style).
    pub fn with_multiplier(mut self, character: CharacterName, stat: Stat, value: f32) -> Self {
        self.multipliers.entry(character).or_default().insert(stat, value);
        self
    }

    /// Firebolt stats.
    pub fn firebolt_stats(&self, character: CharacterName) -> FireboltStats {
        let r = |s| self.resolve(character, s);
        let profile = match character {
            CharacterName::Lucy => SpeedProfile::Constant,
            CharacterName::Herald => SpeedProfile::Accelerating {
                min: r(Stat::FireboltMinSpeed),
                max: r(Stat::FireboltMaxSpeed),
                acceleration: r(Stat::FireboltAcceleration),
                overdrive: r(Stat::FireboltOverdrive),
            },
        };

        FireboltStats {
            damage: r(Stat::FireboltDamage),
            cooldown: r(Stat::FireboltCooldown),
            speed: r(Stat::FireboltSpeed),
            lifetime: r(Stat::FireboltLifetime),
            size: r(Stat::FireboltSize),
            follow_strength: r(Stat::FireboltFollowStrength).clamp(0.0, 1.0),
            profile,
        }
    }

    /// Mortar stats.
    pub fn mortar_stats(&self, character: CharacterName) -> MortarStats {
        let r = |s| self.resolve(character, s);
        MortarStats {
            damage: r(Stat::MortarDamage),
            cooldown: r(Stat::MortarCooldown),
            arc_height: r(Stat::MortarArcHeight),
            size: r(Stat::MortarSize),
            splash_radius: r(Stat::MortarSplashRadius),
            fire_duration: r(Stat::MortarFireDuration),
            area_damage: r(Stat::MortarAreaDamage),
        }
    }

    /// Melee stats; poison is absent when its damage resolves to zero.
    pub fn melee_stats(&self, character: CharacterName) -> MeleeStats {
        let r = |s| self.resolve(character, s);
        let poison_damage = r(Stat::PoisonDamage);
        let poison_duration = r(Stat::PoisonDuration);
        let poison = (poison_damage > 0.0 && poison_duration > 0.0).then_some(PoisonStats {
            damage_per_tick: poison_damage,
            duration: poison_duration,
        });

        MeleeStats {
            damage: r(Stat::MeleeDamage),
            radius: r(Stat::MeleeRadius),
            duration: r(Stat::MeleeDuration),
            tick_interval: r(Stat::MeleeTickInterval).max(1e-3),
            cooldown: r(Stat::MeleeCooldown),
            poison,
        }
    }

    /// Projectile and effect tint as `0xRRGGBB`.
    pub fn character_color(&self, character: CharacterName) -> u32 {
        match character {
            CharacterName::Lucy => 0xFF7A2F,
            CharacterName::Herald => 0x7A5CFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lucy_cooldown_is_exact() {
        let stats = StatsResolver::default();
        assert!((stats.firebolt_stats(CharacterName::Lucy).cooldown - 0.15).abs() < 1e-6);
        assert_eq!(stats.firebolt_stats(CharacterName::Herald).cooldown, BASE_FIREBOLT_COOLDOWN);
    }

    #[test]
    fn test_missing_multiplier_passes_base() {
        let stats = StatsResolver::default();
        assert_eq!(stats.resolve(CharacterName::Lucy, Stat::MortarCooldown), 1.5);
    }

    #[test]
    fn test_profiles() {
        let stats = StatsResolver::default();
        assert_eq!(stats.firebolt_stats(CharacterName::Lucy).profile, SpeedProfile::Constant);
        match stats.firebolt_stats(CharacterName::Herald).profile {
            SpeedProfile::Accelerating { overdrive, .. } => assert_eq!(overdrive, 1.5),
            SpeedProfile::Constant => panic!("herald must accelerate"),
        }
    }

    #[test]
    fn test_poison_only_for_lucy() {
        let stats = StatsResolver::default();
        assert!(stats.melee_stats(CharacterName::Lucy).poison.is_some());
        assert!(stats.melee_stats(CharacterName::Herald).poison.is_none());
    }

    #[test]
    fn test_overrides() {
        let stats = StatsResolver::default()
            .with_base(Stat::MortarDamage, 40.0)
            .with_multiplier(CharacterName::Lucy, Stat::MortarDamage, 0.5);
        assert_eq!(stats.mortar_stats(CharacterName::Lucy).damage, 20.0);
        assert_eq!(stats.mortar_stats(CharacterName::Herald).damage, 50.0);
    }
}
