//! Per-player ability cooldowns.

use std::collections::BTreeMap;

use crate::game::state::PlayerId;

/// Remaining time below which an entry counts as expired.
const EXPIRY_EPSILON: f32 = 1e-6;

/// Seconds remaining per player. Absence means ready; no entry ever holds
/// zero or a negative value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CooldownTable {
    remaining: BTreeMap<PlayerId, f32>,
}

impl CooldownTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cooldown. Non-positive durations leave the player ready.
    pub fn start(&mut self, player: PlayerId, seconds: f32) {
        if seconds > EXPIRY_EPSILON {
            self.remaining.insert(player, seconds);
        } else {
            self.remaining.remove(&player);
        }
    }

    /// Decrement every entry, deleting those that expire.
    pub fn tick(&mut self, dt: f32) {
        self.remaining.retain(|_, left| {
            *left -= dt;
            *left > EXPIRY_EPSILON
        });
    }

    /// Is the player ready?
    #[inline]
    pub fn can_shoot(&self, player: PlayerId) -> bool {
        !self.remaining.contains_key(&player)
    }

    /// Seconds remaining, 0 when ready.
    pub fn remaining(&self, player: PlayerId) -> f32 {
        self.remaining.get(&player).copied().unwrap_or(0.0)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.remaining.clear();
    }

    /// Drop one player's entry.
    pub fn reset(&mut self, player: PlayerId) {
        self.remaining.remove(&player);
    }

    /// Number of players cooling down.
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Everyone ready?
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Iterate entries.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &f32)> {
        self.remaining.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cooldown_expires_and_is_deleted() {
        let id = PlayerId::from_u128(1);
        let mut table = CooldownTable::new();
        table.start(id, 0.15);
        assert!(!table.can_shoot(id));

        table.tick(0.1);
        assert!(!table.can_shoot(id));
        assert!((table.remaining(id) - 0.05).abs() < 1e-6);

        table.tick(0.06);
        assert!(table.can_shoot(id));
        assert!(table.is_empty());
        assert_eq!(table.remaining(id), 0.0);
    }

    #[test]
    fn test_zero_duration_leaves_ready() {
        let id = PlayerId::from_u128(2);
        let mut table = CooldownTable::new();
        table.start(id, 0.0);
        assert!(table.can_shoot(id));
        assert!(table.is_empty());
    }

    #[test]
    fn test_tables_are_per_player() {
        let a = PlayerId::from_u128(1);
        let b = PlayerId::from_u128(2);
        let mut table = CooldownTable::new();
        table.start(a, 1.0);
        assert!(!table.can_shoot(a));
        assert!(table.can_shoot(b));
        table.clear();
        assert!(table.can_shoot(a));
    }

    proptest! {
        #[test]
        fn test_no_zero_or_negative_entries(
            ops in proptest::collection::vec((0u128..4, 0.0f32..1.0, 0.0f32..0.2), 1..60)
        ) {
            let mut table = CooldownTable::new();
            for (player, duration, dt) in ops {
                table.start(PlayerId::from_u128(player), duration);
                table.tick(dt);
                for (_, left) in table.iter() {
                    prop_assert!(*left > 0.0);
                }
            }
        }
    }
}
