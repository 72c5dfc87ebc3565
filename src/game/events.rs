//! Game Events
//!
//! Everything the kernel wants the UI or the driver to know about is pushed
//! into a bounded queue and drained once per frame. There are no callbacks.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::game::animation::AnimKey;
use crate::game::mode::ModeEvent;
use crate::game::state::{CharacterName, PlayerId};
use crate::network::transport::ConnectionState;

// =============================================================================
// BOUNDED QUEUE
// =============================================================================

/// FIFO with a fixed capacity. When full, the oldest event is dropped.
#[derive(Clone, Debug)]
pub struct EventQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> EventQueue<T> {
    /// Create with a capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            dropped: 0,
        }
    }

    /// Push an event. Returns `false` if an older event had to be dropped.
    pub fn push(&mut self, item: T) -> bool {
        let mut kept_all = true;
        if self.items.len() >= self.capacity {
            self.items.pop_front();
            self.dropped += 1;
            kept_all = false;
            if self.dropped.is_power_of_two() {
                warn!(dropped = self.dropped, capacity = self.capacity, "event queue overflow");
            }
        }
        self.items.push_back(item);
        kept_all
    }

    /// Take every queued event in order.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    /// Queued events.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total events dropped due to overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Peek without draining.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

// =============================================================================
// SESSION EVENTS
// =============================================================================

/// Who dealt damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageSource {
    /// Firebolt direct hit.
    Firebolt,
    /// Mortar direct hit.
    Mortar,
    /// Fire area tick.
    FireArea,
    /// Melee swing.
    Melee,
    /// Poison damage-over-time.
    Poison,
    /// Reported by a remote shooter.
    Remote,
}

/// Session event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Forwarded from the mode machine.
    Mode(ModeEvent),

    /// The local character took damage.
    DamageTaken {
        /// Damage applied.
        amount: f32,
        /// Health afterwards.
        health: f32,
        /// What dealt it.
        source: DamageSource,
        /// Who dealt it, if anyone.
        attacker: Option<PlayerId>,
    },

    /// The local character dealt damage to someone else.
    DamageDealt {
        /// Player or bot hit.
        target: PlayerId,
        /// Damage dealt.
        amount: f32,
        /// What dealt it.
        source: DamageSource,
    },

    /// The local character died.
    Died,

    /// The local character respawned.
    Respawned,

    /// Touched down after being airborne.
    Landed,

    /// A practice bot was killed by the local player.
    BotKilled {
        /// The bot.
        bot_id: PlayerId,
    },

    /// Character swapped.
    CharacterSwapped {
        /// Character before.
        old: CharacterName,
        /// Character after.
        new: CharacterName,
    },

    /// A remote player's entity was attached to the scene.
    RemoteSpawned {
        /// Remote player.
        player_id: PlayerId,
    },

    /// A remote player's entity was removed.
    RemoteRemoved {
        /// Remote player.
        player_id: PlayerId,
    },

    /// A remote player changed character.
    RemoteCharacterChanged {
        /// Remote player.
        player_id: PlayerId,
        /// Their new character.
        character: CharacterName,
    },

    /// A one-shot animation finished on the local character.
    AnimationFinished {
        /// Animation that ended.
        key: AnimKey,
    },

    /// Transport state changed.
    Connection(ConnectionState),

    /// The room's privacy flag changed.
    RoomUpdated {
        /// New privacy flag, when sent.
        is_private: Option<bool>,
    },
}

/// A session event stamped with the frame it happened on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Frame counter.
    pub frame: u64,
    /// Event data.
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(frame: u64, data: GameEventData) -> Self {
        Self { frame, data }
    }

    /// Damage taken by the local character.
    pub fn damage_taken(
        frame: u64,
        amount: f32,
        health: f32,
        source: DamageSource,
        attacker: Option<PlayerId>,
    ) -> Self {
        Self::new(frame, GameEventData::DamageTaken { amount, health, source, attacker })
    }

    /// Damage dealt by the local character.
    pub fn damage_dealt(frame: u64, target: PlayerId, amount: f32, source: DamageSource) -> Self {
        Self::new(frame, GameEventData::DamageDealt { target, amount, source })
    }
}
