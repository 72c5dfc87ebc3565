//! Practice Bots
//!
//! Shooting mode fills the arena with bots that wander inside the bounds and
//! return fire at the local player. Their count is persisted per arena and
//! clamped to the arena's maximum.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use tracing::{debug, info};

use crate::bridge::storage::{bot_count_key, KeyValueStore};
use crate::config::{PhysicsConfig, SessionConfig};
use crate::core::math::xz;
use crate::core::rng::SimRng;
use crate::game::character::SPAWN_REGION_FACTOR;
use crate::game::collision::{Arena, ArenaBounds, CollisionWorld};
use crate::game::projectile::{ProjectileSystem, VictimBody};
use crate::game::state::{CharacterName, PlayerId};

/// High bits shared by every bot id.
const BOT_ID_BASE: u128 = 0xB07 << 116;

/// Distance within which a bot fires at the player.
pub const BOT_FIRE_RANGE: f32 = 15.0;

/// Bot walking speed.
pub const BOT_WANDER_SPEED: f32 = 3.0;

/// Seconds a dead bot stays down.
pub const BOT_RESPAWN_DELAY: f32 = 3.0;

/// Chance per second that a bot in range fires when its cooldown allows.
const BOT_FIRE_CHANCE: f32 = 1.5;

/// A practice bot.
#[derive(Clone, Debug, PartialEq)]
pub struct Bot {
    /// Bot id (also its projectile owner id).
    pub id: PlayerId,
    /// Character the bot fires as.
    pub character: CharacterName,
    /// Body center.
    pub position: Vec3,
    /// Wander heading (x, z), normalized.
    pub heading: Vec2,
    /// Seconds until a new heading is picked.
    pub wander_timer: f32,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Footprint width.
    pub size: f32,
    /// Body height.
    pub height: f32,
    /// Seconds until respawn while dead.
    pub respawn_timer: Option<f32>,
}

impl Bot {
    /// Is the bot alive?
    pub fn is_alive(&self) -> bool {
        self.respawn_timer.is_none()
    }

    /// Collision body for hit tests.
    pub fn body(&self) -> VictimBody {
        VictimBody {
            id: self.id,
            position: self.position,
            size: self.size,
            height: self.height,
        }
    }
}

/// Things that happened to bots during an update or damage call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BotEvent {
    /// A bot died.
    Died {
        /// The bot.
        bot: PlayerId,
        /// Who delivered the final hit.
        killer: Option<PlayerId>,
    },
    /// A bot came back.
    Respawned {
        /// The bot.
        bot: PlayerId,
    },
    /// A bot fired a firebolt.
    Fired {
        /// The bot.
        bot: PlayerId,
    },
}

/// Owns every practice bot of the current arena.
#[derive(Clone, Debug)]
pub struct BotManager {
    bots: BTreeMap<PlayerId, Bot>,
    arena: Arena,
    count: u32,
    physics: PhysicsConfig,
    rng: SimRng,
}

impl BotManager {
    /// Create an empty manager.
    pub fn new(arena: Arena, physics: PhysicsConfig, seed: u64) -> Self {
        Self {
            bots: BTreeMap::new(),
            arena,
            count: 0,
            physics,
            rng: SimRng::new(seed),
        }
    }

    /// Persisted bot count for `arena`, clamped; the configured default when
    /// nothing valid is stored.
    pub fn load_count(store: &dyn KeyValueStore, arena: Arena, config: &SessionConfig) -> u32 {
        let max = arena.max_bots(config);
        store
            .get(&bot_count_key(arena))
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(config.default_bot_count)
            .min(max)
    }

    /// Is `id` a bot id?
    pub fn is_bot_id(id: PlayerId) -> bool {
        id.0.as_u128() >> 116 == BOT_ID_BASE >> 116
    }

    /// Arena the bots live in.
    pub fn arena(&self) -> Arena {
        self.arena
    }

    /// Requested bot count.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Bot lookup.
    pub fn get(&self, id: PlayerId) -> Option<&Bot> {
        self.bots.get(&id)
    }

    /// Every bot, dead or alive.
    pub fn bots(&self) -> impl Iterator<Item = &Bot> {
        self.bots.values()
    }

    /// Bodies of living bots.
    pub fn victims(&self) -> Vec<VictimBody> {
        self.bots.values().filter(|b| b.is_alive()).map(Bot::body).collect()
    }

    /// Set the bot count, clamp it to the arena maximum, persist it and
    /// respawn the roster. Returns the applied count.
    pub fn set_count(
        &mut self,
        count: u32,
        config: &SessionConfig,
        store: &dyn KeyValueStore,
        world: &dyn CollisionWorld,
    ) -> u32 {
        let applied = count.min(self.arena.max_bots(config));
        if !store.set(&bot_count_key(self.arena), &applied.to_string()) {
            debug!(arena = %self.arena, "bot count not persisted");
        }
        self.count = applied;
        self.spawn_all(world);
        applied
    }

    /// Replace the roster with `count` fresh bots.
    pub fn spawn_all(&mut self, world: &dyn CollisionWorld) {
        self.bots.clear();
        for index in 0..self.count {
            let id = PlayerId::from_u128(BOT_ID_BASE | index as u128);
            let character = CharacterName::ALL[index as usize % CharacterName::ALL.len()];
            let mut bot = Bot {
                id,
                character,
                position: Vec3::ZERO,
                heading: self.rng.direction(),
                wander_timer: self.rng.range_f32(1.0, 3.0),
                health: self.physics.max_health,
                max_health: self.physics.max_health,
                size: self.physics.character_size,
                height: self.physics.character_height,
                respawn_timer: None,
            };
            place(&mut bot, world, &mut self.rng);
            self.bots.insert(id, bot);
        }
        info!(arena = %self.arena, count = self.count, "practice bots spawned");
    }

    /// Remove every bot.
    pub fn clear(&mut self) {
        self.bots.clear();
    }

    /// Wander, fire at `target` and count down respawns.
    pub fn update(
        &mut self,
        dt: f32,
        world: &dyn CollisionWorld,
        target: Option<Vec3>,
        projectiles: &mut ProjectileSystem,
    ) -> Vec<BotEvent> {
        let mut events = Vec::new();

        for bot in self.bots.values_mut() {
            // 1. Respawn countdown
            if let Some(timer) = bot.respawn_timer.as_mut() {
                *timer -= dt;
                if *timer <= 0.0 {
                    bot.respawn_timer = None;
                    bot.health = bot.max_health;
                    place(bot, world, &mut self.rng);
                    events.push(BotEvent::Respawned { bot: bot.id });
                }
                continue;
            }

            // 2. Wander
            bot.wander_timer -= dt;
            if bot.wander_timer <= 0.0 {
                bot.heading = self.rng.direction();
                bot.wander_timer = self.rng.range_f32(1.0, 3.0);
            }
            let step = bot.heading * BOT_WANDER_SPEED * dt;
            let next = Vec3::new(bot.position.x + step.x, bot.position.y, bot.position.z + step.y);
            let gh = world.ground_height(next.x, next.z, bot.size);
            let half = Vec3::new(bot.size * 0.5, bot.height * 0.5, bot.size * 0.5);
            if gh.is_finite() && !world.will_collide_box(next, half) {
                bot.position = Vec3::new(next.x, gh + bot.height * 0.5, next.z);
            } else {
                bot.heading = -bot.heading;
            }

            // 3. Fire
            let Some(target) = target else { continue };
            let to_target = xz(target) - xz(bot.position);
            if to_target.length() > BOT_FIRE_RANGE || !projectiles.can_shoot(bot.id) {
                continue;
            }
            if !self.rng.chance(BOT_FIRE_CHANCE * dt) {
                continue;
            }
            if projectiles.fire_firebolt(bot.id, bot.character, bot.position, to_target).is_ok() {
                events.push(BotEvent::Fired { bot: bot.id });
            }
        }

        events
    }

    /// Apply damage to a bot. Returns `Died` on the killing blow.
    pub fn apply_damage(&mut self, id: PlayerId, amount: f32, attacker: Option<PlayerId>) -> Option<BotEvent> {
        let bot = self.bots.get_mut(&id)?;
        if !bot.is_alive() {
            return None;
        }
        bot.health = (bot.health - amount.max(0.0)).max(0.0);
        if bot.health > 0.0 {
            return None;
        }
        bot.respawn_timer = Some(BOT_RESPAWN_DELAY);
        debug!(bot = %id.short(), "bot killed");
        Some(BotEvent::Died { bot: id, killer: attacker })
    }
}

/// Drop a bot at a random grounded point within the spawn region.
fn place(bot: &mut Bot, world: &dyn CollisionWorld, rng: &mut SimRng) {
    let region = world
        .bounds()
        .map(|b| b.scaled(SPAWN_REGION_FACTOR))
        .unwrap_or(ArenaBounds::new(10.0, 10.0));

    for _ in 0..16 {
        let p = region.clamp(rng.point_in_rect(region.half_x, region.half_z));
        let gh = world.ground_height(p.x, p.y, bot.size);
        let center = Vec3::new(p.x, gh + bot.height * 0.5, p.y);
        let half = Vec3::new(bot.size * 0.5, bot.height * 0.5, bot.size * 0.5);
        if gh.is_finite() && !world.will_collide_box(center, half) {
            bot.position = center;
            return;
        }
    }
    bot.position = Vec3::new(0.0, bot.height * 0.5, 0.0);
}
