//! Session Coordinator
//!
//! Composes every subsystem into the per-frame loop of one local player.
//! A tick always runs in the same order:
//!
//! 1. Network inbound and ready remote spawns
//! 2. Pause toggle and scheduled restart (runs even while paused)
//! 3. Movement, mode triggers, run timer, shooting and abilities
//! 4. Character physics
//! 5. Projectiles and practice bots
//! 6. Hit resolution (projectiles, melee, poison)
//! 7. Respawn sentinel
//! 8. Animation
//! 9. Remote replication
//! 10. State broadcast and present
//!
//! Steps 3 to 9 are skipped while the mode is paused; the frame is still
//! presented. Remote spawn preparation is the only asynchronous work: it
//! runs on the tokio runtime and hands bundles back through a channel that
//! is drained at the start of each tick.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use glam::{Vec2, Vec3};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::audio::{AudioSink, SoundCue};
use crate::bridge::render::{PresentSurface, RenderHandle, VisualEffect};
use crate::bridge::storage::{SharedStore, KEY_LAST_CHARACTER, KEY_LAST_GAME_MODE, KEY_LAST_INPUT_MODE};
use crate::config::{ConfigError, SessionConfig, SimConfig};
use crate::core::{FrameClock, SimRng};
use crate::game::animation::{
    select_movement_key, update_facing, AnimKey, AnimKind, AnimationController, AnimationError, CharacterAssets,
    Facing,
};
use crate::game::bots::{BotEvent, BotManager};
use crate::game::character::CharacterPhysics;
use crate::game::collision::{Arena, ArenaWorld, CollisionWorld, RespawnMonitor, UnknownArena};
use crate::game::events::{DamageSource, EventQueue, GameEvent, GameEventData};
use crate::game::input::{InputMode, InputState, InputTracker, PolledInput};
use crate::game::melee::MeleeSystem;
use crate::game::mode::{ArenaEntities, EntityManager, GameMode, GameModeMachine, ModeEvent, ModeState};
use crate::game::projectile::{AimContext, LaunchSpec, ProjectileEvent, ProjectileHit, ProjectileSystem, VictimBody};
use crate::game::records::RecordsStore;
use crate::game::state::{Character, CharacterName, PlayerId};
use crate::game::stats::StatsResolver;
use crate::network::protocol::{
    CharacterChangeMsg, Envelope, LaunchParams, NetMessage, PlayerDamageMsg, PlayerStateMsg, ProjectileCreateMsg,
};
use crate::network::replication::{RemoteReplication, ReplicationEvent};
use crate::network::spawn::{prepare_spawn, SharedLoader, SpawnBundle, SpawnError, SpawnRequest};
use crate::network::transport::{
    join_room_with_retry, ConnectionState, ReconnectPolicy, Transport, TransportError, WebSocketTransport,
};

/// Damage overlay fade per second.
const DAMAGE_FLASH_DECAY: f32 = 2.0;

/// Per-attempt connect timeout when joining a room.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Fallback texture load timeout when the configured one is unusable.
const DEFAULT_TEXTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Salt separating the bot RNG stream from the session's.
const BOT_SEED_SALT: u64 = 0xB07_5EED;

// =============================================================================
// ERRORS & SETUP
// =============================================================================

/// Session start errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Launch parameters named an unknown arena.
    #[error("Invalid arena: {0}")]
    Arena(#[from] UnknownArena),

    /// A character's animation bundle is unusable.
    #[error("Animation bundle error: {0}")]
    Animation(#[from] AnimationError),

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Everything a session is built from.
pub struct SessionSetup {
    /// Local player id.
    pub local_id: PlayerId,
    /// Tuning.
    pub config: SimConfig,
    /// Launch parameters (query string).
    pub params: LaunchParams,
    /// Preferences and records.
    pub store: SharedStore,
    /// Animation bundles for every character.
    pub assets: Arc<CharacterAssets>,
    /// Texture source for remote spawns.
    pub loader: SharedLoader,
    /// Seed for respawn points and bots.
    pub seed: u64,
}

impl SessionSetup {
    /// Setup with default tuning and no launch parameters.
    pub fn new(local_id: PlayerId, store: SharedStore, assets: Arc<CharacterAssets>, loader: SharedLoader) -> Self {
        Self {
            local_id,
            config: SimConfig::default(),
            params: LaunchParams::default(),
            store,
            assets,
            loader,
            seed: 0,
        }
    }

    /// Use `config`.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Use launch parameters.
    pub fn with_params(mut self, params: LaunchParams) -> Self {
        self.params = params;
        self
    }

    /// Use `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// What one tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Frame number.
    pub frame: u64,
    /// Delta simulated.
    pub dt: f32,
    /// The simulation was paused this frame.
    pub paused: bool,
    /// Session events, oldest first.
    pub events: Vec<GameEvent>,
    /// Messages handed to the transport.
    pub messages_sent: u32,
}

type SpawnResult = Result<SpawnBundle, (PlayerId, SpawnError)>;

// =============================================================================
// SESSION
// =============================================================================

/// One local player's game: character, modes, projectiles, bots and the
/// remote players of the joined room.
pub struct Session {
    config: SimConfig,
    arena: Arena,
    world: ArenaWorld,
    local: Character,
    physics: CharacterPhysics,
    animation: AnimationController,
    projectiles: ProjectileSystem,
    melee: MeleeSystem,
    modes: GameModeMachine,
    entities: ArenaEntities,
    bots: BotManager,
    replication: RemoteReplication,
    respawn: RespawnMonitor,
    input: InputTracker,
    input_mode: InputMode,
    camera_yaw: f32,
    clock: FrameClock,
    rng: SimRng,
    store: SharedStore,
    assets: Arc<CharacterAssets>,
    loader: SharedLoader,
    transport: Option<Box<dyn Transport>>,
    connection: ConnectionState,
    spawn_tx: mpsc::UnboundedSender<SpawnResult>,
    spawn_rx: mpsc::UnboundedReceiver<SpawnResult>,
    events: EventQueue<GameEvent>,
    local_handle: Option<RenderHandle>,
    bot_handles: BTreeMap<PlayerId, RenderHandle>,
    damage_flash: f32,
    sync_timer: f32,
    frame: u64,
    messages_sent: u32,
}

impl Session {
    /// Build a session. Fails on an invalid arena, configuration or
    /// animation bundle.
    ///
    /// Character, mode and input mode come from the launch parameters,
    /// falling back to the persisted `last_*` preferences.
    pub fn start(setup: SessionSetup) -> Result<Self, SessionError> {
        let SessionSetup { local_id, config, params, store, assets, loader, seed } = setup;

        // 1. Validate
        config.validate()?;
        let arena = params.arena()?;
        for character in CharacterName::ALL {
            assets.get(character)?;
        }

        // 2. Preferences
        let character = params
            .character
            .or_else(|| stored::<CharacterName>(&store, KEY_LAST_CHARACTER))
            .unwrap_or_default();
        let mode = params
            .mode
            .or_else(|| stored::<GameMode>(&store, KEY_LAST_GAME_MODE))
            .unwrap_or_default();
        let input_mode = stored::<InputMode>(&store, KEY_LAST_INPUT_MODE).unwrap_or_default();

        // 3. Subsystems
        let world = arena.world();
        let physics = CharacterPhysics::new(config.physics.clone());
        let animation = AnimationController::new(assets.get(character)?);
        let local = Character::new(local_id, character, Vec3::ZERO, &config.physics);
        let records = RecordsStore::new(store.clone());
        let modes = GameModeMachine::new(
            records,
            config.scoring.clone(),
            config.session.survival_restart_delay,
            config.session.event_capacity,
        );
        let (spawn_tx, spawn_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            arena,
            world,
            local,
            physics,
            animation,
            projectiles: ProjectileSystem::new(config.projectiles.clone(), StatsResolver::default()),
            melee: MeleeSystem::new(),
            modes,
            entities: ArenaEntities::new(),
            bots: BotManager::new(arena, config.physics.clone(), seed ^ BOT_SEED_SALT),
            replication: RemoteReplication::new(config.replication.clone()),
            respawn: RespawnMonitor::new(config.session.respawn_fade_duration, config.session.kill_height),
            input: InputTracker::new(),
            input_mode,
            camera_yaw: 0.0,
            clock: FrameClock::new(),
            rng: SimRng::new(seed),
            store,
            assets,
            loader,
            transport: None,
            connection: ConnectionState::Disconnected,
            spawn_tx,
            spawn_rx,
            events: EventQueue::new(config.session.event_capacity),
            local_handle: None,
            bot_handles: BTreeMap::new(),
            damage_flash: 0.0,
            sync_timer: 0.0,
            frame: 0,
            messages_sent: 0,
            config,
        };

        // 4. Enter the launch mode
        if !session.set_mode(mode) {
            session.respawn_local();
        }

        info!(
            player = %local_id.short(),
            %character,
            %mode,
            %arena,
            "session started"
        );
        Ok(session)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Local character.
    pub fn local(&self) -> &Character {
        &self.local
    }

    /// Current mode run.
    pub fn mode_state(&self) -> &ModeState {
        self.modes.state()
    }

    /// Mode machine.
    pub fn modes(&self) -> &GameModeMachine {
        &self.modes
    }

    /// Mode entities of the current run.
    pub fn entities(&self) -> &ArenaEntities {
        &self.entities
    }

    /// Projectiles and cooldowns.
    pub fn projectiles(&self) -> &ProjectileSystem {
        &self.projectiles
    }

    /// Practice bots.
    pub fn bots(&self) -> &BotManager {
        &self.bots
    }

    /// Remote players.
    pub fn replication(&self) -> &RemoteReplication {
        &self.replication
    }

    /// Active arena.
    pub fn arena(&self) -> Arena {
        self.arena
    }

    /// Collision world of the arena.
    pub fn world(&self) -> &ArenaWorld {
        &self.world
    }

    /// Tuning.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Transport link state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// Frame scheduler.
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------

    /// Use `transport` for room messaging, replacing any previous one.
    pub fn attach_transport(&mut self, transport: Box<dyn Transport>) {
        self.detach_transport();
        info!(player = %transport.local_id().short(), "transport attached");
        self.transport = Some(transport);
    }

    /// Leave the room.
    pub fn detach_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
        self.set_connection(ConnectionState::Disconnected);
    }

    /// Switch game mode in the current arena. A no-op on the same mode.
    pub fn set_mode(&mut self, mode: GameMode) -> bool {
        if !self.modes.set_mode(mode, self.arena, &mut self.entities) {
            return false;
        }
        if !self.store.set(KEY_LAST_GAME_MODE, mode.as_str()) {
            warn!(%mode, "game mode preference not persisted");
        }

        self.projectiles.set_aim(None);
        if mode == GameMode::Shooting {
            let count = BotManager::load_count(self.store.as_ref(), self.arena, &self.config.session);
            self.bots.set_count(count, &self.config.session, self.store.as_ref(), &self.world);
        } else {
            self.bots.clear();
        }
        self.respawn_local();
        true
    }

    /// Restart the current mode run, keeping records.
    pub fn restart_mode(&mut self) {
        self.modes.restart_mode(&mut self.entities);
        if self.modes.mode() == GameMode::Shooting {
            self.bots.spawn_all(&self.world);
        }
    }

    /// Set the practice bot count (shooting mode). Returns the clamped count.
    pub fn set_bot_count(&mut self, count: u32) -> u32 {
        self.bots.set_count(count, &self.config.session, self.store.as_ref(), &self.world)
    }

    /// Move the local character, clearing its horizontal motion.
    pub fn teleport(&mut self, position: Vec3) {
        self.local.position = position;
        self.local.velocity_xz = Vec2::ZERO;
        self.local.physics.velocity_y = 0.0;
    }

    /// Swap to the next character: new animation set, cleared cooldowns,
    /// smoke burst and a `character-change` broadcast.
    pub fn swap_character(&mut self, surface: &mut dyn PresentSurface, audio: &mut dyn AudioSink) -> CharacterName {
        let old = self.local.name;
        let new = old.next();
        let set = match self.assets.get(new) {
            Ok(set) => set,
            Err(e) => {
                warn!(character = %new, error = %e, "swap refused");
                return old;
            }
        };

        self.local.name = new;
        self.animation.set_animations(set);
        self.projectiles.clear_cooldowns();

        let position = self.local.position;
        surface.spawn_effect(VisualEffect::SmokeBurst, position);
        audio.play(SoundCue::Swap, Some(position));
        // Re-attached with the new textures on present
        if let Some(handle) = self.local_handle.take() {
            surface.dispose(handle);
        }

        if !self.store.set(KEY_LAST_CHARACTER, new.as_str()) {
            warn!(character = %new, "character preference not persisted");
        }
        self.send(NetMessage::CharacterChange(CharacterChangeMsg { character_name: new }));
        self.push(GameEventData::CharacterSwapped { old, new });
        info!(%old, %new, "character swapped");
        new
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Advance the frame clock to `now` and tick. `None` while the clock is
    /// stopped.
    pub fn frame(
        &mut self,
        now: f64,
        input: InputState,
        surface: &mut dyn PresentSurface,
        audio: &mut dyn AudioSink,
    ) -> Option<TickReport> {
        let dt = self.clock.advance(now)?;
        Some(self.tick(dt, input, surface, audio))
    }

    /// Run one tick of `dt` seconds.
    pub fn tick(
        &mut self,
        dt: f32,
        input: InputState,
        surface: &mut dyn PresentSurface,
        audio: &mut dyn AudioSink,
    ) -> TickReport {
        self.frame += 1;
        self.messages_sent = 0;
        let polled = self.input.poll(input);
        self.camera_yaw = input.camera_yaw;
        self.note_input_mode(input.mode);

        // 1. Network
        self.process_inbound(surface, audio);
        self.attach_ready_spawns(surface);

        // 2. Pause and scheduled restart
        if polled.just_pressed(InputState::PAUSE) {
            let paused = !self.modes.state().is_paused;
            self.modes.set_paused(paused);
        }
        self.modes.update_restart(dt, &mut self.entities);
        self.forward_mode_events(audio);

        let paused = self.modes.state().is_paused;
        if !paused {
            self.simulate(dt, &polled, surface, audio);
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(
            frame = self.frame,
            dt,
            x = self.local.position.x,
            y = self.local.position.y,
            z = self.local.position.z,
            health = self.local.health,
            projectiles = self.projectiles.len(),
            remotes = self.replication.len(),
            "tick"
        );

        // 10. Broadcast and present
        self.sync_timer += dt;
        if self.sync_timer >= self.config.replication.sync_interval {
            self.sync_timer = 0.0;
            self.broadcast_state();
        }
        self.present(surface);

        TickReport {
            frame: self.frame,
            dt,
            paused,
            events: self.events.drain(),
            messages_sent: self.messages_sent,
        }
    }

    fn simulate(
        &mut self,
        dt: f32,
        polled: &PolledInput,
        surface: &mut dyn PresentSurface,
        audio: &mut dyn AudioSink,
    ) {
        let input = polled.state;
        let controllable = self.local.is_alive() && !self.respawn.is_respawning();

        // 3a. Movement
        if controllable {
            let direction = input.move_direction();
            self.physics
                .move_horizontal(&mut self.local, direction, polled.held(InputState::SPRINT), &self.world, dt);
            self.modes.auto_start(self.local.is_moving());
        } else {
            self.local.velocity_xz = Vec2::ZERO;
            self.local.is_running = false;
        }

        // 3b. Mode triggers, then the run timer
        let overlaps = self.entities.overlapping(self.local.position, self.local.size * 0.5);
        if !overlaps.is_empty() {
            self.modes.handle_collisions(&overlaps, &mut self.entities);
        }
        self.modes.advance_timer(dt);

        // 3c. Shooting
        self.projectiles.tick_cooldowns(dt);
        if controllable && self.modes.mode() == GameMode::Shooting {
            self.shoot(polled, audio);
        } else {
            self.projectiles.set_aim(None);
        }

        // 3d. Abilities
        if controllable {
            self.handle_abilities(dt, polled, surface, audio);
        }

        // 4. Physics
        let wants_levitation = controllable && polled.held(InputState::LEVITATE);
        let step = self.physics.step(&mut self.local, wants_levitation, &self.world, dt);
        if step.landed {
            audio.play(SoundCue::Land, Some(self.local.position));
            self.push(GameEventData::Landed);
        }

        // 5. Projectiles and bots
        for event in self.projectiles.update(dt, &self.world) {
            if let ProjectileEvent::Splash { center, radius, .. } = event {
                surface.spawn_effect(VisualEffect::Explosion { radius }, center);
                audio.play(SoundCue::Explosion, Some(center));
            }
        }
        if self.modes.mode() == GameMode::Shooting {
            let target = self.local.is_alive().then_some(self.local.position);
            for event in self.bots.update(dt, &self.world, target, &mut self.projectiles) {
                self.on_bot_event(event);
            }
        }

        // 6. Hits
        self.resolve_projectile_hits(surface, audio);
        self.resolve_melee(dt, surface);
        self.damage_flash = (self.damage_flash - DAMAGE_FLASH_DECAY * dt).max(0.0);

        // 7. Respawn sentinel
        if self
            .respawn
            .update_respawn_system(self.local.position, self.local.health, &self.world, dt)
        {
            if self.local.is_alive() {
                // Fell out of the arena
                self.modes.record_death();
            }
            self.respawn_local();
            self.push(GameEventData::Respawned);
        }

        // 8. Animation
        self.update_animation(dt, audio);

        // 9. Replication
        for event in self.replication.step(dt, self.camera_yaw, surface, &self.world) {
            self.on_replication_event(event, surface, audio);
        }

        self.forward_mode_events(audio);
    }

    // -------------------------------------------------------------------------
    // Input-driven actions
    // -------------------------------------------------------------------------

    fn shoot(&mut self, polled: &PolledInput, audio: &mut dyn AudioSink) {
        let input = polled.state;
        let aim = AimContext {
            owner: self.local.id,
            shooter: self.local.position,
            cursor: input.cursor,
            right_stick: input.aim_stick(),
            camera_yaw: input.camera_yaw,
            mode: input.mode,
        };
        self.projectiles.set_aim(Some(aim));

        let range = self.config.projectiles.stick_aim_range;
        let (owner, character, origin) = (self.local.id, self.local.name, self.local.position);

        // Hold to autofire
        if polled.held(InputState::FIRE) {
            if let Some(direction) = aim.fire_direction(range) {
                if self.projectiles.fire_firebolt(owner, character, origin, direction).is_ok() {
                    audio.play(SoundCue::Firebolt, Some(origin));
                    let spec = LaunchSpec::Firebolt { direction };
                    self.send(NetMessage::ProjectileCreate(ProjectileCreateMsg::new(origin, spec, character)));
                }
            }
        }

        if polled.just_pressed(InputState::MORTAR) {
            if let Some(target) = aim.mortar_target(range) {
                if self.projectiles.fire_mortar(owner, character, origin, target).is_ok() {
                    audio.play(SoundCue::MortarLaunch, Some(origin));
                    let spec = LaunchSpec::Mortar { target };
                    self.send(NetMessage::ProjectileCreate(ProjectileCreateMsg::new(origin, spec, character)));
                }
            }
        }
    }

    fn handle_abilities(
        &mut self,
        dt: f32,
        polled: &PolledInput,
        surface: &mut dyn PresentSurface,
        audio: &mut dyn AudioSink,
    ) {
        let position = self.local.position;

        if polled.just_pressed(InputState::JUMP) {
            if self.physics.jump(&mut self.local) {
                audio.play(SoundCue::Jump, Some(position));
            } else if self.physics.double_jump(&mut self.local) {
                audio.play(SoundCue::DoubleJump, Some(position));
            }
        }

        if polled.just_pressed(InputState::MELEE) {
            let stats = self.projectiles.stats().melee_stats(self.local.name);
            if self.melee.try_swing(self.local.id, stats) {
                surface.spawn_effect(VisualEffect::MeleeSwing { radius: stats.radius }, position);
                audio.play(SoundCue::Melee, Some(position));
            }
        }

        if polled.held(InputState::HEAL) && self.local.heal(self.config.session.heal_rate * dt) > 0.0 {
            self.modes.set_health(self.local.health);
        }

        if polled.just_pressed(InputState::SWAP) {
            self.swap_character(surface, audio);
        }
    }

    // -------------------------------------------------------------------------
    // Damage
    // -------------------------------------------------------------------------

    fn local_body(&self) -> VictimBody {
        VictimBody {
            id: self.local.id,
            position: self.local.position,
            size: self.local.size,
            height: self.local.height,
        }
    }

    fn remote_bodies(&self) -> Vec<VictimBody> {
        let physics = &self.config.physics;
        self.replication
            .entities()
            .map(|e| VictimBody {
                id: e.player_id,
                position: e.current,
                size: physics.character_size,
                height: physics.character_height,
            })
            .collect()
    }

    fn contacts(&mut self, victim: &VictimBody) -> Vec<ProjectileHit> {
        let direct = self.projectiles.check_all_collisions(victim);
        let ground = self.projectiles.check_mortar_ground_collision(victim, &self.world);
        direct.into_iter().chain(ground).collect()
    }

    fn resolve_projectile_hits(&mut self, surface: &mut dyn PresentSurface, audio: &mut dyn AudioSink) {
        let local_id = self.local.id;

        // 1. Local character: only bot damage is applied here, remote
        // shooters report theirs with `player-damage`
        if self.local.is_alive() {
            let body = self.local_body();
            for hit in self.contacts(&body) {
                self.show_contact(&hit, surface, audio);
                if BotManager::is_bot_id(hit.owner) {
                    self.damage_local(hit.damage, hit.source, Some(hit.owner), surface, audio);
                }
            }
        }

        // 2. Bots
        for victim in self.bots.victims() {
            for hit in self.contacts(&victim) {
                self.show_contact(&hit, surface, audio);
                if hit.owner == local_id {
                    self.damage_bot(victim.id, hit.damage, hit.source);
                }
            }
        }

        // 3. Remote players: the local shooter is authoritative
        for victim in self.remote_bodies() {
            for hit in self.contacts(&victim) {
                self.show_contact(&hit, surface, audio);
                if hit.owner == local_id {
                    self.damage_remote(victim.id, hit.damage, hit.source);
                }
            }
        }
    }

    fn resolve_melee(&mut self, dt: f32, surface: &mut dyn PresentSurface) {
        let local_id = self.local.id;
        let local_position = self.local.position;
        let alive = self.local.is_alive();

        let mut victims = self.bots.victims();
        victims.extend(self.remote_bodies());
        let positions: BTreeMap<PlayerId, Vec3> = victims.iter().map(|v| (v.id, v.position)).collect();

        let hits = self
            .melee
            .update(dt, |id| (id == local_id && alive).then_some(local_position), &victims);

        for hit in hits {
            if hit.source == DamageSource::Poison {
                if let Some(position) = positions.get(&hit.victim) {
                    surface.spawn_effect(VisualEffect::Poison, *position);
                }
            }
            if hit.attacker != local_id {
                continue;
            }
            if BotManager::is_bot_id(hit.victim) {
                self.damage_bot(hit.victim, hit.damage, hit.source);
            } else {
                self.damage_remote(hit.victim, hit.damage, hit.source);
            }
        }
    }

    fn show_contact(&mut self, hit: &ProjectileHit, surface: &mut dyn PresentSurface, audio: &mut dyn AudioSink) {
        if hit.source == DamageSource::Mortar {
            let radius = self.config.projectiles.explosion_radius;
            surface.spawn_effect(VisualEffect::Explosion { radius }, hit.position);
            audio.play(SoundCue::Explosion, Some(hit.position));
        }
    }

    fn damage_local(
        &mut self,
        amount: f32,
        source: DamageSource,
        attacker: Option<PlayerId>,
        surface: &mut dyn PresentSurface,
        audio: &mut dyn AudioSink,
    ) {
        if !self.local.is_alive() || self.respawn.is_respawning() {
            return;
        }
        let taken = self.local.apply_damage(amount);
        if taken <= 0.0 {
            return;
        }

        let position = self.local.position;
        let facing = self.local.facing;
        self.modes.set_health(self.local.health);
        self.damage_flash = 1.0;
        surface.set_damage_overlay(self.damage_flash);
        self.push(GameEventData::DamageTaken {
            amount: taken,
            health: self.local.health,
            source,
            attacker,
        });

        if self.local.is_alive() {
            audio.play(SoundCue::Hurt, Some(position));
            self.animation.play(AnimKey::new(AnimKind::Hit, facing));
        } else {
            audio.play(SoundCue::Death, Some(position));
            self.animation.play(AnimKey::new(AnimKind::Death, facing));
            self.modes.record_death();
            self.push(GameEventData::Died);
            info!(player = %self.local.id.short(), ?source, "local player died");
        }
    }

    fn damage_bot(&mut self, bot: PlayerId, amount: f32, source: DamageSource) {
        let local_id = self.local.id;
        if self.bots.get(bot).is_some_and(|b| b.is_alive()) {
            self.push(GameEventData::DamageDealt { target: bot, amount, source });
        }
        if let Some(event) = self.bots.apply_damage(bot, amount, Some(local_id)) {
            self.on_bot_event(event);
        }
    }

    fn damage_remote(&mut self, target: PlayerId, amount: f32, source: DamageSource) {
        let Some(entity) = self.replication.get(target) else {
            return;
        };
        let max_health = entity.max_health;
        let health = (entity.health - amount).max(0.0);

        self.replication.on_damage(target, health, max_health);
        self.send(NetMessage::PlayerDamage(PlayerDamageMsg {
            target_id: target,
            damage: amount,
            health,
            max_health,
        }));
        self.push(GameEventData::DamageDealt { target, amount, source });
    }

    fn on_bot_event(&mut self, event: BotEvent) {
        if let BotEvent::Died { bot, killer } = event {
            if killer == Some(self.local.id) {
                self.modes.record_kill();
                self.push(GameEventData::BotKilled { bot_id: bot });
            }
        }
    }

    fn respawn_local(&mut self) {
        self.physics
            .respawn(&mut self.local, self.modes.mode(), &self.world, &mut self.rng);
        self.modes.set_health(self.local.health);
        self.melee.clear_player(self.local.id);
        self.animation.play(AnimKey::new(AnimKind::Spawn, self.local.facing));
    }

    // -------------------------------------------------------------------------
    // Animation & events
    // -------------------------------------------------------------------------

    fn update_animation(&mut self, dt: f32, audio: &mut dyn AudioSink) {
        self.local.facing = update_facing(self.local.facing, self.local.velocity_xz.y);

        if self.local.is_alive() {
            let special = self.animation.is_playing_one_shot().then(|| self.animation.current());
            let sprint_alt_form = self.local.name.sprint_uses_idle() && self.local.is_running;
            let key = select_movement_key(
                special,
                self.local.physics.is_grounded,
                self.local.is_moving(),
                sprint_alt_form,
                self.local.facing,
            );
            self.animation.play(key);
        }

        let (position, size) = (self.local.position, self.local.size);
        let world = &self.world;
        let tick = self
            .animation
            .update(dt, self.local.is_running, || world.is_on_obstacle(position.x, position.z, size));

        if let Some(surface) = tick.footstep {
            audio.play(SoundCue::Footstep(surface), Some(position));
        }
        if let Some(key) = tick.completed {
            self.push(GameEventData::AnimationFinished { key });
        }
        self.local.anim_key = self.animation.current();
    }

    fn forward_mode_events(&mut self, audio: &mut dyn AudioSink) {
        for event in self.modes.drain_events() {
            match &event {
                ModeEvent::ItemCollected { .. } => audio.play(SoundCue::Collect, Some(self.local.position)),
                ModeEvent::CheckpointActivated { .. } => audio.play(SoundCue::Checkpoint, Some(self.local.position)),
                ModeEvent::Restarted { mode } => {
                    if *mode == GameMode::Shooting {
                        self.bots.spawn_all(&self.world);
                    }
                    self.respawn_local();
                }
                _ => {}
            }
            self.push(GameEventData::Mode(event));
        }
    }

    fn on_replication_event(
        &mut self,
        event: ReplicationEvent,
        surface: &mut dyn PresentSurface,
        audio: &mut dyn AudioSink,
    ) {
        match event {
            ReplicationEvent::Removed { player_id, reason } => {
                debug!(player = %player_id.short(), ?reason, "remote entity removed");
                self.projectiles.remove_owned_by(player_id);
                self.melee.clear_player(player_id);
                self.push(GameEventData::RemoteRemoved { player_id });
            }
            ReplicationEvent::Smoke(position) => surface.spawn_effect(VisualEffect::SmokePuff, position),
            ReplicationEvent::Footstep(kind, position) => audio.play(SoundCue::Footstep(kind), Some(position)),
            ReplicationEvent::SpawnAbandoned(player_id) => {
                debug!(player = %player_id.short(), "remote spawn abandoned");
            }
        }
    }

    fn push(&mut self, data: GameEventData) {
        self.events.push(GameEvent::new(self.frame, data));
    }

    fn note_input_mode(&mut self, mode: InputMode) {
        if mode == self.input_mode {
            return;
        }
        self.input_mode = mode;
        if !self.store.set(KEY_LAST_INPUT_MODE, mode.as_str()) {
            warn!(%mode, "input mode preference not persisted");
        }
    }

    // -------------------------------------------------------------------------
    // Network
    // -------------------------------------------------------------------------

    fn send(&mut self, message: NetMessage) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };
        let sent = transport.send(&message);
        if sent {
            self.messages_sent += 1;
        }
        sent
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if state == self.connection {
            return;
        }
        info!(from = ?self.connection, to = ?state, "connection state changed");
        self.connection = state;
        self.push(GameEventData::Connection(state));
    }

    fn broadcast_state(&mut self) {
        if self.transport.is_none() {
            return;
        }
        let ch = &self.local;
        let state = PlayerStateMsg {
            player_id: ch.id,
            x: ch.position.x,
            y: ch.position.y,
            z: ch.position.z,
            rotation: self.camera_yaw,
            current_anim_key: ch.anim_key,
            last_facing: ch.facing,
            is_grounded: ch.physics.is_grounded,
            is_running: ch.is_running,
        };
        self.send(NetMessage::PlayerState(state));
    }

    fn process_inbound(&mut self, surface: &mut dyn PresentSurface, audio: &mut dyn AudioSink) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let inbound = transport.poll();
        let state = transport.state();
        self.set_connection(state);

        for envelope in inbound {
            if envelope.from == self.local.id {
                continue;
            }
            self.handle_message(envelope, surface, audio);
        }
    }

    fn handle_message(&mut self, envelope: Envelope, surface: &mut dyn PresentSurface, audio: &mut dyn AudioSink) {
        let from = envelope.from;
        match envelope.message {
            NetMessage::PlayerState(state) => {
                if state.player_id != from {
                    debug!(from = %from.short(), "ignoring state relayed for another player");
                    return;
                }
                if let Some(request) = self.replication.on_player_state(state) {
                    self.request_spawn(request);
                }
            }
            NetMessage::ProjectileCreate(msg) => match msg.launch_spec() {
                Ok(spec) => {
                    self.projectiles.spawn_remote(from, msg.character_name, msg.origin(), spec);
                }
                Err(e) => warn!(from = %from.short(), error = %e, "malformed projectile-create"),
            },
            NetMessage::PlayerDamage(msg) => {
                if msg.target_id == self.local.id {
                    self.damage_local(msg.damage, DamageSource::Remote, Some(from), surface, audio);
                } else {
                    self.replication.on_damage(msg.target_id, msg.health, msg.max_health);
                }
            }
            NetMessage::CharacterChange(msg) => match self.assets.get(msg.character_name) {
                Ok(set) => {
                    self.replication.on_character_change(from, msg.character_name, set);
                    self.push(GameEventData::RemoteCharacterChanged {
                        player_id: from,
                        character: msg.character_name,
                    });
                }
                Err(e) => warn!(from = %from.short(), error = %e, "unknown remote character"),
            },
            NetMessage::RoomUpdated(msg) => {
                self.push(GameEventData::RoomUpdated { is_private: msg.is_private });
            }
            NetMessage::PlayerLeft(msg) => {
                let id = msg.player_id;
                self.projectiles.remove_owned_by(id);
                self.melee.clear_player(id);
                if self.replication.remove(id, surface) {
                    self.push(GameEventData::RemoteRemoved { player_id: id });
                }
            }
        }
    }

    fn request_spawn(&mut self, request: SpawnRequest) {
        let id = request.player_id;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // Left pending; abandoned and retried after the spawn timeout
            warn!(player = %id.short(), "no async runtime for remote spawn");
            return;
        };

        let assets = Arc::clone(&self.assets);
        let loader = Arc::clone(&self.loader);
        let tx = self.spawn_tx.clone();
        let timeout = Duration::try_from_secs_f32(self.config.replication.texture_timeout)
            .unwrap_or(DEFAULT_TEXTURE_TIMEOUT);

        runtime.spawn(async move {
            let result = prepare_spawn(request, &assets, loader.as_ref(), timeout).await;
            // The session may be gone by now
            let _ = tx.send(result.map_err(|e| (id, e)));
        });
    }

    fn attach_ready_spawns(&mut self, surface: &mut dyn PresentSurface) {
        let max_health = self.config.physics.max_health;
        while let Ok(result) = self.spawn_rx.try_recv() {
            match result {
                Ok(bundle) => match self.replication.attach(bundle, surface) {
                    Ok(id) => {
                        self.replication.on_damage(id, max_health, max_health);
                        self.push(GameEventData::RemoteSpawned { player_id: id });
                    }
                    Err(e) => debug!(error = %e, "discarding spawn bundle"),
                },
                Err((id, e)) => {
                    warn!(player = %id.short(), error = %e, "remote spawn failed");
                    self.replication.spawn_failed(id);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Present
    // -------------------------------------------------------------------------

    fn present(&mut self, surface: &mut dyn PresentSurface) {
        // 1. Local sprite
        let handle = match self.local_handle {
            Some(handle) => handle,
            None => {
                let textures = self.animation.animations().textures();
                let handle = surface.attach_sprite(self.local.id, &textures);
                self.local_handle = Some(handle);
                handle
            }
        };
        surface.update_sprite(
            handle,
            self.local.position,
            self.camera_yaw,
            self.animation.current(),
            self.animation.frame(),
        );

        // 2. Bot sprites, live bots only
        let bots = &self.bots;
        self.bot_handles.retain(|id, handle| {
            let keep = bots.get(*id).is_some_and(|b| b.is_alive());
            if !keep {
                surface.dispose(*handle);
            }
            keep
        });
        for bot in self.bots.bots().filter(|b| b.is_alive()) {
            let handle = match self.bot_handles.get(&bot.id) {
                Some(handle) => *handle,
                None => {
                    let textures = self.assets.get(bot.character).map(|s| s.textures()).unwrap_or_default();
                    let handle = surface.attach_sprite(bot.id, &textures);
                    self.bot_handles.insert(bot.id, handle);
                    handle
                }
            };
            surface.update_sprite(handle, bot.position, self.camera_yaw, AnimKey::idle(Facing::Front), 0);
        }

        // 3. Orphans
        let mut keep: Vec<RenderHandle> = self.bot_handles.values().copied().collect();
        keep.push(handle);
        for event in self.replication.sweep_orphans(surface, &keep) {
            if let ReplicationEvent::Removed { player_id, .. } = event {
                self.push(GameEventData::RemoteRemoved { player_id });
            }
        }

        // 4. Overlays
        surface.set_damage_overlay(self.damage_flash);
        surface.set_fade_overlay(self.respawn.overlay_alpha());
        surface.present();
    }
}

/// Read a persisted preference.
fn stored<T: FromStr>(store: &SharedStore, key: &str) -> Option<T> {
    store.get(key).and_then(|value| value.parse().ok())
}

/// Join a room over WebSocket, retrying per the session configuration.
pub async fn join_room(
    base_url: &str,
    room: &str,
    local_id: PlayerId,
    config: &SessionConfig,
) -> Result<WebSocketTransport, TransportError> {
    let delay = Duration::from_millis(config.join_retry_delay_ms);
    join_room_with_retry(room, config.join_retry_attempts, delay, |code| {
        WebSocketTransport::join(base_url, code, local_id, ReconnectPolicy::default(), JOIN_TIMEOUT)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::audio::RecordingAudio;
    use crate::bridge::render::HeadlessSurface;
    use crate::bridge::storage::{bot_count_key, KeyValueStore, MemoryStore};
    use crate::network::spawn::StaticTextureLoader;
    use crate::network::transport::LoopbackHub;

    const DT: f32 = 1.0 / 60.0;

    fn setup(store: SharedStore, query: &str) -> SessionSetup {
        SessionSetup::new(
            PlayerId::from_u128(1),
            store,
            Arc::new(CharacterAssets::uniform(4, 8.0)),
            Arc::new(StaticTextureLoader::new()),
        )
        .with_params(LaunchParams::parse(query))
    }

    fn session(query: &str) -> Session {
        Session::start(setup(MemoryStore::shared(), query)).unwrap()
    }

    fn run(session: &mut Session, frames: usize, input: InputState, surface: &mut HeadlessSurface) -> Vec<GameEvent> {
        let mut audio = RecordingAudio::default();
        let mut events = Vec::new();
        for _ in 0..frames {
            events.extend(session.tick(DT, input, surface, &mut audio).events);
        }
        events
    }

    fn has(events: &[GameEvent], pred: impl Fn(&GameEventData) -> bool) -> bool {
        events.iter().any(|e| pred(&e.data))
    }

    #[test]
    fn test_start_rejects_unknown_arena() {
        let result = Session::start(setup(MemoryStore::shared(), "arena=volcano"));
        assert!(matches!(result, Err(SessionError::Arena(_))));
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let mut config = SimConfig::default();
        config.physics.gravity = 5.0;
        let result = Session::start(setup(MemoryStore::shared(), "").with_config(config));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_launch_params_override_persisted_preferences() {
        let store = MemoryStore::shared();
        store.set(KEY_LAST_CHARACTER, "herald");
        store.set(KEY_LAST_GAME_MODE, "collection");

        let restored = Session::start(setup(store.clone(), "")).unwrap();
        assert_eq!(restored.local().name, CharacterName::Herald);
        assert_eq!(restored.mode_state().mode, GameMode::Collection);

        let launched = Session::start(setup(store, "char=lucy&mode=time-trial&arena=large")).unwrap();
        assert_eq!(launched.local().name, CharacterName::Lucy);
        assert_eq!(launched.mode_state().mode, GameMode::TimeTrial);
        assert_eq!(launched.arena(), Arena::Large);
    }

    #[test]
    fn test_pause_freezes_simulation() {
        let mut s = session("mode=free-play");
        let mut surface = HeadlessSurface::new();
        run(&mut s, 5, InputState::new(), &mut surface);

        let pause = InputState::new().with(InputState::PAUSE);
        run(&mut s, 1, pause, &mut surface);
        assert!(s.mode_state().is_paused);

        let before = s.local().position;
        let events = run(&mut s, 30, InputState::with_movement(1.0, 0.0), &mut surface);
        assert_eq!(s.local().position, before);
        assert!(!has(&events, |d| matches!(d, GameEventData::Landed)));
        // Still presented
        assert!(surface.frames > 30);
    }

    #[test]
    fn test_double_jump_consumes_once() {
        let mut s = session("");
        let mut surface = HeadlessSurface::new();
        let jump = InputState::new().with(InputState::JUMP);
        let idle = InputState::new();
        run(&mut s, 10, idle, &mut surface);
        assert!(s.local().physics.is_grounded);

        run(&mut s, 1, jump, &mut surface);
        assert!(!s.local().physics.is_grounded);
        run(&mut s, 3, idle, &mut surface);

        run(&mut s, 1, jump, &mut surface);
        assert!(s.local().physics.has_double_jumped);
        let after_double = s.local().physics.velocity_y;
        let expected = 0.8 * 12.0 - 30.0 * DT;
        assert!((after_double - expected).abs() < 1e-3);

        run(&mut s, 1, idle, &mut surface);
        run(&mut s, 1, jump, &mut surface);
        // Third press does nothing: velocity only decays under gravity
        let v = s.local().physics.velocity_y;
        assert!((v - (after_double - 2.0 * 30.0 * DT)).abs() < 1e-3);
    }

    #[test]
    fn test_swap_clears_cooldowns_and_broadcasts() {
        let hub = LoopbackHub::new();
        let mut peer = hub.join(PlayerId::from_u128(2));
        let store = MemoryStore::shared();
        store.set(&bot_count_key(Arena::Standard), "0");

        let mut s = Session::start(setup(store.clone(), "mode=shooting")).unwrap();
        s.attach_transport(Box::new(hub.join(PlayerId::from_u128(1))));
        let mut surface = HeadlessSurface::new();

        let mut fire = InputState::new().with(InputState::FIRE);
        fire.cursor = Some(Vec2::new(5.0, 0.0));
        run(&mut s, 1, fire, &mut surface);
        assert!(!s.projectiles().can_shoot(PlayerId::from_u128(1)));

        let swap = InputState::new().with(InputState::SWAP);
        let events = run(&mut s, 1, swap, &mut surface);
        assert!(s.projectiles().can_shoot(PlayerId::from_u128(1)));
        assert_eq!(s.local().name, CharacterName::Herald);
        assert!(has(&events, |d| matches!(d, GameEventData::CharacterSwapped { .. })));
        assert_eq!(store.get(KEY_LAST_CHARACTER).as_deref(), Some("herald"));

        let kinds: Vec<&str> = peer.poll().iter().map(|e| e.message.kind()).collect();
        assert!(kinds.contains(&"projectile-create"));
        assert!(kinds.contains(&"character-change"));
    }

    #[test]
    fn test_state_broadcast_interval() {
        let hub = LoopbackHub::new();
        let mut peer = hub.join(PlayerId::from_u128(2));
        let mut s = session("");
        s.attach_transport(Box::new(hub.join(PlayerId::from_u128(1))));
        let mut surface = HeadlessSurface::new();

        let mut audio = RecordingAudio::default();
        for _ in 0..20 {
            s.tick(0.01, InputState::new(), &mut surface, &mut audio);
        }
        let states = peer
            .poll()
            .into_iter()
            .filter(|e| matches!(e.message, NetMessage::PlayerState(_)))
            .count();
        assert!((3..=4).contains(&states), "got {states} state messages");
    }

    #[test]
    fn test_send_while_disconnected_is_noop() {
        let mut s = session("");
        let mut surface = HeadlessSurface::new();
        let mut audio = RecordingAudio::default();
        let report = s.tick(0.1, InputState::new(), &mut surface, &mut audio);
        assert_eq!(report.messages_sent, 0);
        assert_eq!(s.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_remote_damage_applies_to_local() {
        let hub = LoopbackHub::new();
        let mut peer = hub.join(PlayerId::from_u128(2));
        let mut s = session("");
        s.attach_transport(Box::new(hub.join(PlayerId::from_u128(1))));
        let mut surface = HeadlessSurface::new();

        peer.send(&NetMessage::PlayerDamage(PlayerDamageMsg {
            target_id: PlayerId::from_u128(1),
            damage: 25.0,
            health: 75.0,
            max_health: 100.0,
        }));
        let events = run(&mut s, 1, InputState::new(), &mut surface);
        assert_eq!(s.local().health, 75.0);
        assert!(has(&events, |d| matches!(
            d,
            GameEventData::DamageTaken { source: DamageSource::Remote, .. }
        )));
    }

    #[tokio::test]
    async fn test_remote_player_spawns_after_preparation() {
        let hub = LoopbackHub::new();
        let mut a = session("");
        a.attach_transport(Box::new(hub.join(PlayerId::from_u128(1))));
        let mut b = Session::start(SessionSetup {
            local_id: PlayerId::from_u128(2),
            ..setup(MemoryStore::shared(), "")
        })
        .unwrap();
        b.attach_transport(Box::new(hub.join(PlayerId::from_u128(2))));

        let mut surface_a = HeadlessSurface::new();
        let mut surface_b = HeadlessSurface::new();
        let mut audio = RecordingAudio::default();

        let mut spawned = false;
        for _ in 0..20 {
            a.tick(0.05, InputState::new(), &mut surface_a, &mut audio);
            let report = b.tick(0.05, InputState::new(), &mut surface_b, &mut audio);
            spawned |= has(&report.events, |d| matches!(d, GameEventData::RemoteSpawned { .. }));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(spawned);
        assert_eq!(b.replication().len(), 1);
        assert!(b.replication().get(PlayerId::from_u128(1)).is_some());
        // Local sprite plus one remote
        assert_eq!(surface_b.node_count(), 2);
    }

    #[test]
    fn test_survival_hazard_schedules_restart() {
        let store = MemoryStore::shared();
        let mut s = Session::start(setup(store.clone(), "mode=survival")).unwrap();
        let mut surface = HeadlessSurface::new();
        let walk = InputState::with_movement(0.0, 0.3);

        run(&mut s, 5, walk, &mut surface);
        assert!(s.mode_state().is_started);

        // A hazard on open floor
        let hazard = s.entities().entities().find(|e| e.position.y < 1.0).unwrap().position;
        let y = s.local().position.y;
        s.teleport(Vec3::new(hazard.x, y, hazard.z));
        let events = run(&mut s, 1, walk, &mut surface);
        assert!(has(&events, |d| matches!(d, GameEventData::Mode(ModeEvent::HazardHit { .. }))));
        assert!(s.mode_state().is_paused);
        assert!(s.mode_state().is_complete);
        assert!(s.modes().records().get_best_time(GameMode::Survival, Arena::Standard).is_some());

        let events = run(&mut s, 100, InputState::new(), &mut surface);
        assert!(has(&events, |d| matches!(d, GameEventData::Mode(ModeEvent::Restarted { .. }))));
        assert!(!s.mode_state().is_paused);
        assert!(!s.mode_state().is_complete);
        assert_eq!(s.mode_state().timer, 0.0);
    }

    #[test]
    fn test_time_trial_finish_excludes_current_tick() {
        let mut s = session("mode=time-trial");
        let mut surface = HeadlessSurface::new();
        run(&mut s, 5, InputState::with_movement(0.3, 0.0), &mut surface);
        assert!(s.mode_state().is_started);
        assert!(s.mode_state().timer > 0.0);

        let checkpoints: Vec<Vec3> = s.entities().entities().map(|e| e.position).collect();
        assert_eq!(checkpoints.len(), 4);

        let mut finish = Vec::new();
        for position in checkpoints {
            let before = s.mode_state().timer;
            s.teleport(position);
            finish = run(&mut s, 1, InputState::new(), &mut surface);
            if s.mode_state().is_complete {
                assert_eq!(s.mode_state().last_time, Some(before));
                assert_eq!(s.mode_state().timer, before);
            }
        }

        assert!(s.mode_state().is_complete);
        assert!(has(&finish, |d| matches!(d, GameEventData::Mode(ModeEvent::Completed { .. }))));
    }

    #[test]
    fn test_fall_respawns_within_shooting_bounds() {
        let store = MemoryStore::shared();
        store.set(&bot_count_key(Arena::Standard), "0");
        let mut s = Session::start(setup(store, "mode=shooting")).unwrap();
        let mut surface = HeadlessSurface::new();
        run(&mut s, 2, InputState::new(), &mut surface);

        s.teleport(Vec3::new(30.0, 1.0, 30.0));
        let events = run(&mut s, 300, InputState::new(), &mut surface);
        assert!(has(&events, |d| matches!(d, GameEventData::Respawned)));

        let p = s.local().position;
        assert!(p.x.abs() <= 16.0 && p.z.abs() <= 16.0);
        assert_eq!(s.mode_state().deaths, 1);
        assert_eq!(s.local().health, s.local().max_health);
    }

    #[test]
    fn test_bot_count_clamped_and_persisted() {
        let store = MemoryStore::shared();
        let mut s = Session::start(setup(store.clone(), "mode=shooting")).unwrap();
        assert_eq!(s.bots().count(), 3);

        assert_eq!(s.set_bot_count(50), 10);
        assert_eq!(store.get(&bot_count_key(Arena::Standard)).as_deref(), Some("10"));

        s.set_mode(GameMode::FreePlay);
        assert_eq!(s.bots().bots().count(), 0);
        assert_eq!(store.get(KEY_LAST_GAME_MODE).as_deref(), Some("free-play"));
    }
}
