//! Remote Replication
//!
//! Keeps other players' characters smooth between low-rate authoritative
//! updates: interpolation toward the latest target while updates are fresh,
//! capped horizontal extrapolation when they lag, billboard rotation, stale
//! eviction and an orphan sweep of scene nodes.
//!
//! Spawns are serialized per player id. The first `player-state` for an
//! unknown player yields a `SpawnRequest`; later states for the same id are
//! coalesced into the pending spawn until the prepared bundle is attached or
//! the spawn is abandoned after `spawn_timeout`.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use tracing::{debug, info, warn};

use crate::bridge::render::{PresentSurface, RenderHandle};
use crate::config::ReplicationConfig;
use crate::core::math::{lerp_angle, xz};
use crate::game::animation::{AnimKey, AnimationController, AnimationSet, Facing, FootstepSurface};
use crate::game::collision::CollisionWorld;
use crate::game::state::{CharacterName, PlayerId};
use crate::network::protocol::PlayerStateMsg;
use crate::network::spawn::{SpawnBundle, SpawnError, SpawnRequest};

/// Window below which an update interval yields a velocity sample.
const MAX_SAMPLE_INTERVAL: f64 = 1.0;

/// Remote bodies use the default character height for impulse landings.
const BODY_HALF_HEIGHT: f32 = 1.0;

/// Knockback or launch impulse applied to a remote body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impulse {
    /// Impulse velocity.
    pub velocity: Vec3,
    /// Knocked back (as opposed to launched).
    pub knocked_back: bool,
    /// Vertical speed below which a landing does not bounce.
    pub min_bounce_velocity: f32,
    /// Fraction of vertical speed kept on a bounce.
    pub bounce_restitution: f32,
}

/// Another session's character as seen locally.
#[derive(Clone, Debug)]
pub struct RemoteEntity {
    /// Remote player.
    pub player_id: PlayerId,
    /// Character being played.
    pub character: CharacterName,
    /// Scene node.
    pub handle: RenderHandle,
    /// Animation playback.
    pub animation: AnimationController,
    /// Rendered position.
    pub current: Vec3,
    /// Latest authoritative position.
    pub target: Vec3,
    /// Rendered position when the latest update arrived.
    pub previous: Vec3,
    /// Smoothed velocity estimate.
    pub smoothed_velocity: Vec3,
    /// Replication time of the latest update.
    pub last_update: f64,
    /// Rendered yaw.
    pub rotation: f32,
    /// Yaw being approached.
    pub target_rotation: f32,
    /// Yaw reported by the owner.
    pub network_rotation: f32,
    /// Animation key reported by the owner.
    pub network_anim: AnimKey,
    /// Facing reported by the owner.
    pub facing: Facing,
    /// Owner is sprinting.
    pub is_running: bool,
    /// Owner is on the ground.
    pub is_grounded: bool,
    /// Seconds until the next running smoke puff.
    pub smoke_timer: f32,
    /// Active impulse.
    pub impulse: Option<Impulse>,
    /// Last known health.
    pub health: f32,
    /// Last known max health.
    pub max_health: f32,
}

/// Per-entity render tick output.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RemoteTick {
    /// Emit a running smoke puff.
    pub smoke: bool,
    /// Footstep reached.
    pub footstep: Option<FootstepSurface>,
}

impl RemoteEntity {
    fn new(bundle: &SpawnBundle, handle: RenderHandle, state: &PlayerStateMsg, now: f64, config: &ReplicationConfig) -> Self {
        let position = state.position();
        let mut animation = AnimationController::new(bundle.animations.clone());
        animation.play(state.current_anim_key);
        Self {
            player_id: bundle.player_id,
            character: bundle.character,
            handle,
            animation,
            current: position,
            target: position,
            previous: position,
            smoothed_velocity: Vec3::ZERO,
            last_update: now,
            rotation: state.rotation,
            target_rotation: state.rotation,
            network_rotation: state.rotation,
            network_anim: state.current_anim_key,
            facing: state.last_facing,
            is_running: state.is_running,
            is_grounded: state.is_grounded,
            smoke_timer: config.smoke_interval,
            impulse: None,
            health: 0.0,
            max_health: 0.0,
        }
    }

    /// Fold in an authoritative update received at `now`.
    pub fn apply_update(&mut self, state: &PlayerStateMsg, now: f64, config: &ReplicationConfig) {
        let new_target = state.position();
        self.previous = self.current;

        let interval = now - self.last_update;
        if interval > 0.0 && interval < MAX_SAMPLE_INTERVAL {
            let instant = (new_target - self.target) / interval as f32;
            let keep = config.velocity_smoothing;
            self.smoothed_velocity = self.smoothed_velocity * keep + instant * (1.0 - keep);
        }

        self.target = new_target;
        self.last_update = now;

        self.network_rotation = state.rotation;
        self.facing = state.last_facing;
        self.is_running = state.is_running;
        self.is_grounded = state.is_grounded;
        if state.current_anim_key != self.network_anim {
            self.network_anim = state.current_anim_key;
            self.animation.play(state.current_anim_key);
        }
    }

    /// Start an impulse (knockback). Replaces any active impulse.
    pub fn apply_impulse(&mut self, impulse: Impulse) {
        self.impulse = Some(impulse);
    }

    /// Advance rendering state by `dt` at replication time `now`.
    pub fn step(
        &mut self,
        dt: f32,
        now: f64,
        camera_yaw: f32,
        config: &ReplicationConfig,
        world: &dyn CollisionWorld,
    ) -> RemoteTick {
        let mut out = RemoteTick::default();

        // 1. Position
        if let Some(mut impulse) = self.impulse.take() {
            self.current += impulse.velocity * dt;
            impulse.velocity.x *= config.velocity_decay;
            impulse.velocity.z *= config.velocity_decay;
            impulse.velocity.y += config.impulse_gravity * dt;

            let gh = world.ground_height(self.current.x, self.current.z, 0.0);
            let floor = if gh.is_finite() { gh + BODY_HALF_HEIGHT } else { self.target.y };
            let mut active = true;
            if self.current.y <= floor && impulse.velocity.y < 0.0 {
                self.current.y = floor;
                if -impulse.velocity.y > impulse.min_bounce_velocity {
                    impulse.velocity.y = -impulse.velocity.y * impulse.bounce_restitution;
                } else {
                    active = false;
                }
            }
            if active {
                self.impulse = Some(impulse);
            }
        } else {
            self.follow_target(now, config);
        }

        // 2. Billboard rotation
        self.target_rotation = camera_yaw;
        self.rotation = lerp_angle(self.rotation, self.target_rotation, config.rotation_lerp);

        // 3. Running smoke
        if self.is_running && self.is_grounded {
            self.smoke_timer -= dt;
            if self.smoke_timer <= 0.0 {
                self.smoke_timer = config.smoke_interval;
                out.smoke = true;
            }
        }

        // 4. Animation
        let position = self.current;
        let tick = self.animation.update(dt, self.is_running, || {
            world.is_on_obstacle(position.x, position.z, 1.0)
        });
        out.footstep = tick.footstep;

        out
    }

    fn follow_target(&mut self, now: f64, config: &ReplicationConfig) {
        let horizontal = xz(self.target).distance(xz(self.current));
        let vertical = (self.target.y - self.current.y).abs();

        if horizontal < config.snap_distance && vertical < config.snap_distance {
            self.current = self.target;
            return;
        }

        let since = (now - self.last_update) as f32;
        if since < config.interpolation_window {
            let k = 0.15 + 0.1 * (horizontal / 5.0).min(1.0);
            self.current = self.current.lerp(self.target, k);
        } else {
            let ahead = (since - config.extrapolation_cap).clamp(0.0, config.extrapolation_cap);
            let drift = Vec2::new(self.smoothed_velocity.x, self.smoothed_velocity.z) * ahead;
            self.current = Vec3::new(self.target.x + drift.x, self.target.y, self.target.z + drift.y);
        }
    }
}

/// Why an entity left the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// No update within the stale timeout.
    Stale,
    /// The player left.
    Left,
    /// Its scene node was swept as an orphan.
    Orphaned,
}

/// Replication notifications for the session.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplicationEvent {
    /// Entity removed.
    Removed {
        /// Player.
        player_id: PlayerId,
        /// Why.
        reason: RemovalReason,
    },
    /// A pending spawn ran out of time.
    SpawnAbandoned(PlayerId),
    /// Running smoke puff at a position.
    Smoke(Vec3),
    /// Remote footstep at a position.
    Footstep(FootstepSurface, Vec3),
}

#[derive(Clone, Debug)]
struct PendingSpawn {
    started: f64,
    latest: PlayerStateMsg,
}

/// Owns every remote entity and the pending spawn set.
#[derive(Debug)]
pub struct RemoteReplication {
    config: ReplicationConfig,
    entities: BTreeMap<PlayerId, RemoteEntity>,
    spawning: BTreeMap<PlayerId, PendingSpawn>,
    characters: BTreeMap<PlayerId, CharacterName>,
    time: f64,
}

impl RemoteReplication {
    /// Empty replication state.
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            config,
            entities: BTreeMap::new(),
            spawning: BTreeMap::new(),
            characters: BTreeMap::new(),
            time: 0.0,
        }
    }

    /// Replication clock (seconds).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Tuning.
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Entity lookup.
    pub fn get(&self, id: PlayerId) -> Option<&RemoteEntity> {
        self.entities.get(&id)
    }

    /// Mutable entity lookup.
    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut RemoteEntity> {
        self.entities.get_mut(&id)
    }

    /// Attached entities.
    pub fn entities(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    /// Number of attached entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Nothing attached?
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Is a spawn in flight for `id`?
    pub fn is_spawning(&self, id: PlayerId) -> bool {
        self.spawning.contains_key(&id)
    }

    /// Last character announced by `id`.
    pub fn character_of(&self, id: PlayerId) -> CharacterName {
        self.characters.get(&id).copied().unwrap_or_default()
    }

    /// Handle a `player-state`. Returns a spawn request the first time an
    /// unknown player is seen.
    pub fn on_player_state(&mut self, state: PlayerStateMsg) -> Option<SpawnRequest> {
        let id = state.player_id;

        if let Some(entity) = self.entities.get_mut(&id) {
            entity.apply_update(&state, self.time, &self.config);
            return None;
        }

        if let Some(pending) = self.spawning.get_mut(&id) {
            pending.latest = state;
            return None;
        }

        let character = self.character_of(id);
        self.spawning.insert(id, PendingSpawn { started: self.time, latest: state.clone() });
        debug!(player = %id.short(), %character, "remote spawn requested");
        Some(SpawnRequest { player_id: id, character, state })
    }

    /// Record a `character-change`. An attached entity swaps to `animations`.
    pub fn on_character_change(&mut self, id: PlayerId, character: CharacterName, animations: Arc<AnimationSet>) {
        self.characters.insert(id, character);
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.character = character;
            entity.animation.set_animations(animations);
        }
    }

    /// Record damage reported for a remote player.
    pub fn on_damage(&mut self, id: PlayerId, health: f32, max_health: f32) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.health = health;
            entity.max_health = max_health;
        }
    }

    /// Attach a prepared bundle. Fails if the spawn is no longer pending
    /// (abandoned, or the player left while textures loaded).
    pub fn attach(&mut self, bundle: SpawnBundle, surface: &mut dyn PresentSurface) -> Result<PlayerId, SpawnError> {
        let id = bundle.player_id;
        let pending = self.spawning.remove(&id).ok_or(SpawnError::NotPending(id))?;
        if self.entities.contains_key(&id) {
            return Err(SpawnError::NotPending(id));
        }

        let handle = surface.attach_sprite(id, &bundle.textures);
        let mut entity = RemoteEntity::new(&bundle, handle, &pending.latest, self.time, &self.config);
        // Character announced while the bundle was loading
        if let Some(character) = self.characters.get(&id) {
            entity.character = *character;
        }
        self.entities.insert(id, entity);
        info!(player = %id.short(), character = %bundle.character, "remote player spawned");
        Ok(id)
    }

    /// Forget a failed spawn so the next update retries it.
    pub fn spawn_failed(&mut self, id: PlayerId) {
        if self.spawning.remove(&id).is_some() {
            warn!(player = %id.short(), "remote spawn failed");
        }
    }

    /// Remove a player (left the room).
    pub fn remove(&mut self, id: PlayerId, surface: &mut dyn PresentSurface) -> bool {
        self.spawning.remove(&id);
        self.characters.remove(&id);
        match self.entities.remove(&id) {
            Some(entity) => {
                surface.dispose(entity.handle);
                info!(player = %id.short(), "remote player removed");
                true
            }
            None => false,
        }
    }

    /// Advance every entity, abandon overdue spawns and evict stale players.
    pub fn step(
        &mut self,
        dt: f32,
        camera_yaw: f32,
        surface: &mut dyn PresentSurface,
        world: &dyn CollisionWorld,
    ) -> Vec<ReplicationEvent> {
        self.time += dt as f64;
        let now = self.time;
        let mut events = Vec::new();

        // 1. Overdue spawns
        let spawn_timeout = self.config.spawn_timeout as f64;
        let overdue: Vec<PlayerId> = self
            .spawning
            .iter()
            .filter(|(_, p)| now - p.started > spawn_timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in overdue {
            self.spawning.remove(&id);
            warn!(player = %id.short(), "abandoning remote spawn");
            events.push(ReplicationEvent::SpawnAbandoned(id));
        }

        // 2. Stale eviction
        let stale_timeout = self.config.stale_timeout as f64;
        let stale: Vec<PlayerId> = self
            .entities
            .values()
            .filter(|e| now - e.last_update > stale_timeout)
            .map(|e| e.player_id)
            .collect();
        for id in stale {
            if let Some(entity) = self.entities.remove(&id) {
                surface.dispose(entity.handle);
                info!(player = %id.short(), "evicted stale remote player");
                events.push(ReplicationEvent::Removed { player_id: id, reason: RemovalReason::Stale });
            }
        }

        // 3. Render tick
        for entity in self.entities.values_mut() {
            let tick = entity.step(dt, now, camera_yaw, &self.config, world);
            if tick.smoke {
                events.push(ReplicationEvent::Smoke(entity.current));
            }
            if let Some(surface_kind) = tick.footstep {
                events.push(ReplicationEvent::Footstep(surface_kind, entity.current));
            }
            surface.update_sprite(
                entity.handle,
                entity.current,
                entity.rotation,
                entity.animation.current(),
                entity.animation.frame(),
            );
        }

        events
    }

    /// Dispose scene nodes whose texture is invalid, or that no tracked
    /// entity and no handle in `keep` owns. Entities whose node was swept are
    /// untracked so the next update respawns them.
    pub fn sweep_orphans(&mut self, surface: &mut dyn PresentSurface, keep: &[RenderHandle]) -> Vec<ReplicationEvent> {
        let mut events = Vec::new();

        for node in surface.scene_nodes() {
            let tracked = self.entities.values().find(|e| e.handle == node.handle).map(|e| e.player_id);
            let orphan = !node.texture_valid || (tracked.is_none() && !keep.contains(&node.handle));
            if !orphan {
                continue;
            }
            surface.dispose(node.handle);
            debug!(handle = node.handle.0, owner = %node.owner.short(), "swept orphan scene node");
            if let Some(id) = tracked {
                self.entities.remove(&id);
                events.push(ReplicationEvent::Removed { player_id: id, reason: RemovalReason::Orphaned });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::render::HeadlessSurface;
    use crate::game::animation::CharacterAssets;
    use crate::game::collision::ArenaWorld;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn state(id: u128, x: f32, z: f32) -> PlayerStateMsg {
        PlayerStateMsg {
            player_id: PlayerId::from_u128(id),
            x,
            y: 1.0,
            z,
            rotation: 0.0,
            current_anim_key: AnimKey::idle(Facing::Front),
            last_facing: Facing::Front,
            is_grounded: true,
            is_running: false,
        }
    }

    fn bundle(request: &SpawnRequest) -> SpawnBundle {
        let assets = CharacterAssets::uniform(4, 8.0);
        let animations = assets.get(request.character).unwrap();
        SpawnBundle {
            player_id: request.player_id,
            character: request.character,
            textures: animations.textures(),
            animations,
        }
    }

    fn spawned(surface: &mut HeadlessSurface, x: f32, z: f32) -> RemoteReplication {
        let mut rep = RemoteReplication::new(ReplicationConfig::default());
        let request = rep.on_player_state(state(1, x, z)).unwrap();
        rep.attach(bundle(&request), surface).unwrap();
        rep
    }

    #[test]
    fn test_duplicate_spawns_coalesce() {
        let mut surface = HeadlessSurface::new();
        let mut rep = RemoteReplication::new(ReplicationConfig::default());

        let request = rep.on_player_state(state(1, 0.0, 0.0)).unwrap();
        assert!(rep.on_player_state(state(1, 2.0, 0.0)).is_none());
        assert!(rep.is_spawning(PlayerId::from_u128(1)));

        rep.attach(bundle(&request), &mut surface).unwrap();
        assert_eq!(surface.node_count(), 1);
        // Attached at the latest coalesced state
        assert_eq!(rep.get(PlayerId::from_u128(1)).unwrap().current.x, 2.0);

        // A second bundle for the same id is rejected
        assert!(matches!(rep.attach(bundle(&request), &mut surface), Err(SpawnError::NotPending(_))));
        assert_eq!(surface.node_count(), 1);
    }

    #[test]
    fn test_spawn_abandoned_after_timeout() {
        let mut surface = HeadlessSurface::new();
        let world = ArenaWorld::flat();
        let mut rep = RemoteReplication::new(ReplicationConfig::default());
        let request = rep.on_player_state(state(1, 0.0, 0.0)).unwrap();

        let mut abandoned = false;
        for _ in 0..((5.2 / DT) as usize) {
            abandoned |= rep
                .step(DT, 0.0, &mut surface, &world)
                .contains(&ReplicationEvent::SpawnAbandoned(PlayerId::from_u128(1)));
        }
        assert!(abandoned);
        assert!(rep.attach(bundle(&request), &mut surface).is_err());
        assert_eq!(surface.node_count(), 0);

        // Next update retries
        assert!(rep.on_player_state(state(1, 0.0, 0.0)).is_some());
    }

    #[test]
    fn test_interpolation_snap() {
        let mut surface = HeadlessSurface::new();
        let world = ArenaWorld::flat();
        let mut rep = spawned(&mut surface, 0.0, 0.0);
        let id = PlayerId::from_u128(1);

        rep.on_player_state(state(1, 0.001, 0.001));
        rep.step(DT, 0.0, &mut surface, &world);
        let entity = rep.get(id).unwrap();
        assert_eq!(entity.current, Vec3::new(0.001, 1.0, 0.001));
    }

    #[test]
    fn test_fresh_update_interpolates() {
        let mut surface = HeadlessSurface::new();
        let world = ArenaWorld::flat();
        let mut rep = spawned(&mut surface, 0.0, 0.0);
        let id = PlayerId::from_u128(1);

        rep.on_player_state(state(1, 5.0, 0.0));
        rep.step(DT, 0.0, &mut surface, &world);
        let x = rep.get(id).unwrap().current.x;
        // k = 0.15 + 0.1 * min(5 / 5, 1)
        assert!((x - 1.25).abs() < 1e-4);
    }

    #[test]
    fn test_extrapolation_is_capped() {
        let mut surface = HeadlessSurface::new();
        let world = ArenaWorld::flat();
        let mut rep = spawned(&mut surface, 0.0, 0.0);
        let id = PlayerId::from_u128(1);

        // Two updates 0.1 s apart moving +x at 10 u/s
        for _ in 0..6 {
            rep.step(DT, 0.0, &mut surface, &world);
        }
        rep.on_player_state(state(1, 1.0, 0.0));

        // Let the update go stale for a while
        for _ in 0..60 {
            rep.step(DT, 0.0, &mut surface, &world);
        }
        let entity = rep.get(id).unwrap();
        let v = entity.smoothed_velocity.x;
        assert!(v > 0.0);
        let max_x = 1.0 + v * 0.15;
        assert!(entity.current.x <= max_x + 1e-4);
        assert!(entity.current.x >= 1.0);
        assert_eq!(entity.current.y, 1.0);
    }

    #[test]
    fn test_anim_key_replaced_only_on_change() {
        let mut surface = HeadlessSurface::new();
        let world = ArenaWorld::flat();
        let mut rep = spawned(&mut surface, 0.0, 0.0);
        let id = PlayerId::from_u128(1);

        let mut walking = state(1, 0.0, 0.0);
        walking.current_anim_key = AnimKey::walk(Facing::Back);
        rep.on_player_state(walking.clone());
        for _ in 0..10 {
            rep.step(DT, 0.0, &mut surface, &world);
        }
        let frame = rep.get(id).unwrap().animation.frame();
        assert!(frame > 0);

        // Same key again keeps the running clip
        rep.on_player_state(walking);
        assert_eq!(rep.get(id).unwrap().animation.frame(), frame);
        assert_eq!(rep.get(id).unwrap().animation.current(), AnimKey::walk(Facing::Back));
    }

    #[test]
    fn test_stale_entities_evicted() {
        let mut surface = HeadlessSurface::new();
        let world = ArenaWorld::flat();
        let mut rep = spawned(&mut surface, 0.0, 0.0);

        let mut removed = false;
        for _ in 0..((5.5 / DT) as usize) {
            for event in rep.step(DT, 0.0, &mut surface, &world) {
                removed |= matches!(event, ReplicationEvent::Removed { reason: RemovalReason::Stale, .. });
            }
        }
        assert!(removed);
        assert!(rep.is_empty());
        assert_eq!(surface.node_count(), 0);
    }

    #[test]
    fn test_orphan_sweep() {
        let mut surface = HeadlessSurface::new();
        let mut rep = spawned(&mut surface, 0.0, 0.0);
        let local = surface.attach_sprite(PlayerId::from_u128(99), &["me.png".to_string()]);
        let stray = surface.attach_sprite(PlayerId::from_u128(50), &["x.png".to_string()]);

        let handle = rep.get(PlayerId::from_u128(1)).unwrap().handle;
        surface.invalidate_texture(handle);

        let events = rep.sweep_orphans(&mut surface, &[local]);
        assert_eq!(events.len(), 1);
        assert!(rep.is_empty());
        assert!(surface.node(stray).is_none());
        assert!(surface.node(local).is_some());
    }

    #[test]
    fn test_impulse_bounces_then_settles() {
        let mut surface = HeadlessSurface::new();
        let world = ArenaWorld::flat();
        let mut rep = spawned(&mut surface, 0.0, 0.0);
        let id = PlayerId::from_u128(1);

        rep.get_mut(id).unwrap().apply_impulse(Impulse {
            velocity: Vec3::new(4.0, 6.0, 0.0),
            knocked_back: true,
            min_bounce_velocity: 2.0,
            bounce_restitution: 0.4,
        });
        for _ in 0..240 {
            rep.on_player_state(state(1, 0.0, 0.0));
            rep.step(DT, 0.0, &mut surface, &world);
        }
        assert!(rep.get(id).unwrap().impulse.is_none());
    }

    proptest! {
        #[test]
        fn test_position_on_segment_or_ray(
            start in -10.0f32..10.0,
            end in -10.0f32..10.0,
            steps in 1usize..40,
        ) {
            let mut surface = HeadlessSurface::new();
            let world = ArenaWorld::flat();
            let mut rep = spawned(&mut surface, start, 0.0);
            let id = PlayerId::from_u128(1);
            rep.on_player_state(state(1, end, 0.0));

            let lo = start.min(end) - 1e-3;
            let hi = start.max(end) + 1e-3;
            for _ in 0..steps {
                rep.step(DT, 0.0, &mut surface, &world);
                let e = rep.get(id).unwrap();
                let since = (rep.time() - e.last_update) as f32;
                if since < interpolation_window() {
                    prop_assert!(e.current.x >= lo && e.current.x <= hi);
                } else {
                    let reach = e.smoothed_velocity.x.abs() * 0.15 + 1e-3;
                    prop_assert!((e.current.x - e.target.x).abs() <= reach);
                }
            }
        }
    }

    fn interpolation_window() -> f32 {
        ReplicationConfig::default().interpolation_window
    }
}
