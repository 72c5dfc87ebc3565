//! Game Mode State Machine
//!
//! Per-mode timers, scoring, completion and restart scheduling. The machine
//! owns `ModeState`; nothing else mutates it. Mode entities (collectibles,
//! checkpoints, hazards) live behind an `EntityManager`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ScoringConfig;
use crate::core::math::distance_xz;
use crate::game::collision::{Arena, CollisionWorld};
use crate::game::events::EventQueue;
use crate::game::records::RecordsStore;

// =============================================================================
// MODES
// =============================================================================

/// Unknown mode string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown game mode: {0}")]
pub struct UnknownMode(pub String);

/// Game modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[derive(Default)]
pub enum GameMode {
    /// Explore freely; no timer or score.
    #[default]
    FreePlay,
    /// Activate every checkpoint as fast as possible.
    TimeTrial,
    /// Pick up every collectible.
    Collection,
    /// Avoid hazards for as long as possible.
    Survival,
    /// Fight bots and other players.
    Shooting,
}

impl GameMode {
    /// All modes.
    pub const ALL: [GameMode; 5] = [
        GameMode::FreePlay,
        GameMode::TimeTrial,
        GameMode::Collection,
        GameMode::Survival,
        GameMode::Shooting,
    ];

    /// Storage / URL code.
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::FreePlay => "free-play",
            GameMode::TimeTrial => "time-trial",
            GameMode::Collection => "collection",
            GameMode::Survival => "survival",
            GameMode::Shooting => "shooting",
        }
    }

    /// Does the mode wait for the player to move before its timer runs?
    pub fn requires_start(self) -> bool {
        matches!(self, GameMode::TimeTrial | GameMode::Survival | GameMode::Shooting)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

// =============================================================================
// MODE ENTITIES
// =============================================================================

/// Kind of mode entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Collection item.
    Collectible,
    /// Time-trial checkpoint.
    Checkpoint,
    /// Survival hazard.
    Hazard,
}

/// Reference to a spawned mode entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Kind.
    pub kind: EntityKind,
    /// Id unique within the manager.
    pub id: u32,
}

/// A spawned mode entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeEntity {
    /// Id unique within the manager.
    pub id: u32,
    /// Kind.
    pub kind: EntityKind,
    /// Center.
    pub position: Vec3,
    /// Trigger radius.
    pub radius: f32,
}

impl ModeEntity {
    /// Reference to this entity.
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef { kind: self.kind, id: self.id }
    }
}

/// Spawns and queries the entity set of a mode.
pub trait EntityManager {
    /// Remove every entity.
    fn clear(&mut self);

    /// Spawn the entity set for `mode` in `arena`.
    fn spawn_mode_entities(&mut self, mode: GameMode, arena: Arena) -> Vec<ModeEntity>;

    /// Remove one entity.
    fn despawn(&mut self, entity: EntityRef);

    /// Entities whose trigger overlaps a body at `position` with `radius`.
    fn overlapping(&self, position: Vec3, radius: f32) -> Vec<EntityRef>;
}

/// Vertical reach of entity triggers.
const TRIGGER_HEIGHT: f32 = 1.5;

/// Fixed layouts for each mode, placed on the arena floor.
#[derive(Clone, Debug, Default)]
pub struct ArenaEntities {
    entities: BTreeMap<u32, ModeEntity>,
    next_id: u32,
}

impl ArenaEntities {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entities.
    pub fn entities(&self) -> impl Iterator<Item = &ModeEntity> {
        self.entities.values()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// No live entities?
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn ring(
        &mut self,
        kind: EntityKind,
        count: u32,
        ring_radius: f32,
        angle_offset: f32,
        radius: f32,
        world: &dyn CollisionWorld,
    ) -> Vec<ModeEntity> {
        (0..count)
            .map(|i| {
                let angle = angle_offset + i as f32 * std::f32::consts::TAU / count as f32;
                let x = ring_radius * angle.cos();
                let z = ring_radius * angle.sin();
                let gh = world.ground_height(x, z, radius * 2.0);
                let floor = if gh.is_finite() { gh } else { 0.0 };

                self.next_id += 1;
                let entity = ModeEntity {
                    id: self.next_id,
                    kind,
                    position: Vec3::new(x, floor + 0.5, z),
                    radius,
                };
                self.entities.insert(entity.id, entity);
                entity
            })
            .collect()
    }
}

impl EntityManager for ArenaEntities {
    fn clear(&mut self) {
        self.entities.clear();
    }

    fn spawn_mode_entities(&mut self, mode: GameMode, arena: Arena) -> Vec<ModeEntity> {
        let world = arena.world();
        let half = world
            .bounds()
            .map(|b| b.half_x.min(b.half_z))
            .unwrap_or(20.0);

        match mode {
            GameMode::Collection => self.ring(EntityKind::Collectible, 8, half * 0.5, 0.0, 0.6, &world),
            GameMode::TimeTrial => self.ring(
                EntityKind::Checkpoint,
                4,
                half * 0.7,
                std::f32::consts::FRAC_PI_4,
                1.2,
                &world,
            ),
            GameMode::Survival => self.ring(
                EntityKind::Hazard,
                6,
                half * 0.35,
                std::f32::consts::FRAC_PI_6,
                1.0,
                &world,
            ),
            GameMode::FreePlay | GameMode::Shooting => Vec::new(),
        }
    }

    fn despawn(&mut self, entity: EntityRef) {
        if self.entities.get(&entity.id).is_some_and(|e| e.kind == entity.kind) {
            self.entities.remove(&entity.id);
        }
    }

    fn overlapping(&self, position: Vec3, radius: f32) -> Vec<EntityRef> {
        self.entities
            .values()
            .filter(|e| {
                distance_xz(e.position, position) < e.radius + radius
                    && (e.position.y - position.y).abs() < TRIGGER_HEIGHT
            })
            .map(ModeEntity::entity_ref)
            .collect()
    }
}

// =============================================================================
// MODE STATE
// =============================================================================

/// Which record was broken.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RecordKind {
    /// New high score.
    HighScore(u32),
    /// New best time (seconds).
    BestTime(f32),
}

/// Events emitted by the mode machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ModeEvent {
    /// Mode or arena changed.
    ModeChanged {
        /// Previous mode.
        from: GameMode,
        /// New mode.
        to: GameMode,
        /// Arena of the new mode.
        arena: Arena,
    },
    /// The run started (timer begins).
    Started {
        /// Mode that started.
        mode: GameMode,
    },
    /// The run was restarted.
    Restarted {
        /// Mode that restarted.
        mode: GameMode,
    },
    /// Collectible picked up.
    ItemCollected {
        /// Collectible id.
        id: u32,
        /// Score after the pickup.
        score: u32,
        /// Collectibles left.
        remaining: usize,
    },
    /// Checkpoint activated.
    CheckpointActivated {
        /// Checkpoint id.
        id: u32,
        /// Checkpoints left.
        remaining: usize,
    },
    /// Survival hazard touched.
    HazardHit {
        /// Survival time at contact.
        time: f32,
    },
    /// Run complete.
    Completed {
        /// Mode completed.
        mode: GameMode,
        /// Final run time.
        time: f32,
        /// Final score.
        score: u32,
    },
    /// A persisted record was beaten.
    RecordBroken {
        /// Mode of the record.
        mode: GameMode,
        /// Arena of the record.
        arena: Arena,
        /// New record value.
        record: RecordKind,
    },
    /// Shooting-mode kill.
    Kill {
        /// Kills this run.
        kills: u32,
        /// Score after the kill.
        score: u32,
    },
    /// Shooting-mode death.
    Death {
        /// Deaths this run.
        deaths: u32,
    },
}

/// State of the current mode run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeState {
    /// Active mode.
    pub mode: GameMode,
    /// Arena the run is in.
    pub arena: Arena,
    /// Run timer (seconds).
    pub timer: f32,
    /// Run score.
    pub score: u32,
    /// Persisted high score for `(mode, arena)`.
    pub high_score: u32,
    /// Persisted best time for `(mode, arena)`.
    pub best_time: Option<f32>,
    /// Time of the last finished run.
    pub last_time: Option<f32>,
    /// Run started.
    pub is_started: bool,
    /// Run paused (simulation frozen).
    pub is_paused: bool,
    /// Run finished.
    pub is_complete: bool,
    /// Collectibles still to pick up.
    pub items: BTreeSet<u32>,
    /// Checkpoints not yet activated.
    pub checkpoints: BTreeSet<u32>,
    /// Checkpoints activated this run.
    pub checkpoints_activated: u32,
    /// Hazards in play.
    pub hazards: BTreeSet<u32>,
    /// Local health (shooting only).
    pub health: Option<f32>,
    /// Shooting kills.
    pub kills: u32,
    /// Shooting deaths.
    pub deaths: u32,
}

impl ModeState {
    /// Is the run timer allowed to advance?
    pub fn timer_running(&self) -> bool {
        match self.mode {
            GameMode::FreePlay => false,
            GameMode::Collection => !self.is_paused && !self.is_complete,
            GameMode::TimeTrial | GameMode::Survival | GameMode::Shooting => {
                self.is_started && !self.is_paused && !self.is_complete
            }
        }
    }
}

// =============================================================================
// MACHINE
// =============================================================================

/// Owns the mode state and its records.
#[derive(Debug)]
pub struct GameModeMachine {
    state: ModeState,
    scoring: ScoringConfig,
    restart_delay: f32,
    pending_restart: Option<f32>,
    records: RecordsStore,
    events: EventQueue<ModeEvent>,
    record_announced: bool,
}

impl GameModeMachine {
    /// Boot in free-play on the standard arena.
    pub fn new(
        records: RecordsStore,
        scoring: ScoringConfig,
        restart_delay: f32,
        event_capacity: usize,
    ) -> Self {
        let mut machine = Self {
            state: ModeState::default(),
            scoring,
            restart_delay,
            pending_restart: None,
            records,
            events: EventQueue::new(event_capacity),
            record_announced: false,
        };
        machine.load_records();
        machine
    }

    /// Current state.
    pub fn state(&self) -> &ModeState {
        &self.state
    }

    /// Active mode.
    pub fn mode(&self) -> GameMode {
        self.state.mode
    }

    /// Active arena.
    pub fn arena(&self) -> Arena {
        self.state.arena
    }

    /// Records store.
    pub fn records(&self) -> &RecordsStore {
        &self.records
    }

    /// Seconds until a scheduled restart.
    pub fn pending_restart(&self) -> Option<f32> {
        self.pending_restart
    }

    /// Take queued events.
    pub fn drain_events(&mut self) -> Vec<ModeEvent> {
        self.events.drain()
    }

    fn load_records(&mut self) {
        let record = self.records.get(self.state.mode, self.state.arena);
        self.state.high_score = record.high_score.unwrap_or(0);
        self.state.best_time = record.best_time;
    }

    fn reset_progress(&mut self, entities: &mut dyn EntityManager) {
        let s = &mut self.state;
        s.timer = 0.0;
        s.score = 0;
        s.is_started = false;
        s.is_paused = false;
        s.is_complete = false;
        s.items.clear();
        s.checkpoints.clear();
        s.checkpoints_activated = 0;
        s.hazards.clear();
        s.kills = 0;
        s.deaths = 0;
        s.health = None;
        self.pending_restart = None;
        self.record_announced = false;

        entities.clear();
        for entity in entities.spawn_mode_entities(s.mode, s.arena) {
            match entity.kind {
                EntityKind::Collectible => s.items.insert(entity.id),
                EntityKind::Checkpoint => s.checkpoints.insert(entity.id),
                EntityKind::Hazard => s.hazards.insert(entity.id),
            };
        }
    }

    /// Switch mode and arena. A no-op when both are unchanged.
    pub fn set_mode(&mut self, mode: GameMode, arena: Arena, entities: &mut dyn EntityManager) -> bool {
        if mode == self.state.mode && arena == self.state.arena {
            return false;
        }

        let from = self.state.mode;
        self.state.mode = mode;
        self.state.arena = arena;
        self.state.last_time = None;
        self.load_records();
        self.reset_progress(entities);

        info!(%from, to = %mode, %arena, "game mode changed");
        self.events.push(ModeEvent::ModeChanged { from, to: mode, arena });
        true
    }

    /// Restart the current mode, keeping records.
    pub fn restart_mode(&mut self, entities: &mut dyn EntityManager) {
        self.reset_progress(entities);
        debug!(mode = %self.state.mode, "mode restarted");
        self.events.push(ModeEvent::Restarted { mode: self.state.mode });
    }

    /// Start the run. Returns `false` if already started or finished.
    pub fn start(&mut self) -> bool {
        if self.state.is_started || self.state.is_complete {
            return false;
        }
        self.state.is_started = true;
        self.events.push(ModeEvent::Started { mode: self.state.mode });
        true
    }

    /// Start modes that wait for movement.
    pub fn auto_start(&mut self, moving: bool) -> bool {
        if !moving || !self.state.mode.requires_start() || self.state.is_paused {
            return false;
        }
        self.start()
    }

    /// Pause or resume the run.
    pub fn set_paused(&mut self, paused: bool) {
        self.state.is_paused = paused;
    }

    /// Mirror the local character's health (shooting only).
    pub fn set_health(&mut self, health: f32) {
        if self.state.mode == GameMode::Shooting {
            self.state.health = Some(health);
        }
    }

    /// Advance the restart countdown and then the run timer.
    pub fn update(&mut self, dt: f32, entities: &mut dyn EntityManager) {
        self.update_restart(dt, entities);
        self.advance_timer(dt);
    }

    /// Count down a scheduled restart. Runs even while paused.
    pub fn update_restart(&mut self, dt: f32, entities: &mut dyn EntityManager) {
        if let Some(remaining) = self.pending_restart {
            let remaining = remaining - dt;
            if remaining <= 0.0 {
                self.restart_mode(entities);
            } else {
                self.pending_restart = Some(remaining);
            }
        }
    }

    /// Add `dt` to the run timer while it is running.
    pub fn advance_timer(&mut self, dt: f32) {
        if self.state.timer_running() {
            self.state.timer += dt;
        }
    }

    /// Apply overlaps found this tick.
    pub fn handle_collisions(&mut self, hits: &[EntityRef], entities: &mut dyn EntityManager) {
        for hit in hits {
            match hit.kind {
                EntityKind::Collectible => self.collect_item(hit.id, entities),
                EntityKind::Checkpoint => self.activate_checkpoint(hit.id, entities),
                EntityKind::Hazard => self.touch_hazard(),
            }
        }
    }

    fn collect_item(&mut self, id: u32, entities: &mut dyn EntityManager) {
        if self.state.is_complete || !self.state.items.remove(&id) {
            return;
        }
        entities.despawn(EntityRef { kind: EntityKind::Collectible, id });
        self.state.score += self.scoring.item_points;
        self.events.push(ModeEvent::ItemCollected {
            id,
            score: self.state.score,
            remaining: self.state.items.len(),
        });

        if self.state.mode == GameMode::Collection && self.state.items.is_empty() {
            self.state.is_complete = true;
            self.state.last_time = Some(self.state.timer);
            self.offer_high_score();
            self.events.push(ModeEvent::Completed {
                mode: self.state.mode,
                time: self.state.timer,
                score: self.state.score,
            });
            info!(score = self.state.score, time = self.state.timer, "collection complete");
        }
    }

    fn activate_checkpoint(&mut self, id: u32, entities: &mut dyn EntityManager) {
        if self.state.is_complete || !self.state.checkpoints.contains(&id) {
            return;
        }
        if !self.state.is_started {
            self.start();
        }
        self.state.checkpoints.remove(&id);
        self.state.checkpoints_activated += 1;
        entities.despawn(EntityRef { kind: EntityKind::Checkpoint, id });
        self.state.score += self.scoring.checkpoint_points;
        self.events.push(ModeEvent::CheckpointActivated {
            id,
            remaining: self.state.checkpoints.len(),
        });

        if self.state.mode == GameMode::TimeTrial && self.state.checkpoints.is_empty() {
            let time = self.state.timer;
            self.state.is_complete = true;
            self.state.last_time = Some(time);
            if self.state.best_time.map_or(true, |best| time < best) {
                self.state.best_time = Some(time);
                self.records.set_best_time(GameMode::TimeTrial, time, self.state.arena);
                self.events.push(ModeEvent::RecordBroken {
                    mode: GameMode::TimeTrial,
                    arena: self.state.arena,
                    record: RecordKind::BestTime(time),
                });
            }
            self.events.push(ModeEvent::Completed {
                mode: GameMode::TimeTrial,
                time,
                score: self.state.score,
            });
            info!(time, "time trial complete");
        }
    }

    fn touch_hazard(&mut self) {
        let s = &self.state;
        if s.mode != GameMode::Survival || !s.is_started || s.is_paused || s.is_complete {
            return;
        }

        let time = self.state.timer;
        self.state.last_time = Some(time);
        self.state.is_paused = true;
        self.state.is_complete = true;
        self.events.push(ModeEvent::HazardHit { time });

        if self.state.best_time.map_or(true, |best| time > best) {
            self.state.best_time = Some(time);
            self.records.set_best_time(GameMode::Survival, time, self.state.arena);
            self.events.push(ModeEvent::RecordBroken {
                mode: GameMode::Survival,
                arena: self.state.arena,
                record: RecordKind::BestTime(time),
            });
        }
        self.events.push(ModeEvent::Completed {
            mode: GameMode::Survival,
            time,
            score: self.state.score,
        });

        self.pending_restart = Some(self.restart_delay);
        info!(time, restart_in = self.restart_delay, "survival run over");
    }

    fn offer_high_score(&mut self) {
        let score = self.state.score;
        if score == 0 || score <= self.state.high_score {
            return;
        }
        self.state.high_score = score;
        self.records.set_high_score(self.state.mode, score, self.state.arena);
        if !self.record_announced {
            self.record_announced = true;
            self.events.push(ModeEvent::RecordBroken {
                mode: self.state.mode,
                arena: self.state.arena,
                record: RecordKind::HighScore(score),
            });
        }
    }

    /// Credit a shooting-mode kill.
    pub fn record_kill(&mut self) {
        if self.state.mode != GameMode::Shooting {
            return;
        }
        self.state.kills += 1;
        self.state.score += self.scoring.kill_points;
        self.offer_high_score();
        self.events.push(ModeEvent::Kill {
            kills: self.state.kills,
            score: self.state.score,
        });
    }

    /// Count a shooting-mode death.
    pub fn record_death(&mut self) {
        if self.state.mode != GameMode::Shooting {
            return;
        }
        self.state.deaths += 1;
        self.events.push(ModeEvent::Death { deaths: self.state.deaths });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::storage::MemoryStore;

    fn machine() -> (GameModeMachine, ArenaEntities) {
        let records = RecordsStore::new(MemoryStore::shared());
        (
            GameModeMachine::new(records, ScoringConfig::default(), 1.5, 64),
            ArenaEntities::new(),
        )
    }

    #[test]
    fn test_mode_strings() {
        assert_eq!("time-trial".parse::<GameMode>(), Ok(GameMode::TimeTrial));
        assert_eq!(GameMode::FreePlay.to_string(), "free-play");
        assert!("deathmatch".parse::<GameMode>().is_err());
        assert_eq!(serde_json::to_string(&GameMode::Survival).unwrap(), "\"survival\"");
    }

    #[test]
    fn test_boots_in_free_play() {
        let (m, _) = machine();
        assert_eq!(m.mode(), GameMode::FreePlay);
        assert_eq!(m.state().deaths, 0);
        assert!(!m.state().timer_running());
    }

    #[test]
    fn test_set_mode_is_noop_on_same_mode() {
        let (mut m, mut e) = machine();
        assert!(m.set_mode(GameMode::Collection, Arena::Standard, &mut e));
        m.drain_events();
        assert!(!m.set_mode(GameMode::Collection, Arena::Standard, &mut e));
        assert!(m.drain_events().is_empty());
    }

    #[test]
    fn test_set_mode_spawns_entities() {
        let (mut m, mut e) = machine();
        m.set_mode(GameMode::Collection, Arena::Standard, &mut e);
        assert_eq!(m.state().items.len(), 8);
        assert_eq!(e.len(), 8);

        m.set_mode(GameMode::Shooting, Arena::Standard, &mut e);
        assert!(e.is_empty());
        assert!(m.state().items.is_empty());
    }

    #[test]
    fn test_collection_completes_when_empty() {
        let (mut m, mut e) = machine();
        m.set_mode(GameMode::Collection, Arena::Standard, &mut e);

        let refs: Vec<EntityRef> = e.entities().map(ModeEntity::entity_ref).collect();
        m.update(3.0, &mut e);
        m.handle_collisions(&refs, &mut e);

        let s = m.state();
        assert!(s.is_complete);
        assert_eq!(s.score, 80);
        assert_eq!(s.high_score, 80);
        assert_eq!(m.records().get_high_score(GameMode::Collection, Arena::Standard), 80);
        assert!(m
            .drain_events()
            .iter()
            .any(|ev| matches!(ev, ModeEvent::Completed { mode: GameMode::Collection, .. })));
    }

    #[test]
    fn test_time_trial_keeps_best_time() {
        let (mut m, mut e) = machine();
        m.set_mode(GameMode::TimeTrial, Arena::Standard, &mut e);

        // Timer waits for a start
        m.update(1.0, &mut e);
        assert_eq!(m.state().timer, 0.0);

        assert!(m.auto_start(true));
        m.update(10.0, &mut e);
        let refs: Vec<EntityRef> = e.entities().map(ModeEntity::entity_ref).collect();
        m.handle_collisions(&refs, &mut e);
        assert!(m.state().is_complete);
        assert_eq!(m.state().best_time, Some(10.0));
        assert_eq!(m.state().score, 80);

        // Slower second run does not overwrite
        m.restart_mode(&mut e);
        m.start();
        m.update(12.0, &mut e);
        let refs: Vec<EntityRef> = e.entities().map(ModeEntity::entity_ref).collect();
        m.handle_collisions(&refs, &mut e);
        assert_eq!(m.state().last_time, Some(12.0));
        assert_eq!(m.state().best_time, Some(10.0));
        assert_eq!(m.records().get_best_time(GameMode::TimeTrial, Arena::Standard), Some(10.0));
    }

    #[test]
    fn test_survival_hazard_restart() {
        let (mut m, mut e) = machine();
        m.set_mode(GameMode::Survival, Arena::Standard, &mut e);
        m.auto_start(true);
        m.update(12.3, &mut e);

        let hazard = EntityRef {
            kind: EntityKind::Hazard,
            id: *m.state().hazards.iter().next().unwrap(),
        };
        m.handle_collisions(&[hazard], &mut e);

        let s = m.state();
        assert!((s.last_time.unwrap() - 12.3).abs() < 1e-4);
        assert!((s.best_time.unwrap() - 12.3).abs() < 1e-4);
        assert!(s.is_paused && s.is_complete);

        // Paused: timer frozen, restart countdown still runs
        m.update(1.0, &mut e);
        assert!(m.state().is_complete);
        assert!((m.state().timer - 12.3).abs() < 1e-4);

        m.update(0.5, &mut e);
        let s = m.state();
        assert!(!s.is_started);
        assert!(!s.is_complete);
        assert!(!s.is_paused);
        assert_eq!(s.timer, 0.0);
        assert!((s.best_time.unwrap() - 12.3).abs() < 1e-4);
        assert!(m.drain_events().iter().any(|ev| matches!(ev, ModeEvent::Restarted { .. })));
    }

    #[test]
    fn test_hazard_ignored_before_start() {
        let (mut m, mut e) = machine();
        m.set_mode(GameMode::Survival, Arena::Standard, &mut e);
        let hazard = EntityRef {
            kind: EntityKind::Hazard,
            id: *m.state().hazards.iter().next().unwrap(),
        };
        m.handle_collisions(&[hazard], &mut e);
        assert!(!m.state().is_complete);
        assert!(m.pending_restart().is_none());
    }

    #[test]
    fn test_records_reload_per_arena() {
        let (mut m, mut e) = machine();
        m.records().set_high_score(GameMode::Shooting, 70, Arena::Large);

        m.set_mode(GameMode::Shooting, Arena::Standard, &mut e);
        assert_eq!(m.state().high_score, 0);
        m.set_mode(GameMode::Shooting, Arena::Large, &mut e);
        assert_eq!(m.state().high_score, 70);
    }

    #[test]
    fn test_shooting_kills_and_deaths() {
        let (mut m, mut e) = machine();
        m.set_mode(GameMode::Shooting, Arena::Standard, &mut e);
        m.record_kill();
        m.record_kill();
        m.record_death();

        let s = m.state();
        assert_eq!((s.kills, s.deaths, s.score), (2, 1, 20));
        assert!(!s.is_complete);

        let broken = m
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, ModeEvent::RecordBroken { .. }))
            .count();
        assert_eq!(broken, 1);
        assert_eq!(m.records().get_high_score(GameMode::Shooting, Arena::Standard), 20);
    }

    #[test]
    fn test_restart_keeps_records() {
        let (mut m, mut e) = machine();
        m.set_mode(GameMode::Shooting, Arena::Standard, &mut e);
        m.record_kill();
        m.restart_mode(&mut e);
        assert_eq!(m.state().score, 0);
        assert_eq!(m.state().high_score, 10);
    }

    #[test]
    fn test_overlap_query() {
        let mut e = ArenaEntities::new();
        let spawned = e.spawn_mode_entities(GameMode::Collection, Arena::Standard);
        let first = spawned[0];
        let hits = e.overlapping(first.position + Vec3::new(0.3, 0.5, 0.0), 0.5);
        assert_eq!(hits, vec![first.entity_ref()]);
        assert!(e.overlapping(Vec3::new(0.0, 1.0, 0.0), 0.5).is_empty());
    }
}
