//! Sprite Animation
//!
//! Clip storage, frame advance and movement-driven key selection. Missing
//! clips are recorded as a typed fallback to the idle strip of the same
//! facing, so a fallback can never be mistaken for a one-shot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::CharacterName;

/// Frame-rate multiplier for walk cycles while running.
pub const RUN_FPS_MULTIPLIER: f32 = 1.4;

/// Minimum |v_z| before facing is allowed to flip.
pub const FACING_THRESHOLD: f32 = 1e-4;

// =============================================================================
// KEYS
// =============================================================================

/// Sprite facing relative to the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Facing {
    /// Toward the camera.
    #[default]
    Front,
    /// Away from the camera.
    Back,
}

impl Facing {
    /// Key suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Back => "back",
        }
    }
}

/// Animation family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimKind {
    /// Standing loop.
    Idle,
    /// Walking loop.
    Walk,
    /// Damage flinch (one-shot).
    Hit,
    /// Death (one-shot).
    Death,
    /// Spawn-in (one-shot).
    Spawn,
}

impl AnimKind {
    /// All kinds.
    pub const ALL: [AnimKind; 5] = [
        AnimKind::Idle,
        AnimKind::Walk,
        AnimKind::Hit,
        AnimKind::Death,
        AnimKind::Spawn,
    ];

    /// Key prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            AnimKind::Idle => "idle",
            AnimKind::Walk => "walk",
            AnimKind::Hit => "hit",
            AnimKind::Death => "death",
            AnimKind::Spawn => "spawn",
        }
    }

    /// Kinds that play once and hold their last frame.
    pub fn is_one_shot_kind(self) -> bool {
        matches!(self, AnimKind::Hit | AnimKind::Death | AnimKind::Spawn)
    }
}

/// Malformed animation key string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid animation key: {0}")]
pub struct InvalidAnimKey(pub String);

/// Animation key such as `walk_back`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnimKey {
    /// Family.
    pub kind: AnimKind,
    /// Facing.
    pub facing: Facing,
}

impl AnimKey {
    /// Build a key.
    pub const fn new(kind: AnimKind, facing: Facing) -> Self {
        Self { kind, facing }
    }

    /// Idle key for a facing.
    pub const fn idle(facing: Facing) -> Self {
        Self::new(AnimKind::Idle, facing)
    }

    /// Walk key for a facing.
    pub const fn walk(facing: Facing) -> Self {
        Self::new(AnimKind::Walk, facing)
    }
}

impl fmt::Display for AnimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.facing.as_str())
    }
}

impl FromStr for AnimKey {
    type Err = InvalidAnimKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, facing) = s.split_once('_').ok_or_else(|| InvalidAnimKey(s.to_string()))?;
        let kind = AnimKind::ALL
            .into_iter()
            .find(|k| k.as_str() == kind)
            .ok_or_else(|| InvalidAnimKey(s.to_string()))?;
        let facing = match facing {
            "front" => Facing::Front,
            "back" => Facing::Back,
            _ => return Err(InvalidAnimKey(s.to_string())),
        };
        Ok(AnimKey::new(kind, facing))
    }
}

impl TryFrom<String> for AnimKey {
    type Error = InvalidAnimKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnimKey> for String {
    fn from(key: AnimKey) -> Self {
        key.to_string()
    }
}

// =============================================================================
// CLIPS
// =============================================================================

/// Where a clip's frames come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClipSource {
    /// Horizontal strip in a single texture.
    SpriteSheet {
        /// Texture path.
        texture: String,
        /// Number of frames in the strip.
        frame_count: u32,
    },
    /// One texture per frame.
    Frames(Vec<String>),
}

/// A loaded animation clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    /// Frame source.
    pub source: ClipSource,
    /// Playback rate.
    pub fps: f32,
}

impl AnimationClip {
    /// Sprite-sheet clip.
    pub fn sheet(texture: impl Into<String>, frame_count: u32, fps: f32) -> Self {
        Self {
            source: ClipSource::SpriteSheet {
                texture: texture.into(),
                frame_count,
            },
            fps,
        }
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        match &self.source {
            ClipSource::SpriteSheet { frame_count, .. } => *frame_count as usize,
            ClipSource::Frames(frames) => frames.len(),
        }
    }

    /// Textures this clip needs.
    pub fn textures(&self) -> Vec<&str> {
        match &self.source {
            ClipSource::SpriteSheet { texture, .. } => vec![texture.as_str()],
            ClipSource::Frames(frames) => frames.iter().map(String::as_str).collect(),
        }
    }
}

/// Animation bundle load errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnimationError {
    /// The mandatory idle strip for a facing is missing.
    #[error("Missing mandatory animation {0}")]
    MissingIdle(AnimKey),

    /// A clip has no frames.
    #[error("Animation {0} has no frames")]
    EmptyClip(AnimKey),

    /// No animation bundle at all for a character.
    #[error("No animations for character {0}")]
    MissingCharacter(CharacterName),
}

/// Slot in an animation set.
#[derive(Clone, Debug, PartialEq)]
pub enum AnimSlot {
    /// Clip available.
    Loaded(AnimationClip),
    /// Clip missing; plays the idle of the same facing.
    Fallback,
}

/// All clips of one character, with typed fallbacks.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationSet {
    slots: BTreeMap<AnimKey, AnimSlot>,
}

impl AnimationSet {
    /// Build a set from whatever clips loaded. Idle clips are mandatory;
    /// every other missing key becomes a fallback.
    pub fn build(mut clips: BTreeMap<AnimKey, AnimationClip>) -> Result<Self, AnimationError> {
        let mut slots = BTreeMap::new();

        for facing in [Facing::Front, Facing::Back] {
            for kind in AnimKind::ALL {
                let key = AnimKey::new(kind, facing);
                match clips.remove(&key) {
                    Some(clip) if clip.frame_count() == 0 => {
                        return Err(AnimationError::EmptyClip(key));
                    }
                    Some(clip) => {
                        slots.insert(key, AnimSlot::Loaded(clip));
                    }
                    None if kind == AnimKind::Idle => {
                        return Err(AnimationError::MissingIdle(key));
                    }
                    None => {
                        slots.insert(key, AnimSlot::Fallback);
                    }
                }
            }
        }

        Ok(Self { slots })
    }

    /// Set where every key has a sprite-sheet clip `<prefix>/<key>.png`.
    pub fn uniform(prefix: &str, frame_count: u32, fps: f32) -> Self {
        let clips = [Facing::Front, Facing::Back]
            .into_iter()
            .flat_map(|facing| AnimKind::ALL.into_iter().map(move |kind| AnimKey::new(kind, facing)))
            .map(|key| (key, AnimationClip::sheet(format!("{prefix}/{key}.png"), frame_count, fps)))
            .collect();
        // Every key present and non-empty when frame_count > 0
        Self::build(clips).unwrap_or_else(|_| Self::idle_only(prefix, fps))
    }

    fn idle_only(prefix: &str, fps: f32) -> Self {
        let mut slots = BTreeMap::new();
        for facing in [Facing::Front, Facing::Back] {
            for kind in AnimKind::ALL {
                let key = AnimKey::new(kind, facing);
                let slot = if kind == AnimKind::Idle {
                    AnimSlot::Loaded(AnimationClip::sheet(format!("{prefix}/{key}.png"), 1, fps))
                } else {
                    AnimSlot::Fallback
                };
                slots.insert(key, slot);
            }
        }
        Self { slots }
    }

    /// Resolve a key to the key and clip that will actually play.
    pub fn resolve(&self, key: AnimKey) -> (AnimKey, &AnimationClip) {
        match self.slots.get(&key) {
            Some(AnimSlot::Loaded(clip)) => (key, clip),
            _ => {
                let idle = AnimKey::idle(key.facing);
                match self.slots.get(&idle) {
                    Some(AnimSlot::Loaded(clip)) => (idle, clip),
                    // build() guarantees both idles are loaded
                    _ => unreachable!("animation set without idle clip"),
                }
            }
        }
    }

    /// Is this key a fallback?
    pub fn is_fallback(&self, key: AnimKey) -> bool {
        !matches!(self.slots.get(&key), Some(AnimSlot::Loaded(_)))
    }

    /// One-shot iff the kind is one-shot and a real clip is loaded.
    pub fn is_one_shot(&self, key: AnimKey) -> bool {
        key.kind.is_one_shot_kind() && !self.is_fallback(key)
    }

    /// Every texture referenced by loaded clips.
    pub fn textures(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .slots
            .values()
            .filter_map(|slot| match slot {
                AnimSlot::Loaded(clip) => Some(clip.textures()),
                AnimSlot::Fallback => None,
            })
            .flatten()
            .map(str::to_string)
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

/// Animation sets of every playable character.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterAssets {
    sets: BTreeMap<CharacterName, Arc<AnimationSet>>,
}

impl CharacterAssets {
    /// Build from per-character clip maps. Every character must be present
    /// with both idle strips.
    pub fn build(
        mut clips: BTreeMap<CharacterName, BTreeMap<AnimKey, AnimationClip>>,
    ) -> Result<Self, AnimationError> {
        let mut sets = BTreeMap::new();
        for character in CharacterName::ALL {
            let bundle = clips
                .remove(&character)
                .ok_or(AnimationError::MissingCharacter(character))?;
            sets.insert(character, Arc::new(AnimationSet::build(bundle)?));
        }
        Ok(Self { sets })
    }

    /// Default layout: `characters/<name>/<key>.png` strips.
    pub fn uniform(frame_count: u32, fps: f32) -> Self {
        let sets = CharacterName::ALL
            .into_iter()
            .map(|c| {
                let prefix = format!("characters/{}", c.as_str());
                (c, Arc::new(AnimationSet::uniform(&prefix, frame_count, fps)))
            })
            .collect();
        Self { sets }
    }

    /// Set for a character.
    pub fn get(&self, character: CharacterName) -> Result<Arc<AnimationSet>, AnimationError> {
        self.sets
            .get(&character)
            .cloned()
            .ok_or(AnimationError::MissingCharacter(character))
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Surface a footstep landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FootstepSurface {
    /// Base arena floor.
    Ground,
    /// Raised obstacle.
    Obstacle,
}

/// What happened during one controller update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnimationTick {
    /// At least one frame advanced.
    pub frame_changed: bool,
    /// Footstep to play.
    pub footstep: Option<FootstepSurface>,
    /// One-shot that finished this update (reported exactly once).
    pub completed: Option<AnimKey>,
}

/// Plays one character's animation set.
#[derive(Clone, Debug)]
pub struct AnimationController {
    set: Arc<AnimationSet>,
    current: AnimKey,
    frame: usize,
    time_acc: f32,
    completed: bool,
}

impl AnimationController {
    /// Start on `idle_front`.
    pub fn new(set: Arc<AnimationSet>) -> Self {
        Self {
            set,
            current: AnimKey::idle(Facing::Front),
            frame: 0,
            time_acc: 0.0,
            completed: false,
        }
    }

    /// Swap the animation set (character change), restarting on idle.
    pub fn set_animations(&mut self, set: Arc<AnimationSet>) {
        let facing = self.current.facing;
        self.set = set;
        self.current = AnimKey::new(AnimKind::Spawn, facing);
        self.frame = 0;
        self.time_acc = 0.0;
        self.completed = false;
    }

    /// Animation set in use.
    pub fn animations(&self) -> &Arc<AnimationSet> {
        &self.set
    }

    /// Requested key.
    pub fn current(&self) -> AnimKey {
        self.current
    }

    /// Current frame index within the resolved clip.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Is a one-shot still playing?
    pub fn is_playing_one_shot(&self) -> bool {
        self.set.is_one_shot(self.current) && !self.completed
    }

    /// Switch to `key`. Returns `false` when it is already playing.
    pub fn play(&mut self, key: AnimKey) -> bool {
        if key == self.current {
            return false;
        }
        self.current = key;
        self.frame = 0;
        self.time_acc = 0.0;
        self.completed = false;
        true
    }

    /// Advance by `dt`. `on_obstacle` classifies footsteps and is only
    /// called when a footstep frame is reached.
    pub fn update(
        &mut self,
        dt: f32,
        is_running: bool,
        on_obstacle: impl Fn() -> bool,
    ) -> AnimationTick {
        let mut tick = AnimationTick::default();
        let one_shot = self.set.is_one_shot(self.current);

        if one_shot && self.completed {
            return tick;
        }

        let (resolved, clip) = self.set.resolve(self.current);
        let frame_count = clip.frame_count().max(1);
        let walking = resolved.kind == AnimKind::Walk;

        let mut fps = clip.fps.max(1e-3);
        if is_running && walking {
            fps *= RUN_FPS_MULTIPLIER;
        }
        let frame_time = 1.0 / fps;

        self.time_acc += dt;
        while self.time_acc >= frame_time {
            self.time_acc -= frame_time;

            if one_shot {
                if self.frame + 1 >= frame_count {
                    self.completed = true;
                    self.time_acc = 0.0;
                    tick.completed = Some(self.current);
                    break;
                }
                self.frame += 1;
            } else {
                self.frame = (self.frame + 1) % frame_count;
            }
            tick.frame_changed = true;

            if walking && is_footstep_frame(self.frame, frame_count) {
                tick.footstep = Some(if on_obstacle() {
                    FootstepSurface::Obstacle
                } else {
                    FootstepSurface::Ground
                });
            }
        }

        tick
    }
}

/// Walk frames that play a footstep.
fn is_footstep_frame(frame: usize, frame_count: usize) -> bool {
    if frame_count < 4 {
        frame == 0
    } else {
        frame == 0 || frame == 2
    }
}

/// Update facing from horizontal velocity; small |v_z| keeps the old facing.
pub fn update_facing(current: Facing, velocity_z: f32) -> Facing {
    if velocity_z > FACING_THRESHOLD {
        Facing::Front
    } else if velocity_z < -FACING_THRESHOLD {
        Facing::Back
    } else {
        current
    }
}

/// Pick the movement-driven key. A one-shot in flight always wins.
pub fn select_movement_key(
    special_in_flight: Option<AnimKey>,
    is_grounded: bool,
    is_moving: bool,
    sprint_alt_form: bool,
    facing: Facing,
) -> AnimKey {
    if let Some(key) = special_in_flight {
        return key;
    }
    if !is_grounded {
        return AnimKey::idle(facing);
    }
    if is_moving {
        if sprint_alt_form {
            return AnimKey::idle(facing);
        }
        return AnimKey::walk(facing);
    }
    AnimKey::idle(facing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_assets_require_every_character() {
        let assets = CharacterAssets::uniform(4, 8.0);
        for character in CharacterName::ALL {
            let set = assets.get(character).unwrap();
            assert!(set.textures().iter().all(|t| t.starts_with("characters/")));
        }

        let mut clips = BTreeMap::new();
        let mut lucy = BTreeMap::new();
        lucy.insert(AnimKey::idle(Facing::Front), AnimationClip::sheet("a.png", 2, 8.0));
        lucy.insert(AnimKey::idle(Facing::Back), AnimationClip::sheet("b.png", 2, 8.0));
        clips.insert(CharacterName::Lucy, lucy);
        assert_eq!(
            CharacterAssets::build(clips),
            Err(AnimationError::MissingCharacter(CharacterName::Herald))
        );
    }

    fn set_without(missing: &[AnimKey], frames: u32) -> Arc<AnimationSet> {
        let clips = [Facing::Front, Facing::Back]
            .into_iter()
            .flat_map(|f| AnimKind::ALL.into_iter().map(move |k| AnimKey::new(k, f)))
            .filter(|k| !missing.contains(k))
            .map(|k| (k, AnimationClip::sheet(format!("{k}.png"), frames, 10.0)))
            .collect();
        Arc::new(AnimationSet::build(clips).unwrap())
    }

    #[test]
    fn test_key_string_roundtrip() {
        let key: AnimKey = "walk_back".parse().unwrap();
        assert_eq!(key, AnimKey::walk(Facing::Back));
        assert_eq!(key.to_string(), "walk_back");
        assert!("fly_front".parse::<AnimKey>().is_err());
        assert!("idle".parse::<AnimKey>().is_err());

        let json = serde_json::to_string(&AnimKey::idle(Facing::Front)).unwrap();
        assert_eq!(json, "\"idle_front\"");
    }

    #[test]
    fn test_missing_idle_is_fatal() {
        let mut clips = BTreeMap::new();
        clips.insert(AnimKey::idle(Facing::Front), AnimationClip::sheet("a.png", 4, 8.0));
        let err = AnimationSet::build(clips).unwrap_err();
        assert_eq!(err, AnimationError::MissingIdle(AnimKey::idle(Facing::Back)));
    }

    #[test]
    fn test_fallback_is_not_one_shot() {
        let hit = AnimKey::new(AnimKind::Hit, Facing::Front);
        let set = set_without(&[hit], 4);

        assert!(set.is_fallback(hit));
        assert!(!set.is_one_shot(hit));
        assert_eq!(set.resolve(hit).0, AnimKey::idle(Facing::Front));

        // Hit on the other facing is a real one-shot
        assert!(set.is_one_shot(AnimKey::new(AnimKind::Hit, Facing::Back)));
    }

    #[test]
    fn test_loop_wraps() {
        let mut ctrl = AnimationController::new(set_without(&[], 4));
        for _ in 0..6 {
            ctrl.update(0.1, false, || false);
        }
        assert_eq!(ctrl.frame(), 6 % 4);
    }

    #[test]
    fn test_one_shot_completes_once_and_holds() {
        let mut ctrl = AnimationController::new(set_without(&[], 3));
        let death = AnimKey::new(AnimKind::Death, Facing::Front);
        assert!(ctrl.play(death));
        assert!(ctrl.is_playing_one_shot());

        let mut completions = 0;
        for _ in 0..20 {
            if ctrl.update(0.1, false, || false).completed.is_some() {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(ctrl.frame(), 2);
        assert!(!ctrl.is_playing_one_shot());
    }

    #[test]
    fn test_fallback_one_shot_loops_instead_of_freezing() {
        let hit = AnimKey::new(AnimKind::Hit, Facing::Front);
        let mut ctrl = AnimationController::new(set_without(&[hit], 4));
        ctrl.play(hit);
        assert!(!ctrl.is_playing_one_shot());

        let mut completed = false;
        for _ in 0..10 {
            completed |= ctrl.update(0.1, false, || false).completed.is_some();
        }
        assert!(!completed);
        assert_eq!(ctrl.frame(), 10 % 4);
    }

    #[test]
    fn test_walk_footsteps_on_frames_zero_and_two() {
        let mut ctrl = AnimationController::new(set_without(&[], 4));
        ctrl.play(AnimKey::walk(Facing::Front));

        let mut steps = Vec::new();
        for _ in 0..8 {
            let tick = ctrl.update(0.1, false, || true);
            if let Some(surface) = tick.footstep {
                steps.push((ctrl.frame(), surface));
            }
        }
        assert_eq!(steps.len(), 4);
        assert!(steps.iter().all(|(f, s)| (*f == 0 || *f == 2) && *s == FootstepSurface::Obstacle));
    }

    #[test]
    fn test_short_walk_steps_only_on_frame_zero() {
        let mut ctrl = AnimationController::new(set_without(&[], 3));
        ctrl.play(AnimKey::walk(Facing::Back));
        let mut steps = 0;
        for _ in 0..6 {
            if ctrl.update(0.1, false, || false).footstep.is_some() {
                assert_eq!(ctrl.frame(), 0);
                steps += 1;
            }
        }
        assert_eq!(steps, 2);
    }

    #[test]
    fn test_running_walk_is_faster() {
        let mut walking = AnimationController::new(set_without(&[], 8));
        let mut running = AnimationController::new(set_without(&[], 8));
        walking.play(AnimKey::walk(Facing::Front));
        running.play(AnimKey::walk(Facing::Front));

        walking.update(0.35, false, || false);
        running.update(0.35, true, || false);
        assert_eq!(walking.frame(), 3);
        assert_eq!(running.frame(), 4);
    }

    #[test]
    fn test_facing_threshold() {
        assert_eq!(update_facing(Facing::Front, -0.5), Facing::Back);
        assert_eq!(update_facing(Facing::Back, 0.00001), Facing::Back);
        assert_eq!(update_facing(Facing::Back, 0.2), Facing::Front);
    }

    #[test]
    fn test_movement_key_priority() {
        let hit = AnimKey::new(AnimKind::Hit, Facing::Back);
        assert_eq!(select_movement_key(Some(hit), false, true, false, Facing::Front), hit);
        assert_eq!(
            select_movement_key(None, false, true, false, Facing::Front),
            AnimKey::idle(Facing::Front)
        );
        assert_eq!(
            select_movement_key(None, true, true, false, Facing::Back),
            AnimKey::walk(Facing::Back)
        );
        assert_eq!(
            select_movement_key(None, true, true, true, Facing::Back),
            AnimKey::idle(Facing::Back)
        );
        assert_eq!(
            select_movement_key(None, true, false, false, Facing::Front),
            AnimKey::idle(Facing::Front)
        );
    }

    #[test]
    fn test_textures_listed_once() {
        let set = AnimationSet::uniform("lucy", 4, 8.0);
        let textures = set.textures();
        assert_eq!(textures.len(), 10);
        assert!(textures.contains(&"lucy/idle_front.png".to_string()));
    }
}
