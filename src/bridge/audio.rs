//! Audio Sink
//!
//! Sound playback is a fire-and-forget cue sink. A failed audio backend is
//! replaced by `NullAudio`; audio is never fatal.

use glam::Vec3;
use serde::{Serialize, Deserialize};

use crate::game::animation::FootstepSurface;

/// Sound cues emitted by the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    /// Footstep on a surface.
    Footstep(FootstepSurface),
    /// Ground jump.
    Jump,
    /// Air jump.
    DoubleJump,
    /// Touched down.
    Land,
    /// Firebolt cast.
    Firebolt,
    /// Mortar launch.
    MortarLaunch,
    /// Mortar splash.
    Explosion,
    /// Took damage.
    Hurt,
    /// Died.
    Death,
    /// Melee swing.
    Melee,
    /// Character swap.
    Swap,
    /// Collectible picked up.
    Collect,
    /// Checkpoint activated.
    Checkpoint,
}

/// Audio playback backend.
pub trait AudioSink {
    /// Play a cue, positioned when `at` is given.
    fn play(&mut self, cue: SoundCue, at: Option<Vec3>);
}

/// Discards every cue.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _cue: SoundCue, _at: Option<Vec3>) {}
}

/// Records cues for inspection (tests, headless summaries).
#[derive(Clone, Debug, Default)]
pub struct RecordingAudio {
    /// Cues played, in order.
    pub cues: Vec<SoundCue>,
}

impl RecordingAudio {
    /// How many times a cue was played.
    pub fn count(&self, cue: SoundCue) -> usize {
        self.cues.iter().filter(|c| **c == cue).count()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, cue: SoundCue, _at: Option<Vec3>) {
        self.cues.push(cue);
    }
}
