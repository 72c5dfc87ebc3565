//! External Bridges
//!
//! Traits for the collaborators the kernel drives but does not own:
//!
//! - `storage`: persistent key-value store
//! - `render`: present surface and opaque render handles
//! - `audio`: sound cue sink

pub mod audio;
pub mod render;
pub mod storage;

pub use audio::{AudioSink, NullAudio, RecordingAudio, SoundCue};
pub use render::{HeadlessSurface, PresentSurface, RenderHandle, SceneNode, VisualEffect};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, SharedStore};
