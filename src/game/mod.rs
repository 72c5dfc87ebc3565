//! Game Logic Module
//!
//! Everything the local session simulates each frame.
//!
//! ## Module Structure
//!
//! - `input`: Button bit set, press edges, camera-relative movement
//! - `state`: Player ids, character names, the local character
//! - `character`: Gravity, jumps, levitation, wall sliding, respawn
//! - `collision`: Arena worlds, ground queries, respawn sentinel
//! - `animation`: Animation sets, playback, footsteps
//! - `stats`: Per-character ability stats with modifiers
//! - `projectile`: Firebolts, mortars, fire areas and cooldowns
//! - `melee`: Swings and poison
//! - `bots`: Practice bots for shooting mode
//! - `mode`: Game mode state machine and mode entities
//! - `records`: Persisted high scores and best times
//! - `events`: Session events
//! - `session`: Per-frame coordinator

pub mod animation;
pub mod bots;
pub mod character;
pub mod collision;
pub mod events;
pub mod input;
pub mod melee;
pub mod mode;
pub mod projectile;
pub mod records;
pub mod session;
pub mod state;
pub mod stats;

// Re-export key types
pub use animation::{AnimKey, AnimKind, AnimationController, AnimationSet, CharacterAssets, Facing};
pub use collision::{Arena, ArenaWorld, CollisionWorld, RespawnMonitor};
pub use events::{DamageSource, GameEvent, GameEventData};
pub use input::{InputMode, InputState, InputTracker};
pub use mode::{ArenaEntities, EntityManager, GameMode, GameModeMachine, ModeEvent, ModeState};
pub use projectile::{LaunchSpec, ProjectileSystem};
pub use records::RecordsStore;
pub use session::{join_room, Session, SessionError, SessionSetup, TickReport};
pub use state::{Character, CharacterName, PlayerId};
