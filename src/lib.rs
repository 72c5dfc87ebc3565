//! # Pyre Arena
//!
//! Simulation and synchronization kernel for Pyre Arena, a small
//! multiplayer arena game with two playable characters, five game modes and
//! room-based peer relay.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PYRE ARENA                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Frame clock, seeded RNG, math helpers     │
//! │                                                              │
//! │  game/           - Local simulation                          │
//! │  ├── character.rs- Vertical physics, jumps, levitation       │
//! │  ├── collision.rs- Arena worlds and respawn sentinel         │
//! │  ├── animation.rs- Sprite animation and footsteps            │
//! │  ├── projectile/ - Firebolts, mortars, fire areas            │
//! │  ├── melee.rs    - Swings and poison                         │
//! │  ├── bots.rs     - Practice bots                             │
//! │  ├── mode.rs     - Game mode state machine                   │
//! │  └── session.rs  - Per-frame coordinator                     │
//! │                                                              │
//! │  network/        - Room messaging                            │
//! │  ├── protocol.rs - Wire messages and launch parameters       │
//! │  ├── transport.rs- WebSocket and loopback transports         │
//! │  ├── spawn.rs    - Async remote spawn preparation            │
//! │  └── replication.rs - Remote player interpolation            │
//! │                                                              │
//! │  bridge/         - Storage, render surface, audio sink       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Each session is authoritative for its own character and for the damage
//! its own projectiles deal. Remote players are rendered from the states
//! they broadcast; nothing they report is re-simulated locally.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{ConfigError, SimConfig};
pub use game::session::{Session, SessionError, SessionSetup, TickReport};
pub use game::state::{CharacterName, PlayerId};
pub use network::protocol::{LaunchParams, NetMessage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Nominal frame rate (Hz)
pub const FRAME_RATE: u32 = 60;
