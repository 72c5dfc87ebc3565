//! Core primitives.
//!
//! Frame clock, seeded randomness and math helpers shared by every
//! simulation subsystem.

pub mod clock;
pub mod math;
pub mod rng;

// Re-export core types
pub use clock::{FrameClock, MAX_FRAME_DT};
pub use rng::SimRng;
