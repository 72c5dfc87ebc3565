//! Frame Clock
//!
//! Fixed-cadence frame scheduler driven by the rendering loop. Each frame
//! yields a clamped delta so a long stall (tab switch, debugger) cannot blow
//! up the integrators.

use std::time::Instant;

/// Largest delta handed to the simulation in one frame (seconds).
pub const MAX_FRAME_DT: f32 = 0.033;

/// Frame scheduler.
///
/// Time is supplied by the caller in seconds so tests can drive the clock
/// without sleeping. [`FrameClock::advance_now`] reads a monotonic clock for
/// the real loop.
#[derive(Debug, Clone)]
pub struct FrameClock {
    running: bool,
    last_now: Option<f64>,
    epoch: Instant,
    frames: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a stopped clock.
    pub fn new() -> Self {
        Self {
            running: false,
            last_now: None,
            epoch: Instant::now(),
            frames: 0,
        }
    }

    /// Start producing frames. The first frame after `start` has `dt = 0`.
    pub fn start(&mut self, now: f64) {
        self.running = true;
        self.last_now = Some(now);
    }

    /// Stop producing frames.
    pub fn stop(&mut self) {
        self.running = false;
        self.last_now = None;
    }

    /// Is the clock running?
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of frames produced since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Seconds elapsed since the clock was created (monotonic).
    pub fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Advance to `now` (seconds). Returns the clamped delta, or `None` while
    /// stopped.
    pub fn advance(&mut self, now: f64) -> Option<f32> {
        if !self.running {
            return None;
        }

        let last = self.last_now.unwrap_or(now);
        self.last_now = Some(now);
        self.frames += 1;

        // Clock going backwards yields a zero step
        let raw = (now - last).max(0.0) as f32;
        Some(raw.min(MAX_FRAME_DT))
    }

    /// Advance using the monotonic clock.
    pub fn advance_now(&mut self) -> Option<f32> {
        let now = self.now_secs();
        self.advance(now)
    }
}
