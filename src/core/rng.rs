//! Seeded Random Number Generator
//!
//! Respawn points and bot wandering draw from a ChaCha8 stream seeded per
//! session, so tests and replays see the same sequence on every platform.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded simulation RNG.
///
/// # Example
///
/// ```
/// use pyre_arena::core::rng::SimRng;
///
/// let mut a = SimRng::new(12345);
/// let mut b = SimRng::new(12345);
/// assert_eq!(a.unit(), b.unit());
/// ```
#[derive(Clone, Debug)]
pub struct SimRng {
    inner: ChaCha8Rng,
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimRng {
    /// Stream for `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.inner.gen::<f32>()
    }

    /// Uniform in [min, max). Returns `min` for an empty range.
    #[inline]
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        self.inner.gen_range(min..max)
    }

    /// Point inside `[-half_x, half_x] × [-half_z, half_z]`.
    pub fn point_in_rect(&mut self, half_x: f32, half_z: f32) -> Vec2 {
        Vec2::new(self.range_f32(-half_x, half_x), self.range_f32(-half_z, half_z))
    }

    /// Unit direction on the XZ plane.
    pub fn direction(&mut self) -> Vec2 {
        Vec2::from_angle(self.range_f32(0.0, std::f32::consts::TAU))
    }

    /// True with `probability`; values above 1 always hit.
    #[inline]
    pub fn chance(&mut self, probability: f32) -> bool {
        self.unit() < probability
    }
}
