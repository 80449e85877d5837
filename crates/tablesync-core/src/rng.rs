//! Random number generator abstraction.
//!
//! In production, this wraps an OS-seeded RNG so rolls are not predictable.
//! In tests, a seeded or scripted implementation is injected.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;
}

/// Production RNG seeded from the operating system's entropy source.
#[derive(Debug)]
pub struct SystemRng(StdRng);

impl SystemRng {
    /// Creates a new RNG seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl Default for SystemRng {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicRng for SystemRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.0.random_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_rng_stays_within_inclusive_bounds() {
        let mut rng = SystemRng::new();
        for _ in 0..1_000 {
            let value = rng.next_u32_range(1, 20);
            assert!((1..=20).contains(&value));
        }
    }

    #[test]
    fn test_system_rng_degenerate_range_returns_min() {
        let mut rng = SystemRng::new();
        assert_eq!(rng.next_u32_range(7, 7), 7);
    }
}
