//! Deterministic utilities for reproducible training
//!
//! Provides a seeded LCG and tie-breaking logic so that identical inputs
//! produce identical models and splits across runs and platforms.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses the 64-bit MMIX constants and returns the high bits only
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: Wrapping(seed ^ 0x5DEECE66D),
        };
        // Discard the first output so nearby seeds diverge
        rng.next_u32();
        rng
    }

    /// Generate next random u32
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        (self.state.0 >> 32) as u32
    }

    /// Generate random value in range [0, max)
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        let wide = (u64::from(self.next_u32()) << 32) | u64::from(self.next_u32());
        (wide % max as u64) as usize
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }
}

/// Deterministic tie-breaker for split selection
/// Equal-gain candidates resolve to the lowest (feature_idx, bin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub bin: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, bin: usize) -> Self {
        Self { feature_idx, bin }
    }
}
