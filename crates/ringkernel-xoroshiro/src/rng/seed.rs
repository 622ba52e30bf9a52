//! Scalar seed mixing.
//!
//! A raw 64-bit seed is expanded into a 128-bit state with SplitMix64 (two
//! successive outputs). Nearby seeds such as 0, 1, 2 land on unrelated states,
//! and the all-zero state is rejected.

use super::state::GeneratorState;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// SplitMix64 sequence used for seed expansion.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    counter: u64,
}

impl SplitMix64 {
    /// Start a sequence at `seed`.
    pub const fn new(seed: u64) -> Self {
        Self { counter: seed }
    }

    /// Next mixed output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(GOLDEN_GAMMA);
        mix64(self.counter)
    }
}

/// SplitMix64 finalizer (a bijection on u64).
#[inline]
pub const fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the initial generator state for `seed`.
///
/// Never returns the all-zero state: if both mixed words come out zero the
/// mixer keeps drawing.
pub fn seed_state(seed: u64) -> GeneratorState {
    let mut mixer = SplitMix64::new(seed);
    loop {
        let state = GeneratorState::new(mixer.next_u64(), mixer.next_u64());
        if !state.is_zero() {
            return state;
        }
        tracing::warn!(seed, "Seed mixed to the all-zero state, reseeding");
    }
}
