//! Per-thread generator state.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// xoroshiro128+ state (16 bytes, GPU-friendly).
///
/// Two 64-bit words and nothing else, so a slice of states has the same byte
/// layout on host and device: `s0, s1` per slot, slot-major.
///
/// The all-zero state is a fixed point of the generator. It is never produced
/// by seeding; see [`crate::rng::seed_state`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct GeneratorState {
    /// First state word.
    pub s0: u64,
    /// Second state word.
    pub s1: u64,
}

// SAFETY: GeneratorState is #[repr(C)] with two u64 fields and no padding
unsafe impl Zeroable for GeneratorState {}
unsafe impl Pod for GeneratorState {}

impl GeneratorState {
    /// Size of one state in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a state from its two words.
    pub const fn new(s0: u64, s1: u64) -> Self {
        Self { s0, s1 }
    }

    /// True for the degenerate all-zero state.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.s0 == 0 && self.s1 == 0
    }

    /// The state as an `(s0, s1)` pair.
    #[inline]
    pub const fn to_pair(self) -> (u64, u64) {
        (self.s0, self.s1)
    }

    /// The state packed into one 128-bit word, `s1` in the high half.
    #[inline]
    pub const fn to_u128(self) -> u128 {
        ((self.s1 as u128) << 64) | self.s0 as u128
    }
}

impl From<(u64, u64)> for GeneratorState {
    fn from((s0, s1): (u64, u64)) -> Self {
        Self { s0, s1 }
    }
}

impl From<GeneratorState> for (u64, u64) {
    fn from(state: GeneratorState) -> Self {
        state.to_pair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_size() {
        assert_eq!(std::mem::size_of::<GeneratorState>(), 16);
        assert_eq!(std::mem::align_of::<GeneratorState>(), 8);
        assert_eq!(GeneratorState::SIZE, 16);
    }

    #[test]
    fn test_state_byte_layout() {
        let state = GeneratorState::new(0x0102_0304_0506_0708, 0x1112_1314_1516_1718);
        let words: &[u64] = bytemuck::cast_slice(std::slice::from_ref(&state));
        assert_eq!(words, &[0x0102_0304_0506_0708, 0x1112_1314_1516_1718]);
    }

    #[test]
    fn test_zero_detection() {
        assert!(GeneratorState::default().is_zero());
        assert!(!GeneratorState::new(0, 1).is_zero());
        assert!(!GeneratorState::new(1, 0).is_zero());
    }

    #[test]
    fn test_pair_conversion() {
        let state: GeneratorState = (3, 4).into();
        assert_eq!(state, GeneratorState::new(3, 4));
        let pair: (u64, u64) = state.into();
        assert_eq!(pair, (3, 4));
        assert_eq!(state.to_u128(), (4u128 << 64) | 3);
    }
}
