//! xoroshiro128+ core generator.
//!
//! xoroshiro128+ (Blackman & Vigna) with rotation/shift constants (55, 14, 36).
//!
//! Key properties:
//! - 128-bit state, period 2^128 - 1
//! - Uses only wrapping add, rotate, shift and xor: no branches, uniform cost
//!   across every thread of a grid
//! - Linear over GF(2) apart from the output sum, so it supports O(1) jumps
//!   of 2^64 steps for partitioning into non-overlapping subsequences
//!
//! The two lowest output bits have weak linear complexity; the float
//! transforms only consume high bits.

use rand_core::{impls, le, Error, RngCore, SeedableRng};

use super::poly::JumpPolynomial;
use super::seed::seed_state;
use super::state::GeneratorState;
use super::transform::{self, UnitFloat};

/// State transition without output.
#[inline(always)]
pub(crate) fn step(state: GeneratorState) -> GeneratorState {
    advance(state).1
}

/// Advance one state.
///
/// Returns the 64-bit output word (the sum of the input words) and the next
/// state. Deterministic and defined for every non-zero state.
#[inline(always)]
pub fn advance(state: GeneratorState) -> (u64, GeneratorState) {
    let s0 = state.s0;
    let mut s1 = state.s1;
    let result = s0.wrapping_add(s1);

    s1 ^= s0;
    let next = GeneratorState {
        s0: s0.rotate_left(55) ^ s1 ^ (s1 << 14),
        s1: s1.rotate_left(36),
    };

    (result, next)
}

/// Jump forward, equivalently to 2^64 calls to [`advance`].
///
/// Successive jumps from one seed state give non-overlapping subsequences of
/// length 2^64.
pub fn jump(state: GeneratorState) -> GeneratorState {
    JumpPolynomial::JUMP_2_64.apply(state)
}

impl GeneratorState {
    /// Advance in place and return the output word.
    #[inline(always)]
    pub fn next_u64(&mut self) -> u64 {
        let (out, next) = advance(*self);
        *self = next;
        out
    }

    /// Jump in place by 2^64 steps.
    pub fn jump(&mut self) {
        *self = jump(*self);
    }

    /// Skip `n` outputs in place.
    ///
    /// Small skips iterate; larger ones go through a jump polynomial.
    pub fn skip(&mut self, n: u64) {
        if n <= 128 {
            for _ in 0..n {
                *self = step(*self);
            }
        } else {
            *self = JumpPolynomial::for_distance(n as u128).apply(*self);
        }
    }

    /// Next uniform variate in [0, 1).
    #[inline]
    pub fn next_uniform<F: UnitFloat>(&mut self) -> F {
        transform::uniform(self.next_u64())
    }

    /// Next standard normal variate (Box–Muller, companion discarded).
    #[inline]
    pub fn next_normal<F: UnitFloat>(&mut self) -> F {
        transform::normal(self)
    }

    /// Next pair of independent standard normal variates.
    #[inline]
    pub fn next_normal_pair<F: UnitFloat>(&mut self) -> (F, F) {
        transform::normal_pair(self)
    }
}

/// Single-stream xoroshiro128+ generator for host code.
///
/// Wraps a [`GeneratorState`] and plugs into the `rand` ecosystem through
/// [`RngCore`] and [`SeedableRng`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xoroshiro128Plus {
    state: GeneratorState,
}

impl Xoroshiro128Plus {
    /// Create a generator from a scalar seed.
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed_state(seed),
        }
    }

    /// Create from existing state.
    ///
    /// An all-zero state is replaced by the state for seed 0.
    pub fn from_state(state: GeneratorState) -> Self {
        if state.is_zero() {
            return Self::new(0);
        }
        Self { state }
    }

    /// Get current state (for checkpointing).
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Jump forward by 2^64 outputs.
    pub fn jump(&mut self) {
        self.state.jump();
    }

    /// Skip `n` outputs.
    pub fn skip(&mut self, n: u64) {
        self.state.skip(n);
    }

    /// Generate next uniform f32 in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.state.next_uniform()
    }

    /// Generate next uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state.next_uniform()
    }

    /// Generate next standard normal f32.
    pub fn next_normal_f32(&mut self) -> f32 {
        self.state.next_normal()
    }

    /// Generate next standard normal f64.
    pub fn next_normal_f64(&mut self) -> f64 {
        self.state.next_normal()
    }
}

impl RngCore for Xoroshiro128Plus {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        // Low bits are the weak ones; hand out the upper half.
        (self.state.next_u64() >> 32) as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.state.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Xoroshiro128Plus {
    type Seed = [u8; 16];

    /// Little-endian `s0, s1`. An all-zero seed maps to the state for seed 0.
    fn from_seed(seed: [u8; 16]) -> Self {
        let mut words = [0u64; 2];
        le::read_u64_into(&seed, &mut words);
        Self::from_state(GeneratorState::new(words[0], words[1]))
    }

    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sequence() {
        // First outputs of the (55, 14, 36) reference generator from s0 = 1, s1 = 2.
        let mut state = GeneratorState::new(1, 2);
        assert_eq!(state.next_u64(), 3);

        // s1 ^= s0 -> 3; s0' = rotl(1, 55) ^ 3 ^ (3 << 14); s1' = rotl(3, 36)
        let expected = GeneratorState::new(
            1u64.rotate_left(55) ^ 3 ^ (3 << 14),
            3u64.rotate_left(36),
        );
        assert_eq!(state, expected);
        assert_eq!(state.next_u64(), expected.s0.wrapping_add(expected.s1));
    }

    #[test]
    fn test_advance_deterministic() {
        let state = GeneratorState::new(0xdead_beef, 0xcafe_babe);
        assert_eq!(advance(state), advance(state));
    }

    #[test]
    fn test_zero_state_is_fixed_point() {
        let (out, next) = advance(GeneratorState::default());
        assert_eq!(out, 0);
        assert!(next.is_zero());
    }

    #[test]
    fn test_nonzero_stays_nonzero() {
        let mut state = GeneratorState::new(0, 1);
        for _ in 0..10_000 {
            state.next_u64();
            assert!(!state.is_zero());
        }
        state.jump();
        assert!(!state.is_zero());
    }

    #[test]
    fn test_jump_changes_state() {
        let start = GeneratorState::new(1, 2);
        let jumped = jump(start);
        assert_ne!(start, jumped);
        assert_ne!(jump(jumped), jumped);
    }

    #[test]
    fn test_jump_commutes_with_advance() {
        // T^(2^64) and T commute, so jump-then-step equals step-then-jump.
        let start = GeneratorState::new(0x1234, 0x5678);
        assert_eq!(step(jump(start)), jump(step(start)));
    }

    #[test]
    fn test_skip_matches_iteration() {
        let start = GeneratorState::new(99, 100);
        for n in [0u64, 1, 128, 129, 500] {
            let mut skipped = start;
            skipped.skip(n);

            let mut iterated = start;
            for _ in 0..n {
                iterated.next_u64();
            }
            assert_eq!(skipped, iterated, "skip {}", n);
        }
    }

    #[test]
    fn test_host_rng_reproducible() {
        let mut rng1 = Xoroshiro128Plus::new(42);
        let mut rng2 = Xoroshiro128Plus::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_host_rng_different_seeds() {
        let mut rng1 = Xoroshiro128Plus::new(42);
        let mut rng2 = Xoroshiro128Plus::new(43);

        let same = (0..10).all(|_| rng1.next_u64() == rng2.next_u64());
        assert!(!same, "Different seeds should produce different sequences");
    }

    #[test]
    fn test_from_seed_bytes() {
        let mut bytes = [0u8; 16];
        bytes[0] = 1;
        bytes[8] = 2;
        let rng = Xoroshiro128Plus::from_seed(bytes);
        assert_eq!(rng.state(), GeneratorState::new(1, 2));

        let zero = Xoroshiro128Plus::from_seed([0u8; 16]);
        assert_eq!(zero, Xoroshiro128Plus::seed_from_u64(0));
        assert!(!zero.state().is_zero());
    }

    #[test]
    fn test_next_u32_uses_high_bits() {
        let mut a = Xoroshiro128Plus::new(7);
        let mut b = a.clone();
        assert_eq!(a.next_u32(), (b.next_u64() >> 32) as u32);
    }

    #[test]
    fn test_fill_bytes() {
        let mut rng = Xoroshiro128Plus::new(5);
        let mut buf = [0u8; 37];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_drives_rand_adapters() {
        use rand::Rng;

        let mut rng = Xoroshiro128Plus::seed_from_u64(9);
        for _ in 0..1000 {
            let x: u32 = rng.gen_range(10..20);
            assert!((10..20).contains(&x));
        }
        let mut a = Xoroshiro128Plus::seed_from_u64(9);
        let mut b = Xoroshiro128Plus::new(9);
        assert_eq!(a.gen::<u64>(), b.next_u64());
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = Xoroshiro128Plus::new(12345);

        for _ in 0..1000 {
            let u = rng.next_f32();
            assert!((0.0..1.0).contains(&u), "Uniform should be in [0, 1), got {}", u);
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "Uniform f64 should be in [0, 1), got {}", v);
        }
    }
}
