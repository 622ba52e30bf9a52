//! GF(2) jump polynomials for xoroshiro128+.
//!
//! The generator is linear over GF(2): one step is multiplication of the
//! 128-bit state by a fixed matrix `T`. Advancing `n` steps is therefore
//! `P(T)` for `P(x) = x^n mod p(x)`, where `p` is the characteristic
//! polynomial of `T` (degree 128). Applying `P(T)` costs 128 generator steps
//! regardless of `n`.
//!
//! `p` is recovered from the recurrence itself with Berlekamp–Massey, so the
//! precomputed 2^64 jump table can be checked against first principles.

use std::sync::OnceLock;

use super::state::GeneratorState;
use super::xoroshiro::step;

/// Degree of the characteristic polynomial (state width in bits).
pub const DEGREE: usize = 128;

/// A polynomial of degree < 128 over GF(2); bit `j` is the coefficient of `x^j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpPolynomial(u128);

impl JumpPolynomial {
    /// Precomputed `x^(2^64) mod p(x)`.
    pub const JUMP_2_64: Self = Self::from_words([0xbeac_0467_eba5_facb, 0xd86b_048b_86aa_9922]);

    /// The identity (`x^0`): applying it leaves a state unchanged.
    pub const IDENTITY: Self = Self(1);

    /// Build from two 64-bit words, low coefficients first.
    pub const fn from_words(words: [u64; 2]) -> Self {
        Self(((words[1] as u128) << 64) | words[0] as u128)
    }

    /// The coefficients as two 64-bit words, low coefficients first.
    pub const fn words(self) -> [u64; 2] {
        [self.0 as u64, (self.0 >> 64) as u64]
    }

    /// Raw coefficient bits.
    pub const fn bits(self) -> u128 {
        self.0
    }

    /// Polynomial advancing a state by exactly `distance` steps.
    ///
    /// Square-and-multiply on `x^distance mod p(x)`; `O(log distance)`
    /// polynomial products.
    pub fn for_distance(distance: u128) -> Self {
        let modulus = characteristic_polynomial();
        let mut acc = 1u128;
        for bit in (0..u128::BITS).rev() {
            acc = mul_mod(acc, acc, modulus);
            if (distance >> bit) & 1 == 1 {
                acc = mul_mod(acc, 2, modulus);
            }
        }
        Self(acc)
    }

    /// Polynomial advancing a state by `2^exponent` steps, by repeated squaring of `x`.
    pub fn for_power_of_two(exponent: u32) -> Self {
        let modulus = characteristic_polynomial();
        let mut acc = 2u128;
        for _ in 0..exponent {
            acc = mul_mod(acc, acc, modulus);
        }
        Self(acc)
    }

    /// Composition: applying the product equals applying both factors.
    pub fn then(self, other: Self) -> Self {
        Self(mul_mod(self.0, other.0, characteristic_polynomial()))
    }

    /// Apply the polynomial to `state`.
    ///
    /// Accumulates `state`, `T state`, `T^2 state`, ... under the coefficient
    /// mask. Branch-free: every coefficient costs one step and two masked xors.
    pub fn apply(self, state: GeneratorState) -> GeneratorState {
        let mut acc = GeneratorState::default();
        let mut current = state;
        for j in 0..DEGREE {
            let mask = 0u64.wrapping_sub(((self.0 >> j) & 1) as u64);
            acc.s0 ^= current.s0 & mask;
            acc.s1 ^= current.s1 & mask;
            current = step(current);
        }
        acc
    }
}

/// Low 128 coefficients of the characteristic polynomial (the `x^128` term is implicit).
pub fn characteristic_polynomial() -> u128 {
    static MODULUS: OnceLock<u128> = OnceLock::new();
    *MODULUS.get_or_init(|| {
        let (modulus, degree) = recover_characteristic(GeneratorState::new(1, 0));
        debug_assert_eq!(degree, DEGREE, "recurrence must have full linear complexity");
        modulus
    })
}

/// Berlekamp–Massey over the low bit of `s0`, starting from `seed`.
///
/// Returns the low coefficients of the minimal polynomial of the sequence and
/// its degree. For a full-period generator this is the characteristic
/// polynomial of the transition matrix.
pub(crate) fn recover_characteristic(seed: GeneratorState) -> (u128, usize) {
    let n = 2 * DEGREE;
    let mut seq = Vec::with_capacity(n);
    let mut state = seed;
    for _ in 0..n {
        seq.push((state.s0 & 1) as u8);
        state = step(state);
    }

    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut len = 0usize;
    let mut shift = 1usize;

    for i in 0..n {
        let mut d = seq[i];
        for j in 1..=len {
            d ^= c[j] & seq[i - j];
        }
        if d == 0 {
            shift += 1;
            continue;
        }
        let prev = c.clone();
        for j in 0..=(n - shift) {
            c[j + shift] ^= b[j];
        }
        if 2 * len <= i {
            len = i + 1 - len;
            b = prev;
            shift = 1;
        } else {
            shift += 1;
        }
    }

    // p(x) = x^L + c1 x^(L-1) + ... + cL, so the x^k coefficient is c[L - k].
    let mut modulus = 0u128;
    for k in 0..len.min(DEGREE) {
        modulus |= (c[len - k] as u128) << k;
    }
    (modulus, len)
}

/// `a * b mod p` where `modulus` holds the low coefficients of monic degree-128 `p`.
fn mul_mod(a: u128, b: u128, modulus: u128) -> u128 {
    let mut acc = 0u128;
    for bit in (0..u128::BITS).rev() {
        let carry = acc >> 127;
        acc <<= 1;
        acc ^= modulus & 0u128.wrapping_sub(carry);
        acc ^= a & 0u128.wrapping_sub((b >> bit) & 1);
    }
    acc
}
