//! Raw output to floating-point variates.
//!
//! Both precisions share one skeleton parameterized by [`UnitFloat`]; the
//! per-type constants are generated by a single macro so f32 and f64 cannot
//! disagree on bit selection.

use std::fmt::Debug;

use super::state::GeneratorState;

/// Floating-point type a generator word can be mapped onto.
pub trait UnitFloat: Copy + Debug + PartialOrd + Send + Sync + 'static {
    /// Significand bits taken from the top of the raw word.
    const MANTISSA_BITS: u32;

    /// Zero of this type.
    const ZERO: Self;

    /// Top `MANTISSA_BITS` of `raw` scaled by `2^-MANTISSA_BITS`.
    ///
    /// Exact: the integer fits the significand and the scale is a power of
    /// two, so the result never rounds up to 1.0.
    fn from_raw(raw: u64) -> Self;

    /// `sqrt(-2 ln u1) * (cos, sin)(2π u2)`.
    fn box_muller(u1: Self, u2: Self) -> (Self, Self);

    /// Widen to f64 (for statistics).
    fn to_f64(self) -> f64;
}

macro_rules! impl_unit_float {
    ($ty:ty, $pi:expr) => {
        impl UnitFloat for $ty {
            const MANTISSA_BITS: u32 = <$ty>::MANTISSA_DIGITS;
            const ZERO: Self = 0.0;

            #[inline(always)]
            fn from_raw(raw: u64) -> Self {
                let scale = 1.0 / (1u64 << Self::MANTISSA_BITS) as $ty;
                (raw >> (u64::BITS - Self::MANTISSA_BITS)) as $ty * scale
            }

            #[inline]
            fn box_muller(u1: Self, u2: Self) -> (Self, Self) {
                let r = (-2.0 * u1.ln()).sqrt();
                let theta = 2.0 * $pi * u2;
                (r * theta.cos(), r * theta.sin())
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_unit_float!(f32, std::f32::consts::PI);
impl_unit_float!(f64, std::f64::consts::PI);

/// Uniform variate in [0, 1) from one raw word.
#[inline(always)]
pub fn uniform<F: UnitFloat>(raw: u64) -> F {
    F::from_raw(raw)
}

/// Uniform f32 in [0, 1) from the top 24 bits of `raw`.
#[inline(always)]
pub fn uniform32(raw: u64) -> f32 {
    uniform(raw)
}

/// Uniform f64 in [0, 1) from the top 53 bits of `raw`.
#[inline(always)]
pub fn uniform64(raw: u64) -> f64 {
    uniform(raw)
}

#[inline]
fn open_uniform_pair<F: UnitFloat>(state: &mut GeneratorState) -> (F, F) {
    // u1 feeds ln(); zero is attainable, so redraw it.
    let mut u1: F = uniform(state.next_u64());
    while u1 == F::ZERO {
        u1 = uniform(state.next_u64());
    }
    let u2: F = uniform(state.next_u64());
    (u1, u2)
}

/// Standard normal variate, advancing `state` by two draws.
///
/// The sine companion is discarded rather than cached, keeping the per-thread
/// state at 16 bytes.
#[inline]
pub fn normal<F: UnitFloat>(state: &mut GeneratorState) -> F {
    let (u1, u2) = open_uniform_pair(state);
    F::box_muller(u1, u2).0
}

/// Both Box–Muller outputs from one pair of draws.
#[inline]
pub fn normal_pair<F: UnitFloat>(state: &mut GeneratorState) -> (F, F) {
    let (u1, u2) = open_uniform_pair(state);
    F::box_muller(u1, u2)
}

/// Standard normal f32.
#[inline]
pub fn normal32(state: &mut GeneratorState) -> f32 {
    normal(state)
}

/// Standard normal f64.
#[inline]
pub fn normal64(state: &mut GeneratorState) -> f64 {
    normal(state)
}
