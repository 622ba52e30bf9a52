//! xoroshiro128+ generator primitives.
//!
//! Everything here is pure and infallible over non-zero states:
//! - [`advance`]: one step, one 64-bit output word
//! - [`jump`]: 2^64 steps at the cost of 128, for non-overlapping subsequences
//! - [`seed_state`]: scalar seed to a non-zero 128-bit state
//! - [`transform`]: raw words to uniform/normal f32 and f64 variates

mod poly;
mod seed;
mod state;
pub mod transform;
mod xoroshiro;

pub use poly::{characteristic_polynomial, JumpPolynomial};
pub use seed::{mix64, seed_state, SplitMix64};
pub use state::GeneratorState;
pub use transform::{normal, normal32, normal64, uniform, uniform32, uniform64, UnitFloat};
pub use xoroshiro::{advance, jump, Xoroshiro128Plus};
