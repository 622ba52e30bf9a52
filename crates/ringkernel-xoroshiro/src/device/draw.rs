//! Device-side draw functions.
//!
//! Called from inside a kernel body with the thread's own index. Each call
//! advances `states[index]` in place. Never blocks, never fails.
//!
//! ```ignore
//! device.launch(GridDim::new(10, 64), |tid| {
//!     let i = tid.global();
//!     out[i].store(uniform_f32(&states, i));
//! })?;
//! ```

use crate::rng::UnitFloat;

use super::buffer::DeviceStates;

/// Raw 64-bit output of slot `index`.
#[inline]
pub fn next_u64(states: &DeviceStates, index: usize) -> u64 {
    states.with_state(index, |s| s.next_u64())
}

/// Uniform variate in [0, 1) from slot `index`, either precision.
#[inline]
pub fn uniform<F: UnitFloat>(states: &DeviceStates, index: usize) -> F {
    states.with_state(index, |s| s.next_uniform())
}

/// Standard normal variate from slot `index`, either precision.
#[inline]
pub fn normal<F: UnitFloat>(states: &DeviceStates, index: usize) -> F {
    states.with_state(index, |s| s.next_normal())
}

/// Uniform f32 in [0, 1).
#[inline]
pub fn uniform_f32(states: &DeviceStates, index: usize) -> f32 {
    uniform(states, index)
}

/// Uniform f64 in [0, 1).
#[inline]
pub fn uniform_f64(states: &DeviceStates, index: usize) -> f64 {
    uniform(states, index)
}

/// Standard normal f32.
#[inline]
pub fn normal_f32(states: &DeviceStates, index: usize) -> f32 {
    normal(states, index)
}

/// Standard normal f64.
#[inline]
pub fn normal_f64(states: &DeviceStates, index: usize) -> f64 {
    normal(states, index)
}
