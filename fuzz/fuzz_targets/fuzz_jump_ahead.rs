//! Fuzz target for jump-ahead arithmetic.
//!
//! Checks that polynomial skips agree with stepping and that composed
//! jumps commute with the generator.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ringkernel_xoroshiro::{GeneratorState, JumpPolynomial};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    s0: u64,
    s1: u64,
    /// Short distance, stepped literally.
    steps: u16,
    /// Long distance, split into two polynomial skips.
    far_a: u64,
    far_b: u64,
}

fuzz_target!(|input: FuzzInput| {
    let state = GeneratorState::new(input.s0, input.s1);
    if state.is_zero() {
        return;
    }

    // Limit literal stepping
    let steps = u64::from(input.steps % 4096);

    let mut stepped = state;
    for _ in 0..steps {
        stepped.next_u64();
    }
    let mut skipped = state;
    skipped.skip(steps);
    assert_eq!(stepped, skipped, "skip({}) disagrees with stepping", steps);
    assert_eq!(
        JumpPolynomial::for_distance(u128::from(steps)).apply(state),
        stepped
    );

    // skip(a) then skip(b) equals one combined polynomial
    let a = JumpPolynomial::for_distance(u128::from(input.far_a));
    let b = JumpPolynomial::for_distance(u128::from(input.far_b));
    let combined = JumpPolynomial::for_distance(u128::from(input.far_a) + u128::from(input.far_b));
    assert_eq!(b.apply(a.apply(state)), combined.apply(state));
    assert_eq!(a.then(b).apply(state), combined.apply(state));

    // Jumping commutes with drawing
    let mut drawn_then_jumped = state;
    drawn_then_jumped.next_u64();
    drawn_then_jumped.jump();
    let mut jumped_then_drawn = state;
    jumped_then_drawn.jump();
    jumped_then_drawn.next_u64();
    assert_eq!(drawn_then_jumped, jumped_then_drawn);
});
