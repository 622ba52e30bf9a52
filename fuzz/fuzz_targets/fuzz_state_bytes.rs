//! Fuzz target for decoding raw state vector bytes.
//!
//! Arbitrary byte strings must either decode into a vector of non-zero
//! states that re-encodes to the same bytes, or fail cleanly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ringkernel_xoroshiro::{RngError, StateVector};

fuzz_target!(|data: &[u8]| {
    match StateVector::from_bytes(data) {
        Ok(states) => {
            assert_eq!(states.size_bytes(), data.len());
            assert_eq!(states.as_bytes(), data);
            assert!(states.iter().all(|s| !s.is_zero()));

            // Drawing from any decoded slot never yields the zero state
            let mut first = states[0];
            for _ in 0..8 {
                first.next_u64();
            }
            assert!(!first.is_zero());
        }
        Err(RngError::InvalidConfig(_)) => {}
        Err(e) => panic!("unexpected error decoding {} bytes: {}", data.len(), e),
    }
});
