//! Host-side state vectors and the subsequence initializer.
//!
//! Slot 0 starts `subsequence_start` jumps past the seed state and every
//! following slot is one jump (2^64 draws) further along the same sequence:
//!
//! ```text
//! seed ──mix──► S ──jump^k──► slot 0 ──jump──► slot 1 ──jump──► slot 2 ...
//! ```
//!
//! Consequently `create(n, seed, k)[i] == create(n + k, seed, 0)[i + k]`, and
//! vectors created at disjoint offsets never share a stream.

use std::ops::Index;

use crate::config::StatesConfig;
use crate::error::{Result, RngError};
use crate::rng::{jump, seed_state, GeneratorState, JumpPolynomial};

/// Offsets up to this many jumps are walked one jump at a time; beyond it the
/// offset polynomial is computed directly.
const DIRECT_JUMP_LIMIT: u64 = 256;

/// Ordered generator states, one per logical thread.
///
/// The host copy of a state vector. Its raw byte layout (`s0, s1` per slot,
/// slot-major) is the one device buffers use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVector {
    states: Vec<GeneratorState>,
}

impl StateVector {
    /// Initialize `count` decorrelated states from `seed`.
    pub fn new(count: usize, seed: u64, subsequence_start: u64) -> Result<Self> {
        Self::from_config(&StatesConfig {
            count,
            seed,
            subsequence_start,
        })
    }

    /// Initialize from a validated configuration.
    pub fn from_config(config: &StatesConfig) -> Result<Self> {
        config.validate()?;

        let mut states = Vec::new();
        states
            .try_reserve_exact(config.count)
            .map_err(|_| RngError::HostAllocationFailed {
                size: config.size_bytes(),
            })?;

        let mut current = subsequence_origin(config.seed, config.subsequence_start);
        states.push(current);
        for _ in 1..config.count {
            current = jump(current);
            states.push(current);
        }

        tracing::debug!(
            count = config.count,
            seed = config.seed,
            subsequence_start = config.subsequence_start,
            "Initialized state vector"
        );

        Ok(Self { states })
    }

    /// Wrap existing states.
    ///
    /// Rejects empty input and the degenerate all-zero state.
    pub fn from_states(states: Vec<GeneratorState>) -> Result<Self> {
        if states.is_empty() {
            return Err(RngError::InvalidConfig(
                "state vector must not be empty".to_string(),
            ));
        }
        if let Some(slot) = states.iter().position(GeneratorState::is_zero) {
            return Err(RngError::InvalidConfig(format!(
                "slot {} holds the all-zero state",
                slot
            )));
        }
        Ok(Self { states })
    }

    /// Decode the raw byte layout (16 bytes per slot, native endianness).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % GeneratorState::SIZE != 0 {
            return Err(RngError::InvalidConfig(format!(
                "byte length {} is not a multiple of {}",
                bytes.len(),
                GeneratorState::SIZE
            )));
        }
        // Copies, so unaligned input is fine.
        let states: Vec<GeneratorState> = bytemuck::pod_collect_to_vec(bytes);
        Self::from_states(states)
    }

    /// Raw byte layout, borrowed.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.states)
    }

    /// Raw byte layout, owned.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Slots as `(s0, s1)` pairs in slot order.
    pub fn to_pairs(&self) -> Vec<(u64, u64)> {
        self.states.iter().map(|s| s.to_pair()).collect()
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false for a constructed vector.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.states.len() * GeneratorState::SIZE
    }

    /// State of one slot.
    pub fn get(&self, index: usize) -> Option<&GeneratorState> {
        self.states.get(index)
    }

    /// Slots as a slice.
    pub fn as_slice(&self) -> &[GeneratorState] {
        &self.states
    }

    /// Slots as a mutable slice, for host-side draws.
    pub fn as_mut_slice(&mut self) -> &mut [GeneratorState] {
        &mut self.states
    }

    /// Iterate over slots.
    pub fn iter(&self) -> std::slice::Iter<'_, GeneratorState> {
        self.states.iter()
    }

    /// Consume into the underlying states.
    pub fn into_inner(self) -> Vec<GeneratorState> {
        self.states
    }
}

impl Index<usize> for StateVector {
    type Output = GeneratorState;

    fn index(&self, index: usize) -> &GeneratorState {
        &self.states[index]
    }
}

impl<'a> IntoIterator for &'a StateVector {
    type Item = &'a GeneratorState;
    type IntoIter = std::slice::Iter<'a, GeneratorState>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

/// State of slot 0: the seed state advanced by `start` jumps.
fn subsequence_origin(seed: u64, start: u64) -> GeneratorState {
    let mut state = seed_state(seed);
    if start <= DIRECT_JUMP_LIMIT {
        for _ in 0..start {
            state = jump(state);
        }
    } else {
        // start < 2^64, so start * 2^64 fits in 128 bits.
        state = JumpPolynomial::for_distance((start as u128) << 64).apply(state);
    }
    state
}
