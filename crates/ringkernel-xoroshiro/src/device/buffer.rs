//! Device-resident state vectors.
//!
//! The device mirror of a [`StateVector`] is an index-addressed arena of
//! per-slot word pairs. Grid threads share the arena by reference and each one
//! advances only the slot at its own index; that calling convention is the
//! sole ownership rule. Slots are relaxed atomics, so breaking the convention
//! produces unspecified values rather than undefined behaviour, and the draw
//! path takes no locks.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, RngError};
use crate::rng::GeneratorState;
use crate::states::StateVector;

/// One device slot: the two state words.
#[derive(Debug, Default)]
#[repr(C)]
struct AtomicState {
    s0: AtomicU64,
    s1: AtomicU64,
}

impl AtomicState {
    #[inline(always)]
    fn load(&self) -> GeneratorState {
        GeneratorState::new(
            self.s0.load(Ordering::Relaxed),
            self.s1.load(Ordering::Relaxed),
        )
    }

    #[inline(always)]
    fn store(&self, state: GeneratorState) {
        self.s0.store(state.s0, Ordering::Relaxed);
        self.s1.store(state.s1, Ordering::Relaxed);
    }
}

/// Device memory reserved for one buffer; returned on drop.
#[derive(Debug)]
pub(crate) struct MemoryLease {
    bytes: usize,
    used: Arc<AtomicUsize>,
}

impl MemoryLease {
    /// Reserve `bytes` out of `capacity`, failing when the device is full.
    pub(crate) fn reserve(used: &Arc<AtomicUsize>, bytes: usize, capacity: usize) -> Result<Self> {
        let mut current = used.load(Ordering::Relaxed);
        loop {
            let available = capacity.saturating_sub(current);
            if bytes > available {
                return Err(RngError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
            match used.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Ok(Self {
                        bytes,
                        used: Arc::clone(used),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.used.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

/// Handle to a state vector in device memory.
///
/// Cloning the handle shares the buffer; memory is released when the last
/// handle drops. Contents written by a queued transfer are valid only after
/// the queue has been synchronized.
#[derive(Debug, Clone)]
pub struct DeviceStates {
    slots: Arc<[AtomicState]>,
    device_ordinal: usize,
    _lease: Arc<MemoryLease>,
}

impl DeviceStates {
    /// Allocate `count` zeroed slots under `lease`.
    pub(crate) fn allocate(
        count: usize,
        device_ordinal: usize,
        lease: MemoryLease,
    ) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(count)
            .map_err(|_| RngError::HostAllocationFailed {
                size: count.saturating_mul(GeneratorState::SIZE),
            })?;
        slots.resize_with(count, AtomicState::default);

        Ok(Self {
            slots: slots.into(),
            device_ordinal,
            _lease: Arc::new(lease),
        })
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false for an allocated buffer.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.slots.len() * GeneratorState::SIZE
    }

    /// Ordinal of the owning device.
    pub fn device_ordinal(&self) -> usize {
        self.device_ordinal
    }

    /// Read one slot.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn load(&self, index: usize) -> GeneratorState {
        self.slots[index].load()
    }

    /// Overwrite one slot.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn store(&self, index: usize, state: GeneratorState) {
        self.slots[index].store(state);
    }

    /// Advance slot `index` through `f` and write the result back.
    ///
    /// This is the device-side draw primitive: load the slot, run the
    /// generator on a local copy, store it back.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn with_state<R>(&self, index: usize, f: impl FnOnce(&mut GeneratorState) -> R) -> R {
        let slot = &self.slots[index];
        let mut state = slot.load();
        let out = f(&mut state);
        slot.store(state);
        out
    }

    /// Host-to-device copy of a whole state vector.
    pub(crate) fn write_from(&self, host: &StateVector) -> Result<()> {
        if host.len() != self.len() {
            return Err(RngError::TransferFailed(format!(
                "host vector has {} slots, device buffer has {}",
                host.len(),
                self.len()
            )));
        }
        for (slot, state) in self.slots.iter().zip(host.iter()) {
            slot.store(*state);
        }
        Ok(())
    }

    /// Device-to-host copy as `(s0, s1)` pairs in slot order.
    pub fn copy_to_host(&self) -> Vec<(u64, u64)> {
        self.slots.iter().map(|slot| slot.load().to_pair()).collect()
    }

    /// Device-to-host copy as a [`StateVector`].
    ///
    /// Fails if a slot holds the all-zero state, which only happens when a
    /// queued transfer was abandoned or has not run yet.
    pub fn to_state_vector(&self) -> Result<StateVector> {
        let states = self.slots.iter().map(AtomicState::load).collect();
        StateVector::from_states(states).map_err(|e| RngError::TransferFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(count: usize) -> DeviceStates {
        let used = Arc::new(AtomicUsize::new(0));
        let lease = MemoryLease::reserve(&used, count * 16, usize::MAX).unwrap();
        DeviceStates::allocate(count, 0, lease).unwrap()
    }

    #[test]
    fn test_slot_layout() {
        assert_eq!(std::mem::size_of::<AtomicState>(), GeneratorState::SIZE);
    }

    #[test]
    fn test_write_and_copy_back() {
        let host = StateVector::new(8, 11, 0).unwrap();
        let device = buffer(8);
        device.write_from(&host).unwrap();
        assert_eq!(device.copy_to_host(), host.to_pairs());
        assert_eq!(device.to_state_vector().unwrap(), host);
    }

    #[test]
    fn test_write_length_mismatch() {
        let host = StateVector::new(4, 1, 0).unwrap();
        let device = buffer(5);
        assert!(matches!(
            device.write_from(&host),
            Err(RngError::TransferFailed(_))
        ));
    }

    #[test]
    fn test_unwritten_buffer_is_not_a_state_vector() {
        let device = buffer(2);
        assert!(device.to_state_vector().is_err());
    }

    #[test]
    fn test_with_state_writes_back() {
        let device = buffer(2);
        device.store(1, GeneratorState::new(1, 2));
        let out = device.with_state(1, |s| s.next_u64());
        assert_eq!(out, 3);
        assert_ne!(device.load(1), GeneratorState::new(1, 2));
        assert!(device.load(0).is_zero());
    }

    #[test]
    fn test_lease_accounting() {
        let used = Arc::new(AtomicUsize::new(0));
        let lease = MemoryLease::reserve(&used, 64, 100).unwrap();
        assert_eq!(used.load(Ordering::SeqCst), 64);

        let err = MemoryLease::reserve(&used, 64, 100).unwrap_err();
        assert!(matches!(
            err,
            RngError::OutOfMemory {
                requested: 64,
                available: 36
            }
        ));

        drop(lease);
        assert_eq!(used.load(Ordering::SeqCst), 0);
        assert!(MemoryLease::reserve(&used, 100, 100).is_ok());
    }

    #[test]
    fn test_clone_shares_memory() {
        let a = buffer(1);
        let b = a.clone();
        a.store(0, GeneratorState::new(5, 6));
        assert_eq!(b.load(0), GeneratorState::new(5, 6));
    }
}
