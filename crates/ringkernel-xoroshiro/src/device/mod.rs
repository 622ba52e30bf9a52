//! CPU reference device.
//!
//! Executes the device half of the contract on the host so that state
//! creation, queued transfers and per-thread draws can run without an
//! accelerator:
//!
//! - [`CpuDevice`]: memory accounting, state buffers, grid launches on a
//!   `rayon` pool
//! - [`ExecutionQueue`]: ordered asynchronous work
//! - [`DeviceStates`]: the device mirror of a [`StateVector`]
//! - [`draw`]: per-thread draw functions used inside kernels

mod buffer;
pub mod draw;
mod queue;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, error, info};

use crate::config::{DeviceConfig, StatesConfig};
use crate::error::{Result, RngError};
use crate::rng::GeneratorState;
use crate::states::StateVector;

use buffer::MemoryLease;
pub use buffer::DeviceStates;
pub use queue::ExecutionQueue;

/// One-dimensional launch geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDim {
    /// Blocks in the grid.
    pub blocks: usize,
    /// Threads per block.
    pub threads_per_block: usize,
}

impl GridDim {
    /// Grid of `blocks` blocks of `threads_per_block` threads.
    pub const fn new(blocks: usize, threads_per_block: usize) -> Self {
        Self {
            blocks,
            threads_per_block,
        }
    }

    /// Smallest grid covering `threads` threads with the given block size.
    pub fn covering(threads: usize, threads_per_block: usize) -> Self {
        let threads_per_block = threads_per_block.max(1);
        Self::new(threads.div_ceil(threads_per_block), threads_per_block)
    }

    /// Total threads launched, or `None` if the product overflows `usize`.
    pub const fn checked_total_threads(&self) -> Option<usize> {
        self.blocks.checked_mul(self.threads_per_block)
    }

    /// Total threads launched.
    ///
    /// # Panics
    ///
    /// Panics if `blocks * threads_per_block` overflows `usize`.
    /// [`CpuDevice::launch`] rejects such grids before calling this.
    pub const fn total_threads(&self) -> usize {
        match self.checked_total_threads() {
            Some(total) => total,
            None => panic!("grid thread count overflows usize"),
        }
    }
}

/// Identity of one thread within a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadIdx {
    /// Block index.
    pub block: usize,
    /// Thread index within the block.
    pub thread: usize,
    /// Launch geometry.
    pub grid: GridDim,
}

impl ThreadIdx {
    /// Global linear thread index.
    #[inline]
    pub const fn global(&self) -> usize {
        self.block * self.grid.threads_per_block + self.thread
    }

    /// Total threads in the grid.
    #[inline]
    pub const fn grid_size(&self) -> usize {
        self.grid.total_threads()
    }
}

/// CPU stand-in for an accelerator device.
pub struct CpuDevice {
    /// Device configuration.
    config: DeviceConfig,
    /// Bytes currently held by state buffers.
    used: Arc<AtomicUsize>,
    /// Workers for grid launches.
    pool: rayon::ThreadPool,
}

impl CpuDevice {
    /// Create a device from configuration.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        config.validate()?;

        let ordinal = config.ordinal;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(move |i| format!("xoroshiro-cpu{}-{}", ordinal, i))
            .build()
            .map_err(|e| RngError::BackendError(format!("Failed to build worker pool: {}", e)))?;

        info!(
            ordinal,
            name = %config.name,
            memory_bytes = config.memory_bytes,
            workers = pool.current_num_threads(),
            "Initialized CPU device"
        );

        Ok(Self {
            config,
            used: Arc::new(AtomicUsize::new(0)),
            pool,
        })
    }

    /// Create a device with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DeviceConfig::default())
    }

    /// Device ordinal.
    pub fn ordinal(&self) -> usize {
        self.config.ordinal
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Memory capacity in bytes.
    pub fn total_memory(&self) -> usize {
        self.config.memory_bytes
    }

    /// Memory held by live state buffers.
    pub fn memory_used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Memory still available.
    pub fn free_memory(&self) -> usize {
        self.config.memory_bytes.saturating_sub(self.memory_used())
    }

    /// Create an execution queue on this device.
    pub fn create_queue(&self) -> Result<ExecutionQueue> {
        ExecutionQueue::new(self.config.ordinal)
    }

    /// Allocate an uninitialized (all-zero) state buffer.
    pub fn allocate_states(&self, count: usize) -> Result<DeviceStates> {
        if count == 0 {
            return Err(RngError::InvalidConfig(
                "state count must be positive".to_string(),
            ));
        }
        let bytes = count.checked_mul(GeneratorState::SIZE).ok_or_else(|| {
            RngError::InvalidConfig(format!("state count {} overflows the address space", count))
        })?;
        let lease = MemoryLease::reserve(&self.used, bytes, self.config.memory_bytes)?;
        DeviceStates::allocate(count, self.config.ordinal, lease)
    }

    /// Initialize `count` states from `seed` and transfer them to the device.
    ///
    /// With a queue the call returns once the transfer is enqueued;
    /// synchronize the queue before reading or launching on the result.
    pub fn create_states(
        &self,
        count: usize,
        seed: u64,
        subsequence_start: u64,
        queue: Option<&ExecutionQueue>,
    ) -> Result<DeviceStates> {
        self.create_states_with(
            &StatesConfig {
                count,
                seed,
                subsequence_start,
            },
            queue,
        )
    }

    /// [`create_states`](Self::create_states) from a configuration.
    pub fn create_states_with(
        &self,
        config: &StatesConfig,
        queue: Option<&ExecutionQueue>,
    ) -> Result<DeviceStates> {
        config.validate()?;
        if let Some(queue) = queue {
            self.check_queue(queue)?;
        }
        let host = StateVector::from_config(config)?;
        self.transfer(host, queue)
    }

    /// Mirror an existing host state vector into a new device buffer.
    pub fn upload(
        &self,
        host: &StateVector,
        queue: Option<&ExecutionQueue>,
    ) -> Result<DeviceStates> {
        if let Some(queue) = queue {
            self.check_queue(queue)?;
        }
        self.transfer(host.clone(), queue)
    }

    fn transfer(&self, host: StateVector, queue: Option<&ExecutionQueue>) -> Result<DeviceStates> {
        let buffer = self.allocate_states(host.len())?;

        match queue {
            None => buffer.write_from(&host)?,
            Some(queue) => {
                let target = buffer.clone();
                queue.submit(move || {
                    if let Err(e) = target.write_from(&host) {
                        error!(error = %e, "Queued state transfer failed");
                    }
                })?;
            }
        }

        debug!(
            device = self.config.ordinal,
            count = buffer.len(),
            bytes = buffer.size_bytes(),
            queued = queue.is_some(),
            "Transferred states to device"
        );

        Ok(buffer)
    }

    fn check_queue(&self, queue: &ExecutionQueue) -> Result<()> {
        if queue.device_ordinal() != self.config.ordinal {
            return Err(RngError::InvalidQueue(format!(
                "queue belongs to device {}, not device {}",
                queue.device_ordinal(),
                self.config.ordinal
            )));
        }
        if !queue.is_open() {
            return Err(RngError::InvalidQueue("queue is closed".to_string()));
        }
        Ok(())
    }

    /// Run `kernel` once per thread of `grid`, in parallel, and wait for it.
    ///
    /// Fails with `InvalidConfig` if the grid's thread count overflows.
    pub fn launch<F>(&self, grid: GridDim, kernel: F) -> Result<()>
    where
        F: Fn(ThreadIdx) + Send + Sync,
    {
        let total = grid.checked_total_threads().ok_or_else(|| {
            RngError::InvalidConfig(format!(
                "grid of {} blocks x {} threads overflows the thread index",
                grid.blocks, grid.threads_per_block
            ))
        })?;
        let threads_per_block = grid.threads_per_block;
        self.pool.install(|| {
            (0..total)
                .into_par_iter()
                .for_each(|global| {
                    kernel(ThreadIdx {
                        block: global / threads_per_block,
                        thread: global % threads_per_block,
                        grid,
                    })
                });
        });
        Ok(())
    }
}

impl std::fmt::Debug for CpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuDevice")
            .field("config", &self.config)
            .field("memory_used", &self.memory_used())
            .finish()
    }
}

/// Create `count` device states from `seed`, optionally on `queue`.
pub fn create_states(
    device: &CpuDevice,
    count: usize,
    seed: u64,
    subsequence_start: u64,
    queue: Option<&ExecutionQueue>,
) -> Result<DeviceStates> {
    device.create_states(count, seed, subsequence_start, queue)
}

/// Copy device states back to the host as `(s0, s1)` pairs in slot order.
pub fn copy_to_host(states: &DeviceStates) -> Vec<(u64, u64)> {
    states.copy_to_host()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn device() -> CpuDevice {
        CpuDevice::new(DeviceConfig::small()).unwrap()
    }

    #[test]
    fn test_grid_dims() {
        let grid = GridDim::new(10, 64);
        assert_eq!(grid.total_threads(), 640);

        let covering = GridDim::covering(1000, 256);
        assert_eq!(covering.blocks, 4);
        assert_eq!(covering.total_threads(), 1024);

        let tid = ThreadIdx {
            block: 3,
            thread: 5,
            grid,
        };
        assert_eq!(tid.global(), 197);
        assert_eq!(tid.grid_size(), 640);
    }

    #[test]
    fn test_launch_visits_every_thread_once() {
        let device = device();
        let grid = GridDim::new(7, 32);
        let hits: Vec<AtomicU64> = (0..grid.total_threads())
            .map(|_| AtomicU64::new(0))
            .collect();

        device
            .launch(grid, |tid| {
                hits[tid.global()].fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_overflowing_grid_rejected() {
        let device = device();
        let grid = GridDim::new(usize::MAX / 2, 3);
        assert_eq!(grid.checked_total_threads(), None);

        let ran = AtomicU64::new(0);
        let err = device
            .launch(grid, |_| {
                ran.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap_err();
        assert!(matches!(err, RngError::InvalidConfig(_)));
        assert_eq!(ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_total_threads_panics_on_overflow() {
        let _ = GridDim::new(usize::MAX, 2).total_threads();
    }

    #[test]
    fn test_empty_grid_launches_nothing() {
        let device = device();
        let ran = AtomicU64::new(0);
        device
            .launch(GridDim::new(0, 64), |_| {
                ran.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_create_states_matches_host() {
        let device = device();
        let states = device.create_states(16, 1, 0, None).unwrap();
        let host = StateVector::new(16, 1, 0).unwrap();
        assert_eq!(copy_to_host(&states), host.to_pairs());
        assert_eq!(states.device_ordinal(), 0);
    }

    #[test]
    fn test_zero_count_rejected() {
        let device = device();
        assert!(matches!(
            device.create_states(0, 1, 0, None),
            Err(RngError::InvalidConfig(_))
        ));
        assert_eq!(device.memory_used(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let device = CpuDevice::new(DeviceConfig::default().with_memory_bytes(1024)).unwrap();
        let err = device.create_states(65, 1, 0, None).unwrap_err();
        assert!(matches!(
            err,
            RngError::OutOfMemory {
                requested: 1040,
                available: 1024
            }
        ));
        assert!(err.is_retryable());
        assert_eq!(device.memory_used(), 0);
    }

    #[test]
    fn test_memory_released_with_last_handle() {
        let device = device();
        let states = device.create_states(100, 1, 0, None).unwrap();
        let copy = states.clone();
        assert_eq!(device.memory_used(), 1600);

        drop(states);
        assert_eq!(device.memory_used(), 1600);
        drop(copy);
        assert_eq!(device.memory_used(), 0);
        assert_eq!(device.free_memory(), device.total_memory());
    }

    #[test]
    fn test_foreign_queue_rejected() {
        let device = device();
        let other = CpuDevice::new(DeviceConfig::small().with_ordinal(1)).unwrap();
        let queue = other.create_queue().unwrap();

        let err = device.create_states(4, 1, 0, Some(&queue)).unwrap_err();
        assert!(matches!(err, RngError::InvalidQueue(_)));
        assert_eq!(device.memory_used(), 0);
    }

    #[test]
    fn test_closed_queue_rejected() {
        let device = device();
        let mut queue = device.create_queue().unwrap();
        queue.close();
        assert!(matches!(
            device.create_states(4, 1, 0, Some(&queue)),
            Err(RngError::InvalidQueue(_))
        ));
    }

    #[test]
    fn test_upload_round_trip() {
        let device = device();
        let mut host = StateVector::new(8, 2, 0).unwrap();
        for state in host.as_mut_slice() {
            state.next_u64();
        }
        let states = device.upload(&host, None).unwrap();
        assert_eq!(states.to_state_vector().unwrap(), host);
    }
}
