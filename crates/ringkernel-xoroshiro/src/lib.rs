//! Parallel xoroshiro128+ random streams for GPU Monte Carlo kernels.
//!
//! This crate hands every thread of an arbitrarily large grid its own
//! statistically independent stream, without any cross-thread communication,
//! and converts raw output into uniform and normal variates in f32 and f64.
//!
//! # Features
//!
//! - **xoroshiro128+ core**: 16 bytes of state per thread, branch-free advance
//! - **Jump-ahead partitioning**: slot `i` sits `i` jumps of 2^64 draws past
//!   slot 0, so streams never overlap
//! - **Subsequence offsets**: vectors created at different offsets continue
//!   the same chain
//! - **Uniform/normal transforms**: one generic implementation for both
//!   precisions
//! - **CPU reference device** with asynchronous execution queues, and a CUDA
//!   backend behind the `cuda` feature
//!
//! # Example
//!
//! ```ignore
//! use ringkernel_xoroshiro::prelude::*;
//!
//! let device = CpuDevice::with_defaults()?;
//! let states = create_states(&device, 640, 1, 0, None)?;
//!
//! let out: Vec<AtomicU32> = ...;
//! device.launch(GridDim::new(10, 64), |tid| {
//!     let i = tid.global();
//!     let u = uniform_f32(&states, i);
//!     let z = normal_f64(&states, i);
//!     // ...
//! })?;
//!
//! // Host inspection
//! let pairs = copy_to_host(&states);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod device;
pub mod error;
pub mod rng;
pub mod states;

/// GPU-accelerated implementations (requires `cuda` feature).
#[cfg(feature = "cuda")]
pub mod gpu;

pub use config::{DeviceConfig, StatesConfig, StatesConfigBuilder};
pub use device::draw::{normal_f32, normal_f64, uniform_f32, uniform_f64};
pub use device::{
    copy_to_host, create_states, CpuDevice, DeviceStates, ExecutionQueue, GridDim, ThreadIdx,
};
pub use error::{Result, RngError};
pub use rng::{GeneratorState, JumpPolynomial, UnitFloat, Xoroshiro128Plus};
pub use states::StateVector;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{DeviceConfig, StatesConfig, StatesConfigBuilder};
    pub use crate::device::draw::{
        normal, normal_f32, normal_f64, uniform, uniform_f32, uniform_f64,
    };
    pub use crate::device::{
        copy_to_host, create_states, CpuDevice, DeviceStates, ExecutionQueue, GridDim, ThreadIdx,
    };
    pub use crate::rng::{
        advance, jump, GeneratorState, JumpPolynomial, UnitFloat, Xoroshiro128Plus,
    };
    pub use crate::states::StateVector;
    pub use crate::{Result, RngError};

    // GPU types (when cuda feature is enabled)
    #[cfg(feature = "cuda")]
    pub use crate::gpu::{CudaStates, GpuRngError, GpuXoroshiro};
}
