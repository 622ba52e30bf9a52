//! CUDA implementation of xoroshiro128+ state vectors and draws.

use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaFunction, CudaSlice, CudaStream, PushKernelArg};
use cudarc::nvrtc::compile_ptx;

use super::XOROSHIRO_KERNEL_SOURCE;
use crate::error::RngError;
use crate::rng::GeneratorState;
use crate::states::StateVector;

const BLOCK_SIZE: u32 = 256;

/// Error type for GPU draw operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuRngError {
    /// CUDA driver error.
    #[error("CUDA error: {0}")]
    CudaError(String),
    /// Compilation error.
    #[error("Compilation error: {0}")]
    CompilationError(String),
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Host-side initialization failed.
    #[error(transparent)]
    Host(#[from] RngError),
}

type Result<T> = std::result::Result<T, GpuRngError>;

/// A state vector resident in CUDA device memory.
///
/// Stored as `2 * len` words, `s0, s1` per slot, the layout the kernels
/// expect.
pub struct CudaStates {
    words: CudaSlice<u64>,
    count: usize,
}

impl CudaStates {
    /// Number of slots.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always false for an allocated vector.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Raw device words.
    pub fn words(&self) -> &CudaSlice<u64> {
        &self.words
    }

    /// Mutable raw device words, for passing to custom kernels.
    pub fn words_mut(&mut self) -> &mut CudaSlice<u64> {
        &mut self.words
    }
}

impl std::fmt::Debug for CudaStates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaStates")
            .field("count", &self.count)
            .finish()
    }
}

/// xoroshiro128+ on a CUDA device.
pub struct GpuXoroshiro {
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    fill_uniform_f32: CudaFunction,
    fill_uniform_f64: CudaFunction,
    fill_normal_f32: CudaFunction,
    fill_normal_f64: CudaFunction,
}

impl GpuXoroshiro {
    /// Open device `device_ordinal` and compile the draw kernels.
    pub fn new(device_ordinal: usize) -> Result<Self> {
        let context = CudaContext::new(device_ordinal)
            .map_err(|e| GpuRngError::CudaError(e.to_string()))?;

        let stream = context.default_stream();

        let ptx = compile_ptx(XOROSHIRO_KERNEL_SOURCE)
            .map_err(|e| GpuRngError::CompilationError(e.to_string()))?;

        let module = context
            .load_module(ptx)
            .map_err(|e| GpuRngError::CudaError(e.to_string()))?;

        let load = |name: &str| {
            module
                .load_function(name)
                .map_err(|e| GpuRngError::CudaError(e.to_string()))
        };

        let fill_uniform_f32 = load("xoroshiro_fill_uniform_f32")?;
        let fill_uniform_f64 = load("xoroshiro_fill_uniform_f64")?;
        let fill_normal_f32 = load("xoroshiro_fill_normal_f32")?;
        let fill_normal_f64 = load("xoroshiro_fill_normal_f64")?;

        tracing::info!(device_ordinal, "CUDA xoroshiro kernels loaded");

        Ok(Self {
            context,
            stream,
            fill_uniform_f32,
            fill_uniform_f64,
            fill_normal_f32,
            fill_normal_f64,
        })
    }

    /// Initialize `count` states on the host and copy them to the device.
    ///
    /// The copy is issued on `stream` when given, otherwise on the default
    /// stream. With a caller stream the contents are valid once that stream
    /// has been synchronized.
    pub fn create_states(
        &self,
        count: usize,
        seed: u64,
        subsequence_start: u64,
        stream: Option<&Arc<CudaStream>>,
    ) -> Result<CudaStates> {
        let host = StateVector::new(count, seed, subsequence_start)?;
        self.upload(&host, stream)
    }

    /// Copy an existing host state vector to the device.
    pub fn upload(
        &self,
        host: &StateVector,
        stream: Option<&Arc<CudaStream>>,
    ) -> Result<CudaStates> {
        let stream = stream.unwrap_or(&self.stream);
        let src: &[u64] = bytemuck::cast_slice(host.as_slice());

        // SAFETY: the buffer is fully overwritten by the copy below before any
        // kernel reads it.
        let mut words = unsafe {
            stream
                .alloc::<u64>(src.len())
                .map_err(|e| GpuRngError::CudaError(e.to_string()))?
        };
        stream
            .memcpy_htod(src, &mut words)
            .map_err(|e| GpuRngError::CudaError(e.to_string()))?;

        tracing::debug!(count = host.len(), "uploaded states to CUDA device");

        Ok(CudaStates {
            words,
            count: host.len(),
        })
    }

    /// Copy device states back to the host.
    pub fn copy_to_host(&self, states: &CudaStates) -> Result<StateVector> {
        let mut host = vec![0u64; states.words.len()];
        self.stream
            .memcpy_dtoh(&states.words, &mut host)
            .map_err(|e| GpuRngError::CudaError(e.to_string()))?;

        let pairs = host
            .chunks_exact(2)
            .map(|w| GeneratorState::new(w[0], w[1]))
            .collect();
        Ok(StateVector::from_states(pairs)?)
    }

    /// Fill `output` with `output.len() / states.len()` uniform f32 draws per slot.
    pub fn fill_uniform_f32(
        &self,
        states: &mut CudaStates,
        output: &mut CudaSlice<f32>,
    ) -> Result<()> {
        let per_thread = per_thread(states, output.len())?;
        self.launch(&self.fill_uniform_f32, states, output, per_thread)
    }

    /// Fill `output` with uniform f64 draws, slot-major.
    pub fn fill_uniform_f64(
        &self,
        states: &mut CudaStates,
        output: &mut CudaSlice<f64>,
    ) -> Result<()> {
        let per_thread = per_thread(states, output.len())?;
        self.launch(&self.fill_uniform_f64, states, output, per_thread)
    }

    /// Fill `output` with standard normal f32 draws, slot-major.
    pub fn fill_normal_f32(
        &self,
        states: &mut CudaStates,
        output: &mut CudaSlice<f32>,
    ) -> Result<()> {
        let per_thread = per_thread(states, output.len())?;
        self.launch(&self.fill_normal_f32, states, output, per_thread)
    }

    /// Fill `output` with standard normal f64 draws, slot-major.
    pub fn fill_normal_f64(
        &self,
        states: &mut CudaStates,
        output: &mut CudaSlice<f64>,
    ) -> Result<()> {
        let per_thread = per_thread(states, output.len())?;
        self.launch(&self.fill_normal_f64, states, output, per_thread)
    }

    /// Draw `per_thread` uniform f32 values from every slot and copy them to the host.
    pub fn generate_uniform_f32(
        &self,
        states: &mut CudaStates,
        per_thread: usize,
    ) -> Result<Vec<f32>> {
        let mut output = self.alloc::<f32>(states.len() * per_thread)?;
        self.fill_uniform_f32(states, &mut output)?;
        self.dtoh(&output)
    }

    /// Draw `per_thread` uniform f64 values from every slot and copy them to the host.
    pub fn generate_uniform_f64(
        &self,
        states: &mut CudaStates,
        per_thread: usize,
    ) -> Result<Vec<f64>> {
        let mut output = self.alloc::<f64>(states.len() * per_thread)?;
        self.fill_uniform_f64(states, &mut output)?;
        self.dtoh(&output)
    }

    /// Draw `per_thread` normal f32 values from every slot and copy them to the host.
    pub fn generate_normal_f32(
        &self,
        states: &mut CudaStates,
        per_thread: usize,
    ) -> Result<Vec<f32>> {
        let mut output = self.alloc::<f32>(states.len() * per_thread)?;
        self.fill_normal_f32(states, &mut output)?;
        self.dtoh(&output)
    }

    /// Draw `per_thread` normal f64 values from every slot and copy them to the host.
    pub fn generate_normal_f64(
        &self,
        states: &mut CudaStates,
        per_thread: usize,
    ) -> Result<Vec<f64>> {
        let mut output = self.alloc::<f64>(states.len() * per_thread)?;
        self.fill_normal_f64(states, &mut output)?;
        self.dtoh(&output)
    }

    /// Synchronize the context.
    pub fn synchronize(&self) -> Result<()> {
        self.context
            .synchronize()
            .map_err(|e| GpuRngError::CudaError(e.to_string()))
    }

    /// Get the underlying context.
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// Get the default stream.
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    fn launch<T: cudarc::driver::DeviceRepr>(
        &self,
        kernel: &CudaFunction,
        states: &mut CudaStates,
        output: &mut CudaSlice<T>,
        per_thread: u32,
    ) -> Result<()> {
        let n = states.count as u32;
        let grid_size = n.div_ceil(BLOCK_SIZE);

        // SAFETY: Kernel arguments match the compiled PTX signature. `output`
        // holds exactly `n * per_thread` elements, checked by `per_thread()`.
        unsafe {
            self.stream
                .launch_builder(kernel)
                .arg(&mut states.words)
                .arg(output)
                .arg(&n)
                .arg(&per_thread)
                .launch(cudarc::driver::LaunchConfig {
                    grid_dim: (grid_size, 1, 1),
                    block_dim: (BLOCK_SIZE, 1, 1),
                    shared_mem_bytes: 0,
                })
                .map_err(|e| GpuRngError::CudaError(e.to_string()))?;
        }

        Ok(())
    }

    fn alloc<T: cudarc::driver::DeviceRepr>(&self, n: usize) -> Result<CudaSlice<T>> {
        // SAFETY: every element is written by a fill kernel before it is read.
        unsafe {
            self.stream
                .alloc::<T>(n)
                .map_err(|e| GpuRngError::CudaError(e.to_string()))
        }
    }

    fn dtoh<T: cudarc::driver::DeviceRepr + Default + Clone>(
        &self,
        slice: &CudaSlice<T>,
    ) -> Result<Vec<T>> {
        let mut host = vec![T::default(); slice.len()];
        self.stream
            .memcpy_dtoh(slice, &mut host)
            .map_err(|e| GpuRngError::CudaError(e.to_string()))?;
        Ok(host)
    }
}

/// Draws per slot for an output of `len` elements; kernels index with 32 bits.
fn per_thread(states: &CudaStates, len: usize) -> Result<u32> {
    if states.count == 0 || len % states.count != 0 {
        return Err(GpuRngError::InvalidConfig(format!(
            "output length {} is not a multiple of {} states",
            len, states.count
        )));
    }
    if len > u32::MAX as usize {
        return Err(GpuRngError::InvalidConfig(format!(
            "output length {} exceeds 32-bit kernel indexing",
            len
        )));
    }
    Ok((len / states.count) as u32)
}

/// Check if CUDA is available.
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| {
        cudarc::driver::CudaContext::device_count()
            .map(|c| c > 0)
            .unwrap_or(false)
    })
    .unwrap_or(false)
}
