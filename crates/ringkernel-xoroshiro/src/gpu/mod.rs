//! GPU-accelerated draws.
//!
//! This module provides the CUDA implementation of the device-side draw
//! functions. The generator step and the uniform transforms mirror
//! [`crate::rng`] bit for bit, so states advanced on the GPU and on the CPU
//! reference device stay interchangeable and uniform draws match exactly.
//! Normal draws consume the same words but go through CUDA `logf`/`cosf`
//! (`log`/`cos` for f64), so their values may differ from the host's by a
//! few ULP.

mod cuda;

pub use cuda::*;

/// CUDA kernel source for xoroshiro128+ draws.
///
/// States are laid out as `2 * n` 64-bit words, `s0, s1` per slot. Each fill
/// kernel gives thread `tid` slot `tid` and writes `per_thread` consecutive
/// outputs starting at `tid * per_thread`.
pub const XOROSHIRO_KERNEL_SOURCE: &str = r#"
typedef unsigned long long u64;

__device__ __forceinline__ u64 xoroshiro_rotl(u64 x, unsigned int k) {
    return (x << k) | (x >> (64 - k));
}

// One xoroshiro128+ step; returns s0 + s1 of the input state
__device__ __forceinline__ u64 xoroshiro128p_next(u64* states, unsigned int index) {
    u64 s0 = states[2 * index];
    u64 s1 = states[2 * index + 1];
    u64 result = s0 + s1;

    s1 ^= s0;
    states[2 * index] = xoroshiro_rotl(s0, 55) ^ s1 ^ (s1 << 14);
    states[2 * index + 1] = xoroshiro_rotl(s1, 36);

    return result;
}

// Top 24 bits scaled by 2^-24
__device__ __forceinline__ float xoroshiro128p_uniform_f32(u64* states, unsigned int index) {
    return (float)(xoroshiro128p_next(states, index) >> 40) * (1.0f / 16777216.0f);
}

// Top 53 bits scaled by 2^-53
__device__ __forceinline__ double xoroshiro128p_uniform_f64(u64* states, unsigned int index) {
    return (double)(xoroshiro128p_next(states, index) >> 11) * (1.0 / 9007199254740992.0);
}

// Box-Muller, cosine branch only
__device__ float xoroshiro128p_normal_f32(u64* states, unsigned int index) {
    float u1 = xoroshiro128p_uniform_f32(states, index);
    while (u1 == 0.0f) {
        u1 = xoroshiro128p_uniform_f32(states, index);
    }
    float u2 = xoroshiro128p_uniform_f32(states, index);
    return sqrtf(-2.0f * logf(u1)) * cosf(2.0f * 3.14159265358979323846f * u2);
}

__device__ double xoroshiro128p_normal_f64(u64* states, unsigned int index) {
    double u1 = xoroshiro128p_uniform_f64(states, index);
    while (u1 == 0.0) {
        u1 = xoroshiro128p_uniform_f64(states, index);
    }
    double u2 = xoroshiro128p_uniform_f64(states, index);
    return sqrt(-2.0 * log(u1)) * cos(2.0 * 3.14159265358979323846 * u2);
}

extern "C" __global__ void xoroshiro_fill_uniform_f32(
    u64* states,
    float* output,
    unsigned int n_states,
    unsigned int per_thread
) {
    unsigned int tid = blockIdx.x * blockDim.x + threadIdx.x;
    if (tid >= n_states) return;

    for (unsigned int i = 0; i < per_thread; i++) {
        output[tid * per_thread + i] = xoroshiro128p_uniform_f32(states, tid);
    }
}

extern "C" __global__ void xoroshiro_fill_uniform_f64(
    u64* states,
    double* output,
    unsigned int n_states,
    unsigned int per_thread
) {
    unsigned int tid = blockIdx.x * blockDim.x + threadIdx.x;
    if (tid >= n_states) return;

    for (unsigned int i = 0; i < per_thread; i++) {
        output[tid * per_thread + i] = xoroshiro128p_uniform_f64(states, tid);
    }
}

extern "C" __global__ void xoroshiro_fill_normal_f32(
    u64* states,
    float* output,
    unsigned int n_states,
    unsigned int per_thread
) {
    unsigned int tid = blockIdx.x * blockDim.x + threadIdx.x;
    if (tid >= n_states) return;

    for (unsigned int i = 0; i < per_thread; i++) {
        output[tid * per_thread + i] = xoroshiro128p_normal_f32(states, tid);
    }
}

extern "C" __global__ void xoroshiro_fill_normal_f64(
    u64* states,
    double* output,
    unsigned int n_states,
    unsigned int per_thread
) {
    unsigned int tid = blockIdx.x * blockDim.x + threadIdx.x;
    if (tid >= n_states) return;

    for (unsigned int i = 0; i < per_thread; i++) {
        output[tid * per_thread + i] = xoroshiro128p_normal_f64(states, tid);
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_source_exports() {
        for name in [
            "xoroshiro_fill_uniform_f32",
            "xoroshiro_fill_uniform_f64",
            "xoroshiro_fill_normal_f32",
            "xoroshiro_fill_normal_f64",
        ] {
            let signature = format!("extern \"C\" __global__ void {}(", name);
            assert!(XOROSHIRO_KERNEL_SOURCE.contains(&signature), "missing kernel {}", name);
        }
    }
}
