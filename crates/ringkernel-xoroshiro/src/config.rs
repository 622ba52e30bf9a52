//! Configuration for state creation and the CPU device.
//!
//! Both structs deserialize with per-field defaults, so a partial JSON/TOML
//! table is enough:
//!
//! ```ignore
//! let config: StatesConfig = serde_json::from_str(r#"{ "count": 4096, "seed": 7 }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, RngError};
use crate::rng::GeneratorState;

/// Parameters of one state-vector initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatesConfig {
    /// Number of states (one per thread). Must be positive.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Scalar seed.
    #[serde(default)]
    pub seed: u64,
    /// Jump offset of slot 0 in the subsequence chain.
    #[serde(default)]
    pub subsequence_start: u64,
}

fn default_count() -> usize {
    1
}

impl Default for StatesConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            seed: 0,
            subsequence_start: 0,
        }
    }
}

impl StatesConfig {
    /// Configuration for `count` states from `seed`, starting at subsequence 0.
    pub fn new(count: usize, seed: u64) -> Self {
        Self {
            count,
            seed,
            subsequence_start: 0,
        }
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(RngError::InvalidConfig(
                "state count must be positive".to_string(),
            ));
        }
        if self.count.checked_mul(GeneratorState::SIZE).is_none() {
            return Err(RngError::InvalidConfig(format!(
                "state count {} overflows the address space",
                self.count
            )));
        }
        Ok(())
    }

    /// Size of the resulting state vector in bytes.
    pub fn size_bytes(&self) -> usize {
        self.count.saturating_mul(GeneratorState::SIZE)
    }
}

/// Builder for [`StatesConfig`].
#[derive(Debug, Default)]
pub struct StatesConfigBuilder {
    config: StatesConfig,
}

impl StatesConfigBuilder {
    /// Creates a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of states.
    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.config.count = count;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the subsequence offset of slot 0.
    #[must_use]
    pub fn with_subsequence_start(mut self, start: u64) -> Self {
        self.config.subsequence_start = start;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<StatesConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// CPU device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device ordinal.
    #[serde(default)]
    pub ordinal: usize,
    /// Human-readable name.
    #[serde(default = "default_device_name")]
    pub name: String,
    /// Device memory capacity in bytes.
    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: usize,
    /// Worker threads for grid launches (0 = one per core).
    #[serde(default)]
    pub worker_threads: usize,
}

fn default_device_name() -> String {
    "cpu".to_string()
}

fn default_memory_bytes() -> usize {
    1 << 30
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ordinal: 0,
            name: default_device_name(),
            memory_bytes: default_memory_bytes(),
            worker_threads: 0,
        }
    }
}

impl DeviceConfig {
    /// Small device (1 MiB, two workers) for tests.
    #[must_use]
    pub fn small() -> Self {
        Self {
            memory_bytes: 1 << 20,
            worker_threads: 2,
            ..Self::default()
        }
    }

    /// Device without a memory limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            memory_bytes: usize::MAX,
            ..Self::default()
        }
    }

    /// Sets the ordinal.
    #[must_use]
    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the memory capacity.
    #[must_use]
    pub fn with_memory_bytes(mut self, bytes: usize) -> Self {
        self.memory_bytes = bytes;
        self
    }

    /// Sets the worker thread count.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.memory_bytes < GeneratorState::SIZE {
            return Err(RngError::InvalidConfig(format!(
                "device memory of {} bytes cannot hold a single state",
                self.memory_bytes
            )));
        }
        Ok(())
    }
}
