//! Runtime configuration for pooled-compute.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! All tuning knobs (launch geometry, reduction partitioning, pool bucketing,
//! device selection) live here.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{ComputeError, Result};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "pooled-compute", about = "Pooled GPU compute runtime")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "compute.json")]
    pub config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print device information and the effective configuration.
    Info,

    /// Run the worked examples and print their results.
    Check,

    /// Time a kernel loop.
    Bench {
        /// Which loop to run.
        #[arg(value_enum)]
        op: BenchOp,

        /// Problem size in elements; matrix loops use the largest square that fits.
        #[arg(short, long, default_value_t = 1 << 20)]
        size: usize,

        /// Number of iterations.
        #[arg(short, long, default_value_t = 64)]
        iters: usize,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchOp {
    /// c = a - b
    Sub,
    /// c = exp(a)
    Exp,
    /// b = a.T()
    Transpose,
    /// s = a.sum()
    Sum,
    /// w = u.outer(v)
    Outer,
    /// w -= F.T().dot(F.dot(w) - t) * alpha
    Descent,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device selection.
    pub device: DeviceConfig,

    /// Work-group sizing.
    pub launch: LaunchConfig,

    /// Two-phase reduction partitioning.
    pub reduce: ReduceConfig,

    /// Buffer pool policy.
    pub pool: PoolConfig,
}

/// Which device implementation backs a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Host-emulated device (always available).
    #[default]
    Host,
    /// CUDA device via NVRTC (requires the `cuda` feature).
    Cuda,
}

/// Device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Backend to construct.
    pub backend: Backend,

    /// Device ordinal (CUDA only).
    pub ordinal: usize,

    /// Kernel source file. When unset, the source embedded at build time is used.
    pub kernel_path: Option<PathBuf>,

    /// Maximum bytes the host device hands out (None = unlimited).
    pub memory_limit: Option<usize>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Host,
            ordinal: 0,
            kernel_path: None,
            memory_limit: None,
        }
    }
}

/// Work-group sizing constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Local work size for one-dimensional launches.
    pub local_size: usize,

    /// Local tile edge for two-dimensional launches.
    pub tile_size: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            local_size: 16,
            tile_size: 4,
        }
    }
}

/// Phase-1 lane selection for `Vector::sum`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    /// Elements each lane should accumulate before another lane is added.
    pub items_per_lane: usize,

    /// Lower bound on phase-1 lanes.
    pub min_lanes: usize,

    /// Upper bound on phase-1 lanes.
    pub max_lanes: usize,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            items_per_lane: 64,
            min_lanes: 1,
            max_lanes: 256,
        }
    }
}

impl ReduceConfig {
    /// Number of phase-1 lanes for an input of `n` elements.
    pub fn lanes_for(&self, n: usize) -> usize {
        n.div_ceil(self.items_per_lane)
            .clamp(self.min_lanes, self.max_lanes)
    }
}

/// How the pool groups free buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketPolicy {
    /// One bucket per exact byte length.
    #[default]
    Exact,
    /// Requests are rounded up to the next power of two before bucketing.
    PowerOfTwo,
}

impl BucketPolicy {
    /// Byte length actually requested from the device for `bytes`.
    pub fn bucket_for(&self, bytes: usize) -> usize {
        match self {
            BucketPolicy::Exact => bytes,
            BucketPolicy::PowerOfTwo => bytes.next_power_of_two(),
        }
    }
}

/// Buffer pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub bucketing: BucketPolicy,
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Reject tuning values that would make launches or reductions degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.launch.local_size == 0 || self.launch.tile_size == 0 {
            return Err(ComputeError::InvalidConfig(
                "local_size and tile_size must be non-zero".to_string(),
            ));
        }
        let reduce = &self.reduce;
        if reduce.items_per_lane == 0 || reduce.min_lanes == 0 {
            return Err(ComputeError::InvalidConfig(
                "items_per_lane and min_lanes must be non-zero".to_string(),
            ));
        }
        if reduce.min_lanes > reduce.max_lanes {
            return Err(ComputeError::InvalidConfig(format!(
                "min_lanes ({}) exceeds max_lanes ({})",
                reduce.min_lanes, reduce.max_lanes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.launch.local_size, 16);
        assert_eq!(cfg.launch.tile_size, 4);
        assert_eq!(cfg.pool.bucketing, BucketPolicy::Exact);
        assert_eq!(cfg.device.backend, Backend::Host);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_lanes_for() {
        let reduce = ReduceConfig::default();
        assert_eq!(reduce.lanes_for(0), 1);
        assert_eq!(reduce.lanes_for(64), 1);
        assert_eq!(reduce.lanes_for(65), 2);
        assert_eq!(reduce.lanes_for(1000), 16);
        assert_eq!(reduce.lanes_for(1 << 22), 256);
    }

    #[test]
    fn test_bucket_policy() {
        assert_eq!(BucketPolicy::Exact.bucket_for(12), 12);
        assert_eq!(BucketPolicy::PowerOfTwo.bucket_for(12), 16);
        assert_eq!(BucketPolicy::PowerOfTwo.bucket_for(16), 16);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"pool": {"bucketing": "power_of_two"}}"#).unwrap();
        assert_eq!(cfg.pool.bucketing, BucketPolicy::PowerOfTwo);
        assert_eq!(cfg.launch.local_size, 16);
        assert_eq!(cfg.reduce.max_lanes, 256);
    }

    #[test]
    fn test_validate_rejects_inverted_lanes() {
        let mut cfg = Config::default();
        cfg.reduce.min_lanes = 512;
        assert!(matches!(cfg.validate(), Err(ComputeError::InvalidConfig(_))));
    }
}
