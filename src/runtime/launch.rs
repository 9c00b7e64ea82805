//! Launch geometry and positional kernel arguments.
//!
//! Logical problem dimensions are turned into a padded global grid plus a
//! local work-group size:
//!
//! ```text
//! []         -> global (1, 1),                          local (1, 1)
//! [d]        -> global (ceil(d / L) * L, 1),            local (L, 1)
//! [d0, d1]   -> global (ceil(d0 / T) * T, ceil(d1 / T) * T), local (T, T)
//! ```
//!
//! where `L` is `LaunchConfig::local_size` and `T` is `LaunchConfig::tile_size`.

use std::fmt;

use crate::config::LaunchConfig;
use crate::error::{ComputeError, Result};
use crate::gpu::device::BufferId;

/// A padded launch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGrid {
    /// Number of dimensions handed to the device (1 or 2).
    pub work_dim: u32,

    /// Global work size per dimension; unused dimensions are 1.
    pub global: [usize; 2],

    /// Local work size per dimension; unused dimensions are 1.
    pub local: [usize; 2],
}

impl WorkGrid {
    /// Derive the grid for the given logical dimensions.
    pub fn from_dims(dims: &[usize], config: &LaunchConfig) -> Result<Self> {
        match *dims {
            [] => Ok(Self {
                work_dim: 1,
                global: [1, 1],
                local: [1, 1],
            }),
            [d] => Ok(Self {
                work_dim: 1,
                global: [round_up(d, config.local_size), 1],
                local: [config.local_size, 1],
            }),
            [d0, d1] => Ok(Self {
                work_dim: 2,
                global: [round_up(d0, config.tile_size), round_up(d1, config.tile_size)],
                local: [config.tile_size, config.tile_size],
            }),
            _ => Err(ComputeError::UnsupportedDimensions(dims.len())),
        }
    }

    /// Total number of work items in the grid.
    pub fn work_items(&self) -> usize {
        self.global[0] * self.global[1]
    }

    /// Number of work groups per dimension.
    pub fn groups(&self) -> [usize; 2] {
        [self.global[0] / self.local[0], self.global[1] / self.local[1]]
    }
}

fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}

/// Type tag of a kernel argument / parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Device buffer reference.
    Buffer,
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Int,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Buffer => write!(f, "buffer"),
            ArgKind::Float => write!(f, "float"),
            ArgKind::Int => write!(f, "int"),
        }
    }
}

/// One positional kernel argument: a type tag plus its raw bytes.
///
/// Arguments are bound to parameter slots strictly in order; each one
/// contributes exactly `size()` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KernelArg {
    kind: ArgKind,
    bytes: [u8; 8],
    size: usize,
}

impl KernelArg {
    pub fn buffer(id: BufferId) -> Self {
        Self {
            kind: ArgKind::Buffer,
            bytes: id.raw().to_ne_bytes(),
            size: std::mem::size_of::<u64>(),
        }
    }

    pub fn float(value: f32) -> Self {
        Self::scalar(ArgKind::Float, bytemuck::bytes_of(&value))
    }

    pub fn int(value: i32) -> Self {
        Self::scalar(ArgKind::Int, bytemuck::bytes_of(&value))
    }

    /// An element count or dimension, checked to fit the kernels' `int` parameters.
    pub fn count(value: usize) -> Result<Self> {
        let value = i32::try_from(value).map_err(|_| {
            ComputeError::InvalidShape(format!("dimension {value} exceeds kernel int range"))
        })?;
        Ok(Self::int(value))
    }

    fn scalar(kind: ArgKind, raw: &[u8]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[..raw.len()].copy_from_slice(raw);
        Self {
            kind,
            bytes,
            size: raw.len(),
        }
    }

    pub fn kind(&self) -> ArgKind {
        self.kind
    }

    /// Size in bytes this argument occupies in its slot.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw bytes bound into the slot.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.size]
    }

    pub fn as_buffer(&self) -> Option<BufferId> {
        (self.kind == ArgKind::Buffer)
            .then(|| BufferId(bytemuck::pod_read_unaligned::<u64>(self.bytes())))
    }

    pub fn as_float(&self) -> Option<f32> {
        (self.kind == ArgKind::Float).then(|| bytemuck::pod_read_unaligned::<f32>(self.bytes()))
    }

    pub fn as_int(&self) -> Option<i32> {
        (self.kind == ArgKind::Int).then(|| bytemuck::pod_read_unaligned::<i32>(self.bytes()))
    }
}

impl fmt::Debug for KernelArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ArgKind::Buffer => write!(f, "Buffer({:?})", self.as_buffer()),
            ArgKind::Float => write!(f, "Float({:?})", self.as_float()),
            ArgKind::Int => write!(f, "Int({:?})", self.as_int()),
        }
    }
}

impl From<f32> for KernelArg {
    fn from(value: f32) -> Self {
        KernelArg::float(value)
    }
}

impl From<i32> for KernelArg {
    fn from(value: i32) -> Self {
        KernelArg::int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dims_single_item() {
        let grid = WorkGrid::from_dims(&[], &LaunchConfig::default()).unwrap();
        assert_eq!(grid.work_dim, 1);
        assert_eq!(grid.global, [1, 1]);
        assert_eq!(grid.local, [1, 1]);
        assert_eq!(grid.work_items(), 1);
    }

    #[test]
    fn test_one_dim_rounds_to_local() {
        let cfg = LaunchConfig::default();
        let grid = WorkGrid::from_dims(&[17], &cfg).unwrap();
        assert_eq!(grid.global, [32, 1]);
        assert_eq!(grid.local, [16, 1]);
        assert_eq!(grid.groups(), [2, 1]);

        let exact = WorkGrid::from_dims(&[32], &cfg).unwrap();
        assert_eq!(exact.global, [32, 1]);
    }

    #[test]
    fn test_two_dims_round_independently() {
        let grid = WorkGrid::from_dims(&[13, 15], &LaunchConfig::default()).unwrap();
        assert_eq!(grid.work_dim, 2);
        assert_eq!(grid.global, [16, 16]);
        assert_eq!(grid.local, [4, 4]);

        let grid = WorkGrid::from_dims(&[3, 8], &LaunchConfig::default()).unwrap();
        assert_eq!(grid.global, [4, 8]);
    }

    #[test]
    fn test_three_dims_rejected() {
        let result = WorkGrid::from_dims(&[2, 2, 2], &LaunchConfig::default());
        assert!(matches!(result, Err(ComputeError::UnsupportedDimensions(3))));
    }

    #[test]
    fn test_arg_raw_bytes() {
        let f = KernelArg::float(1.5);
        assert_eq!(f.kind(), ArgKind::Float);
        assert_eq!(f.size(), 4);
        assert_eq!(f.bytes(), 1.5f32.to_ne_bytes());
        assert_eq!(f.as_float(), Some(1.5));
        assert_eq!(f.as_int(), None);

        let i = KernelArg::int(-3);
        assert_eq!(i.bytes(), (-3i32).to_ne_bytes());
        assert_eq!(i.as_int(), Some(-3));

        let b = KernelArg::buffer(BufferId(42));
        assert_eq!(b.size(), 8);
        assert_eq!(b.as_buffer(), Some(BufferId(42)));
    }

    #[test]
    fn test_count_overflow() {
        assert!(KernelArg::count(1 << 20).is_ok());
        assert!(matches!(
            KernelArg::count(usize::MAX),
            Err(ComputeError::InvalidShape(_))
        ));
    }
}
