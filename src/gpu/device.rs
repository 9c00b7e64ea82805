//! Device abstraction.
//!
//! A [`Device`] owns raw device memory and a built kernel program. The
//! runtime talks to it only through opaque [`RawBuffer`] handles, kernel
//! slots and tagged argument lists, so the host-emulated device and the
//! CUDA device are interchangeable behind a `Box<dyn Device>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::runtime::cache::Kernel;
use crate::runtime::launch::{KernelArg, WorkGrid};

/// Opaque identifier of one device allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u64);

impl BufferId {
    /// Raw numeric value, as bound into kernel argument slots.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A device allocation with a fixed byte length.
///
/// Deliberately neither `Clone` nor `Copy`: whoever holds the `RawBuffer`
/// owns the allocation, whether that is a value type or the pool.
#[derive(Debug, PartialEq, Eq)]
pub struct RawBuffer {
    id: BufferId,
    byte_len: usize,
}

impl RawBuffer {
    pub(crate) fn new(id: BufferId, byte_len: usize) -> Self {
        Self { id, byte_len }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Length in bytes, fixed for the lifetime of the allocation.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

/// Information about the device behind a context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "host-emulated", "cuda:0").
    pub name: String,

    /// Memory available for allocation in bytes (None = unbounded).
    pub memory_limit: Option<usize>,

    /// Kernel entry points declared by the built program.
    pub entry_points: Vec<String>,
}

/// A compute device with a single in-order queue.
///
/// Every method is synchronous: it returns only after the device has
/// finished the requested work.
pub trait Device {
    /// Describe the device.
    fn info(&self) -> DeviceInfo;

    /// Allocate a fresh buffer of `byte_len` bytes. Contents are unspecified.
    fn allocate(&mut self, byte_len: usize) -> Result<RawBuffer>;

    /// Return a buffer's memory to the device.
    fn free(&mut self, buffer: RawBuffer) -> Result<()>;

    /// Write `data` to the start of `buffer`.
    fn write(&mut self, buffer: &RawBuffer, data: &[f32]) -> Result<()>;

    /// Read `out.len()` floats from the start of `buffer`.
    fn read(&mut self, buffer: &RawBuffer, out: &mut [f32]) -> Result<()>;

    /// Copy the first `byte_len` bytes of `src` into `dst`.
    fn copy(&mut self, src: &RawBuffer, dst: &RawBuffer, byte_len: usize) -> Result<()>;

    /// Bind the named entry point of the program, returning a device-local slot.
    fn create_kernel(&mut self, name: &str) -> Result<usize>;

    /// Enqueue `kernel` over `grid` with positionally bound `args`.
    fn launch(&mut self, kernel: &Kernel, grid: &WorkGrid, args: &[KernelArg]) -> Result<()>;

    /// Block until all enqueued work has completed.
    fn finish(&mut self) -> Result<()>;

    /// Number of allocations currently held by the device.
    fn live_buffers(&self) -> usize;
}
