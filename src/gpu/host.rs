//! Host-emulated device.
//!
//! Device memory is a map of `BufferId -> Vec<f32>`, the program is "built"
//! by scanning the kernel source for entry points, and a launch executes the
//! matching body from [`crate::kernels`] once per work item of the padded
//! grid. Everything completes before the call returns, so the queue is
//! trivially in order.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{ComputeError, Result};
use crate::gpu::device::{BufferId, Device, DeviceInfo, RawBuffer};
use crate::kernels::{self, Bound, HostKernel, Invocation};
use crate::runtime::cache::Kernel;
use crate::runtime::launch::{KernelArg, WorkGrid};
use crate::runtime::program::ProgramSource;

const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

pub struct HostDevice {
    /// Entry points declared by the program source.
    entry_points: Vec<String>,

    /// Bound kernels; the index is the kernel slot.
    kernels: Vec<&'static HostKernel>,

    /// Live allocations.
    buffers: HashMap<BufferId, Vec<f32>>,

    next_id: u64,

    bytes_in_use: usize,

    memory_limit: Option<usize>,
}

impl HostDevice {
    /// Build the program and create an empty device.
    pub fn new(source: &ProgramSource, memory_limit: Option<usize>) -> Result<Self> {
        let entry_points = source.entry_points();
        if entry_points.is_empty() {
            return Err(ComputeError::ProgramBuild(format!(
                "{} declares no kernel entry points",
                source.origin()
            )));
        }
        info!(
            program = source.origin(),
            entry_points = entry_points.len(),
            "Built host program"
        );

        Ok(Self {
            entry_points,
            kernels: Vec::new(),
            buffers: HashMap::new(),
            next_id: 0,
            bytes_in_use: 0,
            memory_limit,
        })
    }

    /// Bytes currently allocated.
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    fn storage(&self, buffer: &RawBuffer) -> Result<&Vec<f32>> {
        self.buffers
            .get(&buffer.id())
            .ok_or(ComputeError::InvalidBuffer(buffer.id()))
    }

    fn storage_mut(&mut self, buffer: &RawBuffer) -> Result<&mut Vec<f32>> {
        self.buffers
            .get_mut(&buffer.id())
            .ok_or(ComputeError::InvalidBuffer(buffer.id()))
    }

    /// Resolve `args` into invocation slots, moving each distinct buffer
    /// into `memory` (its id recorded at the same index in `ids`).
    fn bind(
        &mut self,
        args: &[KernelArg],
        ids: &mut Vec<BufferId>,
        memory: &mut Vec<Vec<f32>>,
    ) -> Result<Vec<Bound>> {
        let mut slots = Vec::with_capacity(args.len());
        for arg in args {
            let bound = match (arg.as_buffer(), arg.as_float(), arg.as_int()) {
                (Some(id), _, _) => {
                    let index = match ids.iter().position(|taken| *taken == id) {
                        Some(index) => index,
                        None => {
                            let data = self
                                .buffers
                                .remove(&id)
                                .ok_or(ComputeError::InvalidBuffer(id))?;
                            ids.push(id);
                            memory.push(data);
                            ids.len() - 1
                        }
                    };
                    Bound::Buffer(index)
                }
                (_, Some(value), _) => Bound::Float(value),
                (_, _, Some(value)) => Bound::Int(value),
                _ => unreachable!("kernel argument without a decodable tag"),
            };
            slots.push(bound);
        }
        Ok(slots)
    }
}

/// Buffers moved out of device memory for one launch. Dropping it puts them
/// back, including when the launch unwinds.
struct Taken<'a> {
    buffers: &'a mut HashMap<BufferId, Vec<f32>>,
    ids: Vec<BufferId>,
    memory: Vec<Vec<f32>>,
}

impl Drop for Taken<'_> {
    fn drop(&mut self) {
        for (id, data) in self.ids.drain(..).zip(self.memory.drain(..)) {
            self.buffers.insert(id, data);
        }
    }
}

impl Device for HostDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "host-emulated".to_string(),
            memory_limit: self.memory_limit,
            entry_points: self.entry_points.clone(),
        }
    }

    fn allocate(&mut self, byte_len: usize) -> Result<RawBuffer> {
        if let Some(limit) = self.memory_limit {
            if self.bytes_in_use + byte_len > limit {
                return Err(ComputeError::OutOfMemory {
                    requested: byte_len,
                    limit,
                });
            }
        }

        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers
            .insert(id, vec![0.0; byte_len.div_ceil(FLOAT_BYTES)]);
        self.bytes_in_use += byte_len;
        Ok(RawBuffer::new(id, byte_len))
    }

    fn free(&mut self, buffer: RawBuffer) -> Result<()> {
        self.buffers
            .remove(&buffer.id())
            .ok_or(ComputeError::InvalidBuffer(buffer.id()))?;
        self.bytes_in_use = self.bytes_in_use.saturating_sub(buffer.byte_len());
        Ok(())
    }

    fn write(&mut self, buffer: &RawBuffer, data: &[f32]) -> Result<()> {
        let bytes = data.len() * FLOAT_BYTES;
        if bytes > buffer.byte_len() {
            return Err(ComputeError::TransferSize {
                expected: buffer.byte_len(),
                found: bytes,
            });
        }
        let storage = self.storage_mut(buffer)?;
        storage[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&mut self, buffer: &RawBuffer, out: &mut [f32]) -> Result<()> {
        let bytes = out.len() * FLOAT_BYTES;
        if bytes > buffer.byte_len() {
            return Err(ComputeError::TransferSize {
                expected: buffer.byte_len(),
                found: bytes,
            });
        }
        let storage = self.storage(buffer)?;
        out.copy_from_slice(&storage[..out.len()]);
        Ok(())
    }

    fn copy(&mut self, src: &RawBuffer, dst: &RawBuffer, byte_len: usize) -> Result<()> {
        let limit = src.byte_len().min(dst.byte_len());
        if byte_len > limit {
            return Err(ComputeError::TransferSize {
                expected: limit,
                found: byte_len,
            });
        }
        let count = byte_len / FLOAT_BYTES;
        let staged = self.storage(src)?[..count].to_vec();
        self.storage_mut(dst)?[..count].copy_from_slice(&staged);
        Ok(())
    }

    fn create_kernel(&mut self, name: &str) -> Result<usize> {
        if !self.entry_points.iter().any(|e| e == name) {
            return Err(ComputeError::KernelNotFound(name.to_string()));
        }
        let kernel =
            kernels::lookup(name).ok_or_else(|| ComputeError::KernelNotFound(name.to_string()))?;
        self.kernels.push(kernel);
        Ok(self.kernels.len() - 1)
    }

    fn launch(&mut self, kernel: &Kernel, grid: &WorkGrid, args: &[KernelArg]) -> Result<()> {
        let host = *self
            .kernels
            .get(kernel.slot())
            .ok_or_else(|| ComputeError::KernelNotFound(kernel.name().to_string()))?;
        host.check_args(args)?;

        let mut ids = Vec::new();
        let mut memory = Vec::new();
        let bound = self.bind(args, &mut ids, &mut memory);
        let mut taken = Taken {
            buffers: &mut self.buffers,
            ids,
            memory,
        };
        let slots = bound?;
        let mut invocation = Invocation::new(&mut taken.memory, &slots);
        host.run(&mut invocation, grid)?;
        debug!(kernel = host.name, items = grid.work_items(), "Host kernel done");
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}
