//! CUDA device.
//!
//! The program is compiled to PTX with NVRTC once at construction and loaded
//! as a single module. All work goes through the context's default stream
//! and every launch or transfer synchronizes before returning.

use std::collections::HashMap;
use std::sync::Arc;

use cudarc::driver::{
    CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, LaunchConfig as CudaLaunch,
    PushKernelArg,
};
use tracing::{debug, info};

use crate::error::{ComputeError, Result};
use crate::gpu::device::{BufferId, Device, DeviceInfo, RawBuffer};
use crate::kernels;
use crate::runtime::cache::Kernel;
use crate::runtime::launch::{KernelArg, WorkGrid};
use crate::runtime::program::ProgramSource;

const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

fn driver_err(err: impl std::fmt::Display) -> ComputeError {
    ComputeError::Device(err.to_string())
}

/// A kernel argument resolved against device memory.
enum CudaArg<'a> {
    Buffer(&'a CudaSlice<f32>),
    Float(f32),
    Int(i32),
}

pub struct CudaDevice {
    ordinal: usize,
    stream: Arc<CudaStream>,
    module: Arc<CudaModule>,
    entry_points: Vec<String>,
    functions: Vec<CudaFunction>,
    buffers: HashMap<BufferId, CudaSlice<f32>>,
    next_id: u64,
    bytes_in_use: usize,
    memory_limit: Option<usize>,
}

impl CudaDevice {
    /// Open device `ordinal` and build `source` for it.
    pub fn new(ordinal: usize, source: &ProgramSource, memory_limit: Option<usize>) -> Result<Self> {
        let ctx = CudaContext::new(ordinal).map_err(driver_err)?;
        let stream = ctx.default_stream();

        let ptx = cudarc::nvrtc::compile_ptx(source.text()).map_err(|e| {
            ComputeError::ProgramBuild(format!("{}: {e}", source.origin()))
        })?;
        let module = ctx
            .load_module(ptx)
            .map_err(|e| ComputeError::ProgramBuild(format!("{}: {e}", source.origin())))?;

        let entry_points = source.entry_points();
        info!(
            ordinal,
            program = source.origin(),
            entry_points = entry_points.len(),
            "Built CUDA program"
        );

        Ok(Self {
            ordinal,
            stream,
            module,
            entry_points,
            functions: Vec::new(),
            buffers: HashMap::new(),
            next_id: 0,
            bytes_in_use: 0,
            memory_limit,
        })
    }

    fn slice(&self, id: BufferId) -> Result<&CudaSlice<f32>> {
        self.buffers.get(&id).ok_or(ComputeError::InvalidBuffer(id))
    }
}

impl Device for CudaDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("cuda:{}", self.ordinal),
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

        let slice = self
            .stream
            .alloc_zeros::<f32>(byte_len.div_ceil(FLOAT_BYTES))
            .map_err(driver_err)?;
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, slice);
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
        let slice = self
            .buffers
            .get_mut(&buffer.id())
            .ok_or(ComputeError::InvalidBuffer(buffer.id()))?;
        let mut view = slice.slice_mut(0..data.len());
        self.stream.memcpy_htod(data, &mut view).map_err(driver_err)?;
        self.stream.synchronize().map_err(driver_err)
    }

    fn read(&mut self, buffer: &RawBuffer, out: &mut [f32]) -> Result<()> {
        let bytes = out.len() * FLOAT_BYTES;
        if bytes > buffer.byte_len() {
            return Err(ComputeError::TransferSize {
                expected: buffer.byte_len(),
                found: bytes,
            });
        }
        let view = self.slice(buffer.id())?.slice(0..out.len());
        self.stream.memcpy_dtoh(&view, out).map_err(driver_err)?;
        self.stream.synchronize().map_err(driver_err)
    }

    fn copy(&mut self, src: &RawBuffer, dst: &RawBuffer, byte_len: usize) -> Result<()> {
        let limit = src.byte_len().min(dst.byte_len());
        if byte_len > limit {
            return Err(ComputeError::TransferSize {
                expected: limit,
                found: byte_len,
            });
        }
        if src.id() == dst.id() {
            return Ok(());
        }
        let count = byte_len / FLOAT_BYTES;

        // Take the destination out so source and destination can be borrowed together.
        let mut target = self
            .buffers
            .remove(&dst.id())
            .ok_or(ComputeError::InvalidBuffer(dst.id()))?;
        let result = self.slice(src.id()).and_then(|source| {
            let view = source.slice(0..count);
            let mut dst_view = target.slice_mut(0..count);
            self.stream
                .memcpy_dtod(&view, &mut dst_view)
                .map_err(driver_err)
        });
        self.buffers.insert(dst.id(), target);
        result?;
        self.stream.synchronize().map_err(driver_err)
    }

    fn create_kernel(&mut self, name: &str) -> Result<usize> {
        if !self.entry_points.iter().any(|e| e == name) {
            return Err(ComputeError::KernelNotFound(name.to_string()));
        }
        let function = self
            .module
            .load_function(name)
            .map_err(|_| ComputeError::KernelNotFound(name.to_string()))?;
        self.functions.push(function);
        Ok(self.functions.len() - 1)
    }

    fn launch(&mut self, kernel: &Kernel, grid: &WorkGrid, args: &[KernelArg]) -> Result<()> {
        let function = self
            .functions
            .get(kernel.slot())
            .ok_or_else(|| ComputeError::KernelNotFound(kernel.name().to_string()))?;
        if let Some(signature) = kernels::lookup(kernel.name()) {
            signature.check_args(args)?;
        }

        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            let value = match (arg.as_buffer(), arg.as_float(), arg.as_int()) {
                (Some(id), _, _) => CudaArg::Buffer(self.slice(id)?),
                (_, Some(value), _) => CudaArg::Float(value),
                (_, _, Some(value)) => CudaArg::Int(value),
                _ => unreachable!("kernel argument without a decodable tag"),
            };
            resolved.push(value);
        }

        let cfg = CudaLaunch {
            grid_dim: (
                (grid.global[0] / grid.local[0]) as u32,
                (grid.global[1] / grid.local[1]) as u32,
                1,
            ),
            block_dim: (grid.local[0] as u32, grid.local[1] as u32, 1),
            shared_mem_bytes: 0,
        };

        let mut builder = self.stream.launch_builder(function);
        for value in &resolved {
            match value {
                CudaArg::Buffer(slice) => builder.arg(*slice),
                CudaArg::Float(v) => builder.arg(v),
                CudaArg::Int(v) => builder.arg(v),
            };
        }
        // SAFETY: argument kinds and count were checked against the entry
        // point's parameter list, and every buffer outlives the launch.
        unsafe { builder.launch(cfg) }.map_err(driver_err)?;
        self.stream.synchronize().map_err(driver_err)?;

        debug!(kernel = kernel.name(), grid = ?cfg.grid_dim, block = ?cfg.block_dim, "CUDA launch");
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.stream.synchronize().map_err(driver_err)
    }

    fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}
