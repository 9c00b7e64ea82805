//! The compute context.
//!
//! A [`Context`] owns one device, its built program, the buffer pool and the
//! kernel cache. Value types borrow it for their whole lifetime, which ties
//! every pooled buffer to the context that allocated it. All state sits
//! behind `RefCell`s: a context is meant to be driven from one thread and
//! is neither `Send` nor `Sync`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Backend, Config, DeviceConfig};
use crate::dense::DenseMatrix;
use crate::error::{ComputeError, Result};
use crate::gpu::allocator::{BufferPool, PoolStats};
use crate::gpu::device::{Device, DeviceInfo, RawBuffer};
use crate::gpu::host::HostDevice;
use crate::runtime::cache::{Kernel, KernelCache};
use crate::runtime::launch::{KernelArg, WorkGrid};
use crate::runtime::program::ProgramSource;
use crate::values::{Matrix, Scalar, Vector};

const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

/// Host/device transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub h2d_bytes: u64,
    pub h2d_transfers: u64,
    pub d2h_bytes: u64,
    pub d2h_transfers: u64,
    pub d2d_bytes: u64,
    pub d2d_transfers: u64,
}

pub struct Context {
    config: Config,
    device: RefCell<Box<dyn Device>>,
    pool: RefCell<BufferPool>,
    kernels: RefCell<KernelCache>,
    transfers: Cell<TransferStats>,
    launches: Cell<u64>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device.borrow().info().name)
            .field("pool", &self.pool.borrow().stats())
            .field("kernels", &self.kernels.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Open the configured device and build the kernel program on it.
    ///
    /// A configured `kernel_path` that cannot be read, or a program that
    /// fails to build, is a hard error.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let source = match &config.device.kernel_path {
            Some(path) => ProgramSource::load(path)?,
            None => ProgramSource::embedded(),
        };
        let device = open_device(&config.device, &source)?;
        Ok(Self::with_device(config, device))
    }

    /// A context on the host-emulated device with default settings.
    pub fn host() -> Result<Self> {
        Self::new(Config::default())
    }

    /// Wrap an already constructed device.
    pub fn with_device(config: Config, device: Box<dyn Device>) -> Self {
        let info = device.info();
        info!(
            device = %info.name,
            entry_points = info.entry_points.len(),
            bucketing = ?config.pool.bucketing,
            "Compute context ready"
        );

        Self {
            pool: RefCell::new(BufferPool::new(config.pool.bucketing)),
            config,
            device: RefCell::new(device),
            kernels: RefCell::new(KernelCache::new()),
            transfers: Cell::new(TransferStats::default()),
            launches: Cell::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn info(&self) -> DeviceInfo {
        self.device.borrow().info()
    }

    /// Whether `self` and `other` are the same context.
    pub fn is_same(&self, other: &Context) -> bool {
        std::ptr::eq(self, other)
    }

    // Factories.

    /// A vector of `n` elements. Contents are unspecified until `set`.
    pub fn vector(&self, n: usize) -> Result<Vector<'_>> {
        Vector::new(self, n)
    }

    pub fn vector_from(&self, data: &[f32]) -> Result<Vector<'_>> {
        let mut v = Vector::new(self, data.len())?;
        v.set(data)?;
        Ok(v)
    }

    /// A `rows x cols` matrix. Contents are unspecified until `set`.
    pub fn matrix(&self, rows: usize, cols: usize) -> Result<Matrix<'_>> {
        Matrix::new(self, rows, cols)
    }

    pub fn matrix_from(&self, host: &DenseMatrix) -> Result<Matrix<'_>> {
        let mut m = Matrix::new(self, host.rows(), host.cols())?;
        m.set(host)?;
        Ok(m)
    }

    pub fn scalar(&self, value: f32) -> Scalar<'_> {
        Scalar::new(self, value)
    }

    // Kernels.

    /// Resolve a kernel by name, binding it on first use.
    pub fn resolve_kernel(&self, name: &str) -> Result<Rc<Kernel>> {
        let mut device = self.device.borrow_mut();
        self.kernels.borrow_mut().resolve(name, &mut **device)
    }

    /// Launch `name` over `dims` with positional `args` and wait for it.
    ///
    /// `dims` holds zero, one or two logical sizes; the padded grid is
    /// derived from [`crate::config::LaunchConfig`]. More than two dims is
    /// rejected before the kernel is resolved.
    pub fn launch(&self, name: &str, dims: &[usize], args: &[KernelArg]) -> Result<()> {
        let grid = WorkGrid::from_dims(dims, &self.config.launch)?;

        let mut device = self.device.borrow_mut();
        let kernel = self.kernels.borrow_mut().resolve(name, &mut **device)?;
        device.launch(&kernel, &grid, args)?;
        device.finish()?;

        self.launches.set(self.launches.get() + 1);
        debug!(
            kernel = name,
            ?dims,
            global = ?grid.global,
            local = ?grid.local,
            "Launched kernel"
        );
        Ok(())
    }

    /// Number of completed launches.
    pub fn launch_count(&self) -> u64 {
        self.launches.get()
    }

    /// Number of kernels bound so far.
    pub fn kernel_count(&self) -> usize {
        self.kernels.borrow().len()
    }

    // Memory.

    pub(crate) fn acquire(&self, len: usize) -> Result<RawBuffer> {
        let mut device = self.device.borrow_mut();
        self.pool
            .borrow_mut()
            .acquire(len * FLOAT_BYTES, &mut **device)
    }

    pub(crate) fn release(&self, buffer: RawBuffer) {
        self.pool.borrow_mut().release(buffer);
    }

    pub(crate) fn write(&self, buffer: &RawBuffer, data: &[f32]) -> Result<()> {
        self.device.borrow_mut().write(buffer, data)?;
        let mut stats = self.transfers.get();
        stats.h2d_bytes += (data.len() * FLOAT_BYTES) as u64;
        stats.h2d_transfers += 1;
        self.transfers.set(stats);
        Ok(())
    }

    pub(crate) fn read(&self, buffer: &RawBuffer, out: &mut [f32]) -> Result<()> {
        self.device.borrow_mut().read(buffer, out)?;
        let mut stats = self.transfers.get();
        stats.d2h_bytes += (out.len() * FLOAT_BYTES) as u64;
        stats.d2h_transfers += 1;
        self.transfers.set(stats);
        Ok(())
    }

    pub(crate) fn copy(&self, src: &RawBuffer, dst: &RawBuffer, len: usize) -> Result<()> {
        let bytes = len * FLOAT_BYTES;
        self.device.borrow_mut().copy(src, dst, bytes)?;
        let mut stats = self.transfers.get();
        stats.d2d_bytes += bytes as u64;
        stats.d2d_transfers += 1;
        self.transfers.set(stats);
        Ok(())
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.borrow().stats()
    }

    pub fn transfer_stats(&self) -> TransferStats {
        self.transfers.get()
    }

    /// Allocations currently held by the device, pooled or owned.
    pub fn live_buffers(&self) -> usize {
        self.device.borrow().live_buffers()
    }

    /// Hand every pooled free buffer back to the device.
    pub fn trim_pool(&self) -> Result<usize> {
        let mut device = self.device.borrow_mut();
        let freed = self.pool.borrow_mut().trim(&mut **device)?;
        info!(freed, "Trimmed buffer pool");
        Ok(freed)
    }
}

fn open_device(config: &DeviceConfig, source: &ProgramSource) -> Result<Box<dyn Device>> {
    match config.backend {
        Backend::Host => Ok(Box::new(HostDevice::new(source, config.memory_limit)?)),
        Backend::Cuda => open_cuda(config, source),
    }
}

#[cfg(feature = "cuda")]
fn open_cuda(config: &DeviceConfig, source: &ProgramSource) -> Result<Box<dyn Device>> {
    let device = crate::gpu::cuda::CudaDevice::new(config.ordinal, source, config.memory_limit)?;
    Ok(Box::new(device))
}

#[cfg(not(feature = "cuda"))]
fn open_cuda(_config: &DeviceConfig, _source: &ProgramSource) -> Result<Box<dyn Device>> {
    Err(ComputeError::InvalidConfig(
        "backend \"cuda\" requires building with the `cuda` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::names;

    #[test]
    fn test_launch_counts_and_caches() {
        let ctx = Context::host().unwrap();
        let a = ctx.vector_from(&[1.0, 2.0]).unwrap();
        let b = ctx.vector_from(&[3.0, 4.0]).unwrap();

        let _c = &a + &b;
        let _d = &a + &b;
        assert_eq!(ctx.launch_count(), 2);
        assert_eq!(ctx.kernel_count(), 1);
    }

    #[test]
    fn test_launch_rejects_three_dims_before_resolving() {
        let ctx = Context::host().unwrap();
        let result = ctx.launch(names::VADD, &[1, 1, 1], &[]);
        assert!(matches!(result, Err(ComputeError::UnsupportedDimensions(3))));
        assert_eq!(ctx.kernel_count(), 0);
        assert_eq!(ctx.launch_count(), 0);
    }

    #[test]
    fn test_unknown_kernel() {
        let ctx = Context::host().unwrap();
        assert!(matches!(
            ctx.resolve_kernel("not_a_kernel"),
            Err(ComputeError::KernelNotFound(_))
        ));
    }

    #[test]
    fn test_transfer_stats() {
        let ctx = Context::host().unwrap();
        let v = ctx.vector_from(&[1.0, 2.0, 3.0]).unwrap();
        let _ = v.get().unwrap();
        let _copy = v.try_clone().unwrap();

        let stats = ctx.transfer_stats();
        assert_eq!(stats.h2d_transfers, 1);
        assert_eq!(stats.h2d_bytes, 12);
        assert_eq!(stats.d2h_transfers, 1);
        assert_eq!(stats.d2d_transfers, 1);
        assert_eq!(stats.d2d_bytes, 12);
    }

    #[test]
    fn test_cuda_backend_without_feature() {
        if cfg!(feature = "cuda") {
            return;
        }
        let mut config = Config::default();
        config.device.backend = Backend::Cuda;
        assert!(matches!(
            Context::new(config),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_is_same() {
        let a = Context::host().unwrap();
        let b = Context::host().unwrap();
        assert!(a.is_same(&a));
        assert!(!a.is_same(&b));
    }
}
