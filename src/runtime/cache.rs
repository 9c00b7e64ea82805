//! Kernel cache: binds each entry point of the program at most once.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::error::Result;
use crate::gpu::device::Device;

/// A bound kernel entry point.
#[derive(Debug, PartialEq, Eq)]
pub struct Kernel {
    name: String,
    slot: usize,
}

impl Kernel {
    pub(crate) fn new(name: impl Into<String>, slot: usize) -> Self {
        Self {
            name: name.into(),
            slot,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device-local slot returned by [`Device::create_kernel`].
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Memoizes `name -> Kernel` for one context.
#[derive(Debug, Default)]
pub struct KernelCache {
    kernels: HashMap<String, Rc<Kernel>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached kernel for `name`, binding it on first request.
    ///
    /// A failed bind is not cached; the next request retries it.
    pub fn resolve(&mut self, name: &str, device: &mut dyn Device) -> Result<Rc<Kernel>> {
        if let Some(kernel) = self.kernels.get(name) {
            return Ok(Rc::clone(kernel));
        }

        let slot = device.create_kernel(name)?;
        let kernel = Rc::new(Kernel::new(name, slot));
        self.kernels.insert(name.to_string(), Rc::clone(&kernel));
        debug!(kernel = name, slot, "Bound kernel");
        Ok(kernel)
    }

    /// Whether `name` has already been bound.
    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Number of bound kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComputeError;
    use crate::gpu::host::HostDevice;
    use crate::runtime::program::ProgramSource;

    fn device() -> HostDevice {
        HostDevice::new(&ProgramSource::embedded(), None).unwrap()
    }

    #[test]
    fn test_resolve_memoizes() {
        let mut dev = device();
        let mut cache = KernelCache::new();

        let first = cache.resolve("vadd", &mut dev).unwrap();
        let second = cache.resolve("vadd", &mut dev).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("vadd"));
    }

    #[test]
    fn test_distinct_names_distinct_slots() {
        let mut dev = device();
        let mut cache = KernelCache::new();

        let add = cache.resolve("vadd", &mut dev).unwrap();
        let sub = cache.resolve("vsub", &mut dev).unwrap();
        assert_ne!(add.slot(), sub.slot());
        assert_eq!(sub.name(), "vsub");
    }

    #[test]
    fn test_unknown_name_not_cached() {
        let mut dev = device();
        let mut cache = KernelCache::new();

        let result = cache.resolve("no_such_kernel", &mut dev);
        assert!(matches!(result, Err(ComputeError::KernelNotFound(_))));
        assert!(cache.is_empty());
    }
}
