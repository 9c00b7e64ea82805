//! The operation library.
//!
//! - [`names`]: fixed entry-point names used by the value types
//! - [`elementwise`]: binary, compound, scalar-broadcast, copy and unary kernels
//! - [`linalg`]: transpose, matrix-vector, matrix-matrix and outer product
//! - [`reduce`]: the two phases of `Vector::sum`
//!
//! The bodies here are what the host device executes. They follow the same
//! per-work-item contract as the CUDA C in `kernels/kernels.cu`: each call
//! sees one global id, bounds-checks it against its size arguments and
//! touches only the output slots that id owns. Matrices are column-major,
//! element `(i, j)` of an `n`-row matrix at offset `i + j * n`.

pub mod elementwise;
pub mod linalg;
pub mod names;
pub mod reduce;

use crate::error::{ComputeError, Result};
use crate::runtime::launch::{ArgKind, KernelArg, WorkGrid};

/// Global id of the work item being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub global: [usize; 2],
}

impl WorkItem {
    pub fn x(&self) -> usize {
        self.global[0]
    }

    pub fn y(&self) -> usize {
        self.global[1]
    }
}

/// An argument after binding: buffers are resolved to invocation-local memory.
#[derive(Debug, Clone, Copy)]
pub enum Bound {
    Buffer(usize),
    Float(f32),
    Int(i32),
}

/// The memory and arguments one kernel launch runs against.
///
/// Accesses past the end of a buffer do not touch memory: loads read `0.0`,
/// stores are dropped, and the first such access is kept as a fault that
/// [`HostKernel::run`] reports once the grid completes.
pub struct Invocation<'a> {
    memory: &'a mut [Vec<f32>],
    slots: &'a [Bound],
    fault: Option<(usize, usize)>,
}

impl<'a> Invocation<'a> {
    /// `slots` must already match the kernel's parameter list.
    pub fn new(memory: &'a mut [Vec<f32>], slots: &'a [Bound]) -> Self {
        Self {
            memory,
            slots,
            fault: None,
        }
    }

    /// First out-of-bounds access as `(slot, index)`, if any.
    pub fn fault(&self) -> Option<(usize, usize)> {
        self.fault
    }

    fn record_fault(&mut self, slot: usize, index: usize) {
        self.fault.get_or_insert((slot, index));
    }

    fn buffer_index(&self, slot: usize) -> usize {
        match self.slots[slot] {
            Bound::Buffer(index) => index,
            other => panic!("slot {slot} bound to {other:?}, expected a buffer"),
        }
    }

    pub fn load(&mut self, slot: usize, index: usize) -> f32 {
        let buffer = self.buffer_index(slot);
        match self.memory[buffer].get(index) {
            Some(value) => *value,
            None => {
                self.record_fault(slot, index);
                0.0
            }
        }
    }

    pub fn store(&mut self, slot: usize, index: usize, value: f32) {
        let buffer = self.buffer_index(slot);
        match self.memory[buffer].get_mut(index) {
            Some(cell) => *cell = value,
            None => self.record_fault(slot, index),
        }
    }

    pub fn float(&self, slot: usize) -> f32 {
        match self.slots[slot] {
            Bound::Float(value) => value,
            other => panic!("slot {slot} bound to {other:?}, expected a float"),
        }
    }

    /// Integer argument as an index bound; negative values clamp to zero.
    pub fn int(&self, slot: usize) -> usize {
        match self.slots[slot] {
            Bound::Int(value) => value.max(0) as usize,
            other => panic!("slot {slot} bound to {other:?}, expected an int"),
        }
    }
}

pub type KernelBody = fn(&mut Invocation<'_>, WorkItem);

/// A host-executable kernel: its entry-point name, parameter list and body.
pub struct HostKernel {
    pub name: &'static str,
    pub params: &'static [ArgKind],
    pub body: KernelBody,
}

impl std::fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostKernel")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl HostKernel {
    /// Check a positional argument list against the parameter list.
    pub fn check_args(&self, args: &[KernelArg]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(ComputeError::ArgumentMismatch {
                kernel: self.name.to_string(),
                slot: args.len().min(self.params.len()),
                reason: format!(
                    "expected {} arguments, got {}",
                    self.params.len(),
                    args.len()
                ),
            });
        }
        for (slot, (arg, param)) in args.iter().zip(self.params).enumerate() {
            let expected_size = match param {
                ArgKind::Buffer => std::mem::size_of::<u64>(),
                ArgKind::Float | ArgKind::Int => 4,
            };
            if arg.kind() != *param || arg.size() != expected_size {
                return Err(ComputeError::ArgumentMismatch {
                    kernel: self.name.to_string(),
                    slot,
                    reason: format!(
                        "expected {param} ({expected_size} bytes), got {} ({} bytes)",
                        arg.kind(),
                        arg.size()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Execute the body once per work item of the padded grid.
    ///
    /// Fails if any work item indexed past the end of a bound buffer, which
    /// happens when the size arguments exceed the buffers they describe.
    pub fn run(&self, invocation: &mut Invocation<'_>, grid: &WorkGrid) -> Result<()> {
        for y in 0..grid.global[1] {
            for x in 0..grid.global[0] {
                (self.body)(invocation, WorkItem { global: [x, y] });
            }
        }
        match invocation.fault() {
            Some((slot, index)) => Err(ComputeError::Device(format!(
                "kernel '{}' accessed index {index} past the end of the buffer in slot {slot}",
                self.name
            ))),
            None => Ok(()),
        }
    }
}

/// Find the host implementation of an entry point.
pub fn lookup(name: &str) -> Option<&'static HostKernel> {
    elementwise::KERNELS
        .iter()
        .chain(linalg::KERNELS)
        .chain(reduce::KERNELS)
        .find(|k| k.name == name)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::LaunchConfig;

    /// Run `name` over `dims` against `memory`, binding `slots` in order.
    pub fn run(name: &str, dims: &[usize], memory: &mut [Vec<f32>], slots: &[Bound]) {
        let kernel = lookup(name).unwrap();
        assert_eq!(kernel.params.len(), slots.len());
        let grid = WorkGrid::from_dims(dims, &LaunchConfig::default()).unwrap();
        let mut inv = Invocation::new(memory, slots);
        kernel.run(&mut inv, &grid).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_has_host_body() {
        for name in names::ALL {
            assert!(lookup(name).is_some(), "no host body for {name}");
        }
    }

    #[test]
    fn test_names_unique() {
        let mut all: Vec<_> = names::ALL.to_vec();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), names::ALL.len());
    }

    #[test]
    fn test_padded_items_are_bounds_checked() {
        // 5 elements launch 16 work items; the extra 11 must not write.
        let mut memory = vec![vec![1.0; 5], vec![2.0; 5], vec![0.0; 5]];
        testing::run(
            names::VADD,
            &[5],
            &mut memory,
            &[Bound::Buffer(0), Bound::Buffer(1), Bound::Buffer(2), Bound::Int(5)],
        );
        assert_eq!(memory[2], vec![3.0; 5]);
    }
}
