//! Error taxonomy for the compute runtime.
//!
//! Shape and context mismatches are caller bugs and are raised before any
//! pool or device work happens. Everything a backend reports (allocation,
//! program build, launch, transfer) is folded into the remaining variants.

use std::path::PathBuf;

use thiserror::Error;
use tracing::error;

use crate::gpu::device::BufferId;
use crate::values::Shape;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Operand shape mismatch in {op}: {left} vs {right}")]
    ShapeMismatch {
        op: &'static str,
        left: Shape,
        right: Shape,
    },

    #[error("Operands of {op} belong to different contexts")]
    ContextMismatch { op: &'static str },

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Unsupported launch dimensionality: {0} dims (at most 2)")]
    UnsupportedDimensions(usize),

    #[error("Failed to load kernel source from {path:?}: {source}")]
    ProgramLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Kernel program failed to build: {0}")]
    ProgramBuild(String),

    #[error("Kernel '{0}' not found in program")]
    KernelNotFound(String),

    #[error("Bad argument {slot} for kernel '{kernel}': {reason}")]
    ArgumentMismatch {
        kernel: String,
        slot: usize,
        reason: String,
    },

    #[error("Out of device memory: requested {requested} bytes, limit {limit}")]
    OutOfMemory { requested: usize, limit: usize },

    #[error("Invalid or released device buffer {0}")]
    InvalidBuffer(BufferId),

    #[error("Transfer size mismatch: buffer holds {expected} bytes, got {found}")]
    TransferSize { expected: usize, found: usize },

    #[error("Device error: {0}")]
    Device(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = ComputeError> = std::result::Result<T, E>;

/// Unwrap the result of an operation that has no recovery path.
///
/// Used by the std operator impls, which cannot return `Result`.
#[track_caller]
pub(crate) fn fatal<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "Fatal compute error");
            panic!("{err}");
        }
    }
}
