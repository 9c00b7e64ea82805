//! pooled-compute: a GPU compute runtime over pooled device buffers.
//!
//! A [`Context`] owns one device, the kernel program built for it, a buffer
//! pool keyed by byte length and a lazily filled kernel cache. [`Vector`],
//! [`Matrix`] and [`Scalar`] borrow a context; each vector or matrix owns
//! exactly one pooled buffer and returns it to the pool on drop.
//!
//! ```no_run
//! use pooled_compute::{Context, Dot};
//!
//! # fn main() -> pooled_compute::Result<()> {
//! let ctx = Context::host()?;
//! let a = ctx.vector_from(&[1.0, 2.0, 3.0])?;
//! let b = ctx.vector_from(&[4.0, 5.0, 6.0])?;
//! let c = &a + &b;
//! assert_eq!(c.get()?, vec![5.0, 7.0, 9.0]);
//! assert_eq!(a.dot(&b)?.get(), 32.0);
//! # Ok(())
//! # }
//! ```
//!
//! Every launch and transfer blocks until the device is done, and a context
//! is single-threaded.

pub mod config;
pub mod dense;
pub mod error;
pub mod gpu;
pub mod kernels;
pub mod runtime;
pub mod values;

pub use config::Config;
pub use dense::DenseMatrix;
pub use error::{ComputeError, Result};
pub use gpu::allocator::PoolStats;
pub use runtime::context::{Context, TransferStats};
pub use values::{Dot, ElementwiseOp, Matrix, Scalar, Shape, UnaryOp, Vector};
