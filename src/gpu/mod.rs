//! Device backends and device memory pooling.
//!
//! - [`device`]: the `Device` trait, buffer handles and device info
//! - [`host`]: host-emulated device (always available)
//! - [`cuda`]: CUDA device via NVRTC (feature `cuda`)
//! - [`allocator`]: free-list buffer pool keyed by byte length

pub mod allocator;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device;
pub mod host;
