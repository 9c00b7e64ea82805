//! Kernel program, kernel cache, launch geometry and the compute context.
//!
//! - [`program`]: kernel source loading and entry-point discovery
//! - [`cache`]: name -> bound kernel memoization
//! - [`launch`]: padded work grids and tagged positional arguments
//! - [`context`]: the `Context` that owns device, pool and cache

pub mod cache;
pub mod context;
pub mod launch;
pub mod program;
