//! Build script for pooled-compute.
//!
//! The kernel source in `kernels/kernels.cu` is embedded into the library
//! with `include_str!`, so edits to it must trigger a rebuild. With the
//! `cuda` feature the same source is compiled at runtime through NVRTC.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=kernels/kernels.cu");

    if std::env::var_os("CARGO_FEATURE_CUDA").is_some() {
        println!("cargo:warning=CUDA feature enabled: kernels are compiled with NVRTC at context creation");
    }
}
