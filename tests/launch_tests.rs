//! Launch primitive, kernel source loading and argument binding.

use std::io::Write;

use pooled_compute::config::Config;
use pooled_compute::runtime::launch::KernelArg;
use pooled_compute::{ComputeError, Context};

#[test]
fn test_raw_launch_with_tagged_args() {
    let ctx = Context::host().unwrap();
    let a = ctx.vector_from(&[1.0, 2.0, 3.0]).unwrap();
    let b = ctx.vector(3).unwrap();

    ctx.launch(
        "vsmul",
        &[3],
        &[
            KernelArg::buffer(a.buffer_id()),
            KernelArg::buffer(b.buffer_id()),
            KernelArg::float(4.0),
            KernelArg::int(3),
        ],
    )
    .unwrap();
    assert_eq!(b.get().unwrap(), vec![4.0, 8.0, 12.0]);
}

#[test]
fn test_argument_mismatch_reported() {
    let ctx = Context::host().unwrap();
    let a = ctx.vector(3).unwrap();

    let result = ctx.launch(
        "vsmul",
        &[3],
        &[
            KernelArg::buffer(a.buffer_id()),
            KernelArg::buffer(a.buffer_id()),
            KernelArg::int(4),
            KernelArg::int(3),
        ],
    );
    assert!(matches!(
        result,
        Err(ComputeError::ArgumentMismatch { slot: 2, .. })
    ));
    assert_eq!(ctx.launch_count(), 0);
}

#[test]
fn test_count_past_buffer_end_keeps_ownership() {
    let ctx = Context::host().unwrap();
    let a = ctx.vector_from(&[1.0, 2.0, 3.0]).unwrap();
    let b = ctx.vector(3).unwrap();
    let live = ctx.live_buffers();

    let result = ctx.launch(
        "vsmul",
        &[8],
        &[
            KernelArg::buffer(a.buffer_id()),
            KernelArg::buffer(b.buffer_id()),
            KernelArg::float(2.0),
            KernelArg::int(8),
        ],
    );
    assert!(matches!(result, Err(ComputeError::Device(_))));
    assert_eq!(ctx.launch_count(), 0);

    // Both buffers are still owned and readable.
    assert_eq!(ctx.live_buffers(), live);
    assert_eq!(ctx.pool_stats().owned, 2);
    assert_eq!(a.get().unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(b.get().unwrap(), vec![2.0, 4.0, 6.0]);
}

#[test]
fn test_three_dims_rejected() {
    let ctx = Context::host().unwrap();
    let result = ctx.launch("vadd", &[2, 2, 2], &[]);
    assert!(matches!(result, Err(ComputeError::UnsupportedDimensions(3))));
}

#[test]
fn test_kernel_source_from_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"extern "C" __global__ void vadd(const float* a, const float* b, float* c, int n) {{
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) c[i] = a[i] + b[i];
}}
"#
    )
    .unwrap();

    let mut config = Config::default();
    config.device.kernel_path = Some(file.path().to_path_buf());
    let ctx = Context::new(config).unwrap();
    assert_eq!(ctx.info().entry_points, vec!["vadd".to_string()]);

    let a = ctx.vector_from(&[1.0, 2.0]).unwrap();
    let b = ctx.vector_from(&[3.0, 4.0]).unwrap();
    assert_eq!((&a + &b).get().unwrap(), vec![4.0, 6.0]);

    // Entry points missing from this program cannot be resolved.
    assert!(matches!(
        ctx.resolve_kernel("vsub"),
        Err(ComputeError::KernelNotFound(_))
    ));
}

#[test]
fn test_missing_kernel_path_is_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.device.kernel_path = Some(dir.path().join("missing.cu"));

    assert!(matches!(
        Context::new(config),
        Err(ComputeError::ProgramLoad { .. })
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = Config::default();
    config.launch.local_size = 0;
    assert!(matches!(
        Context::new(config),
        Err(ComputeError::InvalidConfig(_))
    ));
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compute.json");
    std::fs::write(
        &path,
        r#"{"launch": {"local_size": 32}, "reduce": {"max_lanes": 8}}"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.launch.local_size, 32);
    assert_eq!(config.launch.tile_size, 4);

    let ctx = Context::new(config).unwrap();
    let data: Vec<f32> = (1..=5000).map(|v| v as f32).collect();
    let sum = ctx.vector_from(&data).unwrap().sum().unwrap().get();
    assert!((sum - 12_502_500.0).abs() / 12_502_500.0 < 1e-5);

    let missing = Config::load(&dir.path().join("absent.json")).unwrap();
    assert_eq!(missing.launch.local_size, 16);
}
