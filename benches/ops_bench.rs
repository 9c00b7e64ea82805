//! Benchmarks for the operation library on the host device.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pooled_compute::{Context, DenseMatrix, Dot};

fn bench_elementwise(c: &mut Criterion) {
    let ctx = Context::host().unwrap();
    let n = 1 << 16;
    let a = ctx.vector_from(&vec![1.5; n]).unwrap();
    let b = ctx.vector_from(&vec![0.5; n]).unwrap();

    // Pool reuse keeps this allocation-free after the first iteration.
    c.bench_function("vsub_64k", |bench| {
        bench.iter(|| {
            let out = black_box(&a) - black_box(&b);
            black_box(out);
        })
    });

    c.bench_function("vexp_64k", |bench| {
        bench.iter(|| black_box(a.exp().unwrap()))
    });
}

fn bench_reduction(c: &mut Criterion) {
    let ctx = Context::host().unwrap();
    let data: Vec<f32> = (0..1 << 18).map(|v| (v % 97) as f32).collect();
    let v = ctx.vector_from(&data).unwrap();

    c.bench_function("sum_256k", |bench| {
        bench.iter(|| black_box(v.sum().unwrap().get()))
    });
}

fn bench_linalg(c: &mut Criterion) {
    let ctx = Context::host().unwrap();
    let n = 128;
    let host = DenseMatrix::from_vec(n, n, (0..n * n).map(|k| (k % 13) as f32).collect()).unwrap();
    let m = ctx.matrix_from(&host).unwrap();
    let x = ctx.vector_from(&vec![1.0; n]).unwrap();

    c.bench_function("transpose_128", |bench| {
        bench.iter(|| black_box(m.t().unwrap()))
    });

    c.bench_function("mvdot_128", |bench| {
        bench.iter(|| black_box(m.dot(&x).unwrap()))
    });

    c.bench_function("mmdot_128", |bench| {
        bench.iter(|| black_box(m.dot(&m).unwrap()))
    });

    c.bench_function("outer_128", |bench| {
        bench.iter(|| black_box(x.outer(&x).unwrap()))
    });
}

criterion_group!(benches, bench_elementwise, bench_reduction, bench_linalg);
criterion_main!(benches);
