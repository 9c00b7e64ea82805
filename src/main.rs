//! pooled-compute CLI.
//!
//! `info` prints the device and effective configuration, `check` runs the
//! worked examples, and `bench` times one kernel loop.

use std::time::Instant;

use anyhow::{ensure, Context as _};
use clap::Parser;
use serde_json::json;
use tracing::info;

use pooled_compute::config::{BenchOp, Cli, Command, Config};
use pooled_compute::{Context, DenseMatrix, Dot};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "pooled_compute=debug"
    } else {
        "pooled_compute=info"
    };

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("pooled-compute v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?;
    let ctx = Context::new(config).context("failed to create compute context")?;

    match cli.command {
        Command::Info => print_info(&ctx)?,
        Command::Check => run_check(&ctx)?,
        Command::Bench { op, size, iters } => run_bench(&ctx, op, size, iters)?,
    }

    info!(
        pool = ?ctx.pool_stats(),
        transfers = ?ctx.transfer_stats(),
        launches = ctx.launch_count(),
        "Done"
    );
    Ok(())
}

fn print_info(ctx: &Context) -> anyhow::Result<()> {
    let report = json!({
        "device": ctx.info(),
        "config": ctx.config(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_check(ctx: &Context) -> anyhow::Result<()> {
    // Outer product.
    let a = ctx.vector_from(&[1.0, 2.0, 3.0, 4.0])?;
    let b = ctx.vector_from(&[91.0, 108.0, -44.0])?;
    let outer = a.outer(&b)?.get()?;
    ensure!(outer[(0, 0)] == 91.0 && outer[(3, 2)] == -176.0, "outer product mismatch");
    println!("outer:\n{}", format_matrix(&outer));

    // Matrix product.
    let lhs = DenseMatrix::from_rows(&[
        [1.0f32, 2.0, 3.0, 4.0],
        [5.0, 6.0, 7.0, 8.0],
        [9.0, 10.0, 11.0, 12.0],
    ])?;
    let rhs = DenseMatrix::from_rows(&[[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]])?;
    let product = ctx.matrix_from(&lhs)?.dot(&ctx.matrix_from(&rhs)?)?.get()?;
    ensure!(product.row(0) == [50.0, 60.0], "matrix product mismatch");
    println!("mmdot:\n{}", format_matrix(&product));

    // Transpose of a 13 x 15 ramp.
    let (n, m) = (13, 15);
    let ramp = DenseMatrix::from_vec(n, m, (0..n * m).map(|k| k as f32).collect())?;
    let t = ctx.matrix_from(&ramp)?.t()?.get()?;
    ensure!(
        (0..n).all(|i| (0..m).all(|j| t[(j, i)] == ramp[(i, j)])),
        "transpose mismatch"
    );
    println!("transpose: {}x{} ok", t.rows(), t.cols());

    // Reduction on both sides of the lane threshold.
    for len in [50usize, 1321, 20_000] {
        let data: Vec<f32> = (1..=len).map(|v| v as f32).collect();
        let sum = ctx.vector_from(&data)?.sum()?.get();
        let expected = (len * (len + 1) / 2) as f32;
        ensure!(
            ((sum - expected) / expected).abs() < 1e-5,
            "sum of 1..={len}: got {sum}, expected {expected}"
        );
        println!("sum 1..={len}: {sum}");
    }

    Ok(())
}

fn format_matrix(m: &DenseMatrix) -> String {
    (0..m.rows())
        .map(|i| {
            m.row(i)
                .iter()
                .map(|v| format!("{v:>8}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Edge of the largest square matrix holding at most `size` elements.
fn matrix_edge(size: usize) -> anyhow::Result<usize> {
    let mut edge = (size as f64).sqrt() as usize;
    while edge.checked_mul(edge).map_or(true, |cells| cells > size) {
        edge -= 1;
    }
    while (edge + 1).checked_mul(edge + 1).is_some_and(|cells| cells <= size) {
        edge += 1;
    }
    ensure!(edge > 0, "bench size {size} is too small for a matrix loop");
    Ok(edge)
}

fn run_bench(ctx: &Context, op: BenchOp, size: usize, iters: usize) -> anyhow::Result<()> {
    let ramp = |len: usize, start: f32| -> Vec<f32> {
        (0..len).map(|k| start + k as f32).collect()
    };

    let start = Instant::now();
    match op {
        BenchOp::Sub => {
            let a = ctx.vector_from(&ramp(size, 1.0))?;
            let b = ctx.vector_from(&ramp(size, 0.0))?;
            let mut c = ctx.vector(size)?;
            for _ in 0..iters {
                c = &a - &b;
            }
            println!("c[..5] = {:?}", &c.get()?[..5.min(size)]);
        }
        BenchOp::Exp => {
            let a = ctx.vector_from(&vec![0.5; size])?;
            let mut c = ctx.vector(size)?;
            for _ in 0..iters {
                c = a.exp()?;
            }
            println!("c[0] = {}", c.get()?[0]);
        }
        BenchOp::Transpose => {
            let n = matrix_edge(size)?;
            let a = ctx.matrix_from(&DenseMatrix::from_vec(n, n, ramp(n * n, 0.0))?)?;
            for _ in 0..iters {
                let _ = a.t()?;
            }
        }
        BenchOp::Sum => {
            let a = ctx.vector_from(&vec![1.0; size])?;
            let mut total = 0.0;
            for _ in 0..iters {
                total = a.sum()?.get();
            }
            println!("sum = {total}");
        }
        BenchOp::Outer => {
            let n = matrix_edge(size)?;
            let u = ctx.vector_from(&ramp(n, 0.0))?;
            let v = ctx.vector_from(&ramp(n, 1.0))?;
            for _ in 0..iters {
                let _ = u.outer(&v)?;
            }
        }
        BenchOp::Descent => {
            // Least squares by gradient descent: F (n x n), t = F . [0, 1, 2, ...].
            let n = matrix_edge(size)?;
            let features = DenseMatrix::from_vec(
                n,
                n,
                (0..n * n).map(|k| ((k * 7919) % 1000) as f32 / 1000.0).collect(),
            )?;
            let f = ctx.matrix_from(&features)?;
            let t = f.dot(&ctx.vector_from(&ramp(n, 0.0))?)?;
            let ft = f.t()?;
            let mut w = ctx.vector_from(&vec![0.0; n])?;
            let alpha = ctx.scalar(1e-7);
            for _ in 0..iters {
                let residual = f.dot(&w)? - &t;
                w -= ft.dot(&residual)? * alpha;
            }
            println!("w[..5] = {:?}", &w.get()?[..5.min(n)]);
        }
    }
    let elapsed = start.elapsed();

    info!(
        ?op,
        size,
        iters,
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        per_iter_us = elapsed.as_secs_f64() * 1e6 / iters.max(1) as f64,
        "Benchmark finished"
    );
    println!("Time: {:.6}", elapsed.as_secs_f64());
    Ok(())
}
