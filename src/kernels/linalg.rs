//! Linear-algebra kernels on column-major storage.

use super::{names, HostKernel, Invocation, WorkItem};
use crate::runtime::launch::ArgKind::{Buffer, Int};

pub(super) const KERNELS: &[HostKernel] = &[
    HostKernel {
        name: names::TRANSPOSE,
        params: &[Buffer, Buffer, Int, Int],
        body: mt,
    },
    HostKernel {
        name: names::MATVEC,
        params: &[Buffer, Buffer, Buffer, Int, Int],
        body: mvdot,
    },
    HostKernel {
        name: names::MATMUL,
        params: &[Buffer, Buffer, Buffer, Int, Int, Int],
        body: mmdot,
    },
    HostKernel {
        name: names::OUTER,
        params: &[Buffer, Buffer, Buffer, Int, Int],
        body: vouter,
    },
];

/// (a, b, n, m): b (m x n) = a (n x m) transposed. Grid (n, m).
fn mt(inv: &mut Invocation<'_>, item: WorkItem) {
    let (n, m) = (inv.int(2), inv.int(3));
    let (i, j) = (item.x(), item.y());
    if i < n && j < m {
        let value = inv.load(0, i + j * n);
        inv.store(1, j + i * m, value);
    }
}

/// (a, x, y, n, m): y (n) = a (n x m) . x (m). Grid (n).
fn mvdot(inv: &mut Invocation<'_>, item: WorkItem) {
    let (n, m) = (inv.int(3), inv.int(4));
    let i = item.x();
    if i < n {
        let mut acc = 0.0f32;
        for j in 0..m {
            acc += inv.load(0, i + j * n) * inv.load(1, j);
        }
        inv.store(2, i, acc);
    }
}

/// (a, b, c, n, m, l): c (n x l) = a (n x m) . b (m x l). Grid (n, l).
fn mmdot(inv: &mut Invocation<'_>, item: WorkItem) {
    let (n, m, l) = (inv.int(3), inv.int(4), inv.int(5));
    let (i, k) = (item.x(), item.y());
    if i < n && k < l {
        let mut acc = 0.0f32;
        for j in 0..m {
            acc += inv.load(0, i + j * n) * inv.load(1, j + k * m);
        }
        inv.store(2, i + k * n, acc);
    }
}

/// (a, b, c, n, m): c (n x m) with c(i, j) = a[i] * b[j]. Grid (n, m).
fn vouter(inv: &mut Invocation<'_>, item: WorkItem) {
    let (n, m) = (inv.int(3), inv.int(4));
    let (i, j) = (item.x(), item.y());
    if i < n && j < m {
        let value = inv.load(0, i) * inv.load(1, j);
        inv.store(2, i + j * n, value);
    }
}
