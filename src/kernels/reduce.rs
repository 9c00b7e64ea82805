//! Two-phase sum reduction.
//!
//! Phase 1 runs one work item per lane; lane `k` accumulates elements
//! `k, k + lanes, k + 2 * lanes, ...` into `partial[k]`. Phase 2 is a single
//! work item that folds the `lanes` partial sums into `out[0]`. No lane ever
//! writes a slot another lane reads, so no atomics are needed.

use super::{names, HostKernel, Invocation, WorkItem};
use crate::runtime::launch::ArgKind::{Buffer, Int};

pub(super) const KERNELS: &[HostKernel] = &[
    HostKernel {
        name: names::SUM_PARTIAL,
        params: &[Buffer, Buffer, Int, Int],
        body: vsum_partial,
    },
    HostKernel {
        name: names::SUM_FINAL,
        params: &[Buffer, Buffer, Int],
        body: vsum_final,
    },
];

/// (a, partial, n, lanes). Grid (lanes).
fn vsum_partial(inv: &mut Invocation<'_>, item: WorkItem) {
    let (n, lanes) = (inv.int(2), inv.int(3));
    let lane = item.x();
    if lane < lanes {
        let mut acc = 0.0f32;
        let mut j = lane;
        while j < n {
            acc += inv.load(0, j);
            j += lanes;
        }
        inv.store(1, lane, acc);
    }
}

/// (partial, out, lanes). Single work item.
fn vsum_final(inv: &mut Invocation<'_>, item: WorkItem) {
    if item.x() != 0 {
        return;
    }
    let lanes = inv.int(2);
    let mut acc = 0.0f32;
    for k in 0..lanes {
        acc += inv.load(0, k);
    }
    inv.store(1, 0, acc);
}

#[cfg(test)]
mod tests {
    use super::super::testing::run;
    use super::super::Bound::{Buffer as B, Int as I};
    use super::*;

    #[test]
    fn test_partial_lanes_are_strided() {
        let data: Vec<f32> = (1..=10).map(|v| v as f32).collect();
        let mut mem = vec![data, vec![0.0; 3], vec![0.0]];
        run(names::SUM_PARTIAL, &[3], &mut mem, &[B(0), B(1), I(10), I(3)]);
        // lane 0: 1+4+7+10, lane 1: 2+5+8, lane 2: 3+6+9
        assert_eq!(mem[1], vec![22.0, 15.0, 18.0]);

        run(names::SUM_FINAL, &[], &mut mem, &[B(1), B(2), I(3)]);
        assert_eq!(mem[2], vec![55.0]);
    }
}
