//! Elementwise kernels over a flattened element count.

use super::{names, HostKernel, Invocation, WorkItem};
use crate::runtime::launch::ArgKind::{self, Buffer, Float, Int};

/// (a, b, c, n): c = a op b
const BINARY: &[ArgKind] = &[Buffer, Buffer, Buffer, Int];
/// (a, b, n): a op= b; also (a, b, n): b = f(a) and b = a
const PAIR: &[ArgKind] = &[Buffer, Buffer, Int];
/// (a, b, y, n): b = a op y
const SCALAR: &[ArgKind] = &[Buffer, Buffer, Float, Int];
/// (a, y, n): a op= y
const SCALAR_ASSIGN: &[ArgKind] = &[Buffer, Float, Int];

pub(super) const KERNELS: &[HostKernel] = &[
    HostKernel { name: names::VADD, params: BINARY, body: vadd },
    HostKernel { name: names::VSUB, params: BINARY, body: vsub },
    HostKernel { name: names::VMUL, params: BINARY, body: vmul },
    HostKernel { name: names::VDIV, params: BINARY, body: vdiv },
    HostKernel { name: names::VADD_ASSIGN, params: PAIR, body: vaddc },
    HostKernel { name: names::VSUB_ASSIGN, params: PAIR, body: vsubc },
    HostKernel { name: names::VMUL_ASSIGN, params: PAIR, body: vmulc },
    HostKernel { name: names::VDIV_ASSIGN, params: PAIR, body: vdivc },
    HostKernel { name: names::VSADD, params: SCALAR, body: vsadd },
    HostKernel { name: names::VSSUB, params: SCALAR, body: vssub },
    HostKernel { name: names::VSMUL, params: SCALAR, body: vsmul },
    HostKernel { name: names::VSDIV, params: SCALAR, body: vsdiv },
    HostKernel { name: names::VSADD_ASSIGN, params: SCALAR_ASSIGN, body: vsaddc },
    HostKernel { name: names::VSSUB_ASSIGN, params: SCALAR_ASSIGN, body: vssubc },
    HostKernel { name: names::VSMUL_ASSIGN, params: SCALAR_ASSIGN, body: vsmulc },
    HostKernel { name: names::VSDIV_ASSIGN, params: SCALAR_ASSIGN, body: vsdivc },
    HostKernel { name: names::VCOPY, params: PAIR, body: vcopy },
    HostKernel { name: names::VSQRT, params: PAIR, body: vsqrt },
    HostKernel { name: names::VEXP, params: PAIR, body: vexp },
    HostKernel { name: names::VTANH, params: PAIR, body: vtanh },
    HostKernel { name: names::VTANH_D, params: PAIR, body: vtanh_d },
    HostKernel { name: names::VRELU, params: PAIR, body: vrelu },
    HostKernel { name: names::VRELU_D, params: PAIR, body: vrelu_d },
];

fn binary(inv: &mut Invocation<'_>, item: WorkItem, op: impl Fn(f32, f32) -> f32) {
    let i = item.x();
    if i < inv.int(3) {
        let value = op(inv.load(0, i), inv.load(1, i));
        inv.store(2, i, value);
    }
}

fn assign(inv: &mut Invocation<'_>, item: WorkItem, op: impl Fn(f32, f32) -> f32) {
    let i = item.x();
    if i < inv.int(2) {
        let value = op(inv.load(0, i), inv.load(1, i));
        inv.store(0, i, value);
    }
}

fn scalar(inv: &mut Invocation<'_>, item: WorkItem, op: impl Fn(f32, f32) -> f32) {
    let i = item.x();
    if i < inv.int(3) {
        let value = op(inv.load(0, i), inv.float(2));
        inv.store(1, i, value);
    }
}

fn scalar_assign(inv: &mut Invocation<'_>, item: WorkItem, op: impl Fn(f32, f32) -> f32) {
    let i = item.x();
    if i < inv.int(2) {
        let value = op(inv.load(0, i), inv.float(1));
        inv.store(0, i, value);
    }
}

fn unary(inv: &mut Invocation<'_>, item: WorkItem, f: impl Fn(f32) -> f32) {
    let i = item.x();
    if i < inv.int(2) {
        let value = f(inv.load(0, i));
        inv.store(1, i, value);
    }
}

fn vadd(inv: &mut Invocation<'_>, item: WorkItem) {
    binary(inv, item, |a, b| a + b)
}

fn vsub(inv: &mut Invocation<'_>, item: WorkItem) {
    binary(inv, item, |a, b| a - b)
}

fn vmul(inv: &mut Invocation<'_>, item: WorkItem) {
    binary(inv, item, |a, b| a * b)
}

fn vdiv(inv: &mut Invocation<'_>, item: WorkItem) {
    binary(inv, item, |a, b| a / b)
}

fn vaddc(inv: &mut Invocation<'_>, item: WorkItem) {
    assign(inv, item, |a, b| a + b)
}

fn vsubc(inv: &mut Invocation<'_>, item: WorkItem) {
    assign(inv, item, |a, b| a - b)
}

fn vmulc(inv: &mut Invocation<'_>, item: WorkItem) {
    assign(inv, item, |a, b| a * b)
}

fn vdivc(inv: &mut Invocation<'_>, item: WorkItem) {
    assign(inv, item, |a, b| a / b)
}

fn vsadd(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar(inv, item, |a, y| a + y)
}

fn vssub(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar(inv, item, |a, y| a - y)
}

fn vsmul(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar(inv, item, |a, y| a * y)
}

fn vsdiv(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar(inv, item, |a, y| a / y)
}

fn vsaddc(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar_assign(inv, item, |a, y| a + y)
}

fn vssubc(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar_assign(inv, item, |a, y| a - y)
}

fn vsmulc(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar_assign(inv, item, |a, y| a * y)
}

fn vsdivc(inv: &mut Invocation<'_>, item: WorkItem) {
    scalar_assign(inv, item, |a, y| a / y)
}

fn vcopy(inv: &mut Invocation<'_>, item: WorkItem) {
    unary(inv, item, |a| a)
}

fn vsqrt(inv: &mut Invocation<'_>, item: WorkItem) {
    unary(inv, item, f32::sqrt)
}

fn vexp(inv: &mut Invocation<'_>, item: WorkItem) {
    unary(inv, item, f32::exp)
}

fn vtanh(inv: &mut Invocation<'_>, item: WorkItem) {
    unary(inv, item, f32::tanh)
}

fn vtanh_d(inv: &mut Invocation<'_>, item: WorkItem) {
    unary(inv, item, |a| {
        let t = a.tanh();
        1.0 - t * t
    })
}

fn vrelu(inv: &mut Invocation<'_>, item: WorkItem) {
    unary(inv, item, |a| a.max(0.0))
}

fn vrelu_d(inv: &mut Invocation<'_>, item: WorkItem) {
    unary(inv, item, |a| if a > 0.0 { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::super::testing::run;
    use super::super::Bound::{Buffer as B, Float as F, Int as I};
    use super::*;

    #[test]
    fn test_binary_and_assign() {
        let mut mem = vec![vec![6.0, 8.0, 10.0], vec![2.0, 4.0, 5.0], vec![0.0; 3]];
        run(names::VDIV, &[3], &mut mem, &[B(0), B(1), B(2), I(3)]);
        assert_eq!(mem[2], vec![3.0, 2.0, 2.0]);

        run(names::VSUB_ASSIGN, &[3], &mut mem, &[B(0), B(1), I(3)]);
        assert_eq!(mem[0], vec![4.0, 4.0, 5.0]);
    }

    #[test]
    fn test_assign_aliased_operand() {
        // a *= a with both slots bound to the same buffer.
        let mut mem = vec![vec![1.0, 2.0, 3.0]];
        run(names::VMUL_ASSIGN, &[3], &mut mem, &[B(0), B(0), I(3)]);
        assert_eq!(mem[0], vec![1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_scalar_broadcast() {
        let mut mem = vec![vec![1.0, 2.0], vec![0.0; 2]];
        run(names::VSMUL, &[2], &mut mem, &[B(0), B(1), F(2.5), I(2)]);
        assert_eq!(mem[1], vec![2.5, 5.0]);

        run(names::VSSUB_ASSIGN, &[2], &mut mem, &[B(0), F(1.0), I(2)]);
        assert_eq!(mem[0], vec![0.0, 1.0]);
    }

    #[test]
    fn test_unary_family() {
        let mut mem = vec![vec![-1.0, 0.0, 4.0], vec![0.0; 3]];
        run(names::VRELU, &[3], &mut mem, &[B(0), B(1), I(3)]);
        assert_eq!(mem[1], vec![0.0, 0.0, 4.0]);

        run(names::VRELU_D, &[3], &mut mem, &[B(0), B(1), I(3)]);
        assert_eq!(mem[1], vec![0.0, 0.0, 1.0]);

        run(names::VTANH_D, &[3], &mut mem, &[B(0), B(1), I(3)]);
        assert!((mem[1][1] - 1.0).abs() < 1e-6);
        let t = (-1.0f32).tanh();
        assert!((mem[1][0] - (1.0 - t * t)).abs() < 1e-6);
    }
}
