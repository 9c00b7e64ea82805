//! Host-side scalar tagged with its context.

use std::ops::{Add, Div, Mul, Sub};

use crate::error::{fatal, ComputeError, Result};
use crate::runtime::context::Context;
use crate::values::ElementwiseOp;

/// A single float. It never occupies a device buffer; the context tag is
/// only there so mixed operations can check their operands agree.
#[derive(Debug, Clone, Copy)]
pub struct Scalar<'ctx> {
    ctx: &'ctx Context,
    value: f32,
}

impl<'ctx> Scalar<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, value: f32) -> Self {
        Self { ctx, value }
    }

    pub fn get(&self) -> f32 {
        self.value
    }

    pub fn set(&mut self, value: f32) {
        self.value = value;
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    /// `self op rhs`, evaluated on the host.
    pub fn try_binary(self, op: ElementwiseOp, rhs: Scalar<'ctx>) -> Result<Scalar<'ctx>> {
        if !self.ctx.is_same(rhs.ctx) {
            return Err(ComputeError::ContextMismatch { op: op.name() });
        }
        Ok(Self::new(self.ctx, op.apply(self.value, rhs.value)))
    }
}

impl From<Scalar<'_>> for f32 {
    fn from(s: Scalar<'_>) -> f32 {
        s.value
    }
}

macro_rules! impl_scalar_op {
    ($Op:ident, $op:ident, $kind:ident) => {
        impl<'ctx> $Op<Scalar<'ctx>> for Scalar<'ctx> {
            type Output = Scalar<'ctx>;

            fn $op(self, rhs: Scalar<'ctx>) -> Scalar<'ctx> {
                fatal(self.try_binary(ElementwiseOp::$kind, rhs))
            }
        }

        impl<'ctx> $Op<f32> for Scalar<'ctx> {
            type Output = Scalar<'ctx>;

            fn $op(self, rhs: f32) -> Scalar<'ctx> {
                Scalar::new(self.ctx, ElementwiseOp::$kind.apply(self.value, rhs))
            }
        }
    };
}

impl_scalar_op!(Add, add, Add);
impl_scalar_op!(Sub, sub, Sub);
impl_scalar_op!(Mul, mul, Mul);
impl_scalar_op!(Div, div, Div);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_arithmetic() {
        let ctx = Context::host().unwrap();
        let a = ctx.scalar(6.0);
        let b = ctx.scalar(4.0);
        assert_eq!((a + b).get(), 10.0);
        assert_eq!((a - b).get(), 2.0);
        assert_eq!((a * b).get(), 24.0);
        assert_eq!((a / b).get(), 1.5);
        assert_eq!((a * 0.5f32).get(), 3.0);
        assert_eq!(f32::from(a), 6.0);
    }

    #[test]
    fn test_context_mismatch() {
        let one = Context::host().unwrap();
        let two = Context::host().unwrap();
        let result = one.scalar(1.0).try_binary(ElementwiseOp::Add, two.scalar(2.0));
        assert!(matches!(
            result,
            Err(ComputeError::ContextMismatch { op: "add" })
        ));
    }

    #[test]
    #[should_panic(expected = "different contexts")]
    fn test_operator_panics_on_mismatch() {
        let one = Context::host().unwrap();
        let two = Context::host().unwrap();
        let _ = one.scalar(1.0) + two.scalar(2.0);
    }
}
