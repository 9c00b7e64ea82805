//! Operation kinds and the launch orchestration shared by `Vector` and
//! `Matrix`.
//!
//! Every operation checks contexts and shapes before it touches the pool
//! or the device, so a rejected call has no side effects.

use crate::error::{ComputeError, Result};
use crate::kernels::names;
use crate::runtime::launch::KernelArg;
use crate::values::buffer::PooledBuffer;
use crate::values::{Scalar, Shape};

/// The four elementwise arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementwiseOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ElementwiseOp {
    pub fn name(self) -> &'static str {
        match self {
            ElementwiseOp::Add => "add",
            ElementwiseOp::Sub => "sub",
            ElementwiseOp::Mul => "mul",
            ElementwiseOp::Div => "div",
        }
    }

    /// `c = a op b`
    pub fn kernel(self) -> &'static str {
        match self {
            ElementwiseOp::Add => names::VADD,
            ElementwiseOp::Sub => names::VSUB,
            ElementwiseOp::Mul => names::VMUL,
            ElementwiseOp::Div => names::VDIV,
        }
    }

    /// `a op= b`
    pub fn assign_kernel(self) -> &'static str {
        match self {
            ElementwiseOp::Add => names::VADD_ASSIGN,
            ElementwiseOp::Sub => names::VSUB_ASSIGN,
            ElementwiseOp::Mul => names::VMUL_ASSIGN,
            ElementwiseOp::Div => names::VDIV_ASSIGN,
        }
    }

    /// `b = a op y`
    pub fn scalar_kernel(self) -> &'static str {
        match self {
            ElementwiseOp::Add => names::VSADD,
            ElementwiseOp::Sub => names::VSSUB,
            ElementwiseOp::Mul => names::VSMUL,
            ElementwiseOp::Div => names::VSDIV,
        }
    }

    /// `a op= y`
    pub fn scalar_assign_kernel(self) -> &'static str {
        match self {
            ElementwiseOp::Add => names::VSADD_ASSIGN,
            ElementwiseOp::Sub => names::VSSUB_ASSIGN,
            ElementwiseOp::Mul => names::VSMUL_ASSIGN,
            ElementwiseOp::Div => names::VSDIV_ASSIGN,
        }
    }

    /// Host evaluation, used for scalar-scalar arithmetic.
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            ElementwiseOp::Add => a + b,
            ElementwiseOp::Sub => a - b,
            ElementwiseOp::Mul => a * b,
            ElementwiseOp::Div => a / b,
        }
    }
}

/// Unary elementwise functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Sqrt,
    Exp,
    Tanh,
    /// `1 - tanh(x)^2`
    TanhDerivative,
    Relu,
    /// `1` where `x > 0`, else `0`
    ReluDerivative,
}

impl UnaryOp {
    pub fn kernel(self) -> &'static str {
        match self {
            UnaryOp::Sqrt => names::VSQRT,
            UnaryOp::Exp => names::VEXP,
            UnaryOp::Tanh => names::VTANH,
            UnaryOp::TanhDerivative => names::VTANH_D,
            UnaryOp::Relu => names::VRELU,
            UnaryOp::ReluDerivative => names::VRELU_D,
        }
    }
}

/// Linear-algebra product.
///
/// `Matrix . Vector -> Vector`, `Matrix . Matrix -> Matrix` and
/// `Vector . Vector -> Scalar`.
pub trait Dot<Rhs> {
    type Output;

    fn dot(&self, rhs: Rhs) -> Result<Self::Output>;
}

/// A value backed by one pooled buffer.
pub(crate) trait DeviceValue<'ctx>: Sized {
    fn buffer(&self) -> &PooledBuffer<'ctx>;

    fn buffer_mut(&mut self) -> &mut PooledBuffer<'ctx>;

    fn layout(&self) -> Shape;

    /// A value of the same shape around `buffer`.
    fn with_buffer(&self, buffer: PooledBuffer<'ctx>) -> Self;
}

pub(crate) fn check_context<'ctx>(
    op: &'static str,
    left: &PooledBuffer<'ctx>,
    right: &crate::Context,
) -> Result<()> {
    if left.context().is_same(right) {
        Ok(())
    } else {
        Err(ComputeError::ContextMismatch { op })
    }
}

fn check_pair<'ctx, T: DeviceValue<'ctx>>(op: &'static str, a: &T, b: &T) -> Result<()> {
    check_context(op, a.buffer(), b.buffer().context())?;
    if a.layout() != b.layout() {
        return Err(ComputeError::ShapeMismatch {
            op,
            left: a.layout(),
            right: b.layout(),
        });
    }
    Ok(())
}

pub(crate) fn binary<'ctx, T: DeviceValue<'ctx>>(op: ElementwiseOp, a: &T, b: &T) -> Result<T> {
    check_pair(op.name(), a, b)?;
    let n = a.buffer().len();
    let count = KernelArg::count(n)?;

    let ctx = a.buffer().context();
    let out = PooledBuffer::acquire(ctx, n)?;
    ctx.launch(
        op.kernel(),
        &[n],
        &[a.buffer().arg(), b.buffer().arg(), out.arg(), count],
    )?;
    Ok(a.with_buffer(out))
}

pub(crate) fn binary_assign<'ctx, T: DeviceValue<'ctx>>(
    op: ElementwiseOp,
    a: &mut T,
    b: &T,
) -> Result<()> {
    check_pair(op.name(), a, b)?;
    let n = a.buffer().len();
    let count = KernelArg::count(n)?;

    a.buffer().context().launch(
        op.assign_kernel(),
        &[n],
        &[a.buffer().arg(), b.buffer().arg(), count],
    )
}

pub(crate) fn scalar<'ctx, T: DeviceValue<'ctx>>(
    op: ElementwiseOp,
    a: &T,
    y: Scalar<'ctx>,
) -> Result<T> {
    check_context(op.name(), a.buffer(), y.context())?;
    let n = a.buffer().len();
    let count = KernelArg::count(n)?;

    let ctx = a.buffer().context();
    let out = PooledBuffer::acquire(ctx, n)?;
    ctx.launch(
        op.scalar_kernel(),
        &[n],
        &[a.buffer().arg(), out.arg(), KernelArg::float(y.get()), count],
    )?;
    Ok(a.with_buffer(out))
}

pub(crate) fn scalar_assign<'ctx, T: DeviceValue<'ctx>>(
    op: ElementwiseOp,
    a: &mut T,
    y: Scalar<'ctx>,
) -> Result<()> {
    check_context(op.name(), a.buffer(), y.context())?;
    let n = a.buffer().len();
    let count = KernelArg::count(n)?;

    a.buffer().context().launch(
        op.scalar_assign_kernel(),
        &[n],
        &[a.buffer().arg(), KernelArg::float(y.get()), count],
    )
}

pub(crate) fn unary<'ctx, T: DeviceValue<'ctx>>(op: UnaryOp, a: &T) -> Result<T> {
    let n = a.buffer().len();
    let count = KernelArg::count(n)?;

    let ctx = a.buffer().context();
    let out = PooledBuffer::acquire(ctx, n)?;
    ctx.launch(op.kernel(), &[n], &[a.buffer().arg(), out.arg(), count])?;
    Ok(a.with_buffer(out))
}

/// In place: input and output slots are bound to the same buffer.
pub(crate) fn unary_in_place<'ctx, T: DeviceValue<'ctx>>(op: UnaryOp, a: &mut T) -> Result<()> {
    let n = a.buffer().len();
    let count = KernelArg::count(n)?;
    let arg = a.buffer().arg();
    a.buffer().context().launch(op.kernel(), &[n], &[arg, arg, count])
}

pub(crate) fn assign<'ctx, T: DeviceValue<'ctx>>(dst: &mut T, src: &T) -> Result<()> {
    check_pair("assign", dst, src)?;
    if dst.buffer().id() == src.buffer().id() {
        return Ok(());
    }
    dst.buffer_mut().copy_from(src.buffer())
}

/// Inherent methods shared by the buffer-backed value types.
macro_rules! device_value_methods {
    ($ty:ident) => {
        impl<'ctx> $ty<'ctx> {
            /// The context this value was created from.
            pub fn context(&self) -> &'ctx $crate::Context {
                self.buf.context()
            }

            /// Number of elements.
            pub fn len(&self) -> usize {
                self.buf.len()
            }

            /// Always false; zero-sized values cannot be constructed.
            pub fn is_empty(&self) -> bool {
                self.buf.is_empty()
            }

            /// Identifier of the owned device buffer.
            pub fn buffer_id(&self) -> $crate::gpu::device::BufferId {
                self.buf.id()
            }

            /// Elementwise `self op rhs` into a new value.
            pub fn try_binary(
                &self,
                op: $crate::values::ElementwiseOp,
                rhs: &Self,
            ) -> $crate::error::Result<Self> {
                $crate::values::ops::binary(op, self, rhs)
            }

            /// Elementwise `self op= rhs`.
            pub fn try_binary_assign(
                &mut self,
                op: $crate::values::ElementwiseOp,
                rhs: &Self,
            ) -> $crate::error::Result<()> {
                $crate::values::ops::binary_assign(op, self, rhs)
            }

            /// Broadcast `self op y` into a new value.
            pub fn try_scalar(
                &self,
                op: $crate::values::ElementwiseOp,
                y: $crate::values::Scalar<'ctx>,
            ) -> $crate::error::Result<Self> {
                $crate::values::ops::scalar(op, self, y)
            }

            /// Broadcast `self op= y`.
            pub fn try_scalar_assign(
                &mut self,
                op: $crate::values::ElementwiseOp,
                y: $crate::values::Scalar<'ctx>,
            ) -> $crate::error::Result<()> {
                $crate::values::ops::scalar_assign(op, self, y)
            }

            /// Apply `op` to every element into a new value.
            pub fn map(&self, op: $crate::values::UnaryOp) -> $crate::error::Result<Self> {
                $crate::values::ops::unary(op, self)
            }

            /// Apply `op` to every element in place.
            pub fn map_in_place(
                &mut self,
                op: $crate::values::UnaryOp,
            ) -> $crate::error::Result<()> {
                $crate::values::ops::unary_in_place(op, self)
            }

            pub fn sqrt(&self) -> $crate::error::Result<Self> {
                self.map($crate::values::UnaryOp::Sqrt)
            }

            pub fn exp(&self) -> $crate::error::Result<Self> {
                self.map($crate::values::UnaryOp::Exp)
            }

            pub fn tanh(&self) -> $crate::error::Result<Self> {
                self.map($crate::values::UnaryOp::Tanh)
            }

            pub fn tanh_d(&self) -> $crate::error::Result<Self> {
                self.map($crate::values::UnaryOp::TanhDerivative)
            }

            pub fn relu(&self) -> $crate::error::Result<Self> {
                self.map($crate::values::UnaryOp::Relu)
            }

            pub fn relu_d(&self) -> $crate::error::Result<Self> {
                self.map($crate::values::UnaryOp::ReluDerivative)
            }

            /// Copy `other` into this value's existing buffer.
            pub fn assign(&mut self, other: &Self) -> $crate::error::Result<()> {
                $crate::values::ops::assign(self, other)
            }

            /// A deep copy in a freshly acquired buffer.
            pub fn try_clone(&self) -> $crate::error::Result<Self> {
                let buf = self.buf.try_clone()?;
                Ok($crate::values::ops::DeviceValue::with_buffer(self, buf))
            }
        }

        impl<'ctx> Clone for $ty<'ctx> {
            fn clone(&self) -> Self {
                $crate::error::fatal(self.try_clone())
            }

            fn clone_from(&mut self, source: &Self) {
                use $crate::values::ops::DeviceValue;
                if self.context().is_same(source.context()) && self.layout() == source.layout() {
                    $crate::error::fatal(self.assign(source))
                } else {
                    *self = source.clone();
                }
            }
        }

        impl<'ctx> ::std::ops::Neg for &$ty<'ctx> {
            type Output = $ty<'ctx>;

            fn neg(self) -> $ty<'ctx> {
                let y = self.context().scalar(-1.0);
                $crate::error::fatal(self.try_scalar($crate::values::ElementwiseOp::Mul, y))
            }
        }

        impl<'ctx> ::std::ops::Neg for $ty<'ctx> {
            type Output = $ty<'ctx>;

            fn neg(self) -> $ty<'ctx> {
                -&self
            }
        }

        impl_elementwise!($ty, Add, add, AddAssign, add_assign, Add);
        impl_elementwise!($ty, Sub, sub, SubAssign, sub_assign, Sub);
        impl_elementwise!($ty, Mul, mul, MulAssign, mul_assign, Mul);
        impl_elementwise!($ty, Div, div, DivAssign, div_assign, Div);
    };
}

/// Std operator impls for one elementwise operation. Mismatched operands
/// panic; use the `try_*` methods to get a `Result` instead.
macro_rules! impl_elementwise {
    ($ty:ident, $Op:ident, $op:ident, $OpAssign:ident, $op_assign:ident, $kind:ident) => {
        impl<'ctx> ::std::ops::$Op<&$ty<'ctx>> for &$ty<'ctx> {
            type Output = $ty<'ctx>;

            fn $op(self, rhs: &$ty<'ctx>) -> $ty<'ctx> {
                $crate::error::fatal(self.try_binary($crate::values::ElementwiseOp::$kind, rhs))
            }
        }

        impl<'ctx> ::std::ops::$Op<&$ty<'ctx>> for $ty<'ctx> {
            type Output = $ty<'ctx>;

            fn $op(self, rhs: &$ty<'ctx>) -> $ty<'ctx> {
                $crate::error::fatal(self.try_binary($crate::values::ElementwiseOp::$kind, rhs))
            }
        }

        impl<'ctx> ::std::ops::$Op<$ty<'ctx>> for $ty<'ctx> {
            type Output = $ty<'ctx>;

            fn $op(self, rhs: $ty<'ctx>) -> $ty<'ctx> {
                $crate::error::fatal(self.try_binary($crate::values::ElementwiseOp::$kind, &rhs))
            }
        }

        impl<'ctx> ::std::ops::$OpAssign<&$ty<'ctx>> for $ty<'ctx> {
            fn $op_assign(&mut self, rhs: &$ty<'ctx>) {
                $crate::error::fatal(
                    self.try_binary_assign($crate::values::ElementwiseOp::$kind, rhs),
                )
            }
        }

        impl<'ctx> ::std::ops::$OpAssign<$ty<'ctx>> for $ty<'ctx> {
            fn $op_assign(&mut self, rhs: $ty<'ctx>) {
                $crate::error::fatal(
                    self.try_binary_assign($crate::values::ElementwiseOp::$kind, &rhs),
                )
            }
        }

        impl<'ctx> ::std::ops::$Op<$crate::values::Scalar<'ctx>> for &$ty<'ctx> {
            type Output = $ty<'ctx>;

            fn $op(self, y: $crate::values::Scalar<'ctx>) -> $ty<'ctx> {
                $crate::error::fatal(self.try_scalar($crate::values::ElementwiseOp::$kind, y))
            }
        }

        impl<'ctx> ::std::ops::$Op<$crate::values::Scalar<'ctx>> for $ty<'ctx> {
            type Output = $ty<'ctx>;

            fn $op(self, y: $crate::values::Scalar<'ctx>) -> $ty<'ctx> {
                $crate::error::fatal(self.try_scalar($crate::values::ElementwiseOp::$kind, y))
            }
        }

        impl<'ctx> ::std::ops::$OpAssign<$crate::values::Scalar<'ctx>> for $ty<'ctx> {
            fn $op_assign(&mut self, y: $crate::values::Scalar<'ctx>) {
                $crate::error::fatal(
                    self.try_scalar_assign($crate::values::ElementwiseOp::$kind, y),
                )
            }
        }

        impl<'ctx> ::std::ops::$Op<f32> for &$ty<'ctx> {
            type Output = $ty<'ctx>;

            fn $op(self, y: f32) -> $ty<'ctx> {
                let y = self.context().scalar(y);
                $crate::error::fatal(self.try_scalar($crate::values::ElementwiseOp::$kind, y))
            }
        }

        impl<'ctx> ::std::ops::$Op<f32> for $ty<'ctx> {
            type Output = $ty<'ctx>;

            fn $op(self, y: f32) -> $ty<'ctx> {
                let y = self.context().scalar(y);
                $crate::error::fatal(self.try_scalar($crate::values::ElementwiseOp::$kind, y))
            }
        }

        impl<'ctx> ::std::ops::$OpAssign<f32> for $ty<'ctx> {
            fn $op_assign(&mut self, y: f32) {
                let y = self.context().scalar(y);
                $crate::error::fatal(
                    self.try_scalar_assign($crate::values::ElementwiseOp::$kind, y),
                )
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_names_per_op() {
        assert_eq!(ElementwiseOp::Add.kernel(), "vadd");
        assert_eq!(ElementwiseOp::Sub.assign_kernel(), "vsubc");
        assert_eq!(ElementwiseOp::Mul.scalar_kernel(), "vsmul");
        assert_eq!(ElementwiseOp::Div.scalar_assign_kernel(), "vsdivc");
        assert_eq!(UnaryOp::TanhDerivative.kernel(), "vtanh_d");
    }

    #[test]
    fn test_apply() {
        assert_eq!(ElementwiseOp::Sub.apply(5.0, 2.0), 3.0);
        assert_eq!(ElementwiseOp::Div.apply(5.0, 2.0), 2.5);
    }
}
