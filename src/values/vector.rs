//! Device vector.

use crate::error::{ComputeError, Result};
use crate::kernels::names;
use crate::runtime::context::Context;
use crate::runtime::launch::KernelArg;
use crate::values::buffer::PooledBuffer;
use crate::values::ops::{DeviceValue, Dot};
use crate::values::{ElementwiseOp, Matrix, Scalar, Shape};

/// `n` floats in one pooled device buffer.
#[derive(Debug)]
pub struct Vector<'ctx> {
    buf: PooledBuffer<'ctx>,
}

impl<'ctx> Vector<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(ComputeError::InvalidShape(
                "vector length must be non-zero".to_string(),
            ));
        }
        KernelArg::count(n)?;
        Ok(Self {
            buf: PooledBuffer::acquire(ctx, n)?,
        })
    }

    pub(crate) fn from_buffer(buf: PooledBuffer<'ctx>) -> Self {
        Self { buf }
    }

    pub fn shape(&self) -> Shape {
        Shape::Vector(self.buf.len())
    }

    /// Write `data` to the device. Its length must equal `len()`.
    pub fn set(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.len() {
            return Err(ComputeError::ShapeMismatch {
                op: "set",
                left: self.shape(),
                right: Shape::Vector(data.len()),
            });
        }
        self.buf.write(data)
    }

    /// Read the contents back to the host.
    pub fn get(&self) -> Result<Vec<f32>> {
        self.buf.read()
    }

    /// Sum of all elements, in two phases.
    ///
    /// Phase 1 launches `lanes` work items, each summing a strided slice of
    /// the input into a temporary vector of partial sums. Phase 2 runs a
    /// single work item that folds the partials into one value.
    pub fn sum(&self) -> Result<Scalar<'ctx>> {
        let ctx = self.context();
        let n = self.len();
        let lanes = ctx.config().reduce.lanes_for(n);
        let (n_arg, lanes_arg) = (KernelArg::count(n)?, KernelArg::count(lanes)?);

        let partial = Vector::new(ctx, lanes)?;
        let total = Vector::new(ctx, 1)?;
        ctx.launch(
            names::SUM_PARTIAL,
            &[lanes],
            &[self.buf.arg(), partial.buf.arg(), n_arg, lanes_arg],
        )?;
        ctx.launch(
            names::SUM_FINAL,
            &[],
            &[partial.buf.arg(), total.buf.arg(), lanes_arg],
        )?;

        let value = total.get()?[0];
        Ok(ctx.scalar(value))
    }

    /// Outer product: an `len() x other.len()` matrix with cell
    /// `(i, j) = self[i] * other[j]`.
    pub fn outer(&self, other: &Vector<'ctx>) -> Result<Matrix<'ctx>> {
        let ctx = self.context();
        if !ctx.is_same(other.context()) {
            return Err(ComputeError::ContextMismatch { op: "outer" });
        }
        let (n, m) = (self.len(), other.len());
        let (n_arg, m_arg) = (KernelArg::count(n)?, KernelArg::count(m)?);

        let out = Matrix::new(ctx, n, m)?;
        ctx.launch(
            names::OUTER,
            &[n, m],
            &[self.buf.arg(), other.buf.arg(), out.buffer().arg(), n_arg, m_arg],
        )?;
        Ok(out)
    }
}

impl<'ctx> DeviceValue<'ctx> for Vector<'ctx> {
    fn buffer(&self) -> &PooledBuffer<'ctx> {
        &self.buf
    }

    fn buffer_mut(&mut self) -> &mut PooledBuffer<'ctx> {
        &mut self.buf
    }

    fn layout(&self) -> Shape {
        self.shape()
    }

    fn with_buffer(&self, buffer: PooledBuffer<'ctx>) -> Self {
        Self::from_buffer(buffer)
    }
}

device_value_methods!(Vector);

/// `a . b = (a * b).sum()`
impl<'ctx> Dot<&Vector<'ctx>> for Vector<'ctx> {
    type Output = Scalar<'ctx>;

    fn dot(&self, rhs: &Vector<'ctx>) -> Result<Scalar<'ctx>> {
        self.try_binary(ElementwiseOp::Mul, rhs)?.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_round_trip() {
        let ctx = Context::host().unwrap();
        let mut v = ctx.vector(4).unwrap();
        v.set(&[1.5, -2.0, 0.0, 1e-3]).unwrap();
        assert_eq!(v.get().unwrap(), vec![1.5, -2.0, 0.0, 1e-3]);
    }

    #[test]
    fn test_set_wrong_length() {
        let ctx = Context::host().unwrap();
        let mut v = ctx.vector(3).unwrap();
        assert!(matches!(
            v.set(&[1.0, 2.0]),
            Err(ComputeError::ShapeMismatch { op: "set", .. })
        ));
    }

    #[test]
    fn test_zero_length_rejected() {
        let ctx = Context::host().unwrap();
        assert!(matches!(ctx.vector(0), Err(ComputeError::InvalidShape(_))));
        assert_eq!(ctx.pool_stats().fresh, 0);
    }

    #[test]
    fn test_operators() {
        let ctx = Context::host().unwrap();
        let a = ctx.vector_from(&[1.0, 2.0, 3.0]).unwrap();
        let b = ctx.vector_from(&[4.0, 5.0, 6.0]).unwrap();

        assert_eq!((&a + &b).get().unwrap(), vec![5.0, 7.0, 9.0]);
        assert_eq!((&b - &a).get().unwrap(), vec![3.0, 3.0, 3.0]);
        assert_eq!((&a * &b).get().unwrap(), vec![4.0, 10.0, 18.0]);
        assert_eq!((&b / &a).get().unwrap(), vec![4.0, 2.5, 2.0]);
        assert_eq!((&a * 2.0f32).get().unwrap(), vec![2.0, 4.0, 6.0]);
        assert_eq!((-&a).get().unwrap(), vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_compound_operators() {
        let ctx = Context::host().unwrap();
        let mut a = ctx.vector_from(&[1.0, 2.0]).unwrap();
        let b = ctx.vector_from(&[10.0, 20.0]).unwrap();

        a += &b;
        assert_eq!(a.get().unwrap(), vec![11.0, 22.0]);
        a -= ctx.scalar(1.0);
        assert_eq!(a.get().unwrap(), vec![10.0, 21.0]);
        a /= 2.0f32;
        assert_eq!(a.get().unwrap(), vec![5.0, 10.5]);
    }

    #[test]
    fn test_dot_and_sum() {
        let ctx = Context::host().unwrap();
        let a = ctx.vector_from(&[1.0, 2.0, 3.0]).unwrap();
        let b = ctx.vector_from(&[4.0, -5.0, 6.0]).unwrap();
        assert_eq!(a.dot(&b).unwrap().get(), 12.0);
        assert_eq!(a.sum().unwrap().get(), 6.0);
    }

    #[test]
    fn test_sum_releases_temporaries() {
        let ctx = Context::host().unwrap();
        let a = ctx.vector_from(&[1.0; 100]).unwrap();
        a.sum().unwrap();
        let stats = ctx.pool_stats();
        assert_eq!(stats.owned, 1);
        assert_eq!(stats.free, 2);
    }

    #[test]
    fn test_unary_in_place() {
        let ctx = Context::host().unwrap();
        let mut v = ctx.vector_from(&[4.0, 9.0]).unwrap();
        v.map_in_place(crate::UnaryOp::Sqrt).unwrap();
        assert_eq!(v.get().unwrap(), vec![2.0, 3.0]);
        assert_eq!(v.relu_d().unwrap().get().unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_clone_is_deep() {
        let ctx = Context::host().unwrap();
        let a = ctx.vector_from(&[1.0, 2.0]).unwrap();
        let mut b = a.clone();
        assert_ne!(a.buffer_id(), b.buffer_id());

        b += 1.0f32;
        assert_eq!(a.get().unwrap(), vec![1.0, 2.0]);
        assert_eq!(b.get().unwrap(), vec![2.0, 3.0]);

        // Same shape: clone_from reuses b's buffer.
        let id = b.buffer_id();
        b.clone_from(&a);
        assert_eq!(b.buffer_id(), id);
        assert_eq!(b.get().unwrap(), vec![1.0, 2.0]);
    }
}
