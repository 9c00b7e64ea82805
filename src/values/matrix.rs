//! Device matrix.
//!
//! Storage on the device is column-major: element `(i, j)` of an `n`-row
//! matrix lives at offset `i + j * n`. Host data is row-major, so `set` and
//! `get` reindex through a staging buffer rather than copying raw.

use crate::dense::DenseMatrix;
use crate::error::{ComputeError, Result};
use crate::kernels::names;
use crate::runtime::context::Context;
use crate::runtime::launch::KernelArg;
use crate::values::buffer::PooledBuffer;
use crate::values::ops::{check_context, DeviceValue, Dot};
use crate::values::{Shape, Vector};

/// A `rows x cols` matrix in one pooled device buffer.
#[derive(Debug)]
pub struct Matrix<'ctx> {
    buf: PooledBuffer<'ctx>,
    rows: usize,
    cols: usize,
}

impl<'ctx> Matrix<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(ComputeError::InvalidShape(format!(
                "matrix dimensions must be non-zero, got {rows}x{cols}"
            )));
        }
        let len = rows.checked_mul(cols).ok_or_else(|| {
            ComputeError::InvalidShape(format!("{rows}x{cols} matrix overflows"))
        })?;
        KernelArg::count(len)?;
        Ok(Self {
            buf: PooledBuffer::acquire(ctx, len)?,
            rows,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::Matrix(self.rows, self.cols)
    }

    /// Write a row-major host matrix of the same shape.
    pub fn set(&mut self, host: &DenseMatrix) -> Result<()> {
        if host.rows() != self.rows || host.cols() != self.cols {
            return Err(ComputeError::ShapeMismatch {
                op: "set",
                left: self.shape(),
                right: Shape::Matrix(host.rows(), host.cols()),
            });
        }
        self.buf.write(&host.to_col_major())
    }

    /// Read back into a row-major host matrix.
    pub fn get(&self) -> Result<DenseMatrix> {
        let staged = self.buf.read()?;
        DenseMatrix::from_col_major(self.rows, self.cols, &staged)
    }

    /// Transpose on the device.
    #[allow(non_snake_case)]
    pub fn T(&self) -> Result<Matrix<'ctx>> {
        self.t()
    }

    /// Transpose on the device.
    pub fn t(&self) -> Result<Matrix<'ctx>> {
        let ctx = self.context();
        let (n, m) = (self.rows, self.cols);
        let (n_arg, m_arg) = (KernelArg::count(n)?, KernelArg::count(m)?);

        let out = Matrix::new(ctx, m, n)?;
        ctx.launch(
            names::TRANSPOSE,
            &[n, m],
            &[self.buf.arg(), out.buf.arg(), n_arg, m_arg],
        )?;
        Ok(out)
    }
}

impl<'ctx> DeviceValue<'ctx> for Matrix<'ctx> {
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
        Self {
            buf: buffer,
            rows: self.rows,
            cols: self.cols,
        }
    }
}

device_value_methods!(Matrix);

/// Matrix-vector product, one work item per output row.
impl<'ctx> Dot<&Vector<'ctx>> for Matrix<'ctx> {
    type Output = Vector<'ctx>;

    fn dot(&self, x: &Vector<'ctx>) -> Result<Vector<'ctx>> {
        check_context("mvdot", &self.buf, x.context())?;
        if self.cols != x.len() {
            return Err(ComputeError::ShapeMismatch {
                op: "mvdot",
                left: self.shape(),
                right: x.shape(),
            });
        }
        let ctx = self.context();
        let (n, m) = (self.rows, self.cols);
        let (n_arg, m_arg) = (KernelArg::count(n)?, KernelArg::count(m)?);

        let y = Vector::new(ctx, n)?;
        ctx.launch(
            names::MATVEC,
            &[n],
            &[self.buf.arg(), x.buffer().arg(), y.buffer().arg(), n_arg, m_arg],
        )?;
        Ok(y)
    }
}

/// Matrix-matrix product, one work item per output cell.
impl<'ctx> Dot<&Matrix<'ctx>> for Matrix<'ctx> {
    type Output = Matrix<'ctx>;

    fn dot(&self, b: &Matrix<'ctx>) -> Result<Matrix<'ctx>> {
        check_context("mmdot", &self.buf, b.context())?;
        if self.cols != b.rows {
            return Err(ComputeError::ShapeMismatch {
                op: "mmdot",
                left: self.shape(),
                right: b.shape(),
            });
        }
        let ctx = self.context();
        let (n, m, l) = (self.rows, self.cols, b.cols);
        let args = [KernelArg::count(n)?, KernelArg::count(m)?, KernelArg::count(l)?];

        let c = Matrix::new(ctx, n, l)?;
        ctx.launch(
            names::MATMUL,
            &[n, l],
            &[self.buf.arg(), b.buf.arg(), c.buf.arg(), args[0], args[1], args[2]],
        )?;
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ctx: &Context) -> Matrix<'_> {
        let host = DenseMatrix::from_rows(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        ctx.matrix_from(&host).unwrap()
    }

    #[test]
    fn test_set_get_preserves_row_major_view() {
        let ctx = Context::host().unwrap();
        let m = sample(&ctx);
        let back = m.get().unwrap();
        assert_eq!(back.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(back.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(m.len(), 6);
    }

    #[test]
    fn test_transpose() {
        let ctx = Context::host().unwrap();
        let t = sample(&ctx).t().unwrap();
        assert_eq!(t.shape(), Shape::Matrix(3, 2));
        let host = t.get().unwrap();
        assert_eq!(host.row(0), &[1.0, 4.0]);
        assert_eq!(host.row(2), &[3.0, 6.0]);
    }

    #[test]
    fn test_matvec() {
        let ctx = Context::host().unwrap();
        let m = sample(&ctx);
        let x = ctx.vector_from(&[1.0, 0.0, -1.0]).unwrap();
        assert_eq!(m.dot(&x).unwrap().get().unwrap(), vec![-2.0, -2.0]);

        let wrong = ctx.vector_from(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            m.dot(&wrong),
            Err(ComputeError::ShapeMismatch { op: "mvdot", .. })
        ));
    }

    #[test]
    fn test_matmul_inner_dimension_checked() {
        let ctx = Context::host().unwrap();
        let a = sample(&ctx);
        let b = sample(&ctx);
        assert!(matches!(
            a.dot(&b),
            Err(ComputeError::ShapeMismatch { op: "mmdot", .. })
        ));
        let launches = ctx.launch_count();
        let owned = ctx.pool_stats().owned;
        assert!(a.dot(&b).is_err());
        assert_eq!(ctx.launch_count(), launches);
        assert_eq!(ctx.pool_stats().owned, owned);
    }

    #[test]
    fn test_elementwise_on_matrices() {
        let ctx = Context::host().unwrap();
        let a = sample(&ctx);
        let b = &a * 2.0f32;
        let c = &b - &a;
        assert_eq!(c.get().unwrap(), a.get().unwrap());
        assert_eq!(c.shape(), Shape::Matrix(2, 3));
    }
}
