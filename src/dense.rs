//! Host-side dense matrix.
//!
//! Row-major, the convention callers use on the host. [`crate::Matrix`]
//! converts to and from column-major when it stages data for the device.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{ComputeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    /// A zero-filled `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap row-major `data`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ComputeError::InvalidShape(format!(
                "{} values for a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a list of equally long rows.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(ComputeError::InvalidShape(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Rebuild from column-major storage (element `(i, j)` at `i + j * rows`).
    pub fn from_col_major(rows: usize, cols: usize, col_major: &[f32]) -> Result<Self> {
        if col_major.len() != rows * cols {
            return Err(ComputeError::InvalidShape(format!(
                "{} values for a {rows}x{cols} matrix",
                col_major.len()
            )));
        }
        let mut out = Self::new(rows, cols);
        for j in 0..cols {
            for i in 0..rows {
                out.data[i * cols + j] = col_major[i + j * rows];
            }
        }
        Ok(out)
    }

    /// Column-major copy of the data.
    pub fn to_col_major(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.data.len()];
        for i in 0..self.rows {
            for j in 0..self.cols {
                out[i + j * self.rows] = self.data[i * self.cols + j];
            }
        }
        out
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Row-major backing slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f32;

    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) out of bounds");
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f32 {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) out of bounds");
        &mut self.data[row * self.cols + col]
    }
}
