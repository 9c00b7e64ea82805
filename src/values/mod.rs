//! Value types over pooled device buffers.
//!
//! - [`Vector`]: `n` floats in one buffer
//! - [`Matrix`]: `rows x cols` floats, column-major on the device
//! - [`Scalar`]: a host-side float tagged with its context
//!
//! Vectors and matrices each own exactly one [`PooledBuffer`]. Dropping a
//! value returns its buffer to the context's pool; cloning acquires a new
//! buffer and copies on the device; moving transfers the buffer.

#[macro_use]
mod ops;
mod buffer;
mod matrix;
mod scalar;
mod vector;

use std::fmt;

use serde::Serialize;

pub use buffer::PooledBuffer;
pub use matrix::Matrix;
pub use ops::{Dot, ElementwiseOp, UnaryOp};
pub use scalar::Scalar;
pub use vector::Vector;

/// Shape of a value, used in mismatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Shape {
    Scalar,
    Vector(usize),
    Matrix(usize, usize),
}

impl Shape {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match *self {
            Shape::Scalar => 1,
            Shape::Vector(n) => n,
            Shape::Matrix(rows, cols) => rows * cols,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Vector(n) => write!(f, "vector[{n}]"),
            Shape::Matrix(rows, cols) => write!(f, "matrix[{rows}x{cols}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_display() {
        assert_eq!(Shape::Vector(3).to_string(), "vector[3]");
        assert_eq!(Shape::Matrix(3, 4).to_string(), "matrix[3x4]");
        assert_eq!(Shape::Scalar.to_string(), "scalar");
        assert_eq!(Shape::Matrix(3, 4).len(), 12);
    }
}
