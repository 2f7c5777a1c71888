//! Field-valued matrices for parity generation and erasure recovery
//!
//! A `Matrix` is a dense, row-major grid of GF(2^8) symbols. The same type
//! holds small coefficient matrices (the generator and its inverses) and
//! wide stripe matrices whose rows are whole node payloads, so
//! multiplication works row-at-a-time with table-driven multiply-accumulate.

use crate::galois::{FieldError, GaloisField};
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;

/// Output size (in symbols) above which multiplication fans out across rows
const PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Errors raised by matrix operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// No non-zero pivot exists for a column during elimination
    #[error("Matrix is singular at column {column}")]
    Singular { column: usize },

    /// Operand shapes are incompatible
    #[error("Dimension mismatch: {left_rows}x{left_cols} against {right_rows}x{right_cols}")]
    DimensionMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    /// Rows supplied to `from_rows` have different lengths
    #[error("Ragged rows: expected {expected} columns, found {found}")]
    RaggedRows { expected: usize, found: usize },

    /// A row index does not exist
    #[error("Row {index} out of range for a matrix with {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Type alias for Result with MatrixError
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Dense row-major matrix over GF(2^8)
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// Create a zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// Create a square identity matrix
    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::zeros(size, size);
        for i in 0..size {
            matrix.set(i, i, 1);
        }
        matrix
    }

    /// Build a matrix from equally sized rows
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |row| row.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);

        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(MatrixError::RaggedRows {
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Wrap a row-major buffer whose length is exactly `rows * cols`
    pub(crate) fn from_row_major(rows: usize, cols: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Iterate over rows in order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.rows).map(move |row| self.row(row))
    }

    /// All symbols, rows concatenated in order
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn transpose(&self) -> Self {
        let mut result = Self::zeros(self.cols, self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                result.set(col, row, self.get(row, col));
            }
        }
        result
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.cols {
            self.data.swap(a * self.cols + col, b * self.cols + col);
        }
    }

    /// Copy of the matrix without the listed rows
    pub fn remove_rows(&self, indices: &[usize]) -> Result<Self> {
        self.check_rows(indices)?;
        let keep: Vec<usize> = (0..self.rows).filter(|r| !indices.contains(r)).collect();
        self.select_rows(&keep)
    }

    /// New matrix made of the listed rows, in the order given
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        self.check_rows(indices)?;
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &index in indices {
            data.extend_from_slice(self.row(index));
        }
        Ok(Self::from_row_major(indices.len(), self.cols, data))
    }

    /// Stack `other` below `self`
    pub fn vstack(&self, other: &Matrix) -> Result<Self> {
        if self.cols != other.cols {
            return Err(self.mismatch(other));
        }
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        Ok(Self::from_row_major(self.rows + other.rows, self.cols, data))
    }

    /// Matrix product `self * rhs` over the field
    pub fn multiply(&self, rhs: &Matrix, gf: &GaloisField) -> Result<Self> {
        if self.cols != rhs.rows {
            return Err(self.mismatch(rhs));
        }

        let mut result = Self::zeros(self.rows, rhs.cols);
        if result.data.is_empty() {
            return Ok(result);
        }

        let accumulate = |(row, out): (usize, &mut [u8])| {
            for k in 0..self.cols {
                gf.mul_slice_xor(self.get(row, k), rhs.row(k), out);
            }
        };

        if result.data.len() >= PARALLEL_THRESHOLD {
            result
                .data
                .par_chunks_mut(rhs.cols)
                .enumerate()
                .for_each(accumulate);
        } else {
            result
                .data
                .chunks_mut(rhs.cols)
                .enumerate()
                .for_each(accumulate);
        }

        Ok(result)
    }

    /// Invert the matrix over the field
    ///
    /// Square matrices are inverted directly. A non-square `A` is handled by
    /// inverting the normal matrix `Aᵗ·A` and returning `(Aᵗ·A)⁻¹·Aᵗ`. Over
    /// GF(2^8) the normal matrix can be singular even when `A` has full
    /// column rank, in which case this returns `Singular`.
    pub fn invert(&self, gf: &GaloisField) -> Result<Self> {
        if self.is_square() {
            return self.invert_square(gf);
        }

        let transposed = self.transpose();
        let normal = transposed.multiply(self, gf)?;
        normal.invert_square(gf)?.multiply(&transposed, gf)
    }

    /// Gauss-Jordan elimination on `[A | I]`
    fn invert_square(&self, gf: &GaloisField) -> Result<Self> {
        let n = self.rows;
        let width = n * 2;

        let mut aug = Self::zeros(n, width);
        for row in 0..n {
            aug.row_mut(row)[..n].copy_from_slice(self.row(row));
            aug.set(row, n + row, 1);
        }

        // Forward pass: unit pivots, zeros below
        for pivot in 0..n {
            if aug.get(pivot, pivot) == 0 {
                let swap_with = (pivot + 1..n)
                    .find(|&row| aug.get(row, pivot) != 0)
                    .ok_or(MatrixError::Singular { column: pivot })?;
                aug.swap_rows(pivot, swap_with);
            }

            let pivot_value = aug.get(pivot, pivot);
            for value in aug.row_mut(pivot) {
                *value = gf.div(*value, pivot_value)?;
            }

            for row in pivot + 1..n {
                let factor = aug.get(row, pivot);
                aug.eliminate(gf, pivot, row, factor);
            }
        }

        // Reverse pass: zeros above
        for pivot in (0..n).rev() {
            for row in 0..pivot {
                let factor = aug.get(row, pivot);
                aug.eliminate(gf, pivot, row, factor);
            }
        }

        let mut inverse = Self::zeros(n, n);
        for row in 0..n {
            inverse.row_mut(row).copy_from_slice(&aug.row(row)[n..]);
        }
        Ok(inverse)
    }

    /// `row[dst] ^= factor * row[src]`
    fn eliminate(&mut self, gf: &GaloisField, src: usize, dst: usize, factor: u8) {
        if factor == 0 || src == dst {
            return;
        }
        let cols = self.cols;
        let (src_row, dst_row) = if src < dst {
            let (head, tail) = self.data.split_at_mut(dst * cols);
            (&head[src * cols..(src + 1) * cols], &mut tail[..cols])
        } else {
            let (head, tail) = self.data.split_at_mut(src * cols);
            (&tail[..cols], &mut head[dst * cols..(dst + 1) * cols])
        };
        gf.mul_slice_xor(factor, src_row, dst_row);
    }

    fn check_rows(&self, indices: &[usize]) -> Result<()> {
        match indices.iter().find(|&&index| index >= self.rows) {
            Some(&index) => Err(MatrixError::RowOutOfRange {
                index,
                rows: self.rows,
            }),
            None => Ok(()),
        }
    }

    fn mismatch(&self, other: &Matrix) -> MatrixError {
        MatrixError::DimensionMismatch {
            left_rows: self.rows,
            left_cols: self.cols,
            right_rows: other.rows,
            right_cols: other.cols,
        }
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix {}x{}", self.rows, self.cols)?;
        if self.data.len() <= 64 {
            let mut list = f.debug_list();
            for row in self.iter_rows() {
                list.entry(&row);
            }
            list.finish()?;
        }
        Ok(())
    }
}
