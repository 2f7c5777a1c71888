//! Vandermonde parity generator
//!
//! The generator `V` is a `check_count × data_count` matrix with
//! `V[i][j] = (j + 1)^i`. Row `i` of `V` applied to the data rows yields parity
//! row `i`. Stacking the identity on top of `V` gives the recovery matrix
//! `G = [I; V]`: every stored row (data or parity) is `G` applied to the data,
//! so dropping up to `check_count` rows of `G` still leaves a solvable system.

use crate::galois::GaloisField;
use crate::matrix::{Matrix, MatrixError, Result};
use log::debug;

/// Number of parity rows per object
pub const CHECK_COUNT: usize = 2;

/// Largest data row count with distinct Vandermonde evaluation points
pub const MAX_DATA_COUNT: usize = 255;

/// Data and parity rows recovered from a partial stripe set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    pub data: Matrix,
    pub parity: Matrix,
}

#[derive(Debug, Clone)]
pub struct GeneratorMatrix {
    data_count: usize,
    vandermonde: Matrix,
}

impl GeneratorMatrix {
    /// Build `V[i][j] = pow(j + 1, i)` for `i < check_count`, `j < data_count`.
    ///
    /// `data_count` must not exceed `MAX_DATA_COUNT`.
    pub fn build(data_count: usize, check_count: usize, gf: &GaloisField) -> Self {
        debug_assert!(data_count <= MAX_DATA_COUNT);

        let mut vandermonde = Matrix::zeros(check_count, data_count);
        for i in 0..check_count {
            for j in 0..data_count {
                vandermonde.set(i, j, gf.pow((j + 1) as u8, i as u32));
            }
        }

        Self {
            data_count,
            vandermonde,
        }
    }

    pub fn data_count(&self) -> usize {
        self.data_count
    }

    pub fn check_count(&self) -> usize {
        self.vandermonde.rows()
    }

    pub fn vandermonde(&self) -> &Matrix {
        &self.vandermonde
    }

    /// `[Identity(data_count); V]`
    pub fn recovery_matrix(&self) -> Matrix {
        let total = self.data_count + self.check_count();
        let mut matrix = Matrix::zeros(total, self.data_count);
        for i in 0..self.data_count {
            matrix.set(i, i, 1);
        }
        for i in 0..self.check_count() {
            matrix
                .row_mut(self.data_count + i)
                .copy_from_slice(self.vandermonde.row(i));
        }
        matrix
    }

    /// Parity rows for a set of data rows
    pub fn encode(&self, data: &Matrix, gf: &GaloisField) -> Result<Matrix> {
        self.vandermonde.multiply(data, gf)
    }

    /// Recover every data row from the rows that survived.
    ///
    /// `erased` lists row indices in the combined data+parity space (data rows
    /// are `0..data_count`, parity row `i` is `data_count + i`). `surviving`
    /// holds the remaining rows in ascending row order.
    ///
    /// The system `G'` (recovery matrix without the erased rows) is inverted
    /// as-is first. When fewer rows were erased than there is parity, `G'` is
    /// tall and goes through the normal-equations path, whose normal matrix
    /// can be singular over GF(2^8); in that case the first `data_count`
    /// surviving rows are solved as a square system instead.
    pub fn reconstruct(
        &self,
        gf: &GaloisField,
        erased: &[usize],
        surviving: &Matrix,
    ) -> Result<Reconstruction> {
        let system = self.recovery_matrix().remove_rows(erased)?;
        if system.rows() != surviving.rows() {
            return Err(MatrixError::DimensionMismatch {
                left_rows: system.rows(),
                left_cols: system.cols(),
                right_rows: surviving.rows(),
                right_cols: surviving.cols(),
            });
        }

        let data = match system.invert(gf) {
            Ok(decoder) => decoder.multiply(surviving, gf)?,
            Err(MatrixError::Singular { column }) if !system.is_square() => {
                debug!(
                    "normal matrix singular at column {} for erased rows {:?}, solving square subsystem",
                    column, erased
                );
                let leading: Vec<usize> = (0..self.data_count).collect();
                system
                    .select_rows(&leading)?
                    .invert(gf)?
                    .multiply(&surviving.select_rows(&leading)?, gf)?
            }
            Err(e) => return Err(e),
        };

        let parity = self.encode(&data, gf)?;
        Ok(Reconstruction { data, parity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vandermonde_rows() {
        let gf = GaloisField::default();
        let generator = GeneratorMatrix::build(3, CHECK_COUNT, &gf);
        let v = generator.vandermonde();

        assert_eq!(v.row(0), &[1, 1, 1]);
        assert_eq!(v.row(1), &[1, 2, 3]);
        assert_eq!(generator.check_count(), 2);
    }

    #[test]
    fn test_recovery_matrix_layout() {
        let gf = GaloisField::default();
        let generator = GeneratorMatrix::build(3, CHECK_COUNT, &gf);
        let g = generator.recovery_matrix();

        assert_eq!((g.rows(), g.cols()), (5, 3));
        assert_eq!(g.select_rows(&[0, 1, 2]).unwrap(), Matrix::identity(3));
        assert_eq!(g.row(3), &[1, 1, 1]);
        assert_eq!(g.row(4), &[1, 2, 3]);
    }

    #[test]
    fn test_first_parity_row_is_xor() {
        let gf = GaloisField::default();
        let generator = GeneratorMatrix::build(3, CHECK_COUNT, &gf);
        let data = Matrix::from_rows(&[[1u8, 2], [4, 8], [16, 32]]).unwrap();
        let parity = generator.encode(&data, &gf).unwrap();

        assert_eq!(parity.row(0), &[1 ^ 4 ^ 16, 2 ^ 8 ^ 32]);
    }

    fn stripe(generator: &GeneratorMatrix, gf: &GaloisField) -> (Matrix, Matrix) {
        let rows: Vec<Vec<u8>> = (0..generator.data_count())
            .map(|r| (0..8).map(|c| (r * 31 + c * 7 + 1) as u8).collect())
            .collect();
        let data = Matrix::from_rows(&rows).unwrap();
        let all = data.vstack(&generator.encode(&data, gf).unwrap()).unwrap();
        (data, all)
    }

    #[test]
    fn test_reconstruct_two_erasures() {
        let gf = GaloisField::default();
        let generator = GeneratorMatrix::build(5, CHECK_COUNT, &gf);
        let (data, all) = stripe(&generator, &gf);

        let erased = [1, 5];
        let surviving = all.remove_rows(&erased).unwrap();
        let rebuilt = generator.reconstruct(&gf, &erased, &surviving).unwrap();

        assert_eq!(rebuilt.data, data);
        assert_eq!(rebuilt.parity, all.select_rows(&[5, 6]).unwrap());
    }

    #[test]
    fn test_reconstruct_single_erasure_with_singular_normal_matrix() {
        // Seven nodes: the normal matrix for any single erasure is singular
        let gf = GaloisField::default();
        let generator = GeneratorMatrix::build(5, CHECK_COUNT, &gf);
        let (data, all) = stripe(&generator, &gf);

        let system = generator.recovery_matrix().remove_rows(&[2]).unwrap();
        assert!(matches!(
            system.invert(&gf),
            Err(MatrixError::Singular { .. })
        ));

        let surviving = all.remove_rows(&[2]).unwrap();
        let rebuilt = generator.reconstruct(&gf, &[2], &surviving).unwrap();
        assert_eq!(rebuilt.data, data);
    }

    #[test]
    fn test_reconstruct_rejects_wrong_row_count() {
        let gf = GaloisField::default();
        let generator = GeneratorMatrix::build(3, CHECK_COUNT, &gf);
        let surviving = Matrix::zeros(2, 4);
        assert!(matches!(
            generator.reconstruct(&gf, &[0], &surviving),
            Err(MatrixError::DimensionMismatch { .. })
        ));
    }
}
