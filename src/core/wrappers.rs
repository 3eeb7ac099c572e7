//! Trait implementations for serial `faer::Mat` operators and `Vec<T>` vectors.
//!
//! A dense `faer::Mat` is the reference operator of the crate: it is what the
//! direct backend factorizes, and it is what the Krylov kernels are checked
//! against. Inner products here are purely local; the distributed operator in
//! [`crate::matrix::operator`] reduces across processes instead.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)
//! - [num-traits crate documentation](https://docs.rs/num-traits)

use crate::core::traits::{BlockDiagonal, Indexing, InnerProduct, MatVec, ToDense};
use crate::error::LssError;
use faer::Mat;
use num_traits::Float;

/// Dense `y = A x`, row by row.
impl<T: Float> MatVec<Vec<T>> for Mat<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(self.ncols(), x.len(), "operand length differs from column count");
        assert_eq!(self.nrows(), y.len(), "result length differs from row count");
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = x.iter().enumerate().fold(T::zero(), |acc, (j, xj)| acc + self[(i, j)] * *xj);
        }
    }
}

/// Local inner product; rayon splits the sum when enabled.
impl<T: Float + From<f64> + Send + Sync> InnerProduct<Vec<T>> for Mat<T> {
    type Scalar = T;

    fn dot(&self, x: &Vec<T>, y: &Vec<T>) -> T {
        assert_eq!(x.len(), y.len(), "operand lengths differ");
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            x.as_slice()
                .par_iter()
                .zip(y.as_slice().par_iter())
                .map(|(xi, yi)| *xi * *yi)
                .reduce(|| T::zero(), |acc, v| acc + v)
        }
        #[cfg(not(feature = "rayon"))]
        {
            x.iter()
                .zip(y.iter())
                .map(|(xi, yi)| *xi * *yi)
                .fold(T::zero(), |acc, v| acc + v)
        }
    }

    fn norm(&self, x: &Vec<T>) -> T {
        self.dot(x, x).sqrt()
    }
}

/// A dense matrix seen as a block operator with 1×1 blocks.
impl<T: Float> BlockDiagonal<T> for Mat<T> {
    fn block_size(&self) -> usize {
        1
    }

    fn diagonal_blocks(&self) -> Vec<T> {
        (0..self.nrows()).map(|i| self[(i, i)]).collect()
    }
}

impl ToDense for Mat<f64> {
    fn to_dense(&self) -> Result<Mat<f64>, LssError> {
        Ok(self.clone())
    }
}

impl<T> Indexing for Vec<T> {
    fn nrows(&self) -> usize {
        self.len()
    }
}

impl<T> Indexing for Mat<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
}
