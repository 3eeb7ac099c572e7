//! Core linear-algebra traits for lssys.
//!
//! Solver backends only see an assembled system through these traits, so the
//! same Krylov kernels run on a dense `faer::Mat` in tests and on the
//! distributed block operator in production.

use crate::error::LssError;

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Inner products & norms.
pub trait InnerProduct<V> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd + From<f64>;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Self::Scalar;
}

/// Uniform indexing into vectors (dense or sparse).
pub trait Indexing {
    /// Number of rows (or length for a vector).
    fn nrows(&self) -> usize;
}

/// Access to the block diagonal of an operator.
pub trait BlockDiagonal<T> {
    /// Edge length of one diagonal block.
    fn block_size(&self) -> usize;
    /// Diagonal blocks, row-major, `block_size²` entries per block row.
    fn diagonal_blocks(&self) -> Vec<T>;
}

/// Conversion to a dense matrix, for direct factorizations.
pub trait ToDense {
    fn to_dense(&self) -> Result<faer::Mat<f64>, LssError>;
}
