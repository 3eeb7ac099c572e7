//! Preconditioners for linear solvers.
//!
//! This module defines the Preconditioner trait and the diagonal ones the
//! block system uses: scalar Jacobi and block Jacobi over the `neq×neq`
//! diagonal blocks.

use crate::error::LssError;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<M, V> {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), LssError>;
    /// Optionally: setup/factorize from A
    fn setup(&mut self, _a: &M) -> Result<(), LssError> {
        Ok(())
    }
}

pub mod block_jacobi;
pub mod jacobi;

pub use block_jacobi::BlockJacobi;
pub use jacobi::Jacobi;
