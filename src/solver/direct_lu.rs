//! Direct dense solver using Faer: LU with full pivoting.
//!
//! The operator is expanded to a dense matrix, so this backend is only
//! meant for small systems held on a single process.
//!
//! # References
//! - Faer documentation: https://github.com/sarah-ek/faer-rs
//! - Golub & Van Loan, Matrix Computations

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, MatMut};
use log::debug;

use crate::core::traits::ToDense;
use crate::error::LssError;
use crate::preconditioner::Preconditioner;
use crate::solver::LinearSolver;
use crate::utils::convergence::SolveStats;

/// LU solver using full pivoting from Faer.
///
/// Stores the LU factorization for reuse.
#[derive(Default)]
pub struct LuSolver {
    /// Cached LU factorization (if computed)
    factor: Option<FullPivLu<f64>>,
}

impl LuSolver {
    /// Create a new LU solver (no factorization yet).
    pub fn new() -> Self {
        LuSolver { factor: None }
    }

    /// Solve with the cached factorization of the last `solve`.
    pub fn solve_cached(&self, b: &[f64], x: &mut [f64]) -> Result<(), LssError> {
        let factor = self.factor.as_ref().ok_or(LssError::NotCreated("LU factorization"))?;
        let mut sol = b.to_vec();
        let n = sol.len();
        factor.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(&mut sol, n, 1));
        if sol.iter().any(|v| !v.is_finite()) {
            return Err(LssError::FactorError("matrix is singular".into()));
        }
        x.copy_from_slice(&sol);
        Ok(())
    }
}

impl<M, V> LinearSolver<M, V> for LuSolver
where
    M: ToDense,
    V: AsRef<[f64]> + AsMut<[f64]>,
{
    type Error = LssError;
    type Scalar = f64;

    /// Solve Ax = b using LU factorization (full pivoting). Preconditioners
    /// are ignored.
    fn solve(&mut self, a: &M, _pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<f64>, LssError> {
        let dense = a.to_dense()?;
        let n = b.as_ref().len();
        if dense.nrows() != n || dense.ncols() != n {
            return Err(LssError::DimensionMismatch { expected: dense.nrows(), found: n });
        }
        if x.as_ref().len() != n {
            return Err(LssError::DimensionMismatch { expected: n, found: x.as_ref().len() });
        }
        debug!("LU factorization of a dense {n}x{n} matrix");
        self.factor = Some(FullPivLu::new(dense.as_ref()));
        self.solve_cached(b.as_ref(), x.as_mut())?;
        Ok(SolveStats { iterations: 1, final_residual: 0.0, converged: true })
    }
}
