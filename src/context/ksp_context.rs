//! Factory for Krylov Subspace Methods (KSP).
//!
//! This module provides the `KspContext` struct, which turns a
//! [`SolverOptions`] into a configured solver and preconditioner pair and
//! runs it on any operator exposing products, reductions, its block diagonal
//! and a dense form.
//!
//! # Supported Solvers
//! - CG (preconditioned), BiCGStab, restarted GMRES, dense LU
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems. SIAM.
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

use log::debug;

use crate::config::{PcKind, SolverKind, SolverOptions};
use crate::core::traits::{BlockDiagonal, InnerProduct, MatVec, ToDense};
use crate::error::LssError;
use crate::preconditioner::{BlockJacobi, Jacobi, Preconditioner};
use crate::solver::{BiCgStabSolver, GmresSolver, LinearSolver, LuSolver, PcgSolver};
use crate::utils::convergence::SolveStats;

/// Solver configuration for one or more solves.
#[derive(Debug, Clone, Default)]
pub struct KspContext {
    pub options: SolverOptions,
}

impl KspContext {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    /// Solve `A x = b`; `x` holds the initial guess on entry.
    ///
    /// Iterative backends return `Ok` with `converged == false` when the
    /// iteration cap is reached.
    pub fn solve<M>(&self, a: &M, b: &Vec<f64>, x: &mut Vec<f64>) -> Result<SolveStats<f64>, LssError>
    where
        M: MatVec<Vec<f64>> + InnerProduct<Vec<f64>, Scalar = f64> + BlockDiagonal<f64> + ToDense,
    {
        let opts = &self.options;
        opts.validate()?;
        let jacobi: Jacobi<f64>;
        let block_jacobi: BlockJacobi;
        let pc: Option<&dyn Preconditioner<M, Vec<f64>>> = match (opts.kind, opts.pc) {
            (SolverKind::DirectLu, _) | (_, PcKind::None) => None,
            (_, PcKind::Jacobi) => {
                let mut p = Jacobi::new();
                <Jacobi<f64> as Preconditioner<M, Vec<f64>>>::setup(&mut p, a)?;
                jacobi = p;
                Some(&jacobi as &dyn Preconditioner<M, Vec<f64>>)
            }
            (_, PcKind::BlockJacobi) => {
                let mut p = BlockJacobi::new();
                <BlockJacobi as Preconditioner<M, Vec<f64>>>::setup(&mut p, a)?;
                block_jacobi = p;
                Some(&block_jacobi as &dyn Preconditioner<M, Vec<f64>>)
            }
        };
        debug!("ksp: {} / {}, rtol = {:e}, max_it = {}", opts.kind, opts.pc, opts.rtol, opts.max_iters);

        match opts.kind {
            SolverKind::Cg => PcgSolver::new(opts.rtol, opts.max_iters).solve(a, pc, b, x),
            SolverKind::Bicgstab => BiCgStabSolver::new(opts.rtol, opts.max_iters).solve(a, pc, b, x),
            SolverKind::Gmres => GmresSolver::new(opts.restart, opts.rtol, opts.max_iters).solve(a, pc, b, x),
            SolverKind::DirectLu => LuSolver::new().solve(a, pc, b, x),
        }
    }
}
