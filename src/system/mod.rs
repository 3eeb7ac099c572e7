//! Linear system: block matrix plus right-hand side and solution.
//!
//! Element assembly and boundary conditions act on all three objects at
//! once, so they live here rather than on the matrix.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::config::SolverOptions;
use crate::error::LssError;
use crate::matrix::{BlockAccumulator, DistributedMatrix, DistributedVector};
use crate::parallel::CommPattern;
use crate::utils::convergence::SolveStats;

/// Matrix, right-hand side and solution sharing one pattern and `neq`.
pub struct LinearSystem<P: CommPattern> {
    matrix: DistributedMatrix<P>,
    rhs: DistributedVector<P>,
    solution: DistributedVector<P>,
    /// Reused by `dirichlet` for the extracted column.
    column: Vec<f64>,
}

impl<P: CommPattern> Default for LinearSystem<P> {
    fn default() -> Self {
        Self::new(SolverOptions::default())
    }
}

impl<P: CommPattern> LinearSystem<P> {
    pub fn new(options: SolverOptions) -> Self {
        Self {
            matrix: DistributedMatrix::new(options),
            rhs: DistributedVector::new(),
            solution: DistributedVector::new(),
            column: Vec::new(),
        }
    }

    /// Create the matrix from the node connectivity, and both vectors with it.
    pub fn create(
        &mut self,
        pattern: Arc<P>,
        neq: usize,
        node_connectivity: &[usize],
        starting_indices: &[usize],
    ) -> Result<(), LssError> {
        self.matrix.create(
            pattern,
            neq,
            node_connectivity,
            starting_indices,
            &mut self.solution,
            &mut self.rhs,
        )
    }

    /// Release matrix and vectors.
    pub fn destroy(&mut self) {
        self.matrix.destroy();
        self.rhs.destroy();
        self.solution.destroy();
    }

    pub fn is_created(&self) -> bool {
        self.matrix.is_created()
    }

    pub fn matrix(&self) -> &DistributedMatrix<P> {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut DistributedMatrix<P> {
        &mut self.matrix
    }

    pub fn rhs(&self) -> &DistributedVector<P> {
        &self.rhs
    }

    pub fn rhs_mut(&mut self) -> &mut DistributedVector<P> {
        &mut self.rhs
    }

    pub fn solution(&self) -> &DistributedVector<P> {
        &self.solution
    }

    pub fn solution_mut(&mut self) -> &mut DistributedVector<P> {
        &mut self.solution
    }

    /// Scatter an element batch into matrix, rhs and solution. The batch is
    /// checked in full before anything is written.
    pub fn set_values(&mut self, acc: &BlockAccumulator) -> Result<(), LssError> {
        check_vector_lengths(acc)?;
        self.matrix.set_values(acc)?;
        self.rhs.set_values(&acc.indices, &acc.rhs)?;
        self.solution.set_values(&acc.indices, &acc.sol)
    }

    /// Like [`set_values`](Self::set_values) but accumulating.
    pub fn add_values(&mut self, acc: &BlockAccumulator) -> Result<(), LssError> {
        check_vector_lengths(acc)?;
        self.matrix.add_values(acc)?;
        self.rhs.add_values(&acc.indices, &acc.rhs)?;
        self.solution.add_values(&acc.indices, &acc.sol)
    }

    pub fn get_values(&self, acc: &mut BlockAccumulator) -> Result<(), LssError> {
        check_vector_lengths(acc)?;
        self.matrix.get_values(acc)?;
        self.rhs.get_values(&acc.indices, &mut acc.rhs)?;
        self.solution.get_values(&acc.indices, &mut acc.sol)
    }

    /// Fix unknown `block_row·neq + eq` to `value`.
    ///
    /// With `preserve_symmetry` the matching column is eliminated first and
    /// its contribution moved to the right-hand side.
    pub fn dirichlet(&mut self, block_row: usize, eq: usize, value: f64, preserve_symmetry: bool) -> Result<(), LssError> {
        let neq = self.matrix.neq();
        self.matrix.set_row(block_row, eq, 1.0, 0.0)?;
        if preserve_symmetry {
            self.matrix.get_column_and_replace_to_zero(block_row, eq, &mut self.column)?;
            let rhs = self.rhs.as_mut_slice()?;
            for (r, c) in rhs.iter_mut().zip(&self.column) {
                *r -= c * value;
            }
            self.matrix.set_value(block_row * neq + eq, block_row * neq + eq, 1.0)?;
        }
        let irow = block_row * neq + eq;
        self.rhs.set_value(irow, value)?;
        self.solution.set_value(irow, value)?;
        debug!("dirichlet: row {irow} = {value}");
        Ok(())
    }

    /// Periodic pair: block row `from` is folded into `to` and constrained to
    /// equal it. The right-hand side follows the same folding.
    pub fn periodicity(&mut self, to: usize, from: usize) -> Result<(), LssError> {
        self.matrix.tie_blockrow_pairs(to, from)?;
        let neq = self.matrix.neq();
        let rhs = self.rhs.as_mut_slice()?;
        for eq in 0..neq {
            let moved = std::mem::take(&mut rhs[from * neq + eq]);
            rhs[to * neq + eq] += moved;
        }
        debug!("periodicity: block row {from} tied to {to}");
        Ok(())
    }

    pub fn set_diagonal(&mut self, diag: &[f64]) -> Result<(), LssError> {
        self.matrix.set_diagonal(diag)
    }

    pub fn add_diagonal(&mut self, diag: &[f64]) -> Result<(), LssError> {
        self.matrix.add_diagonal(diag)
    }

    pub fn get_diagonal(&self) -> Result<Vec<f64>, LssError> {
        self.matrix.get_diagonal()
    }

    pub fn reset(&mut self, value: f64) -> Result<(), LssError> {
        self.matrix.reset(value)?;
        self.rhs.reset(value)?;
        self.solution.reset(value)
    }

    /// Solve into the solution vector; see [`DistributedMatrix::solve`].
    pub fn solve(&mut self) -> Result<SolveStats<f64>, LssError> {
        self.matrix.solve(&mut self.solution, &self.rhs)
    }

    pub fn print<W: Write>(&self, out: &mut W) -> Result<(), LssError> {
        self.matrix.print(out)?;
        writeln!(out, "# rhs")?;
        self.rhs.print(out)?;
        writeln!(out, "# solution")?;
        self.solution.print(out)
    }

    pub fn print_to_file<Q: AsRef<Path>>(&self, path: Q) -> Result<(), LssError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.print(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

/// Right-hand side and solution of the batch must match its matrix, so that
/// a bad batch is rejected before the matrix is touched.
fn check_vector_lengths(acc: &BlockAccumulator) -> Result<(), LssError> {
    let expected = acc.size();
    for found in [acc.rhs.len(), acc.sol.len()] {
        if found != expected {
            return Err(LssError::DimensionMismatch { expected, found });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialPattern;

    fn pair() -> LinearSystem<SerialPattern> {
        let mut sys = LinearSystem::default();
        sys.create(Arc::new(SerialPattern::new(2)), 1, &[1, 0], &[0, 1, 2]).unwrap();
        let mut acc = BlockAccumulator::new(2, 1);
        acc.neighbour_indices(&[0, 1]);
        acc.mat.copy_from_slice(&[2.0, -1.0, -1.0, 2.0]);
        acc.rhs.copy_from_slice(&[1.0, 1.0]);
        sys.add_values(&acc).unwrap();
        sys
    }

    #[test]
    fn symmetric_dirichlet_moves_column_to_rhs() {
        let mut sys = pair();
        sys.dirichlet(0, 0, 3.0, true).unwrap();
        let m = sys.matrix();
        assert_eq!(m.get_value(0, 0).unwrap(), 1.0);
        assert_eq!(m.get_value(1, 0).unwrap(), 0.0);
        assert_eq!(m.get_value(0, 1).unwrap(), 0.0);
        // 1 - (-1)·3
        assert_eq!(sys.rhs().get_value(1).unwrap(), 4.0);
        assert_eq!(sys.rhs().get_value(0).unwrap(), 3.0);
        assert_eq!(sys.solution().get_value(0).unwrap(), 3.0);
    }

    #[test]
    fn short_rhs_leaves_system_unassembled() {
        let mut sys = pair();
        let mut acc = BlockAccumulator::new(2, 1);
        acc.neighbour_indices(&[0, 1]);
        acc.reset(1.0);
        acc.rhs.pop();
        assert!(matches!(sys.add_values(&acc), Err(LssError::DimensionMismatch { expected: 2, found: 1 })));
        assert!(matches!(sys.set_values(&acc), Err(LssError::DimensionMismatch { .. })));
        assert_eq!(sys.matrix().get_value(0, 0).unwrap(), 2.0);
        assert_eq!(sys.matrix().get_value(1, 0).unwrap(), -1.0);
        assert_eq!(sys.rhs().get_value(0).unwrap(), 1.0);

        acc.rhs.push(1.0);
        acc.sol.clear();
        assert!(matches!(sys.get_values(&mut acc), Err(LssError::DimensionMismatch { .. })));
        assert_eq!(acc.mat, vec![1.0; 4]);
    }

    #[test]
    fn periodicity_folds_rhs() {
        let mut sys = pair();
        sys.periodicity(0, 1).unwrap();
        assert_eq!(sys.rhs().get_value(0).unwrap(), 2.0);
        assert_eq!(sys.rhs().get_value(1).unwrap(), 0.0);
        assert_eq!(sys.matrix().get_row(1, 0).unwrap(), vec![(0, -1.0), (1, 1.0)]);
    }
}
