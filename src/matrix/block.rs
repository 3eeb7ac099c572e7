//! Distributed block-sparse matrix.
//!
//! The nonzero structure is fixed at [`DistributedMatrix::create`] from the
//! node connectivity; afterwards only values change. Each stored block is a
//! dense `neq×neq` array kept row-major, so scalar entry `(irow, icol)` with
//! `irow = block_row·neq + ieq` and `icol = block_col·neq + jeq` lives at
//! `pos·neq² + ieq·neq + jeq`, where `pos` is the block's position in the
//! sparsity pattern.
//!
//! Rows are the local blocks of the communication pattern, owned and ghost.
//! Ghost rows can be written but are dropped from the solve; their owners
//! hold the authoritative equations.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;
use log::{debug, info, warn};

use crate::config::SolverOptions;
use crate::context::KspContext;
use crate::error::LssError;
use crate::matrix::accumulator::BlockAccumulator;
use crate::matrix::operator::DistributedOperator;
use crate::matrix::sparsity::BlockSparsity;
use crate::matrix::vector::DistributedVector;
use crate::parallel::CommPattern;
use crate::utils::convergence::SolveStats;

bitflags! {
    /// Boundary treatment applied to a block row since the last reset.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct RowConstraint: u8 {
        /// At least one equation was replaced by [`DistributedMatrix::set_row`].
        const DIRICHLET = 0b001;
        /// Row was folded into its periodic partner and now ties to it.
        const PERIODIC_SOURCE = 0b010;
        /// Row received the contributions of a periodic partner.
        const PERIODIC_TARGET = 0b100;
    }
}

pub(crate) struct MatrixState<P> {
    pub(crate) pattern: Arc<P>,
    pub(crate) neq: usize,
    pub(crate) sparsity: BlockSparsity,
    pub(crate) values: Vec<f64>,
    constraints: Vec<RowConstraint>,
}

#[inline]
fn slot(neq: usize, pos: usize, ieq: usize, jeq: usize) -> usize {
    (pos * neq + ieq) * neq + jeq
}

impl<P> MatrixState<P> {
    fn nrows(&self) -> usize {
        self.sparsity.nrows() * self.neq
    }

    fn ncols(&self) -> usize {
        self.sparsity.ncols() * self.neq
    }

    fn locate(&self, icol: usize, irow: usize) -> Result<usize, LssError> {
        if irow >= self.nrows() || icol >= self.ncols() {
            return Err(LssError::IndexOutOfRange(format!(
                "matrix entry (row {irow}, col {icol}) outside {}x{}",
                self.nrows(),
                self.ncols()
            )));
        }
        let neq = self.neq;
        let pos = self.sparsity.find(irow / neq, icol / neq).ok_or_else(|| {
            LssError::IndexOutOfRange(format!("matrix entry (row {irow}, col {icol}) not in sparsity pattern"))
        })?;
        Ok(slot(neq, pos, irow % neq, icol % neq))
    }

    fn check_block_row(&self, block_row: usize, eq: usize) -> Result<(), LssError> {
        if block_row >= self.sparsity.nrows() || eq >= self.neq {
            return Err(LssError::IndexOutOfRange(format!(
                "block row {block_row}, equation {eq} (block rows: {}, neq: {})",
                self.sparsity.nrows(),
                self.neq
            )));
        }
        Ok(())
    }

    /// Block positions for every `(row, col)` pair of the accumulator, in
    /// [`BlockAccumulator::entries`] order. Nothing is written on failure.
    fn accumulator_positions(&self, acc: &BlockAccumulator) -> Result<Vec<usize>, LssError> {
        if acc.neq() != self.neq {
            return Err(LssError::DimensionMismatch { expected: self.neq, found: acc.neq() });
        }
        let expected = acc.size() * acc.size();
        if acc.mat.len() != expected {
            return Err(LssError::DimensionMismatch { expected, found: acc.mat.len() });
        }
        acc.entries()
            .map(|(r, c, _, _)| {
                self.sparsity.find(r, c).ok_or_else(|| {
                    LssError::IndexOutOfRange(format!("block ({r}, {c}) not in sparsity pattern"))
                })
            })
            .collect()
    }

    fn check_diagonal_len(&self, len: usize) -> Result<(), LssError> {
        if len != self.nrows() {
            return Err(LssError::DimensionMismatch { expected: self.nrows(), found: len });
        }
        Ok(())
    }
}

/// Block-sparse matrix over the local blocks of a [`CommPattern`].
///
/// Starts empty; [`create`](Self::create) fixes the structure and
/// [`destroy`](Self::destroy) releases it.
pub struct DistributedMatrix<P: CommPattern> {
    options: SolverOptions,
    state: Option<MatrixState<P>>,
}

impl<P: CommPattern> Default for DistributedMatrix<P> {
    fn default() -> Self {
        Self::new(SolverOptions::default())
    }
}

impl<P: CommPattern> DistributedMatrix<P> {
    /// Uncreated matrix that will solve with `options`.
    pub fn new(options: SolverOptions) -> Self {
        Self { options, state: None }
    }

    /// Backend configuration used by [`solve`](Self::solve).
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Choose another backend. Only allowed before `create`.
    pub fn set_options(&mut self, options: SolverOptions) -> Result<(), LssError> {
        if self.state.is_some() {
            return Err(LssError::AlreadyCreated("matrix"));
        }
        self.options = options;
        Ok(())
    }

    /// Build the sparsity from the node connectivity and allocate zeroed
    /// values. `solution` and `rhs` are created with the same pattern and
    /// `neq` unless they already are.
    pub fn create(
        &mut self,
        pattern: Arc<P>,
        neq: usize,
        node_connectivity: &[usize],
        starting_indices: &[usize],
        solution: &mut DistributedVector<P>,
        rhs: &mut DistributedVector<P>,
    ) -> Result<(), LssError> {
        if self.state.is_some() {
            return Err(LssError::AlreadyCreated("matrix"));
        }
        if neq == 0 {
            return Err(LssError::InvalidOption("number of equations must be positive".into()));
        }
        self.options.validate()?;
        let nblocks = pattern.local_size();
        let sparsity = BlockSparsity::from_connectivity(nblocks, nblocks, node_connectivity, starting_indices)?;
        for (v, what) in [(&*solution, "solution"), (&*rhs, "rhs")] {
            if let Some(p) = v.pattern() {
                if !Arc::ptr_eq(p, &pattern) || v.neq() != neq {
                    return Err(LssError::PartitionMismatch(format!(
                        "{what} vector was created with a different pattern or neq"
                    )));
                }
            }
        }
        if !solution.is_created() {
            solution.create(pattern.clone(), neq)?;
        }
        if !rhs.is_created() {
            rhs.create(pattern.clone(), neq)?;
        }

        info!(
            "created block matrix: {} block rows ({} owned), neq = {}, {} stored blocks, solver = {}",
            nblocks,
            pattern.owned_count(),
            neq,
            sparsity.nnz(),
            self.options.kind
        );
        let values = vec![0.0; sparsity.nnz() * neq * neq];
        let constraints = vec![RowConstraint::empty(); nblocks];
        self.state = Some(MatrixState { pattern, neq, sparsity, values, constraints });
        Ok(())
    }

    /// Release structure and values. Calling it on an uncreated matrix is a no-op.
    pub fn destroy(&mut self) {
        if self.state.take().is_some() {
            debug!("destroyed block matrix");
        }
    }

    /// Whether `create` succeeded since the last `destroy`.
    pub fn is_created(&self) -> bool {
        self.state.is_some()
    }

    pub(crate) fn state(&self) -> Result<&MatrixState<P>, LssError> {
        self.state.as_ref().ok_or(LssError::NotCreated("matrix"))
    }

    fn state_mut(&mut self) -> Result<&mut MatrixState<P>, LssError> {
        self.state.as_mut().ok_or(LssError::NotCreated("matrix"))
    }

    /// Equations per block, 0 before `create`.
    pub fn neq(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.neq)
    }

    /// Number of local block rows, owned and ghost.
    pub fn blockrow_size(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.sparsity.nrows())
    }

    /// Number of block columns.
    pub fn blockcol_size(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.sparsity.ncols())
    }

    /// Short name of the configured backend (`"cg"`, `"bicgstab"`, `"gmres"` or `"lu"`).
    pub fn solvertype(&self) -> &'static str {
        self.options.kind.name()
    }

    /// Block nonzero structure built at `create`.
    pub fn sparsity(&self) -> Result<&BlockSparsity, LssError> {
        Ok(&self.state()?.sparsity)
    }

    /// Communication pattern the rows are partitioned by, if created.
    pub fn pattern(&self) -> Option<&Arc<P>> {
        self.state.as_ref().map(|s| &s.pattern)
    }

    /// Boundary treatment applied to `block_row` since the last [`reset`](Self::reset).
    pub fn constraints(&self, block_row: usize) -> Result<RowConstraint, LssError> {
        let s = self.state()?;
        s.constraints.get(block_row).copied().ok_or_else(|| {
            LssError::IndexOutOfRange(format!("block row {block_row} (block rows: {})", s.sparsity.nrows()))
        })
    }

    /// The matrix as a linear operator, for residual checks or custom solves.
    pub fn operator(&self) -> Result<DistributedOperator<'_, P>, LssError> {
        Ok(DistributedOperator::new(self.state()?))
    }

    /// Overwrite scalar entry `(irow, icol)`.
    ///
    /// Fails with `IndexOutOfRange` when the entry lies outside the matrix or
    /// its block is not stored.
    pub fn set_value(&mut self, icol: usize, irow: usize, value: f64) -> Result<(), LssError> {
        let s = self.state_mut()?;
        let k = s.locate(icol, irow)?;
        s.values[k] = value;
        Ok(())
    }

    /// Add `value` to scalar entry `(irow, icol)`.
    pub fn add_value(&mut self, icol: usize, irow: usize, value: f64) -> Result<(), LssError> {
        let s = self.state_mut()?;
        let k = s.locate(icol, irow)?;
        s.values[k] += value;
        Ok(())
    }

    /// Read scalar entry `(irow, icol)`.
    pub fn get_value(&self, icol: usize, irow: usize) -> Result<f64, LssError> {
        let s = self.state()?;
        Ok(s.values[s.locate(icol, irow)?])
    }

    /// Overwrite every block addressed by the accumulator's neighbour indices.
    pub fn set_values(&mut self, acc: &BlockAccumulator) -> Result<(), LssError> {
        self.scatter(acc, |dst, src| dst.copy_from_slice(src))
    }

    /// Add the accumulator's element matrix into the addressed blocks.
    pub fn add_values(&mut self, acc: &BlockAccumulator) -> Result<(), LssError> {
        self.scatter(acc, |dst, src| {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        })
    }

    fn scatter<F>(&mut self, acc: &BlockAccumulator, mut op: F) -> Result<(), LssError>
    where
        F: FnMut(&mut [f64], &[f64]),
    {
        let s = self.state_mut()?;
        let positions = s.accumulator_positions(acc)?;
        let neq = s.neq;
        for ((_, _, i, j), pos) in acc.entries().zip(positions) {
            for ieq in 0..neq {
                let src = acc.mat_index(i, ieq, j, 0);
                let dst = slot(neq, pos, ieq, 0);
                op(&mut s.values[dst..dst + neq], &acc.mat[src..src + neq]);
            }
        }
        Ok(())
    }

    /// Copy the addressed blocks into the accumulator's element matrix.
    pub fn get_values(&self, acc: &mut BlockAccumulator) -> Result<(), LssError> {
        let s = self.state()?;
        let positions = s.accumulator_positions(acc)?;
        let neq = s.neq;
        let entries: Vec<_> = acc.entries().collect();
        for ((_, _, i, j), pos) in entries.into_iter().zip(positions) {
            for ieq in 0..neq {
                let dst = acc.mat_index(i, ieq, j, 0);
                let src = slot(neq, pos, ieq, 0);
                acc.mat[dst..dst + neq].copy_from_slice(&s.values[src..src + neq]);
            }
        }
        Ok(())
    }

    /// Replace equation `eq` of `block_row`: `diagval` on the diagonal,
    /// `offdiagval` at every other stored entry of the row.
    pub fn set_row(&mut self, block_row: usize, eq: usize, diagval: f64, offdiagval: f64) -> Result<(), LssError> {
        let s = self.state_mut()?;
        s.check_block_row(block_row, eq)?;
        let neq = s.neq;
        let diag = s.sparsity.diag(block_row);
        for pos in s.sparsity.row(block_row) {
            for jeq in 0..neq {
                s.values[slot(neq, pos, eq, jeq)] = if pos == diag && jeq == eq { diagval } else { offdiagval };
            }
        }
        s.constraints[block_row] |= RowConstraint::DIRICHLET;
        Ok(())
    }

    /// Extract column `block_col·neq + eq` into `values` (one entry per scalar
    /// row, zero where no block is stored) and zero its stored entries.
    pub fn get_column_and_replace_to_zero(
        &mut self,
        block_col: usize,
        eq: usize,
        values: &mut Vec<f64>,
    ) -> Result<(), LssError> {
        let s = self.state_mut()?;
        if block_col >= s.sparsity.ncols() || eq >= s.neq {
            return Err(LssError::IndexOutOfRange(format!(
                "block column {block_col}, equation {eq} (block columns: {}, neq: {})",
                s.sparsity.ncols(),
                s.neq
            )));
        }
        let neq = s.neq;
        values.clear();
        values.resize(s.nrows(), 0.0);
        for &(row, pos) in s.sparsity.col_entries(block_col) {
            for ieq in 0..neq {
                let k = slot(neq, pos, ieq, eq);
                values[row * neq + ieq] = s.values[k];
                s.values[k] = 0.0;
            }
        }
        Ok(())
    }

    /// Periodic tie: add block row `from` onto block row `to`, then turn each
    /// equation of `from` into `x_from - x_to = 0`.
    ///
    /// Every block column of `from` must also be stored in `to`, and block
    /// `(from, to)` must exist.
    pub fn tie_blockrow_pairs(&mut self, to: usize, from: usize) -> Result<(), LssError> {
        let s = self.state_mut()?;
        let nrows = s.sparsity.nrows();
        if to >= nrows || from >= nrows {
            return Err(LssError::IndexOutOfRange(format!(
                "tie of block rows {to} <- {from} (block rows: {nrows})"
            )));
        }
        if to == from {
            return Err(LssError::IndexOutOfRange(format!("block row {to} cannot be tied to itself")));
        }
        let tie = s.sparsity.find(from, to).ok_or_else(|| {
            LssError::IndexOutOfRange(format!("block ({from}, {to}) not in sparsity pattern"))
        })?;
        let pairs = s
            .sparsity
            .row(from)
            .map(|pf| {
                let c = s.sparsity.col_of(pf);
                s.sparsity.find(to, c).map(|pt| (pf, pt)).ok_or_else(|| {
                    LssError::IndexOutOfRange(format!("block ({to}, {c}) not in sparsity pattern"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bs2 = s.neq * s.neq;
        for (pf, pt) in pairs {
            for k in 0..bs2 {
                let v = s.values[pf * bs2 + k];
                s.values[pt * bs2 + k] += v;
            }
            s.values[pf * bs2..(pf + 1) * bs2].fill(0.0);
        }
        let neq = s.neq;
        let diag = s.sparsity.diag(from);
        for ieq in 0..neq {
            s.values[slot(neq, diag, ieq, ieq)] = 1.0;
            s.values[slot(neq, tie, ieq, ieq)] = -1.0;
        }
        s.constraints[from] |= RowConstraint::PERIODIC_SOURCE;
        s.constraints[to] |= RowConstraint::PERIODIC_TARGET;
        Ok(())
    }

    /// Stored entries of scalar row `block_row·neq + eq` as `(icol, value)`.
    pub fn get_row(&self, block_row: usize, eq: usize) -> Result<Vec<(usize, f64)>, LssError> {
        let s = self.state()?;
        s.check_block_row(block_row, eq)?;
        let neq = s.neq;
        let mut row = Vec::with_capacity(s.sparsity.row(block_row).len() * neq);
        for pos in s.sparsity.row(block_row) {
            let c = s.sparsity.col_of(pos);
            for jeq in 0..neq {
                row.push((c * neq + jeq, s.values[slot(neq, pos, eq, jeq)]));
            }
        }
        Ok(row)
    }

    /// Overwrite the diagonal; `diag[block·neq + eq]` goes to that scalar row.
    pub fn set_diagonal(&mut self, diag: &[f64]) -> Result<(), LssError> {
        let s = self.state_mut()?;
        s.check_diagonal_len(diag.len())?;
        let neq = s.neq;
        for r in 0..s.sparsity.nrows() {
            let pos = s.sparsity.diag(r);
            for ieq in 0..neq {
                s.values[slot(neq, pos, ieq, ieq)] = diag[r * neq + ieq];
            }
        }
        Ok(())
    }

    /// Add `diag` to the diagonal, same ordering as [`set_diagonal`](Self::set_diagonal).
    pub fn add_diagonal(&mut self, diag: &[f64]) -> Result<(), LssError> {
        let s = self.state_mut()?;
        s.check_diagonal_len(diag.len())?;
        let neq = s.neq;
        for r in 0..s.sparsity.nrows() {
            let pos = s.sparsity.diag(r);
            for ieq in 0..neq {
                s.values[slot(neq, pos, ieq, ieq)] += diag[r * neq + ieq];
            }
        }
        Ok(())
    }

    /// Diagonal in scalar-row order.
    pub fn get_diagonal(&self) -> Result<Vec<f64>, LssError> {
        let s = self.state()?;
        let neq = s.neq;
        let mut diag = Vec::with_capacity(s.nrows());
        for r in 0..s.sparsity.nrows() {
            let pos = s.sparsity.diag(r);
            diag.extend((0..neq).map(|ieq| s.values[slot(neq, pos, ieq, ieq)]));
        }
        Ok(diag)
    }

    /// Set every stored entry to `value` and clear boundary flags. The
    /// sparsity is kept.
    pub fn reset(&mut self, value: f64) -> Result<(), LssError> {
        let s = self.state_mut()?;
        s.values.fill(value);
        s.constraints.fill(RowConstraint::empty());
        Ok(())
    }

    /// Solve `A·x = b` with the configured backend. Collective.
    ///
    /// Ghost rows of `rhs` are ignored; on success the ghost entries of
    /// `solution` are refreshed from their owners. On failure `solution` is
    /// left untouched.
    pub fn solve(
        &self,
        solution: &mut DistributedVector<P>,
        rhs: &DistributedVector<P>,
    ) -> Result<SolveStats<f64>, LssError> {
        let s = self.state()?;
        check_partition(s, solution, "solution")?;
        check_partition(s, rhs, "rhs")?;

        let op = DistributedOperator::new(s);
        let mut b = rhs.as_slice()?.to_vec();
        op.mask_ghosts(&mut b);
        let mut x = solution.as_slice()?.to_vec();
        info!(
            "solving {} local unknowns with {} / {}",
            x.len(),
            self.options.kind,
            self.options.pc
        );

        let failure = |reason: String| LssError::BackendSolveFailure {
            backend: self.options.kind.name().to_string(),
            reason,
        };
        let stats = KspContext::new(self.options.clone())
            .solve(&op, &b, &mut x)
            .map_err(|e| failure(e.to_string()))?;
        if !stats.converged {
            warn!(
                "{} stopped after {} iterations, residual {:e}",
                self.options.kind, stats.iterations, stats.final_residual
            );
            return Err(failure(format!(
                "no convergence after {} iterations (residual {:e})",
                stats.iterations, stats.final_residual
            )));
        }
        debug!("converged in {} iterations, residual {:e}", stats.iterations, stats.final_residual);

        solution.as_mut_slice()?.copy_from_slice(&x);
        solution.sync()?;
        Ok(stats)
    }

    /// One line per stored scalar entry: `irow icol value`.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<(), LssError> {
        let s = self.state()?;
        let neq = s.neq;
        writeln!(
            out,
            "# block matrix: {} x {} blocks, neq = {}, {} stored blocks, solver = {}",
            s.sparsity.nrows(),
            s.sparsity.ncols(),
            neq,
            s.sparsity.nnz(),
            self.solvertype()
        )?;
        for r in 0..s.sparsity.nrows() {
            for ieq in 0..neq {
                for pos in s.sparsity.row(r) {
                    let c = s.sparsity.col_of(pos);
                    for jeq in 0..neq {
                        writeln!(out, "{} {} {:e}", r * neq + ieq, c * neq + jeq, s.values[slot(neq, pos, ieq, jeq)])?;
                    }
                }
            }
        }
        Ok(())
    }

    /// [`print`](Self::print) into a newly created file.
    pub fn print_to_file<Q: AsRef<Path>>(&self, path: Q) -> Result<(), LssError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.print(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

fn check_partition<P: CommPattern>(
    s: &MatrixState<P>,
    v: &DistributedVector<P>,
    what: &'static str,
) -> Result<(), LssError> {
    let p = v.pattern().ok_or(LssError::NotCreated(what))?;
    if !Arc::ptr_eq(p, &s.pattern) || v.neq() != s.neq {
        return Err(LssError::PartitionMismatch(format!(
            "{what} vector is not partitioned like the matrix"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialPattern;

    /// 1D chain of `n` nodes, each connected to its neighbours.
    fn chain(n: usize, neq: usize) -> (DistributedMatrix<SerialPattern>, DistributedVector<SerialPattern>, DistributedVector<SerialPattern>) {
        let mut conn = Vec::new();
        let mut start = vec![0];
        for i in 0..n {
            if i > 0 {
                conn.push(i - 1);
            }
            if i + 1 < n {
                conn.push(i + 1);
            }
            start.push(conn.len());
        }
        let mut m = DistributedMatrix::default();
        let mut x = DistributedVector::new();
        let mut b = DistributedVector::new();
        m.create(Arc::new(SerialPattern::new(n)), neq, &conn, &start, &mut x, &mut b).unwrap();
        (m, x, b)
    }

    #[test]
    fn scalar_access_follows_block_layout() {
        let (mut m, x, b) = chain(3, 2);
        assert_eq!(x.blockrow_size(), 3);
        assert_eq!(b.neq(), 2);
        m.set_value(3, 0, 5.0).unwrap();
        m.add_value(3, 0, 1.0).unwrap();
        assert_eq!(m.get_value(3, 0).unwrap(), 6.0);
        // block (0, 2) is not connected
        assert!(matches!(m.set_value(4, 0, 1.0), Err(LssError::IndexOutOfRange(_))));
        assert!(matches!(m.get_value(0, 6), Err(LssError::IndexOutOfRange(_))));
    }

    #[test]
    fn accumulator_scatter_is_all_or_nothing() {
        let (mut m, _, _) = chain(3, 1);
        let mut acc = BlockAccumulator::new(2, 1);
        acc.neighbour_indices(&[0, 2]);
        acc.reset(1.0);
        assert!(matches!(m.add_values(&acc), Err(LssError::IndexOutOfRange(_))));
        assert_eq!(m.get_value(0, 0).unwrap(), 0.0);
        acc.neighbour_indices(&[1, 0]);
        acc.set_value(0, 0, 1, 0, 7.0);
        m.add_values(&acc).unwrap();
        assert_eq!(m.get_value(0, 1).unwrap(), 7.0);
        assert_eq!(m.get_value(1, 1).unwrap(), 1.0);
        let mut back = BlockAccumulator::new(2, 1);
        back.neighbour_indices(&[1, 0]);
        m.get_values(&mut back).unwrap();
        assert_eq!(back.mat, acc.mat);
    }

    #[test]
    fn row_column_and_tie_operations() {
        let (mut m, _, _) = chain(3, 1);
        for r in 0..3 {
            for (c, _) in m.get_row(r, 0).unwrap() {
                m.set_value(c, r, (10 * r + c + 1) as f64).unwrap();
            }
        }
        let mut col = Vec::new();
        m.get_column_and_replace_to_zero(1, 0, &mut col).unwrap();
        assert_eq!(col, vec![2.0, 12.0, 22.0]);
        assert_eq!(m.get_value(1, 2).unwrap(), 0.0);

        m.set_row(0, 0, 1.0, 0.0).unwrap();
        assert_eq!(m.get_row(0, 0).unwrap(), vec![(0, 1.0), (1, 0.0)]);
        assert!(m.constraints(0).unwrap().contains(RowConstraint::DIRICHLET));

        // row 0 has cols {0, 1}, row 1 has {0, 1, 2}
        m.tie_blockrow_pairs(1, 0).unwrap();
        assert_eq!(m.get_row(0, 0).unwrap(), vec![(0, 1.0), (1, -1.0)]);
        assert_eq!(m.get_value(0, 1).unwrap(), 12.0);
        assert_eq!(m.get_value(1, 1).unwrap(), 0.0);
        assert!(m.constraints(1).unwrap().contains(RowConstraint::PERIODIC_TARGET));
        // row 1 couples to block 0, row 2 does not
        assert!(matches!(m.tie_blockrow_pairs(2, 1), Err(LssError::IndexOutOfRange(_))));

        m.reset(0.0).unwrap();
        assert!(m.constraints(0).unwrap().is_empty());
    }

    /// Every stored scalar entry, row by row.
    fn stored(m: &DistributedMatrix<SerialPattern>) -> Vec<Vec<(usize, f64)>> {
        let neq = m.neq();
        (0..m.blockrow_size() * neq).map(|irow| m.get_row(irow / neq, irow % neq).unwrap()).collect()
    }

    /// Distinct value at every stored entry.
    fn fill_distinct(m: &mut DistributedMatrix<SerialPattern>) {
        let neq = m.neq();
        for irow in 0..m.blockrow_size() * neq {
            for (icol, _) in m.get_row(irow / neq, irow % neq).unwrap() {
                m.set_value(icol, irow, (100 * irow + icol + 1) as f64).unwrap();
            }
        }
    }

    #[test]
    fn bulk_matches_single_entries_in_accumulator_order() {
        let mut acc = BlockAccumulator::new(3, 2);
        acc.neighbour_indices(&[1, 1, 2]);
        for (k, v) in acc.mat.iter_mut().enumerate() {
            *v = k as f64 + 0.5;
        }
        for add in [false, true] {
            let (mut bulk, _, _) = chain(3, 2);
            let (mut single, _, _) = chain(3, 2);
            fill_distinct(&mut bulk);
            fill_distinct(&mut single);
            if add {
                bulk.add_values(&acc).unwrap();
            } else {
                bulk.set_values(&acc).unwrap();
            }
            for (r, c, i, j) in acc.entries() {
                for ieq in 0..2 {
                    for jeq in 0..2 {
                        let v = acc.value(i, ieq, j, jeq);
                        if add {
                            single.add_value(c * 2 + jeq, r * 2 + ieq, v).unwrap();
                        } else {
                            single.set_value(c * 2 + jeq, r * 2 + ieq, v).unwrap();
                        }
                    }
                }
            }
            assert_eq!(stored(&bulk), stored(&single), "add = {add}");
        }
    }

    #[test]
    fn reset_reaches_every_stored_entry() {
        let (mut m, _, _) = chain(3, 2);
        fill_distinct(&mut m);
        m.set_row(2, 1, 1.0, 0.0).unwrap();
        m.reset(0.0).unwrap();
        let rows = stored(&m);
        assert_eq!(rows.len(), 6);
        for row in rows {
            assert!(!row.is_empty());
            assert!(row.iter().all(|&(_, v)| v == 0.0), "{row:?}");
        }
        assert!(m.constraints(2).unwrap().is_empty());
    }

    #[test]
    fn tie_sums_whole_rows_for_every_equation() {
        let (mut m, _, _) = chain(3, 2);
        fill_distinct(&mut m);
        let before = stored(&m);
        // block row 0 stores columns {0, 1}, block row 1 stores {0, 1, 2}
        m.tie_blockrow_pairs(1, 0).unwrap();
        let after = stored(&m);
        for eq in 0..2 {
            let expected: Vec<(usize, f64)> = before[2 + eq]
                .iter()
                .map(|&(c, v)| {
                    let from = before[eq].iter().find(|&&(fc, _)| fc == c).map_or(0.0, |&(_, fv)| fv);
                    (c, v + from)
                })
                .collect();
            assert_eq!(after[2 + eq], expected);
            let tie: Vec<(usize, f64)> = (0..4)
                .map(|c| (c, if c == eq { 1.0 } else if c == 2 + eq { -1.0 } else { 0.0 }))
                .collect();
            assert_eq!(after[eq], tie);
        }
        assert_eq!(after[4..], before[4..]);
        assert!(m.constraints(0).unwrap().contains(RowConstraint::PERIODIC_SOURCE));
    }

    #[test]
    fn set_row_with_several_equations() {
        let (mut m, _, _) = chain(2, 2);
        m.reset(1.0).unwrap();
        m.set_row(1, 1, 9.0, 0.5).unwrap();
        assert_eq!(m.get_row(1, 1).unwrap(), vec![(0, 0.5), (1, 0.5), (2, 0.5), (3, 9.0)]);
        assert_eq!(m.get_row(1, 0).unwrap(), vec![(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0)]);
        assert_eq!(m.get_value(2, 3).unwrap(), 0.5);
        assert_eq!(m.get_diagonal().unwrap(), vec![1.0, 1.0, 1.0, 9.0]);
        assert!(m.constraints(1).unwrap().contains(RowConstraint::DIRICHLET));
        assert!(m.constraints(0).unwrap().is_empty());
    }

    #[test]
    fn diagonal_is_ordered_by_scalar_row() {
        let (mut m, _, _) = chain(2, 2);
        m.set_diagonal(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        m.add_diagonal(&[1.0; 4]).unwrap();
        assert_eq!(m.get_value(3, 3).unwrap(), 5.0);
        assert_eq!(m.get_diagonal().unwrap(), vec![2.0, 3.0, 4.0, 5.0]);
        assert!(matches!(m.set_diagonal(&[1.0]), Err(LssError::DimensionMismatch { .. })));
    }

    #[test]
    fn lifecycle_errors() {
        let mut m: DistributedMatrix<SerialPattern> = DistributedMatrix::default();
        assert!(matches!(m.get_diagonal(), Err(LssError::NotCreated(_))));
        assert_eq!(m.blockrow_size(), 0);
        let (mut x, mut b) = (DistributedVector::new(), DistributedVector::new());
        let p = Arc::new(SerialPattern::new(1));
        m.create(p.clone(), 1, &[], &[0, 0], &mut x, &mut b).unwrap();
        assert!(matches!(m.create(p, 1, &[], &[0, 0], &mut x, &mut b), Err(LssError::AlreadyCreated(_))));
        assert!(m.set_options(SolverOptions::default()).is_err());
        m.destroy();
        assert!(!m.is_created());
    }
}
