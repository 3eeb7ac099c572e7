//! Linear-operator view of a created block matrix.
//!
//! Solvers only see owned rows: ghost rows of the product are zero and ghost
//! entries are left out of inner products, so every process contributes its
//! owned part exactly once to the reductions.

use faer::Mat;

use crate::core::traits::{BlockDiagonal, Indexing, InnerProduct, MatVec, ToDense};
use crate::error::LssError;
use crate::matrix::block::MatrixState;
use crate::matrix::sparsity::BlockSparsity;
use crate::parallel::CommPattern;

pub struct DistributedOperator<'m, P: CommPattern> {
    state: &'m MatrixState<P>,
    owned: Vec<bool>,
}

impl<'m, P: CommPattern> DistributedOperator<'m, P> {
    pub(crate) fn new(state: &'m MatrixState<P>) -> Self {
        let owned = (0..state.sparsity.nrows()).map(|r| state.pattern.is_owned(r)).collect();
        Self { state, owned }
    }

    pub fn neq(&self) -> usize {
        self.state.neq
    }

    /// Zero the entries of ghost block rows.
    pub fn mask_ghosts(&self, v: &mut [f64]) {
        let neq = self.state.neq;
        for (chunk, &owned) in v.chunks_mut(neq).zip(&self.owned) {
            if !owned {
                chunk.fill(0.0);
            }
        }
    }

    /// `y = A·x` assuming the ghost entries of `x` are current.
    fn product(&self, x: &[f64], y: &mut [f64]) {
        let sparsity = &self.state.sparsity;
        let values = &self.state.values[..];
        let owned = &self.owned[..];
        let neq = self.state.neq;

        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            y.par_chunks_mut(neq)
                .enumerate()
                .for_each(|(r, yr)| row_product(sparsity, values, neq, owned[r], r, x, yr));
        }
        #[cfg(not(feature = "rayon"))]
        for (r, yr) in y.chunks_mut(neq).enumerate() {
            row_product(sparsity, values, neq, owned[r], r, x, yr);
        }
    }
}

fn row_product(
    sparsity: &BlockSparsity,
    values: &[f64],
    neq: usize,
    owned: bool,
    r: usize,
    x: &[f64],
    yr: &mut [f64],
) {
    yr.fill(0.0);
    if !owned {
        return;
    }
    let bs2 = neq * neq;
    for pos in sparsity.row(r) {
        let c = sparsity.col_of(pos);
        let xc = &x[c * neq..(c + 1) * neq];
        let block = &values[pos * bs2..(pos + 1) * bs2];
        for (yi, brow) in yr.iter_mut().zip(block.chunks_exact(neq)) {
            *yi += brow.iter().zip(xc).map(|(a, b)| a * b).sum::<f64>();
        }
    }
}

impl<P: CommPattern> MatVec<Vec<f64>> for DistributedOperator<'_, P> {
    fn matvec(&self, x: &Vec<f64>, y: &mut Vec<f64>) {
        if self.owned.iter().all(|&o| o) {
            self.product(x, y);
        } else {
            let mut xg = x.clone();
            self.state.pattern.exchange(&mut xg, self.state.neq);
            self.product(&xg, y);
        }
    }
}

impl<P: CommPattern> InnerProduct<Vec<f64>> for DistributedOperator<'_, P> {
    type Scalar = f64;

    fn dot(&self, x: &Vec<f64>, y: &Vec<f64>) -> f64 {
        let neq = self.state.neq;
        let local: f64 = x
            .chunks(neq)
            .zip(y.chunks(neq))
            .zip(&self.owned)
            .filter(|(_, owned)| **owned)
            .map(|((xa, ya), _)| xa.iter().zip(ya).map(|(a, b)| a * b).sum::<f64>())
            .sum();
        self.state.pattern.all_reduce(local)
    }

    fn norm(&self, x: &Vec<f64>) -> f64 {
        self.dot(x, x).sqrt()
    }
}

impl<P: CommPattern> Indexing for DistributedOperator<'_, P> {
    fn nrows(&self) -> usize {
        self.state.sparsity.nrows() * self.state.neq
    }
}

impl<P: CommPattern> BlockDiagonal<f64> for DistributedOperator<'_, P> {
    fn block_size(&self) -> usize {
        self.state.neq
    }

    /// Identity blocks stand in for ghost rows.
    fn diagonal_blocks(&self) -> Vec<f64> {
        let neq = self.state.neq;
        let bs2 = neq * neq;
        let mut blocks = Vec::with_capacity(self.owned.len() * bs2);
        for (r, &owned) in self.owned.iter().enumerate() {
            if owned {
                let pos = self.state.sparsity.diag(r);
                blocks.extend_from_slice(&self.state.values[pos * bs2..(pos + 1) * bs2]);
            } else {
                blocks.extend((0..bs2).map(|k| if k % (neq + 1) == 0 { 1.0 } else { 0.0 }));
            }
        }
        blocks
    }
}

impl<P: CommPattern> ToDense for DistributedOperator<'_, P> {
    fn to_dense(&self) -> Result<Mat<f64>, LssError> {
        if let Some(ghost) = self.owned.iter().position(|&o| !o) {
            return Err(LssError::PartitionMismatch(format!(
                "dense factorization needs every block row local, block row {ghost} is a ghost"
            )));
        }
        let neq = self.state.neq;
        let n = self.nrows();
        let sparsity = &self.state.sparsity;
        let mut dense = Mat::zeros(n, n);
        for r in 0..sparsity.nrows() {
            for pos in sparsity.row(r) {
                let c = sparsity.col_of(pos);
                for ieq in 0..neq {
                    for jeq in 0..neq {
                        dense[(r * neq + ieq, c * neq + jeq)] = self.state.values[(pos * neq + ieq) * neq + jeq];
                    }
                }
            }
        }
        Ok(dense)
    }
}
