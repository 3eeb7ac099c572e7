//! Per-element batch of block contributions.
//!
//! An element visit fills one [`BlockAccumulator`]: the local block indices
//! of the element's nodes, a dense `(n·neq)×(n·neq)` matrix, and `n·neq`
//! right-hand-side and solution entries. Dense row `i·neq + ieq` and column
//! `j·neq + jeq` hold equation `(ieq, jeq)` of block `(indices[i], indices[j])`.
//! Nothing is validated here; the matrix checks indices when it consumes the
//! batch.

#[derive(Clone, Debug, Default)]
pub struct BlockAccumulator {
    /// Local block index of every node of the element.
    pub indices: Vec<usize>,
    /// Row-major dense block matrix.
    pub mat: Vec<f64>,
    pub rhs: Vec<f64>,
    pub sol: Vec<f64>,
    neq: usize,
}

impl BlockAccumulator {
    pub fn new(nb_nodes: usize, neq: usize) -> Self {
        let mut acc = Self::default();
        acc.resize(nb_nodes, neq);
        acc
    }

    /// Resize for `nb_nodes` nodes and `neq` equations, zeroing all values.
    pub fn resize(&mut self, nb_nodes: usize, neq: usize) {
        let n = nb_nodes * neq;
        self.neq = neq;
        self.indices.clear();
        self.indices.resize(nb_nodes, 0);
        self.mat.clear();
        self.mat.resize(n * n, 0.0);
        self.rhs.clear();
        self.rhs.resize(n, 0.0);
        self.sol.clear();
        self.sol.resize(n, 0.0);
    }

    /// Fill matrix, rhs and solution with `value`; indices are kept.
    pub fn reset(&mut self, value: f64) {
        self.mat.fill(value);
        self.rhs.fill(value);
        self.sol.fill(value);
    }

    /// Set the node indices, resizing when the node count changes.
    pub fn neighbour_indices(&mut self, indices: &[usize]) {
        if indices.len() != self.indices.len() {
            self.resize(indices.len(), self.neq);
        }
        self.indices.copy_from_slice(indices);
    }

    pub fn nb_nodes(&self) -> usize {
        self.indices.len()
    }

    pub fn neq(&self) -> usize {
        self.neq
    }

    /// Edge length of the dense matrix.
    pub fn size(&self) -> usize {
        self.indices.len() * self.neq
    }

    #[inline]
    pub fn mat_index(&self, i: usize, ieq: usize, j: usize, jeq: usize) -> usize {
        (i * self.neq + ieq) * self.size() + j * self.neq + jeq
    }

    pub fn value(&self, i: usize, ieq: usize, j: usize, jeq: usize) -> f64 {
        self.mat[self.mat_index(i, ieq, j, jeq)]
    }

    pub fn set_value(&mut self, i: usize, ieq: usize, j: usize, jeq: usize, value: f64) {
        let k = self.mat_index(i, ieq, j, jeq);
        self.mat[k] = value;
    }

    pub fn add_value(&mut self, i: usize, ieq: usize, j: usize, jeq: usize, value: f64) {
        let k = self.mat_index(i, ieq, j, jeq);
        self.mat[k] += value;
    }

    /// Overwrite the `neq×neq` block coupling node `i` to node `j` (row-major `block`).
    pub fn set_block(&mut self, i: usize, j: usize, block: &[f64]) {
        let neq = self.neq;
        debug_assert_eq!(block.len(), neq * neq);
        for ieq in 0..neq {
            let k = self.mat_index(i, ieq, j, 0);
            self.mat[k..k + neq].copy_from_slice(&block[ieq * neq..(ieq + 1) * neq]);
        }
    }

    pub fn add_block(&mut self, i: usize, j: usize, block: &[f64]) {
        let neq = self.neq;
        debug_assert_eq!(block.len(), neq * neq);
        for ieq in 0..neq {
            let k = self.mat_index(i, ieq, j, 0);
            for (m, b) in self.mat[k..k + neq].iter_mut().zip(&block[ieq * neq..(ieq + 1) * neq]) {
                *m += b;
            }
        }
    }

    /// Copy of the block coupling node `i` to node `j`.
    pub fn block(&self, i: usize, j: usize) -> Vec<f64> {
        let neq = self.neq;
        let mut out = Vec::with_capacity(neq * neq);
        for ieq in 0..neq {
            let k = self.mat_index(i, ieq, j, 0);
            out.extend_from_slice(&self.mat[k..k + neq]);
        }
        out
    }

    /// `(row_block, col_block, i, j)` for every node pair, rows major.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, usize, usize)> + '_ {
        let n = self.indices.len();
        (0..n).flat_map(move |i| (0..n).map(move |j| (self.indices[i], self.indices[j], i, j)))
    }
}
