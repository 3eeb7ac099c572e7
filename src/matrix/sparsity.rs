//! Block sparsity pattern built from node connectivity.
//!
//! Rows and columns are local block indices. Every row always holds its
//! diagonal block, whether or not the connectivity lists it. Column indices
//! are sorted within a row, so a block is found by binary search; a
//! transposed index (column → stored blocks) makes column sweeps cost the
//! column's degree instead of a scan over all rows.

use std::ops::Range;

use crate::error::LssError;

#[derive(Clone, Debug)]
pub struct BlockSparsity {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    diag: Vec<usize>,
    col_ptr: Vec<usize>,
    /// For each column, `(row, block position)` sorted by row.
    col_entries: Vec<(usize, usize)>,
}

impl BlockSparsity {
    /// Build from a CSR-style adjacency: the neighbours of block row `i` are
    /// `node_connectivity[starting_indices[i]..starting_indices[i + 1]]`.
    pub fn from_connectivity(
        nrows: usize,
        ncols: usize,
        node_connectivity: &[usize],
        starting_indices: &[usize],
    ) -> Result<Self, LssError> {
        if nrows > ncols {
            return Err(LssError::InvalidConnectivity(format!(
                "{nrows} block rows cannot have a diagonal with {ncols} block columns"
            )));
        }
        if starting_indices.len() != nrows + 1 {
            return Err(LssError::InvalidConnectivity(format!(
                "expected {} starting indices for {nrows} block rows, got {}",
                nrows + 1,
                starting_indices.len()
            )));
        }
        if starting_indices[0] != 0 || starting_indices[nrows] != node_connectivity.len() {
            return Err(LssError::InvalidConnectivity(format!(
                "starting indices must span 0..{}",
                node_connectivity.len()
            )));
        }
        if starting_indices.windows(2).any(|w| w[0] > w[1]) {
            return Err(LssError::InvalidConnectivity("starting indices must be non-decreasing".into()));
        }
        if let Some(&bad) = node_connectivity.iter().find(|&&c| c >= ncols) {
            return Err(LssError::IndexOutOfRange(format!(
                "connectivity references block column {bad} (block columns: {ncols})"
            )));
        }

        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::with_capacity(node_connectivity.len() + nrows);
        let mut diag = Vec::with_capacity(nrows);
        row_ptr.push(0);
        let mut cols = Vec::new();
        for i in 0..nrows {
            cols.clear();
            cols.extend_from_slice(&node_connectivity[starting_indices[i]..starting_indices[i + 1]]);
            cols.push(i);
            cols.sort_unstable();
            cols.dedup();
            let start = col_idx.len();
            // the diagonal was pushed above, the search cannot fail
            let d = cols.binary_search(&i).unwrap_or(0);
            diag.push(start + d);
            col_idx.extend_from_slice(&cols);
            row_ptr.push(col_idx.len());
        }

        // transposed index by counting sort; rows come out ascending
        let mut col_ptr = vec![0; ncols + 1];
        for &c in &col_idx {
            col_ptr[c + 1] += 1;
        }
        for c in 0..ncols {
            col_ptr[c + 1] += col_ptr[c];
        }
        let mut fill = col_ptr.clone();
        let mut col_entries = vec![(0, 0); col_idx.len()];
        for i in 0..nrows {
            for pos in row_ptr[i]..row_ptr[i + 1] {
                let c = col_idx[pos];
                col_entries[fill[c]] = (i, pos);
                fill[c] += 1;
            }
        }

        Ok(Self { nrows, ncols, row_ptr, col_idx, diag, col_ptr, col_entries })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored blocks.
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// Block positions of row `row`.
    pub fn row(&self, row: usize) -> Range<usize> {
        self.row_ptr[row]..self.row_ptr[row + 1]
    }

    pub fn row_cols(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row(row)]
    }

    pub fn col_of(&self, pos: usize) -> usize {
        self.col_idx[pos]
    }

    /// Position of the diagonal block of `row`.
    pub fn diag(&self, row: usize) -> usize {
        self.diag[row]
    }

    /// Position of block `(row, col)`, if stored.
    pub fn find(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.nrows {
            return None;
        }
        let start = self.row_ptr[row];
        self.row_cols(row).binary_search(&col).ok().map(|k| start + k)
    }

    /// `(row, position)` of every stored block in column `col`.
    pub fn col_entries(&self, col: usize) -> &[(usize, usize)] {
        &self.col_entries[self.col_ptr[col]..self.col_ptr[col + 1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 - 1 - 2 chain, diagonal omitted on purpose
    fn chain() -> BlockSparsity {
        BlockSparsity::from_connectivity(3, 3, &[1, 0, 2, 1], &[0, 1, 3, 4]).unwrap()
    }

    #[test]
    fn diagonal_is_always_present() {
        let s = chain();
        assert_eq!(s.nnz(), 7);
        for i in 0..3 {
            assert_eq!(s.col_of(s.diag(i)), i);
        }
        assert_eq!(s.row_cols(1), &[0, 1, 2]);
        assert_eq!(s.find(0, 2), None);
        assert_eq!(s.find(2, 1), Some(s.row(2).start));
    }

    #[test]
    fn column_index_matches_rows() {
        let s = chain();
        let rows: Vec<usize> = s.col_entries(1).iter().map(|&(r, _)| r).collect();
        assert_eq!(rows, vec![0, 1, 2]);
        for &(r, pos) in s.col_entries(2) {
            assert_eq!(s.find(r, 2), Some(pos));
        }
    }

    #[test]
    fn malformed_connectivity_is_rejected() {
        assert!(matches!(
            BlockSparsity::from_connectivity(2, 2, &[1], &[0, 1]),
            Err(LssError::InvalidConnectivity(_))
        ));
        assert!(matches!(
            BlockSparsity::from_connectivity(2, 2, &[1, 0], &[0, 2, 1]),
            Err(LssError::InvalidConnectivity(_))
        ));
        assert!(matches!(
            BlockSparsity::from_connectivity(2, 2, &[5, 0], &[0, 1, 2]),
            Err(LssError::IndexOutOfRange(_))
        ));
    }
}
