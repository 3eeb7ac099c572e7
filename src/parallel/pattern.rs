//! Ownership classification and ghost exchange for distributed block rows.
//!
//! Every process numbers its block rows locally, `0..local_size()`. Some of
//! them are owned by the process, the others are ghosts: copies of rows owned
//! elsewhere. A [`CommPattern`] answers which is which, and refreshes ghost
//! values from their owners with one collective call. Global numbering exists
//! only inside the pattern; the matrix layer never indexes with it.

use std::collections::HashSet;

use crate::error::LssError;
use crate::parallel::Comm;

/// Owner of a local block index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    /// Ghost copy of a row owned by the given rank.
    Ghost(usize),
}

pub trait CommPattern {
    fn rank(&self) -> usize;
    fn nprocs(&self) -> usize;
    /// Number of local block indices, owned and ghost.
    fn local_size(&self) -> usize;
    fn classify(&self, local: usize) -> Ownership;
    fn global_index(&self, local: usize) -> usize;
    /// Overwrite the ghost entries of `buffer` (`stride` values per local
    /// index) with the values held by their owners. Collective.
    fn exchange(&self, buffer: &mut [f64], stride: usize);
    /// Sum of `x` over all processes.
    fn all_reduce(&self, x: f64) -> f64;

    fn is_owned(&self, local: usize) -> bool {
        self.classify(local) == Ownership::Owned
    }

    fn owned_count(&self) -> usize {
        (0..self.local_size()).filter(|&i| self.is_owned(i)).count()
    }
}

/// Single-process pattern: every local index is owned.
#[derive(Clone, Debug)]
pub struct SerialPattern {
    size: usize,
}

impl SerialPattern {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl CommPattern for SerialPattern {
    fn rank(&self) -> usize {
        0
    }
    fn nprocs(&self) -> usize {
        1
    }
    fn local_size(&self) -> usize {
        self.size
    }
    fn classify(&self, _local: usize) -> Ownership {
        Ownership::Owned
    }
    fn global_index(&self, local: usize) -> usize {
        local
    }
    fn exchange(&self, buffer: &mut [f64], stride: usize) {
        debug_assert_eq!(buffer.len(), self.size * stride);
    }
    fn all_reduce(&self, x: f64) -> f64 {
        x
    }
}

/// Pattern given by an explicit owner table.
///
/// Each global index must be owned by exactly one process. The exchange
/// scatters owned values into a global-length buffer and sums it over all
/// processes, so it costs O(global size) per call.
pub struct PartitionedPattern<C: Comm> {
    comm: C,
    global_ids: Vec<usize>,
    owners: Vec<usize>,
    global_size: usize,
}

impl<C: Comm> PartitionedPattern<C> {
    pub fn new(
        comm: C,
        global_ids: Vec<usize>,
        owners: Vec<usize>,
        global_size: usize,
    ) -> Result<Self, LssError> {
        if global_ids.len() != owners.len() {
            return Err(LssError::DimensionMismatch { expected: global_ids.len(), found: owners.len() });
        }
        let mut seen = HashSet::with_capacity(global_ids.len());
        for (local, &g) in global_ids.iter().enumerate() {
            if g >= global_size {
                return Err(LssError::IndexOutOfRange(format!(
                    "global index {g} of local row {local} (global size {global_size})"
                )));
            }
            if !seen.insert(g) {
                return Err(LssError::PartitionMismatch(format!("global index {g} appears twice")));
            }
        }
        let nprocs = comm.size();
        if let Some(&bad) = owners.iter().find(|&&r| r >= nprocs) {
            return Err(LssError::PartitionMismatch(format!(
                "owner rank {bad} outside communicator of size {nprocs}"
            )));
        }
        Ok(Self { comm, global_ids, owners, global_size })
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn global_size(&self) -> usize {
        self.global_size
    }
}

impl<C: Comm> CommPattern for PartitionedPattern<C> {
    fn rank(&self) -> usize {
        self.comm.rank()
    }

    fn nprocs(&self) -> usize {
        self.comm.size()
    }

    fn local_size(&self) -> usize {
        self.global_ids.len()
    }

    fn classify(&self, local: usize) -> Ownership {
        let owner = self.owners[local];
        if owner == self.comm.rank() {
            Ownership::Owned
        } else {
            Ownership::Ghost(owner)
        }
    }

    fn global_index(&self, local: usize) -> usize {
        self.global_ids[local]
    }

    fn exchange(&self, buffer: &mut [f64], stride: usize) {
        debug_assert_eq!(buffer.len(), self.global_ids.len() * stride);
        let rank = self.comm.rank();
        let mut scratch = vec![0.0; self.global_size * stride];
        for (local, (&g, &owner)) in self.global_ids.iter().zip(&self.owners).enumerate() {
            if owner == rank {
                scratch[g * stride..(g + 1) * stride]
                    .copy_from_slice(&buffer[local * stride..(local + 1) * stride]);
            }
        }
        self.comm.all_reduce_sum(&mut scratch);
        for (local, (&g, &owner)) in self.global_ids.iter().zip(&self.owners).enumerate() {
            if owner != rank {
                buffer[local * stride..(local + 1) * stride]
                    .copy_from_slice(&scratch[g * stride..(g + 1) * stride]);
            }
        }
    }

    fn all_reduce(&self, x: f64) -> f64 {
        self.comm.all_reduce(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;

    #[test]
    fn serial_pattern_owns_everything() {
        let p = SerialPattern::new(4);
        assert_eq!(p.local_size(), 4);
        assert_eq!(p.owned_count(), 4);
        assert_eq!(p.classify(3), Ownership::Owned);
        assert_eq!(p.global_index(2), 2);
    }

    #[test]
    fn partitioned_pattern_maps_global_ids() {
        let p = PartitionedPattern::new(SerialComm, vec![2, 0, 1], vec![0, 0, 0], 3).unwrap();
        assert_eq!(p.global_index(0), 2);
        assert_eq!(p.owned_count(), 3);
        let mut buf = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        p.exchange(&mut buf, 2);
        assert_eq!(buf, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn partitioned_pattern_rejects_bad_tables() {
        assert!(matches!(
            PartitionedPattern::new(SerialComm, vec![0, 1], vec![0, 1], 2),
            Err(LssError::PartitionMismatch(_))
        ));
        assert!(matches!(
            PartitionedPattern::new(SerialComm, vec![0, 5], vec![0, 0], 2),
            Err(LssError::IndexOutOfRange(_))
        ));
        assert!(matches!(
            PartitionedPattern::new(SerialComm, vec![1, 1], vec![0, 0], 2),
            Err(LssError::PartitionMismatch(_))
        ));
    }
}
