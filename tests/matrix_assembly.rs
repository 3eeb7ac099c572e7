//! Assembly tests for the block-sparse matrix.
//!
//! Element batches are scattered through `BlockAccumulator` on a 1D mesh and
//! the result is compared with a dense assembly of the same elements.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use faer::Mat;
use lssys::{
    BlockAccumulator, DistributedMatrix, DistributedVector, LssError, PartitionedPattern, SerialComm, SerialPattern,
    SolverOptions, ToDense,
};
use rand::Rng;

/// Node connectivity of a 1D chain: each node couples to its neighbours.
fn chain_connectivity(n: usize) -> (Vec<usize>, Vec<usize>) {
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
    (conn, start)
}

fn chain_matrix(n: usize, neq: usize) -> (DistributedMatrix<SerialPattern>, DistributedVector<SerialPattern>, DistributedVector<SerialPattern>) {
    let (conn, start) = chain_connectivity(n);
    let mut m = DistributedMatrix::new(SolverOptions::default());
    let mut x = DistributedVector::new();
    let mut b = DistributedVector::new();
    m.create(Arc::new(SerialPattern::new(n)), neq, &conn, &start, &mut x, &mut b).unwrap();
    (m, x, b)
}

#[test]
fn element_assembly_matches_dense_reference() {
    let (n, neq) = (6, 2);
    let (mut m, _, _) = chain_matrix(n, neq);
    let mut rng = rand::thread_rng();
    let size = n * neq;
    let mut reference = Mat::<f64>::zeros(size, size);
    let mut acc = BlockAccumulator::new(2, neq);
    for e in 0..n - 1 {
        acc.neighbour_indices(&[e, e + 1]);
        for v in acc.mat.iter_mut() {
            *v = rng.gen_range(-1.0..1.0);
        }
        m.add_values(&acc).unwrap();
        for (_, _, i, j) in acc.entries() {
            for ieq in 0..neq {
                for jeq in 0..neq {
                    let (r, c) = (acc.indices[i] * neq + ieq, acc.indices[j] * neq + jeq);
                    reference[(r, c)] += acc.value(i, ieq, j, jeq);
                }
            }
        }
    }
    let dense = m.operator().unwrap().to_dense().unwrap();
    for r in 0..size {
        for c in 0..size {
            assert_abs_diff_eq!(dense[(r, c)], reference[(r, c)], epsilon = 1e-14);
            if let Ok(v) = m.get_value(c, r) {
                assert_abs_diff_eq!(v, reference[(r, c)], epsilon = 1e-14);
            }
        }
    }
}

#[test]
fn set_values_overwrites_and_get_values_reads_back() {
    let (mut m, _, _) = chain_matrix(3, 2);
    let mut acc = BlockAccumulator::new(2, 2);
    acc.neighbour_indices(&[2, 1]);
    acc.reset(1.0);
    m.add_values(&acc).unwrap();
    m.add_values(&acc).unwrap();
    assert_eq!(m.get_value(2, 5).unwrap(), 2.0);

    acc.set_block(0, 1, &[5.0, 6.0, 7.0, 8.0]);
    m.set_values(&acc).unwrap();
    // block (2, 1): scalar rows 4..6, columns 2..4
    assert_eq!(m.get_value(2, 4).unwrap(), 5.0);
    assert_eq!(m.get_value(3, 5).unwrap(), 8.0);
    assert_eq!(m.get_value(5, 5).unwrap(), 1.0);

    let mut back = BlockAccumulator::new(2, 2);
    back.neighbour_indices(&[2, 1]);
    m.get_values(&mut back).unwrap();
    assert_eq!(back.block(0, 1), vec![5.0, 6.0, 7.0, 8.0]);
    assert_eq!(back.mat, acc.mat);
}

#[test]
fn accumulator_with_wrong_neq_is_rejected() {
    let (mut m, _, _) = chain_matrix(3, 2);
    let mut acc = BlockAccumulator::new(2, 3);
    acc.neighbour_indices(&[0, 1]);
    assert!(matches!(m.add_values(&acc), Err(LssError::DimensionMismatch { .. })));
}

#[test]
fn sparsity_always_contains_the_diagonal() {
    // node 1 lists nobody, node 0 lists only node 2
    let mut m: DistributedMatrix<SerialPattern> = DistributedMatrix::default();
    let (mut x, mut b) = (DistributedVector::new(), DistributedVector::new());
    m.create(Arc::new(SerialPattern::new(3)), 1, &[2, 0], &[0, 1, 1, 2], &mut x, &mut b).unwrap();
    for r in 0..3 {
        m.set_value(r, r, 1.0).unwrap();
    }
    assert_eq!(m.sparsity().unwrap().nnz(), 5);
    assert!(m.set_value(1, 0, 1.0).is_err());
    assert_eq!(m.get_diagonal().unwrap(), vec![1.0; 3]);
}

#[test]
fn print_lists_every_stored_entry() {
    let (mut m, _, _) = chain_matrix(3, 2);
    m.set_value(1, 0, 2.5).unwrap();
    let mut out = Vec::new();
    m.print(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with('#'));
    let entries: Vec<&str> = lines.collect();
    assert_eq!(entries.len(), 7 * 4);
    assert!(entries.contains(&"0 1 2.5e0"));
}

#[test]
fn operations_before_create_fail() {
    let mut m: DistributedMatrix<SerialPattern> = DistributedMatrix::default();
    assert!(!m.is_created());
    assert!(matches!(m.set_value(0, 0, 1.0), Err(LssError::NotCreated(_))));
    assert!(matches!(m.reset(0.0), Err(LssError::NotCreated(_))));
    assert!(matches!(m.tie_blockrow_pairs(0, 1), Err(LssError::NotCreated(_))));
    let mut sink = Vec::new();
    assert!(m.print(&mut sink).is_err());
}

#[test]
fn solve_requires_vectors_from_the_same_partition() {
    let (m, _, b) = chain_matrix(3, 1);
    let mut foreign = DistributedVector::new();
    foreign.create(Arc::new(SerialPattern::new(3)), 1).unwrap();
    assert!(matches!(m.solve(&mut foreign, &b), Err(LssError::PartitionMismatch(_))));
}

#[test]
fn partitioned_pattern_on_one_process() {
    let n = 4;
    let (conn, start) = chain_connectivity(n);
    // local numbering is a permutation of the global one
    let pattern = PartitionedPattern::new(SerialComm, vec![3, 1, 0, 2], vec![0; n], n).unwrap();
    let mut m = DistributedMatrix::default();
    let (mut x, mut b) = (DistributedVector::new(), DistributedVector::new());
    m.create(Arc::new(pattern), 1, &conn, &start, &mut x, &mut b).unwrap();
    for r in 0..n {
        for (c, _) in m.get_row(r, 0).unwrap() {
            m.set_value(c, r, if c == r { 4.0 } else { -1.0 }).unwrap();
        }
        b.set_value(r, 1.0).unwrap();
    }
    m.solve(&mut x, &b).unwrap();
    let op = m.operator().unwrap();
    let mut ax = vec![0.0; n];
    lssys::MatVec::matvec(&op, &x.as_slice().unwrap().to_vec(), &mut ax);
    for v in ax {
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-6);
    }
}
