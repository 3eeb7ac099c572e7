use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lssys::{BlockAccumulator, LinearSystem, SerialPattern, SolverOptions};

/// Structured 2D grid, 4-neighbour connectivity.
fn grid(nx: usize, ny: usize) -> (Vec<usize>, Vec<usize>) {
    let mut conn = Vec::new();
    let mut start = vec![0];
    for j in 0..ny {
        for i in 0..nx {
            let node = j * nx + i;
            if i > 0 {
                conn.push(node - 1);
            }
            if i + 1 < nx {
                conn.push(node + 1);
            }
            if j > 0 {
                conn.push(node - nx);
            }
            if j + 1 < ny {
                conn.push(node + nx);
            }
            start.push(conn.len());
        }
    }
    (conn, start)
}

fn bench_assembly(c: &mut Criterion) {
    let (nx, ny, neq) = (64, 64, 4);
    let (conn, start) = grid(nx, ny);
    let mut sys = LinearSystem::new(SolverOptions::default());
    sys.create(Arc::new(SerialPattern::new(nx * ny)), neq, &conn, &start).unwrap();
    let edges: Vec<(usize, usize)> = (0..nx * ny)
        .flat_map(|n| conn[start[n]..start[n + 1]].iter().filter(move |&&m| m > n).map(move |&m| (n, m)))
        .collect();
    let mut acc = BlockAccumulator::new(2, neq);
    for (k, v) in acc.mat.iter_mut().enumerate() {
        *v = (k as f64).sin();
    }

    c.bench_function("assembly: block accumulator", |b| {
        b.iter(|| {
            for &(n, m) in &edges {
                acc.neighbour_indices(&[n, m]);
                sys.add_values(black_box(&acc)).unwrap();
            }
        })
    });

    c.bench_function("assembly: scalar entries", |b| {
        b.iter(|| {
            let matrix = sys.matrix_mut();
            for &(n, m) in &edges {
                for (i, bi) in [n, m].into_iter().enumerate() {
                    for (j, bj) in [n, m].into_iter().enumerate() {
                        for ieq in 0..neq {
                            for jeq in 0..neq {
                                let v = acc.value(i, ieq, j, jeq);
                                matrix.add_value(bj * neq + jeq, bi * neq + ieq, black_box(v)).unwrap();
                            }
                        }
                    }
                }
            }
        })
    });
}

criterion_group!(benches, bench_assembly);
criterion_main!(benches);
