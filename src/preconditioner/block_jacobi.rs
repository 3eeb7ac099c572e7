// Block-Jacobi preconditioner implementation

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::core::traits::BlockDiagonal;
use crate::error::LssError;
use crate::preconditioner::Preconditioner;

/// Block-Jacobi preconditioner: exact LU of every diagonal block.
#[derive(Default)]
pub struct BlockJacobi {
    block_size: usize,
    factors: Vec<FullPivLu<f64>>,
}

impl BlockJacobi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nblocks(&self) -> usize {
        self.factors.len()
    }
}

impl<M, V> Preconditioner<M, V> for BlockJacobi
where
    M: BlockDiagonal<f64>,
    V: AsRef<[f64]> + AsMut<[f64]>,
{
    /// Setup: factor each block
    fn setup(&mut self, a: &M) -> Result<(), LssError> {
        let bs = a.block_size();
        let blocks = a.diagonal_blocks();
        self.block_size = bs;
        self.factors = blocks
            .chunks_exact(bs * bs)
            .map(|b| {
                let m = Mat::from_fn(bs, bs, |i, j| b[i * bs + j]);
                FullPivLu::new(m.as_ref())
            })
            .collect();
        Ok(())
    }

    /// Apply: z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), LssError> {
        let bs = self.block_size;
        let (r, z) = (r.as_ref(), z.as_mut());
        let n = self.factors.len() * bs;
        if r.len() != n || z.len() != n {
            return Err(LssError::DimensionMismatch { expected: n, found: r.len() });
        }
        z.copy_from_slice(r);
        for (k, (lu, zb)) in self.factors.iter().zip(z.chunks_exact_mut(bs)).enumerate() {
            lu.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(zb, bs, 1));
            if zb.iter().any(|v| !v.is_finite()) {
                return Err(LssError::ZeroPivot(k * bs));
            }
        }
        Ok(())
    }
}
