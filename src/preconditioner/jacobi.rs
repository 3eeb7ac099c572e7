// Jacobi preconditioner implementation

use crate::core::traits::BlockDiagonal;
use crate::error::LssError;
use crate::preconditioner::Preconditioner;
use num_traits::Float;

/// Jacobi preconditioner: M⁻¹ = D⁻¹
pub struct Jacobi<T> {
    pub(crate) inv_diag: Vec<T>,
}

impl<T: Float> Jacobi<T> {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new() }
    }
}

impl<T: Float> Default for Jacobi<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, V, T> Preconditioner<M, V> for Jacobi<T>
where
    M: BlockDiagonal<T>,
    V: AsRef<[T]> + AsMut<[T]>,
    T: Float,
{
    fn setup(&mut self, a: &M) -> Result<(), LssError> {
        let bs = a.block_size();
        let blocks = a.diagonal_blocks();
        // zero pivots are left unscaled
        self.inv_diag = blocks
            .chunks_exact(bs * bs)
            .flat_map(|b| (0..bs).map(move |k| b[k * bs + k]))
            .map(|d| if d != T::zero() { T::one() / d } else { T::zero() })
            .collect();
        Ok(())
    }

    fn apply(&self, x: &V, y: &mut V) -> Result<(), LssError> {
        let x_ref = x.as_ref();
        let y_mut = y.as_mut();
        if x_ref.len() != self.inv_diag.len() || y_mut.len() != self.inv_diag.len() {
            return Err(LssError::DimensionMismatch { expected: self.inv_diag.len(), found: x_ref.len() });
        }
        for ((yi, xi), di) in y_mut.iter_mut().zip(x_ref).zip(&self.inv_diag) {
            *yi = *di * *xi;
        }
        Ok(())
    }
}
