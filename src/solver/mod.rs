//! Krylov & direct solver interfaces.

use crate::core::traits::MatVec;
use crate::preconditioner::Preconditioner;
use crate::utils::convergence::SolveStats;

/// Common interface for any direct or iterative solver.
pub trait LinearSolver<M, V> {
    type Error;
    type Scalar: Copy + PartialOrd + From<f64>;
    /// Solve A·x = b, writing result into `x`; `x` holds the initial guess on entry.
    /// Returns iteration stats (including convergence info).
    fn solve(
        &mut self,
        a: &M,
        pc: Option<&dyn Preconditioner<M, V>>,
        b: &V,
        x: &mut V,
    ) -> Result<SolveStats<Self::Scalar>, Self::Error>;
}

/// r = b - A x
pub(crate) fn residual<M, V, T>(a: &M, b: &V, x: &V) -> V
where
    M: MatVec<V>,
    V: AsRef<[T]> + From<Vec<T>>,
    T: num_traits::Float,
{
    let n = b.as_ref().len();
    let mut ax = V::from(vec![T::zero(); n]);
    a.matvec(x, &mut ax);
    V::from(ax.as_ref().iter().zip(b.as_ref()).map(|(&axi, &bi)| bi - axi).collect())
}

/// z = M⁻¹ r, or a copy of r without preconditioner.
pub(crate) fn precondition<M, V: Clone>(
    pc: Option<&dyn Preconditioner<M, V>>,
    r: &V,
    z: &mut V,
) -> Result<(), crate::error::LssError> {
    match pc {
        Some(pc) => pc.apply(r, z),
        None => {
            z.clone_from(r);
            Ok(())
        }
    }
}

pub mod direct_lu;
pub use direct_lu::LuSolver;

pub mod pcg;
pub use pcg::PcgSolver;

pub mod gmres;
pub use gmres::GmresSolver;

pub mod bicgstab;
pub use bicgstab::BiCgStabSolver;
