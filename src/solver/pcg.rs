//! Preconditioned Conjugate Gradient (PCG) per Saad §9.2

use log::trace;

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::LssError;
use crate::preconditioner::Preconditioner;
use crate::solver::{LinearSolver, precondition, residual};
use crate::utils::convergence::{Convergence, SolveStats};

pub struct PcgSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: Copy + num_traits::Float> PcgSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence { tol, max_iters } }
    }
}

impl<M, V, T> LinearSolver<M, V> for PcgSolver<T>
where
    M: MatVec<V> + InnerProduct<V, Scalar = T>,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: num_traits::Float + From<f64> + std::fmt::LowerExp,
{
    type Error = LssError;
    type Scalar = T;

    fn solve(&mut self, a: &M, pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<T>, LssError> {
        let n = b.as_ref().len();
        let mut r = residual(a, b, x);
        let res0 = a.norm(&r);
        let mut stats = SolveStats { iterations: 0, final_residual: res0, converged: res0 == T::zero() };
        if stats.converged {
            return Ok(stats);
        }
        let mut z = V::from(vec![T::zero(); n]);
        precondition(pc, &r, &mut z)?;
        let mut p = z.clone();
        let mut rz = a.dot(&r, &z);
        let mut ap = V::from(vec![T::zero(); n]);
        for i in 1..=self.conv.max_iters {
            a.matvec(&p, &mut ap);
            let p_dot_ap = a.dot(&p, &ap);
            // Indefinite-matrix detection
            if p_dot_ap <= T::zero() {
                return Err(LssError::IndefiniteMatrix);
            }
            let alpha = rz / p_dot_ap;
            for (xj, pj) in x.as_mut().iter_mut().zip(p.as_ref()) {
                *xj = *xj + alpha * *pj;
            }
            for (rj, apj) in r.as_mut().iter_mut().zip(ap.as_ref()) {
                *rj = *rj - alpha * *apj;
            }
            let res_norm = a.norm(&r);
            trace!("pcg {i}: residual {res_norm:e}");
            let (stop, s) = self.conv.check(res_norm, res0, i);
            stats = s;
            if stop {
                break;
            }
            precondition(pc, &r, &mut z)?;
            let rz_new = a.dot(&r, &z);
            let beta = rz_new / rz;
            for (pj, zj) in p.as_mut().iter_mut().zip(z.as_ref()) {
                *pj = *zj + beta * *pj;
            }
            rz = rz_new;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use faer::Mat;

    #[test]
    fn pcg_solves_spd_2x2() {
        // SPD system: [[4,1],[1,3]] x = [1,2]
        let a = Mat::from_fn(2, 2, |i, j| [[4.0, 1.0], [1.0, 3.0]][i][j]);
        let b = vec![1.0, 2.0];
        let mut x = vec![0.0, 0.0];
        let stats = PcgSolver::new(1e-10, 20).solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged, "PCG did not converge: {stats:?}");
        assert_abs_diff_eq!(x[0], 1.0 / 11.0, epsilon = 1e-8);
        assert_abs_diff_eq!(x[1], 7.0 / 11.0, epsilon = 1e-8);
    }

    #[test]
    fn pcg_rejects_indefinite() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { [1.0, -1.0][i] } else { 0.0 });
        let mut x = vec![0.0, 0.0];
        let res = PcgSolver::new(1e-10, 20).solve(&a, None, &vec![0.0, 1.0], &mut x);
        assert!(matches!(res, Err(LssError::IndefiniteMatrix)));
    }
}
