//! Preconditioned BiCGStab solver (Saad §7.1), right preconditioning.

use log::{debug, trace};

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::LssError;
use crate::preconditioner::Preconditioner;
use crate::solver::{LinearSolver, precondition, residual};
use crate::utils::convergence::{Convergence, SolveStats};

pub struct BiCgStabSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: num_traits::Float> BiCgStabSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence { tol, max_iters } }
    }
}

impl<M, V, T> LinearSolver<M, V> for BiCgStabSolver<T>
where
    M: MatVec<V> + InnerProduct<V, Scalar = T>,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: num_traits::Float + From<f64> + std::fmt::LowerExp,
{
    type Error = LssError;
    type Scalar = T;

    fn solve(&mut self, a: &M, pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<T>, LssError> {
        let n = b.as_ref().len();
        let zeros = || V::from(vec![T::zero(); n]);
        // r0 = b - A x0
        let mut r = residual(a, b, x);
        let r_hat = r.clone(); // shadow residual
        let res0 = a.norm(&r);
        let mut stats = SolveStats { iterations: 0, final_residual: res0, converged: res0 == T::zero() };
        if stats.converged {
            return Ok(stats);
        }
        // breakdown thresholds scale with the shadow residual
        let tiny = T::epsilon() * res0;
        let mut rho_prev = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();
        let mut v = zeros();
        let mut p = zeros();
        let mut p_hat = zeros();
        let mut s_hat = zeros();
        let mut t = zeros();
        for i in 1..=self.conv.max_iters {
            let rho = a.dot(&r_hat, &r);
            if rho.abs() < tiny * tiny {
                debug!("bicgstab breakdown: rho = {rho:e}");
                break;
            }
            let beta = (rho / rho_prev) * (alpha / omega);
            // p = r + beta * (p - omega * v)
            for ((pj, rj), vj) in p.as_mut().iter_mut().zip(r.as_ref()).zip(v.as_ref()) {
                *pj = *rj + beta * (*pj - omega * *vj);
            }
            precondition(pc, &p, &mut p_hat)?;
            a.matvec(&p_hat, &mut v);
            let alpha_den = a.dot(&r_hat, &v);
            if alpha_den.abs() < tiny * tiny {
                debug!("bicgstab breakdown: (r_hat, v) = {alpha_den:e}");
                break;
            }
            alpha = rho / alpha_den;
            // s = r - alpha * v, kept in r
            for (rj, vj) in r.as_mut().iter_mut().zip(v.as_ref()) {
                *rj = *rj - alpha * *vj;
            }
            for (xj, pj) in x.as_mut().iter_mut().zip(p_hat.as_ref()) {
                *xj = *xj + alpha * *pj;
            }
            let s_norm = a.norm(&r);
            let (stop, s) = self.conv.check(s_norm, res0, i);
            stats = s;
            if stats.converged {
                return Ok(stats);
            }
            precondition(pc, &r, &mut s_hat)?;
            a.matvec(&s_hat, &mut t);
            let tt = a.dot(&t, &t);
            if tt == T::zero() {
                debug!("bicgstab breakdown: A s = 0");
                break;
            }
            omega = a.dot(&t, &r) / tt;
            for (xj, sj) in x.as_mut().iter_mut().zip(s_hat.as_ref()) {
                *xj = *xj + omega * *sj;
            }
            // r = s - omega * t
            for (rj, tj) in r.as_mut().iter_mut().zip(t.as_ref()) {
                *rj = *rj - omega * *tj;
            }
            let r_norm = a.norm(&r);
            trace!("bicgstab {i}: residual {r_norm:e}");
            let (stop_r, s) = self.conv.check(r_norm, res0, i);
            stats = s;
            if stop || stop_r {
                break;
            }
            if omega == T::zero() {
                debug!("bicgstab breakdown: omega = 0");
                break;
            }
            rho_prev = rho;
        }
        Ok(stats)
    }
}
