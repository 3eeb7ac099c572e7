//! Generalized Minimal Residual (GMRES) solver with fixed restart (Saad §6.4)
//!
//! Restarted GMRES for nonsymmetric systems, right preconditioned: Arnoldi
//! runs on `A M⁻¹` and the correction is built from the preconditioned basis
//! `z_j = M⁻¹ v_j`, so the monitored residual is the true residual of the
//! original system. Arnoldi uses modified Gram-Schmidt with one
//! reorthogonalization pass; the Hessenberg least-squares problem is reduced
//! with Givens rotations as columns arrive.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §6.4, §9.3.2

use log::{debug, trace};
use num_traits::Float;

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::LssError;
use crate::preconditioner::Preconditioner;
use crate::solver::{LinearSolver, precondition, residual};
use crate::utils::convergence::{Convergence, SolveStats};

/// GMRES solver struct with restart length.
///
/// # Type Parameters
/// * `T` - Scalar type (e.g., f32, f64)
pub struct GmresSolver<T> {
    /// Number of Arnoldi vectors before restart
    pub restart: usize,
    /// Convergence criteria (tolerance and max iterations)
    pub conv: Convergence<T>,
}

impl<T: Copy + Float> GmresSolver<T> {
    /// Create a new GMRES solver with restart, tolerance, and max iterations.
    pub fn new(restart: usize, tol: T, max_iters: usize) -> Self {
        Self { restart: restart.max(1), conv: Convergence { tol, max_iters } }
    }

    /// Apply previous Givens rotations to column `j` of `h`, build the new
    /// rotation and update `g`.
    fn apply_givens_and_update_g(h: &mut [Vec<T>], g: &mut [T], cs: &mut [T], sn: &mut [T], j: usize) {
        for i in 0..j {
            let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
            h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
            h[i][j] = temp;
        }
        let h_kk = h[j][j];
        let h_k1k = h[j + 1][j];
        let r = h_kk.hypot(h_k1k);
        if r == T::zero() {
            cs[j] = T::one();
            sn[j] = T::zero();
        } else {
            cs[j] = h_kk / r;
            sn[j] = h_k1k / r;
        }
        h[j][j] = cs[j] * h_kk + sn[j] * h_k1k;
        h[j + 1][j] = T::zero();
        let temp = cs[j] * g[j] + sn[j] * g[j + 1];
        g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
        g[j] = temp;
    }

    /// Solve upper-triangular system Hy = g for y, with zero-pivot protection.
    fn back_substitution(h: &[Vec<T>], g: &[T], m: usize) -> Vec<T> {
        let mut y = vec![T::zero(); m];
        for i in (0..m).rev() {
            let mut acc = g[i];
            for j in (i + 1)..m {
                acc = acc - h[i][j] * y[j];
            }
            y[i] = if h[i][i] != T::zero() { acc / h[i][i] } else { T::zero() };
        }
        y
    }
}

impl<M, V, T> LinearSolver<M, V> for GmresSolver<T>
where
    M: MatVec<V> + InnerProduct<V, Scalar = T>,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: Float + From<f64> + std::fmt::LowerExp,
{
    type Error = LssError;
    type Scalar = T;

    /// Solve the linear system Ax = b using restarted GMRES.
    ///
    /// Returns `Ok` with `converged == false` when the iteration cap is hit.
    fn solve(&mut self, a: &M, pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<T>, LssError> {
        let n = b.as_ref().len();
        let restart = self.restart;
        let mut r = residual(a, b, x);
        let mut beta = a.norm(&r);
        let res0 = beta;
        let mut stats = SolveStats { iterations: 0, final_residual: beta, converged: beta == T::zero() };
        if stats.converged {
            return Ok(stats);
        }
        let breakdown = T::epsilon() * res0;
        let mut iteration = 0;
        while iteration < self.conv.max_iters {
            let mut v_basis: Vec<V> = Vec::with_capacity(restart + 1);
            let mut z_basis: Vec<V> = Vec::with_capacity(restart);
            v_basis.push(V::from(r.as_ref().iter().map(|&ri| ri / beta).collect::<Vec<_>>()));
            let mut h = vec![vec![T::zero(); restart]; restart + 1];
            let mut g = vec![T::zero(); restart + 1];
            g[0] = beta;
            let mut cs = vec![T::zero(); restart];
            let mut sn = vec![T::zero(); restart];
            let mut m = 0;
            for j in 0..restart {
                iteration += 1;
                let mut z = V::from(vec![T::zero(); n]);
                precondition(pc, &v_basis[j], &mut z)?;
                let mut w = V::from(vec![T::zero(); n]);
                a.matvec(&z, &mut w);
                z_basis.push(z);
                // Modified Gram-Schmidt, then one refinement pass
                for pass in 0..2 {
                    for i in 0..=j {
                        let hij = a.dot(&w, &v_basis[i]);
                        h[i][j] = if pass == 0 { hij } else { h[i][j] + hij };
                        for (wk, vik) in w.as_mut().iter_mut().zip(v_basis[i].as_ref()) {
                            *wk = *wk - hij * *vik;
                        }
                    }
                }
                h[j + 1][j] = a.norm(&w);
                let happy = h[j + 1][j] <= breakdown;
                if !happy {
                    let hn = h[j + 1][j];
                    v_basis.push(V::from(w.as_ref().iter().map(|&wi| wi / hn).collect::<Vec<_>>()));
                }
                Self::apply_givens_and_update_g(&mut h, &mut g, &mut cs, &mut sn, j);
                m = j + 1;
                let res_norm = g[j + 1].abs();
                trace!("gmres {iteration}: estimated residual {res_norm:e}");
                let (stop, s) = self.conv.check(res_norm, res0, iteration);
                stats = s;
                if happy {
                    debug!("gmres happy breakdown at iteration {iteration}");
                }
                if stop || happy {
                    break;
                }
            }
            // x = x + Z y
            let y = Self::back_substitution(&h, &g, m);
            for (yj, zj) in y.iter().zip(&z_basis) {
                for (xi, zji) in x.as_mut().iter_mut().zip(zj.as_ref()) {
                    *xi = *xi + *yj * *zji;
                }
            }
            // true residual decides convergence
            r = residual(a, b, x);
            beta = a.norm(&r);
            stats.final_residual = beta;
            stats.converged = beta <= self.conv.tol * res0;
            if stats.converged || beta == T::zero() {
                break;
            }
            debug!("gmres restart after {iteration} iterations, residual {beta:e}");
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::Jacobi;
    use approx::assert_abs_diff_eq;
    use faer::Mat;

    fn tridiag(n: usize) -> Mat<f64> {
        Mat::from_fn(n, n, |i, j| {
            if i == j {
                4.0
            } else if j == i + 1 {
                -1.5
            } else if i == j + 1 {
                -0.5
            } else {
                0.0
            }
        })
    }

    #[test]
    fn restarted_gmres_matches_known_solution() {
        let n = 12;
        let a = tridiag(n);
        let x_true: Vec<f64> = (0..n).map(|i| (i as f64).sin() + 1.0).collect();
        let mut b = vec![0.0; n];
        a.matvec(&x_true, &mut b);
        let mut x = vec![0.0; n];
        let stats = GmresSolver::new(4, 1e-12, 200).solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged, "{stats:?}");
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_abs_diff_eq!(*xi, *ti, epsilon = 1e-9);
        }
    }

    #[test]
    fn right_preconditioned_gmres_converges() {
        let n = 8;
        let a = Mat::from_fn(n, n, |i, j| if i == j { (i + 2) as f64 * 3.0 } else { 1.0 / (1.0 + (i + j) as f64) });
        let b = vec![1.0; n];
        let mut pc = Jacobi::new();
        <Jacobi<f64> as Preconditioner<Mat<f64>, Vec<f64>>>::setup(&mut pc, &a).unwrap();
        let pc: &dyn Preconditioner<Mat<f64>, Vec<f64>> = &pc;
        let mut x = vec![0.0; n];
        let stats = GmresSolver::new(30, 1e-10, 100).solve(&a, Some(pc), &b, &mut x).unwrap();
        assert!(stats.converged);
        let mut ax = vec![0.0; n];
        a.matvec(&x, &mut ax);
        for (axi, bi) in ax.iter().zip(&b) {
            assert_abs_diff_eq!(*axi, *bi, epsilon = 1e-8);
        }
    }

    #[test]
    fn iteration_cap_reports_no_convergence() {
        let a = tridiag(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];
        let stats = GmresSolver::new(2, 1e-14, 3).solve(&a, None, &b, &mut x).unwrap();
        assert!(!stats.converged);
        assert!(stats.iterations <= 3);
    }
}
