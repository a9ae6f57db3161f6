//! Forward-difference Jacobians.
//!
//! Used whenever a residual function has no analytic derivatives. The step for
//! column `j` is `sqrt(ε) * max(|p_j|, 1)`, which keeps truncation and rounding
//! error balanced for parameters of any magnitude.

use nalgebra::DMatrix;

/// Fill `jac` (`m × n`) with forward differences of `residual_fn` around `p`.
///
/// `r0` must hold `residual_fn(p)`. Returns the number of residual evaluations.
pub fn forward_difference<F>(p: &[f64], r0: &[f64], jac: &mut DMatrix<f64>, mut residual_fn: F) -> usize
where
    F: FnMut(&[f64], &mut [f64]),
{
    let m = r0.len();
    let n = p.len();
    let sqrt_eps = f64::EPSILON.sqrt();

    let mut p_work = p.to_vec();
    let mut r_work = vec![0.0; m];

    for j in 0..n {
        let h = sqrt_eps * p[j].abs().max(1.0);
        p_work[j] = p[j] + h;
        // The actual step may differ from `h` once rounded.
        let step = p_work[j] - p[j];
        residual_fn(&p_work, &mut r_work);
        for i in 0..m {
            jac[(i, j)] = (r_work[i] - r0[i]) / step;
        }
        p_work[j] = p[j];
    }

    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_linear_jacobian() {
        // r(p) = [2 p0 + p1, -p1, 3 p0]
        let residual = |p: &[f64], r: &mut [f64]| {
            r[0] = 2.0 * p[0] + p[1];
            r[1] = -p[1];
            r[2] = 3.0 * p[0];
        };
        let p = [1.5, -4.0];
        let mut r0 = [0.0; 3];
        residual(&p, &mut r0);

        let mut jac = DMatrix::zeros(3, 2);
        let evals = forward_difference(&p, &r0, &mut jac, residual);
        assert_eq!(evals, 2);

        let expected = DMatrix::from_row_slice(3, 2, &[2.0, 1.0, 0.0, -1.0, 3.0, 0.0]);
        assert!((jac - expected).amax() < 1e-6);
    }
}
