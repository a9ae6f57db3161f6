//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `0.5 * ||r(p)||²` for a residual function `r: Rⁿ → Rᵐ`.
//!
//! Each iteration solves the damped step
//!
//! ```text
//! (JᵀJ + λ D) δ = -Jᵀr,    D = diag(JᵀJ)
//! ```
//!
//! as the augmented least squares problem `[J; sqrt(λ D)] δ ≈ [-r; 0]`.
//! Accepted steps shrink λ (towards Gauss–Newton); rejected steps grow it
//! (towards scaled gradient descent). The Jacobian is only recomputed after an
//! accepted step.

use nalgebra::{DMatrix, DVector};

use crate::domain::SolverSettings;
use crate::error::AppError;
use crate::math::{forward_difference, solve_least_squares};

/// Damping ceiling; beyond it no step can reduce the cost.
const LAMBDA_MAX: f64 = 1e16;

/// Damping floor.
const LAMBDA_MIN: f64 = 1e-12;

/// Floor on the Marquardt scaling entries, so flat directions stay damped.
const DIAG_FLOOR: f64 = 1e-12;

/// A nonlinear least squares problem.
pub trait LeastSquaresProblem {
    /// Number of residuals (`m`).
    fn residual_len(&self) -> usize;

    /// Write `r(p)` into `out` (length `m`).
    fn residuals(&self, p: &[f64], out: &mut [f64]);

    /// Write the `m × n` Jacobian of `r` at `p`. Return `false` to fall back to
    /// forward differences.
    fn jacobian(&self, _p: &[f64], _out: &mut DMatrix<f64>) -> bool {
        false
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Relative cost reduction fell below `ftol`.
    CostTolerance,
    /// Relative accepted step fell below `xtol`.
    StepTolerance,
    /// Gradient infinity-norm fell below `gtol`.
    GradientTolerance,
    /// Iteration budget exhausted.
    MaxIterations,
    /// Rejected steps shrank below `xtol` or damping passed its ceiling
    /// without finding a better point.
    Stalled,
}

impl StopReason {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            StopReason::CostTolerance | StopReason::StepTolerance | StopReason::GradientTolerance
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            StopReason::CostTolerance => "relative cost reduction below ftol",
            StopReason::StepTolerance => "relative step below xtol",
            StopReason::GradientTolerance => "gradient below gtol",
            StopReason::MaxIterations => "maximum iterations reached",
            StopReason::Stalled => "no lower cost found along ever shorter steps",
        }
    }
}

/// One solver iteration, as recorded when `collect_trace` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub iter: usize,
    pub cost: f64,
    pub lambda: f64,
    pub step_norm: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct LmResult {
    pub params: Vec<f64>,
    pub residuals: Vec<f64>,
    /// `0.5 * ||r||²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub residual_evals: usize,
    pub converged: bool,
    pub stop_reason: StopReason,
    pub trace: Option<Vec<TraceRecord>>,
}

#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    pub settings: SolverSettings,
}

impl LevenbergMarquardt {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Minimize the problem starting from `p0`.
    pub fn solve<P: LeastSquaresProblem + ?Sized>(&self, problem: &P, p0: Vec<f64>) -> Result<LmResult, AppError> {
        let s = &self.settings;
        let m = problem.residual_len();
        let n = p0.len();
        if n == 0 {
            return Err(AppError::input("Nothing to fit: no free parameters."));
        }
        if m < n {
            return Err(AppError::new(
                3,
                format!("Underdetermined fit: {m} residuals for {n} free parameters."),
            ));
        }
        if p0.iter().any(|v| !v.is_finite()) {
            return Err(AppError::input("Initial parameters must be finite."));
        }

        let lambda_up = if s.lambda_up > 1.0 { s.lambda_up } else { 10.0 };
        let lambda_down = if s.lambda_down > 0.0 && s.lambda_down < 1.0 {
            s.lambda_down
        } else {
            0.1
        };
        let mut lambda = s.lambda.max(LAMBDA_MIN);

        let mut p = p0;
        let mut r = vec![0.0; m];
        problem.residuals(&p, &mut r);
        let mut residual_evals = 1;
        if r.iter().any(|v| !v.is_finite()) {
            return Err(AppError::numeric(
                "Residuals are not finite at the initial parameters.",
            ));
        }
        let mut cost = half_sq_norm(&r);

        let mut jac = DMatrix::<f64>::zeros(m, n);
        let mut diag = vec![0.0; n];
        let mut need_jacobian = true;

        let mut p_trial = vec![0.0; n];
        let mut r_trial = vec![0.0; m];
        let mut trace = s.collect_trace.then(Vec::new);

        log::trace!("lm start: n={n} m={m} cost={cost:.6e}");

        let mut stop = StopReason::MaxIterations;
        let mut iterations = 0;

        for iter in 0..s.max_iters {
            iterations = iter + 1;

            if need_jacobian {
                if !problem.jacobian(&p, &mut jac) {
                    residual_evals += forward_difference(&p, &r, &mut jac, |x, out| problem.residuals(x, out));
                }
                if jac.iter().any(|v| !v.is_finite()) {
                    return Err(AppError::numeric("Jacobian is not finite."));
                }
                let r_vec = DVector::from_column_slice(&r);
                let grad = jac.tr_mul(&r_vec);
                for (j, d) in diag.iter_mut().enumerate() {
                    *d = jac.column(j).norm_squared().max(DIAG_FLOOR);
                }
                need_jacobian = false;

                if grad.amax() < s.gtol {
                    stop = StopReason::GradientTolerance;
                    iterations = iter;
                    break;
                }
            }

            let Some(delta) = damped_step(&jac, &r, &diag, lambda) else {
                lambda *= lambda_up;
                log::trace!("lm iter {iter}: linear solve failed, lambda={lambda:.3e}");
                if lambda > LAMBDA_MAX {
                    stop = StopReason::Stalled;
                    break;
                }
                continue;
            };

            for j in 0..n {
                p_trial[j] = p[j] + delta[j];
            }
            problem.residuals(&p_trial, &mut r_trial);
            residual_evals += 1;
            let cost_trial = half_sq_norm(&r_trial);
            let step_norm = delta.norm();
            let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
            let rel_step = step_norm / (p_norm + s.xtol);

            let accepted = cost_trial.is_finite() && cost_trial < cost;
            if let Some(trace) = trace.as_mut() {
                trace.push(TraceRecord {
                    iter,
                    cost: if accepted { cost_trial } else { cost },
                    lambda,
                    step_norm,
                    accepted,
                });
            }

            if !accepted {
                lambda *= lambda_up;
                log::trace!(
                    "lm iter {iter}: rejected cost={cost_trial:.6e} step={step_norm:.3e} lambda={lambda:.3e}"
                );
                // No shorter step will find a lower cost either.
                if rel_step < s.xtol || lambda > LAMBDA_MAX {
                    stop = StopReason::Stalled;
                    break;
                }
                continue;
            }

            let rel_reduction = (cost - cost_trial) / cost.max(f64::MIN_POSITIVE);

            std::mem::swap(&mut p, &mut p_trial);
            std::mem::swap(&mut r, &mut r_trial);
            cost = cost_trial;
            lambda = (lambda * lambda_down).max(LAMBDA_MIN);
            need_jacobian = true;

            log::trace!(
                "lm iter {iter}: accepted cost={cost:.6e} step={step_norm:.3e} lambda={lambda:.3e}"
            );

            if rel_reduction < s.ftol {
                stop = StopReason::CostTolerance;
                break;
            }
            if rel_step < s.xtol {
                stop = StopReason::StepTolerance;
                break;
            }
        }

        log::debug!(
            "lm done: cost={cost:.6e} iterations={iterations} evals={residual_evals} stop={stop:?}"
        );

        Ok(LmResult {
            params: p,
            residuals: r,
            cost,
            iterations,
            residual_evals,
            converged: stop.is_converged(),
            stop_reason: stop,
            trace,
        })
    }
}

fn half_sq_norm(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

fn damped_step(jac: &DMatrix<f64>, r: &[f64], diag: &[f64], lambda: f64) -> Option<DVector<f64>> {
    let (m, n) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jac);
    for j in 0..n {
        a[(m + j, j)] = (lambda * diag[j]).sqrt();
    }

    let mut b = DVector::<f64>::zeros(m + n);
    for i in 0..m {
        b[i] = -r[i];
    }

    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// y = a * exp(-b x) sampled without noise.
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
        analytic: bool,
    }

    impl ExpDecay {
        fn new(a: f64, b: f64, analytic: bool) -> Self {
            let x: Vec<f64> = (0..25).map(|i| i as f64 * 0.2).collect();
            let y = x.iter().map(|&x| a * (-b * x).exp()).collect();
            Self { x, y, analytic }
        }
    }

    impl LeastSquaresProblem for ExpDecay {
        fn residual_len(&self) -> usize {
            self.x.len()
        }

        fn residuals(&self, p: &[f64], out: &mut [f64]) {
            for (i, (&x, &y)) in self.x.iter().zip(&self.y).enumerate() {
                out[i] = p[0] * (-p[1] * x).exp() - y;
            }
        }

        fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) -> bool {
            if !self.analytic {
                return false;
            }
            for (i, &x) in self.x.iter().enumerate() {
                let e = (-p[1] * x).exp();
                out[(i, 0)] = e;
                out[(i, 1)] = -p[0] * x * e;
            }
            true
        }
    }

    #[test]
    fn recovers_exponential_decay_with_finite_differences() {
        let problem = ExpDecay::new(3.0, 0.7, false);
        let res = LevenbergMarquardt::default().solve(&problem, vec![1.0, 0.1]).unwrap();
        assert!(res.converged, "stop reason: {:?}", res.stop_reason);
        assert_relative_eq!(res.params[0], 3.0, epsilon = 1e-6);
        assert_relative_eq!(res.params[1], 0.7, epsilon = 1e-6);
        assert!(res.cost < 1e-12);
    }

    #[test]
    fn analytic_jacobian_needs_fewer_evaluations() {
        let fd = LevenbergMarquardt::default()
            .solve(&ExpDecay::new(3.0, 0.7, false), vec![1.0, 0.1])
            .unwrap();
        let an = LevenbergMarquardt::default()
            .solve(&ExpDecay::new(3.0, 0.7, true), vec![1.0, 0.1])
            .unwrap();
        assert!(an.converged);
        assert_relative_eq!(an.params[1], 0.7, epsilon = 1e-6);
        assert!(an.residual_evals < fd.residual_evals);
    }

    #[test]
    fn trace_is_collected_when_requested() {
        let settings = SolverSettings {
            collect_trace: true,
            ..SolverSettings::default()
        };
        let res = LevenbergMarquardt::new(settings)
            .solve(&ExpDecay::new(2.0, 0.3, true), vec![1.0, 1.0])
            .unwrap();
        let trace = res.trace.unwrap();
        assert!(!trace.is_empty());
        // Accepted costs never increase.
        let accepted: Vec<f64> = trace.iter().filter(|t| t.accepted).map(|t| t.cost).collect();
        assert!(accepted.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn iteration_budget_is_reported() {
        let settings = SolverSettings {
            max_iters: 1,
            ..SolverSettings::default()
        };
        let res = LevenbergMarquardt::new(settings)
            .solve(&ExpDecay::new(3.0, 0.7, true), vec![1.0, 0.1])
            .unwrap();
        assert_eq!(res.stop_reason, StopReason::MaxIterations);
        assert!(!res.converged);
    }

    /// `r(p) = p - 3` paired with a Jacobian of the wrong sign, so every
    /// proposed step moves uphill.
    struct WrongSlope;

    impl LeastSquaresProblem for WrongSlope {
        fn residual_len(&self) -> usize {
            1
        }

        fn residuals(&self, p: &[f64], out: &mut [f64]) {
            out[0] = p[0] - 3.0;
        }

        fn jacobian(&self, _p: &[f64], out: &mut DMatrix<f64>) -> bool {
            out[(0, 0)] = -1.0;
            true
        }
    }

    #[test]
    fn uphill_steps_end_stalled_not_converged() {
        let res = LevenbergMarquardt::default().solve(&WrongSlope, vec![0.0]).unwrap();
        assert_eq!(res.stop_reason, StopReason::Stalled);
        assert!(!res.converged);
        assert_eq!(res.params, vec![0.0]);
        assert_eq!(res.cost, 4.5);
    }

    struct NanAtStart;

    impl LeastSquaresProblem for NanAtStart {
        fn residual_len(&self) -> usize {
            2
        }

        fn residuals(&self, p: &[f64], out: &mut [f64]) {
            out[0] = p[0].ln();
            out[1] = 1.0;
        }
    }

    #[test]
    fn non_finite_initial_residuals_are_numeric_errors() {
        let err = LevenbergMarquardt::default().solve(&NanAtStart, vec![-1.0]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.message(), "Residuals are not finite at the initial parameters.");
    }

    #[test]
    fn rejects_underdetermined_problems() {
        let mut problem = ExpDecay::new(1.0, 1.0, true);
        problem.x.truncate(1);
        problem.y.truncate(1);
        let err = LevenbergMarquardt::default().solve(&problem, vec![1.0, 1.0]).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
