//! Fitting one model to one dataset.
//!
//! Used to compare a joint fit against fitting every model on its own. Fixed
//! parameters are held at their current value; bounded and tied parameters are
//! rejected like in the joint fitter.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{Dataset, SolverSettings};
use crate::error::AppError;
use crate::fit::levmar::{LeastSquaresProblem, LevenbergMarquardt, StopReason};
use crate::models::Model1D;

/// Outcome of a single-model fit.
#[derive(Debug, Clone)]
pub struct SingleFitReport {
    pub values: Vec<f64>,
    pub rmse: f64,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
    pub stop_reason: StopReason,
}

/// Fit `model` to `data`, updating its parameters in place.
pub fn fit_single(
    model: &mut dyn Model1D,
    data: &Dataset,
    settings: SolverSettings,
) -> Result<SingleFitReport, AppError> {
    data.validate()?;

    let mut free = Vec::new();
    for (j, p) in model.parameters().iter().enumerate() {
        if p.is_bounded() || p.tied.is_some() {
            return Err(AppError::input(format!(
                "Parameter '{}' of model '{}' is bounded or tied; only fixed parameters are supported.",
                p.name,
                model.name()
            )));
        }
        if !p.fixed {
            free.push(j);
        }
    }

    let base = model.values();
    let p0: Vec<f64> = free.iter().map(|&j| base[j]).collect();

    let result = {
        let problem = SingleProblem {
            model: &*model,
            data,
            base: &base,
            free: &free,
        };
        LevenbergMarquardt::new(settings).solve(&problem, p0)?
    };
    if !result.converged {
        log::warn!(
            "fit of '{}' did not converge: {}",
            model.name(),
            result.stop_reason.describe()
        );
    }

    let mut values = base;
    for (&j, &v) in free.iter().zip(&result.params) {
        values[j] = v;
    }
    model.set_values(&values)?;

    let sse: f64 = result.residuals.iter().map(|r| r * r).sum();
    Ok(SingleFitReport {
        values,
        rmse: (sse / data.len() as f64).sqrt(),
        cost: result.cost,
        iterations: result.iterations,
        converged: result.converged,
        stop_reason: result.stop_reason,
    })
}

/// Fit every model to its own dataset, in parallel. Inputs are left untouched;
/// fitted copies are returned in model order.
pub fn fit_independent(
    models: &[Box<dyn Model1D>],
    datasets: &[Dataset],
    settings: SolverSettings,
) -> Result<Vec<(Box<dyn Model1D>, SingleFitReport)>, AppError> {
    if models.len() != datasets.len() {
        return Err(AppError::input(format!(
            "Expected {} datasets but {} provided.",
            models.len(),
            datasets.len()
        )));
    }

    models
        .par_iter()
        .zip(datasets.par_iter())
        .map(|(model, data)| {
            let mut model = model.clone_box();
            let report = fit_single(model.as_mut(), data, settings)?;
            Ok((model, report))
        })
        .collect()
}

struct SingleProblem<'a> {
    model: &'a dyn Model1D,
    data: &'a Dataset,
    base: &'a [f64],
    free: &'a [usize],
}

impl SingleProblem<'_> {
    fn full(&self, p: &[f64]) -> Vec<f64> {
        let mut values = self.base.to_vec();
        for (&j, &v) in self.free.iter().zip(p) {
            values[j] = v;
        }
        values
    }
}

impl LeastSquaresProblem for SingleProblem<'_> {
    fn residual_len(&self) -> usize {
        self.data.len()
    }

    fn residuals(&self, p: &[f64], out: &mut [f64]) {
        let values = self.full(p);
        for (i, (&x, &y)) in self.data.x.iter().zip(&self.data.y).enumerate() {
            out[i] = self.model.evaluate(x, &values) - y;
        }
    }

    fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) -> bool {
        let values = self.full(p);
        let mut deriv = vec![0.0; values.len()];
        for (i, &x) in self.data.x.iter().enumerate() {
            if !self.model.fit_deriv(x, &values, &mut deriv) {
                return false;
            }
            for (col, &j) in self.free.iter().enumerate() {
                out[(i, col)] = deriv[j];
            }
        }
        true
    }
}
