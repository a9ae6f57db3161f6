//! Joint fitting of several models that share parameters.
//!
//! Given:
//! - models `M_1..M_K`
//! - for every model, an ordered list of shared parameter names
//! - one initial value per shared slot
//! - one `(x, y)` dataset per model
//!
//! we pack every free value into a single vector:
//!
//! ```text
//! [ shared_0 .. shared_{S-1} | own params of M_1 | own params of M_2 | ... ]
//! ```
//!
//! The i-th name in each model's shared list reads `shared_i`, so the lists line
//! up positionally (`amplitude` of `g1` and `amplitude` of `g2` both in slot 0).
//! Every other parameter keeps its own slot, in model parameter order.
//!
//! The residual vector is the concatenation of `M_k(x_k) - y_k` over all models,
//! minimized with Levenberg–Marquardt. Fixed, bounded and tied parameters are
//! not supported and are rejected up front.

use std::collections::{BTreeMap, HashSet};

use nalgebra::DMatrix;

use crate::domain::{Dataset, SolverSettings};
use crate::error::AppError;
use crate::fit::levmar::{LeastSquaresProblem, LevenbergMarquardt, StopReason, TraceRecord};
use crate::models::Model1D;

/// Model name -> ordered shared parameter names.
pub type SharedParams = BTreeMap<String, Vec<String>>;

/// Outcome of a joint fit.
#[derive(Debug, Clone)]
pub struct JointFitReport {
    pub shared_values: Vec<f64>,
    /// Full parameter vector of each model, in model order.
    pub model_values: Vec<Vec<f64>>,
    /// Root-mean-square residual of each dataset.
    pub rmse: Vec<f64>,
    /// `0.5 * Σ r²` over all datasets.
    pub cost: f64,
    pub iterations: usize,
    pub residual_evals: usize,
    pub converged: bool,
    pub stop_reason: StopReason,
    /// Per-iteration solver trace, when `SolverSettings::collect_trace` is set.
    pub trace: Option<Vec<TraceRecord>>,
}

#[derive(Debug)]
pub struct JointFitter {
    models: Vec<Box<dyn Model1D>>,
    shared: SharedParams,
    initvals: Vec<f64>,
    /// `layout[k][j]` is the packed index feeding parameter `j` of model `k`.
    layout: Vec<Vec<usize>>,
    fit_params: Vec<f64>,
    solver: LevenbergMarquardt,
}

impl JointFitter {
    /// Validate the inputs and build the packed parameter layout.
    pub fn new(
        models: Vec<Box<dyn Model1D>>,
        shared: SharedParams,
        initvals: Vec<f64>,
    ) -> Result<Self, AppError> {
        verify_inputs(&models, &shared, &initvals)?;

        let n_shared = initvals.len();
        let mut fit_params = initvals.clone();
        let mut layout = Vec::with_capacity(models.len());

        for model in &models {
            let names = &shared[model.name()];
            let mut slots = Vec::with_capacity(model.parameters().len());
            for p in model.parameters() {
                match names.iter().position(|n| *n == p.name) {
                    Some(i) => slots.push(i),
                    None => {
                        slots.push(fit_params.len());
                        fit_params.push(p.value);
                    }
                }
            }
            layout.push(slots);
        }

        log::debug!(
            "joint fitter: {} models, {} shared slots, {} packed parameters",
            models.len(),
            n_shared,
            fit_params.len()
        );

        Ok(Self {
            models,
            shared,
            initvals,
            layout,
            fit_params,
            solver: LevenbergMarquardt::default(),
        })
    }

    pub fn with_solver(mut self, settings: SolverSettings) -> Self {
        self.solver = LevenbergMarquardt::new(settings);
        self
    }

    pub fn models(&self) -> &[Box<dyn Model1D>] {
        &self.models
    }

    pub fn into_models(self) -> Vec<Box<dyn Model1D>> {
        self.models
    }

    pub fn model(&self, name: &str) -> Option<&dyn Model1D> {
        self.models.iter().find(|m| m.name() == name).map(|m| m.as_ref())
    }

    pub fn shared(&self) -> &SharedParams {
        &self.shared
    }

    /// The packed parameter vector (shared values first). Holds the fitted
    /// values after a successful `fit`.
    pub fn fit_params(&self) -> &[f64] {
        &self.fit_params
    }

    /// Fit all models jointly, one dataset per model (in model order).
    ///
    /// On success every model's parameters are updated in place; shared
    /// parameters hold the same value in every model.
    pub fn fit(&mut self, datasets: &[Dataset]) -> Result<JointFitReport, AppError> {
        if datasets.len() != self.models.len() {
            return Err(AppError::input(format!(
                "Expected {} datasets but {} provided.",
                self.models.len(),
                datasets.len()
            )));
        }
        for d in datasets {
            d.validate()?;
        }

        let problem = JointProblem {
            models: &self.models,
            layout: &self.layout,
            datasets,
        };

        log::info!(
            "joint fit: {} datasets, {} residuals, {} parameters",
            datasets.len(),
            problem.residual_len(),
            self.fit_params.len()
        );

        let result = self.solver.solve(&problem, self.fit_params.clone())?;
        if !result.converged {
            log::warn!("joint fit did not converge: {}", result.stop_reason.describe());
        }

        let mut rmse = Vec::with_capacity(datasets.len());
        let mut offset = 0;
        for d in datasets {
            let block = &result.residuals[offset..offset + d.len()];
            let sse: f64 = block.iter().map(|r| r * r).sum();
            rmse.push((sse / d.len() as f64).sqrt());
            offset += d.len();
        }

        self.fit_params = result.params;
        let model_values = self.unpack(&self.fit_params);
        for (model, values) in self.models.iter_mut().zip(&model_values) {
            model.set_values(values)?;
        }

        Ok(JointFitReport {
            shared_values: self.fit_params[..self.initvals.len()].to_vec(),
            model_values,
            rmse,
            cost: result.cost,
            iterations: result.iterations,
            residual_evals: result.residual_evals,
            converged: result.converged,
            stop_reason: result.stop_reason,
            trace: result.trace,
        })
    }

    fn unpack(&self, packed: &[f64]) -> Vec<Vec<f64>> {
        self.layout
            .iter()
            .map(|slots| slots.iter().map(|&i| packed[i]).collect())
            .collect()
    }
}

fn verify_inputs(models: &[Box<dyn Model1D>], shared: &SharedParams, initvals: &[f64]) -> Result<(), AppError> {
    if models.len() <= 1 {
        return Err(AppError::input(format!(
            "Expected >1 models, {} is given.",
            models.len()
        )));
    }
    if shared.len() < 2 {
        return Err(AppError::input(format!(
            "At least two entries are expected in the shared parameter mapping, {} is given.",
            shared.len()
        )));
    }

    let mut seen = HashSet::new();
    for model in models {
        if !seen.insert(model.name()) {
            return Err(AppError::input(format!(
                "Model name '{}' is used more than once.",
                model.name()
            )));
        }
        if !shared.contains_key(model.name()) {
            return Err(AppError::input(format!(
                "Model '{}' has no entry in the shared parameter mapping.",
                model.name()
            )));
        }
    }
    if let Some(name) = shared.keys().find(|k| !seen.contains(k.as_str())) {
        return Err(AppError::input(format!(
            "Shared parameter mapping names unknown model '{name}'."
        )));
    }

    for (name, params) in shared {
        if params.len() != initvals.len() {
            return Err(AppError::input(format!(
                "{} parameter(s) provided for model '{name}' but {} expected.",
                params.len(),
                initvals.len()
            )));
        }
    }
    if let Some(v) = initvals.iter().find(|v| !v.is_finite()) {
        return Err(AppError::input(format!("Initial shared value {v} is not finite.")));
    }

    for model in models {
        let names = &shared[model.name()];
        let mut listed = HashSet::new();
        for n in names {
            if model.param_index(n).is_none() {
                return Err(AppError::input(format!(
                    "Model '{}' has no parameter '{n}'.",
                    model.name()
                )));
            }
            if !listed.insert(n.as_str()) {
                return Err(AppError::input(format!(
                    "Parameter '{n}' is listed twice for model '{}'.",
                    model.name()
                )));
            }
        }
        for p in model.parameters() {
            if let Some(label) = p.constraint_label() {
                return Err(AppError::input(format!(
                    "Joint fitting does not support fixed, bounded or tied parameters \
                     ('{}' of model '{}' is {label}).",
                    p.name,
                    model.name()
                )));
            }
        }
    }

    Ok(())
}

struct JointProblem<'a> {
    models: &'a [Box<dyn Model1D>],
    layout: &'a [Vec<usize>],
    datasets: &'a [Dataset],
}

impl JointProblem<'_> {
    fn model_params(&self, k: usize, packed: &[f64]) -> Vec<f64> {
        self.layout[k].iter().map(|&i| packed[i]).collect()
    }
}

impl LeastSquaresProblem for JointProblem<'_> {
    fn residual_len(&self) -> usize {
        self.datasets.iter().map(Dataset::len).sum()
    }

    fn residuals(&self, p: &[f64], out: &mut [f64]) {
        let mut row = 0;
        for (k, (model, data)) in self.models.iter().zip(self.datasets).enumerate() {
            let params = self.model_params(k, p);
            for (&x, &y) in data.x.iter().zip(&data.y) {
                out[row] = model.evaluate(x, &params) - y;
                row += 1;
            }
        }
    }

    fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) -> bool {
        out.fill(0.0);
        let mut row = 0;
        for (k, (model, data)) in self.models.iter().zip(self.datasets).enumerate() {
            let params = self.model_params(k, p);
            let mut deriv = vec![0.0; params.len()];
            for &x in &data.x {
                if !model.fit_deriv(x, &params, &mut deriv) {
                    return false;
                }
                // Shared slots collect the derivative of every model that reads them.
                for (j, &col) in self.layout[k].iter().enumerate() {
                    out[(row, col)] += deriv[j];
                }
                row += 1;
            }
        }
        true
    }
}
