//! Shared "fit pipeline" logic used by `jf fit` and `jf demo`.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! models + datasets -> joint fit -> residuals -> (optional) independent fits
//!
//! The handlers in `app` then only deal with presentation and exports.

use std::path::Path;

use crate::domain::{Dataset, DatasetSource, FitConfig, JobFile, ModelEntry, ModelKind, SolverSettings, SyntheticSpec};
use crate::error::AppError;
use crate::fit::{JointFitReport, JointFitter, SharedParams, SingleFitReport, fit_independent};
use crate::models::Model1D;
use crate::report::{PointResidual, compute_residuals};

/// All computed outputs of a single joint fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Fitted models, in job order.
    pub models: Vec<Box<dyn Model1D>>,
    pub shared: SharedParams,
    pub datasets: Vec<Dataset>,
    pub report: JointFitReport,
    pub residuals: Vec<PointResidual>,
    /// Present when `FitConfig::independent` was set.
    pub independent: Option<Vec<(Box<dyn Model1D>, SingleFitReport)>>,
}

/// Load a job file and run it. Relative CSV paths resolve against the job
/// file's directory.
pub fn run_job_file(path: &Path, config: &FitConfig) -> Result<RunOutput, AppError> {
    let job = crate::io::read_job(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    run_job(&job, base_dir, config)
}

/// Execute the full pipeline for an already parsed job.
pub fn run_job(job: &JobFile, base_dir: &Path, config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Instantiate models and load/generate their datasets.
    let models = crate::io::build_models(job)?;
    let datasets = crate::io::load_datasets(job, &models, base_dir)?;

    run_fit(models, job.shared.clone(), job.initvals.clone(), datasets, job.solver, config)
}

/// Execute the pipeline on in-memory models and datasets.
pub fn run_fit(
    models: Vec<Box<dyn Model1D>>,
    shared: SharedParams,
    initvals: Vec<f64>,
    datasets: Vec<Dataset>,
    solver: SolverSettings,
    config: &FitConfig,
) -> Result<RunOutput, AppError> {
    // Independent fits start from the same initial parameters as the joint fit.
    let independent_start = config.independent.then(|| models.clone());

    // 2) Joint fit.
    let mut fitter = JointFitter::new(models, shared, initvals)?.with_solver(solver);
    let report = fitter.fit(&datasets)?;
    let shared = fitter.shared().clone();
    let models = fitter.into_models();

    // 3) Residuals per point.
    let mut residuals = Vec::new();
    for (model, data) in models.iter().zip(&datasets) {
        residuals.extend(compute_residuals(model.as_ref(), data)?);
    }

    // 4) Optional comparison against unshared fits.
    let independent = match independent_start {
        Some(start) => Some(fit_independent(&start, &datasets, solver)?),
        None => None,
    };

    Ok(RunOutput {
        models,
        shared,
        datasets,
        report,
        residuals,
        independent,
    })
}

/// Parameters of the built-in demo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoSettings {
    pub points: usize,
    pub noise: f64,
    pub seed: u64,
    pub initval: f64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            points: 20,
            noise: 0.2,
            seed: 42,
            initval: 9.8,
        }
    }
}

/// Two Gaussians with different means and widths sharing `amplitude`, each
/// sampled with seeded noise over x in [4, 6].
pub fn demo_job(settings: &DemoSettings) -> JobFile {
    let synthetic = |seed: u64| {
        DatasetSource::Synthetic(SyntheticSpec {
            n: settings.points,
            x_min: 4.0,
            x_max: 6.0,
            noise: settings.noise,
            seed,
        })
    };

    JobFile {
        models: vec![
            ModelEntry {
                name: "g1".to_string(),
                kind: ModelKind::Gaussian1d,
                params: Some(vec![10.0, 4.6, 0.3]),
                fixed: Vec::new(),
            },
            ModelEntry {
                name: "g2".to_string(),
                kind: ModelKind::Gaussian1d,
                params: Some(vec![10.0, 5.3, 0.2]),
                fixed: Vec::new(),
            },
        ],
        shared: SharedParams::from([
            ("g1".to_string(), vec!["amplitude".to_string()]),
            ("g2".to_string(), vec!["amplitude".to_string()]),
        ]),
        initvals: vec![settings.initval],
        datasets: vec![synthetic(settings.seed), synthetic(settings.seed.wrapping_add(1))],
        solver: SolverSettings::default(),
    }
}
