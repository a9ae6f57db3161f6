//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - loaded from job files
//! - exported to JSON/CSV and reloaded later for plotting

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Built-in one-dimensional model kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Gaussian1d,
    Lorentz1d,
    Linear1d,
    Exponential1d,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Gaussian1d => "Gaussian1D",
            ModelKind::Lorentz1d => "Lorentz1D",
            ModelKind::Linear1d => "Linear1D",
            ModelKind::Exponential1d => "Exponential1D",
        }
    }

    /// Parameter names, in evaluation order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Gaussian1d => &["amplitude", "mean", "stddev"],
            ModelKind::Lorentz1d => &["amplitude", "x_0", "fwhm"],
            ModelKind::Linear1d => &["slope", "intercept"],
            ModelKind::Exponential1d => &["amplitude", "tau"],
        }
    }

    pub fn param_len(self) -> usize {
        self.param_names().len()
    }

    /// Values used when a job file does not provide any.
    pub fn default_values(self) -> &'static [f64] {
        match self {
            ModelKind::Gaussian1d => &[1.0, 0.0, 1.0],
            ModelKind::Lorentz1d => &[1.0, 0.0, 1.0],
            ModelKind::Linear1d => &[1.0, 0.0],
            ModelKind::Exponential1d => &[1.0, 1.0],
        }
    }
}

/// A named model parameter.
///
/// The constraint fields exist so that fitters can refuse what they do not
/// support; none of the fitters in this crate implement bounds or ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub bounds: (Option<f64>, Option<f64>),
    /// Name of the parameter this one is tied to, if any.
    #[serde(default)]
    pub tied: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            fixed: false,
            bounds: (None, None),
            tied: None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.bounds.0.is_some() || self.bounds.1.is_some()
    }

    /// Short description of the first constraint found, for error messages.
    pub fn constraint_label(&self) -> Option<&'static str> {
        if self.fixed {
            Some("fixed")
        } else if self.is_bounded() {
            Some("bounded")
        } else if self.tied.is_some() {
            Some("tied")
        } else {
            None
        }
    }
}

/// One independent `(x, y)` dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Dataset {
    pub fn new(label: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            x,
            y,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Check that the dataset is non-empty, paired and finite.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.x.len() != self.y.len() {
            return Err(AppError::input(format!(
                "Dataset '{}' has {} x values but {} y values.",
                self.label,
                self.x.len(),
                self.y.len()
            )));
        }
        if self.is_empty() {
            return Err(AppError::new(3, format!("Dataset '{}' is empty.", self.label)));
        }
        if let Some(i) = self
            .x
            .iter()
            .zip(&self.y)
            .position(|(x, y)| !(x.is_finite() && y.is_finite()))
        {
            return Err(AppError::input(format!(
                "Dataset '{}' has a non-finite value at row {}.",
                self.label,
                i + 1
            )));
        }
        Ok(())
    }

    /// Range of the x values, if there is a non-degenerate one.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.x)
    }

    pub fn y_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.y)
    }
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo.is_finite() && hi.is_finite() && hi > lo {
        Some((lo, hi))
    } else {
        None
    }
}

/// Levenberg–Marquardt settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iters: usize,
    /// Stop when the relative cost reduction of an accepted step drops below this.
    pub ftol: f64,
    /// Stop when the relative step size drops below this.
    pub xtol: f64,
    /// Stop when the gradient infinity-norm drops below this.
    pub gtol: f64,
    /// Initial damping.
    pub lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// Keep a per-iteration trace in the result.
    pub collect_trace: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            collect_trace: false,
        }
    }
}

/// Model entry in a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub kind: ModelKind,
    /// Initial values in the kind's parameter order (defaults when omitted).
    #[serde(default)]
    pub params: Option<Vec<f64>>,
    /// Names of parameters to mark fixed.
    #[serde(default)]
    pub fixed: Vec<String>,
}

/// Seeded synthetic data drawn from a model's initial parameters plus Gaussian noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub n: usize,
    pub x_min: f64,
    pub x_max: f64,
    #[serde(default)]
    pub noise: f64,
    #[serde(default)]
    pub seed: u64,
}

/// Where a job's dataset comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    Csv(PathBuf),
    Synthetic(SyntheticSpec),
}

/// A joint-fit job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    pub models: Vec<ModelEntry>,
    /// Model name -> shared parameter names (i-th name maps to `initvals[i]`).
    pub shared: BTreeMap<String, Vec<String>>,
    pub initvals: Vec<f64>,
    pub datasets: Vec<DatasetSource>,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_result: Option<PathBuf>,
    pub export_residuals: Option<PathBuf>,
    /// Also fit every model on its own dataset, for comparison.
    pub independent: bool,
}

/// Fitted values of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub name: String,
    pub kind: Option<ModelKind>,
    pub param_names: Vec<String>,
    pub values: Vec<f64>,
    pub rmse: f64,
    pub grid: FittedGrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Solver statistics recorded in an exported result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverStats {
    pub cost: f64,
    pub iterations: usize,
    pub residual_evals: usize,
    pub converged: bool,
    pub stop_reason: String,
}

/// A saved joint-fit result (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub shared_names: BTreeMap<String, Vec<String>>,
    pub shared_values: Vec<f64>,
    pub models: Vec<FittedModel>,
    pub solver: SolverStats,
}
