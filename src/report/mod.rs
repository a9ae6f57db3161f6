//! Reporting utilities: residuals, fitted grids, and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

pub mod format;

pub use format::*;

use crate::domain::{Dataset, FittedGrid};
use crate::error::AppError;
use crate::models::Model1D;

/// One observation with its fitted value.
#[derive(Debug, Clone, PartialEq)]
pub struct PointResidual {
    pub dataset: String,
    pub x: f64,
    pub y_obs: f64,
    pub y_fit: f64,
    pub residual: f64,
}

/// Compute fitted values and residuals (`y_obs - y_fit`) for one dataset.
pub fn compute_residuals(model: &dyn Model1D, data: &Dataset) -> Result<Vec<PointResidual>, AppError> {
    let values = model.values();
    let mut out = Vec::with_capacity(data.len());
    for (&x, &y_obs) in data.x.iter().zip(&data.y) {
        let y_fit = model.evaluate(x, &values);
        if !y_fit.is_finite() {
            return Err(AppError::numeric(format!(
                "Non-finite prediction of model '{}' at x={x}.",
                model.name()
            )));
        }
        out.push(PointResidual {
            dataset: data.label.clone(),
            x,
            y_obs,
            y_fit,
            residual: y_obs - y_fit,
        });
    }
    Ok(out)
}

/// Evaluation range for plots and exported grids: the data's x-range,
/// restricted to the model's bounding box when the two overlap.
pub fn grid_range(model: &dyn Model1D, data: Option<&Dataset>) -> (f64, f64) {
    let data_range = data.and_then(Dataset::x_range);
    match (data_range, model.bounding_box()) {
        (Some((lo, hi)), Some((blo, bhi))) => {
            let (clo, chi) = (lo.max(blo), hi.min(bhi));
            if chi > clo { (clo, chi) } else { (lo, hi) }
        }
        (Some(range), None) | (None, Some(range)) => range,
        (None, None) => (0.0, 1.0),
    }
}

/// Evaluate `model` at `n` evenly spaced points over `[x_min, x_max]`.
pub fn model_grid(model: &dyn Model1D, x_min: f64, x_max: f64, n: usize) -> FittedGrid {
    let n = n.max(2);
    let values = model.values();
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let xi = x_min + u * (x_max - x_min);
        x.push(xi);
        y.push(model.evaluate(xi, &values));
    }
    FittedGrid { x, y }
}
