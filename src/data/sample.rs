//! Synthetic dataset generation.
//!
//! Evaluates a model on an evenly spaced grid and adds seeded Gaussian noise,
//! so example fits are reproducible run to run.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Dataset, SyntheticSpec};
use crate::error::AppError;
use crate::models::Model1D;

/// Sample `model` (at its current parameter values) according to `spec`.
pub fn generate_dataset(model: &dyn Model1D, spec: &SyntheticSpec, label: impl Into<String>) -> Result<Dataset, AppError> {
    if spec.n < 2 {
        return Err(AppError::input("Synthetic datasets need at least 2 points."));
    }
    if !(spec.x_min.is_finite() && spec.x_max.is_finite() && spec.x_max > spec.x_min) {
        return Err(AppError::input(format!(
            "Invalid synthetic x range: [{}, {}].",
            spec.x_min, spec.x_max
        )));
    }
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(AppError::input("Synthetic noise must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::numeric(format!("Noise distribution error: {e}")))?;

    let step = (spec.x_max - spec.x_min) / (spec.n as f64 - 1.0);
    let mut x = Vec::with_capacity(spec.n);
    let mut y = Vec::with_capacity(spec.n);
    for i in 0..spec.n {
        let xi = spec.x_min + step * i as f64;
        let z: f64 = normal.sample(&mut rng);
        x.push(xi);
        y.push(model.predict(xi) + spec.noise * z);
    }

    let data = Dataset::new(label, x, y);
    data.validate()?;
    Ok(data)
}
