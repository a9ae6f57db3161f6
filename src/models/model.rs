//! The one-dimensional model interface.
//!
//! Fitters only need a few primitive operations from a model:
//! - its ordered, named parameters (read and write)
//! - `evaluate(x, params)` with an explicit parameter vector
//! - optionally, analytic partial derivatives
//!
//! Custom models implement `Model1D` directly; the built-in kinds are served by
//! `BuiltinModel`.

use crate::domain::{ModelKind, Parameter};
use crate::error::AppError;
use crate::models::builtin;

pub trait Model1D: Send + Sync {
    /// Instance label. Joint fits key shared parameters by this name.
    fn name(&self) -> &str;

    fn parameters(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut [Parameter];

    /// Evaluate at `x` with the given parameter values (in `parameters()` order).
    fn evaluate(&self, x: f64, params: &[f64]) -> f64;

    /// Write `d model / d param_j` into `out`. Returns `false` when the model has
    /// no analytic derivatives, in which case fitters use finite differences.
    fn fit_deriv(&self, _x: f64, _params: &[f64], _out: &mut [f64]) -> bool {
        false
    }

    /// Default evaluation domain, if the model has a natural one.
    fn bounding_box(&self) -> Option<(f64, f64)> {
        None
    }

    /// Built-in kind, if any.
    fn kind(&self) -> Option<ModelKind> {
        None
    }

    fn clone_box(&self) -> Box<dyn Model1D>;

    fn param_names(&self) -> Vec<&str> {
        self.parameters().iter().map(|p| p.name.as_str()).collect()
    }

    fn param_index(&self, name: &str) -> Option<usize> {
        self.parameters().iter().position(|p| p.name == name)
    }

    /// Current parameter values, in order.
    fn values(&self) -> Vec<f64> {
        self.parameters().iter().map(|p| p.value).collect()
    }

    fn set_values(&mut self, values: &[f64]) -> Result<(), AppError> {
        let params = self.parameters_mut();
        if values.len() != params.len() {
            return Err(AppError::input(format!(
                "Expected {} parameter values but {} provided.",
                params.len(),
                values.len()
            )));
        }
        for (p, &v) in params.iter_mut().zip(values) {
            p.value = v;
        }
        Ok(())
    }

    /// Evaluate with the current parameter values.
    fn predict(&self, x: f64) -> f64 {
        self.evaluate(x, &self.values())
    }
}

impl Clone for Box<dyn Model1D> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl std::fmt::Debug for dyn Model1D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model1D")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("parameters", &self.parameters())
            .finish()
    }
}

/// A named instance of one of the built-in model kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinModel {
    name: String,
    kind: ModelKind,
    params: Vec<Parameter>,
}

impl BuiltinModel {
    /// Build a model with explicit values (in the kind's parameter order).
    pub fn new(name: impl Into<String>, kind: ModelKind, values: &[f64]) -> Result<Self, AppError> {
        let name = name.into();
        if values.len() != kind.param_len() {
            return Err(AppError::input(format!(
                "Model '{name}' ({}) takes {} parameters but {} were given.",
                kind.display_name(),
                kind.param_len(),
                values.len()
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(AppError::input(format!(
                "Model '{name}' has a non-finite initial value ({v})."
            )));
        }
        let params = kind
            .param_names()
            .iter()
            .zip(values)
            .map(|(&n, &v)| Parameter::new(n, v))
            .collect();
        Ok(Self { name, kind, params })
    }

    /// Build a model with the kind's default values.
    pub fn with_defaults(name: impl Into<String>, kind: ModelKind) -> Self {
        let params = kind
            .param_names()
            .iter()
            .zip(kind.default_values())
            .map(|(&n, &v)| Parameter::new(n, v))
            .collect();
        Self {
            name: name.into(),
            kind,
            params,
        }
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name == name)
    }
}

impl Model1D for BuiltinModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.params
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        builtin::evaluate(self.kind, x, params)
    }

    fn fit_deriv(&self, x: f64, params: &[f64], out: &mut [f64]) -> bool {
        builtin::fill_deriv(self.kind, x, params, out)
    }

    fn bounding_box(&self) -> Option<(f64, f64)> {
        builtin::bounding_box(self.kind, &self.values())
    }

    fn kind(&self) -> Option<ModelKind> {
        Some(self.kind)
    }

    fn clone_box(&self) -> Box<dyn Model1D> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_arity() {
        let err = BuiltinModel::new("g", ModelKind::Gaussian1d, &[1.0, 2.0]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn set_values_updates_in_order() {
        let mut m = BuiltinModel::with_defaults("l", ModelKind::Linear1d);
        m.set_values(&[2.0, 3.0]).unwrap();
        assert_eq!(m.values(), vec![2.0, 3.0]);
        assert_eq!(m.predict(2.0), 7.0);
        assert!(m.set_values(&[1.0]).is_err());
    }

    #[test]
    fn param_lookup_by_name() {
        let m = BuiltinModel::with_defaults("g", ModelKind::Gaussian1d);
        assert_eq!(m.param_names(), vec!["amplitude", "mean", "stddev"]);
        assert_eq!(m.param_index("stddev"), Some(2));
        assert_eq!(m.param_index("sigma"), None);
    }
}
