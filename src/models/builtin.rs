//! Evaluation of the built-in model kinds.
//!
//! Each kind provides:
//! - `evaluate`: `y(x)` for explicit parameter values
//! - `fill_deriv`: analytic partial derivatives, in parameter order
//! - `bounding_box`: optional default domain
//!
//! Parameter order follows `ModelKind::param_names`.

use crate::domain::ModelKind;

/// Half-width of the Gaussian bounding box, in standard deviations.
const GAUSSIAN_BOX_SIGMAS: f64 = 5.5;

/// Half-width of the Lorentzian bounding box, in FWHMs.
const LORENTZ_BOX_FWHMS: f64 = 25.0;

/// Evaluate `y(x)` for the given model kind.
///
/// # Panics
/// Panics if `params` is shorter than `kind.param_len()`.
pub fn evaluate(kind: ModelKind, x: f64, params: &[f64]) -> f64 {
    match kind {
        ModelKind::Gaussian1d => {
            let (amplitude, mean, stddev) = (params[0], params[1], params[2]);
            let d = x - mean;
            amplitude * (-0.5 * d * d / (stddev * stddev)).exp()
        }
        ModelKind::Lorentz1d => {
            let (amplitude, x_0, fwhm) = (params[0], params[1], params[2]);
            let g2 = (0.5 * fwhm).powi(2);
            let d = x - x_0;
            amplitude * g2 / (d * d + g2)
        }
        ModelKind::Linear1d => params[0] * x + params[1],
        ModelKind::Exponential1d => params[0] * (x / params[1]).exp(),
    }
}

/// Fill `out` with `d y / d param_j` at `x`. Always returns `true`.
pub fn fill_deriv(kind: ModelKind, x: f64, params: &[f64], out: &mut [f64]) -> bool {
    match kind {
        ModelKind::Gaussian1d => {
            let (amplitude, mean, stddev) = (params[0], params[1], params[2]);
            let d = x - mean;
            let s2 = stddev * stddev;
            let e = (-0.5 * d * d / s2).exp();
            out[0] = e;
            out[1] = amplitude * e * d / s2;
            out[2] = amplitude * e * d * d / (s2 * stddev);
        }
        ModelKind::Lorentz1d => {
            let (amplitude, x_0, fwhm) = (params[0], params[1], params[2]);
            let g = 0.5 * fwhm;
            let g2 = g * g;
            let d = x - x_0;
            let denom = d * d + g2;
            out[0] = g2 / denom;
            out[1] = 2.0 * amplitude * g2 * d / (denom * denom);
            out[2] = amplitude * g * d * d / (denom * denom);
        }
        ModelKind::Linear1d => {
            out[0] = x;
            out[1] = 1.0;
        }
        ModelKind::Exponential1d => {
            let (amplitude, tau) = (params[0], params[1]);
            let e = (x / tau).exp();
            out[0] = e;
            out[1] = -amplitude * x * e / (tau * tau);
        }
    }
    true
}

/// Default evaluation domain for peaked kinds.
pub fn bounding_box(kind: ModelKind, params: &[f64]) -> Option<(f64, f64)> {
    let (center, half) = match kind {
        ModelKind::Gaussian1d => (params[1], GAUSSIAN_BOX_SIGMAS * params[2].abs()),
        ModelKind::Lorentz1d => (params[1], LORENTZ_BOX_FWHMS * params[2].abs()),
        ModelKind::Linear1d | ModelKind::Exponential1d => return None,
    };
    (half.is_finite() && half > 0.0).then_some((center - half, center + half))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn numeric_deriv(kind: ModelKind, x: f64, params: &[f64]) -> Vec<f64> {
        (0..params.len())
            .map(|j| {
                let h = 1e-6 * params[j].abs().max(1.0);
                let mut hi = params.to_vec();
                let mut lo = params.to_vec();
                hi[j] += h;
                lo[j] -= h;
                (evaluate(kind, x, &hi) - evaluate(kind, x, &lo)) / (2.0 * h)
            })
            .collect()
    }

    #[test]
    fn gaussian_peak_and_half_width() {
        let p = [10.0, 4.6, 0.3];
        assert_relative_eq!(evaluate(ModelKind::Gaussian1d, 4.6, &p), 10.0);
        let hwhm = 0.3 * (2.0 * 2f64.ln()).sqrt();
        assert_relative_eq!(evaluate(ModelKind::Gaussian1d, 4.6 + hwhm, &p), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn lorentz_is_half_at_half_fwhm() {
        let p = [2.0, 1.0, 0.5];
        assert_relative_eq!(evaluate(ModelKind::Lorentz1d, 1.0, &p), 2.0);
        assert_relative_eq!(evaluate(ModelKind::Lorentz1d, 1.25, &p), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn analytic_derivatives_match_central_differences() {
        let cases: [(ModelKind, &[f64]); 4] = [
            (ModelKind::Gaussian1d, &[10.0, 4.6, 0.3]),
            (ModelKind::Lorentz1d, &[3.0, -1.0, 0.8]),
            (ModelKind::Linear1d, &[2.0, -1.0]),
            (ModelKind::Exponential1d, &[1.5, 2.0]),
        ];
        for (kind, params) in cases {
            for &x in &[-1.0, 0.3, 4.5, 4.9] {
                let mut out = vec![0.0; params.len()];
                assert!(fill_deriv(kind, x, params, &mut out));
                let num = numeric_deriv(kind, x, params);
                for (a, n) in out.iter().zip(&num) {
                    assert_relative_eq!(*a, *n, epsilon = 1e-5, max_relative = 1e-5);
                }
            }
        }
    }

    #[test]
    fn bounding_boxes() {
        let (lo, hi) = bounding_box(ModelKind::Gaussian1d, &[1.0, 0.0, 2.0]).unwrap();
        assert_relative_eq!(lo, -11.0);
        assert_relative_eq!(hi, 11.0);
        assert!(bounding_box(ModelKind::Linear1d, &[1.0, 0.0]).is_none());
        assert!(bounding_box(ModelKind::Gaussian1d, &[1.0, 0.0, 0.0]).is_none());
    }
}
