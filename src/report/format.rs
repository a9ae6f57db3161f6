//! Formatted terminal output for fit results.

use crate::domain::Dataset;
use crate::fit::{JointFitReport, SharedParams, SingleFitReport};
use crate::models::Model1D;

/// Format the joint fit summary: datasets, shared values, per-model parameters
/// and solver diagnostics.
pub fn format_joint_summary(
    models: &[Box<dyn Model1D>],
    shared: &SharedParams,
    datasets: &[Dataset],
    report: &JointFitReport,
) -> String {
    let mut out = String::new();

    out.push_str("=== jf - joint fit ===\n");
    for (model, data) in models.iter().zip(datasets) {
        let kind = model.kind().map(|k| k.display_name()).unwrap_or("custom");
        match data.x_range() {
            Some((lo, hi)) => out.push_str(&format!(
                "{:<10} {:<14} data={} n={} x=[{lo:.3}, {hi:.3}]\n",
                model.name(),
                kind,
                data.label,
                data.len()
            )),
            None => out.push_str(&format!(
                "{:<10} {:<14} data={} n={}\n",
                model.name(),
                kind,
                data.label,
                data.len()
            )),
        }
    }

    out.push_str("\nShared parameters:\n");
    for (slot, value) in report.shared_values.iter().enumerate() {
        let names: Vec<String> = shared
            .iter()
            .filter_map(|(model, names)| names.get(slot).map(|n| format!("{model}.{n}")))
            .collect();
        out.push_str(&format!("  [{slot}] {value:>14.6}  ({})\n", names.join(", ")));
    }

    out.push_str("\nFitted models:\n");
    for (k, model) in models.iter().enumerate() {
        let shared_names = shared.get(model.name());
        out.push_str(&format!("  {}:\n", model.name()));
        for p in model.parameters() {
            let mark = if shared_names.is_some_and(|names| names.contains(&p.name)) {
                "*"
            } else {
                " "
            };
            out.push_str(&format!("   {mark} {:<12} {:>14.6}\n", p.name, p.value));
        }
        if let Some(rmse) = report.rmse.get(k) {
            out.push_str(&format!("     rmse         {rmse:>14.6}\n"));
        }
    }

    out.push_str(&format!(
        "\nSolver: cost={:.6e} iterations={} evals={} converged={} ({})\n",
        report.cost,
        report.iterations,
        report.residual_evals,
        report.converged,
        report.stop_reason.describe()
    ));

    if let Some(trace) = &report.trace {
        out.push_str("\nIterations:\n");
        for t in trace {
            out.push_str(&format!(
                "  {:>4} cost={:.6e} lambda={:.3e} step={:.3e} {}\n",
                t.iter,
                t.cost,
                t.lambda,
                t.step_norm,
                if t.accepted { "accepted" } else { "rejected" }
            ));
        }
    }

    out
}

/// Format independent fits next to the joint fit, for comparison.
pub fn format_independent(fits: &[(Box<dyn Model1D>, SingleFitReport)]) -> String {
    let mut out = String::new();
    out.push_str("\nIndependent fits (no shared parameters):\n");
    for (model, report) in fits {
        out.push_str(&format!(
            "  {:<10} {}  rmse={:.6}{}\n",
            model.name(),
            fmt_vec(&report.values),
            report.rmse,
            if report.converged { "" } else { "  (not converged)" }
        ));
    }
    out
}

/// Ordered parameter values, e.g. `[9.823, 4.600, 0.301]`.
pub fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::fit::{StopReason, TraceRecord};
    use crate::models::BuiltinModel;

    #[test]
    fn summary_marks_shared_parameters() {
        let models: Vec<Box<dyn Model1D>> = vec![
            Box::new(BuiltinModel::new("g1", ModelKind::Gaussian1d, &[9.5, 4.6, 0.3]).unwrap()),
            Box::new(BuiltinModel::new("g2", ModelKind::Gaussian1d, &[9.5, 4.7, 0.2]).unwrap()),
        ];
        let shared = SharedParams::from([
            ("g1".to_string(), vec!["amplitude".to_string()]),
            ("g2".to_string(), vec!["amplitude".to_string()]),
        ]);
        let datasets = vec![
            Dataset::new("a", vec![4.0, 5.0], vec![1.0, 2.0]),
            Dataset::new("b", vec![4.0, 6.0], vec![1.0, 2.0]),
        ];
        let report = JointFitReport {
            shared_values: vec![9.5],
            model_values: vec![vec![9.5, 4.6, 0.3], vec![9.5, 4.7, 0.2]],
            rmse: vec![0.1, 0.2],
            cost: 0.05,
            iterations: 7,
            residual_evals: 9,
            converged: true,
            stop_reason: StopReason::CostTolerance,
            trace: None,
        };

        let txt = format_joint_summary(&models, &shared, &datasets, &report);
        assert!(txt.contains("[0]       9.500000  (g1.amplitude, g2.amplitude)"));
        assert!(txt.contains("   * amplitude          9.500000"));
        assert!(txt.contains("     mean               4.600000"));
        assert!(txt.contains("converged=true"));
        assert!(!txt.contains("Iterations:"));

        let traced = JointFitReport {
            trace: Some(vec![
                TraceRecord { iter: 0, cost: 2.0, lambda: 1e-3, step_norm: 0.5, accepted: true },
                TraceRecord { iter: 1, cost: 2.0, lambda: 1e-3, step_norm: 0.25, accepted: false },
            ]),
            ..report
        };
        let txt = format_joint_summary(&models, &shared, &datasets, &traced);
        assert!(txt.contains("Iterations:\n     0 cost=2.000000e0 lambda=1.000e-3 step=5.000e-1 accepted\n"));
        assert!(txt.contains("     1 cost=2.000000e0 lambda=1.000e-3 step=2.500e-1 rejected\n"));
    }

    #[test]
    fn fmt_vec_basic() {
        assert_eq!(fmt_vec(&[1.0, -2.5]), "[1.000000, -2.500000]");
    }
}
