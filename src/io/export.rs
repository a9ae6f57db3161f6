//! Exports: fitted result JSON and per-point residual CSV.
//!
//! The result JSON is the portable representation of a joint fit:
//! - shared parameter names and values
//! - every model's kind, parameter names and fitted values
//! - solver diagnostics
//! - a precomputed fitted grid per model for quick plotting
//!
//! The schema is defined by `domain::ResultFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{Dataset, FittedModel, ResultFile, SolverStats};
use crate::error::AppError;
use crate::fit::{JointFitReport, SharedParams};
use crate::models::Model1D;
use crate::report::{PointResidual, grid_range, model_grid};

/// Number of points in each exported fitted grid.
const GRID_POINTS: usize = 101;

/// Assemble the result file for a finished joint fit.
pub fn build_result(
    models: &[Box<dyn Model1D>],
    shared: &SharedParams,
    datasets: &[Dataset],
    report: &JointFitReport,
) -> ResultFile {
    let fitted = models
        .iter()
        .enumerate()
        .map(|(k, model)| {
            let (x_min, x_max) = grid_range(model.as_ref(), datasets.get(k));
            FittedModel {
                name: model.name().to_string(),
                kind: model.kind(),
                param_names: model.param_names().into_iter().map(str::to_string).collect(),
                values: model.values(),
                rmse: report.rmse.get(k).copied().unwrap_or(f64::NAN),
                grid: model_grid(model.as_ref(), x_min, x_max, GRID_POINTS),
            }
        })
        .collect();

    ResultFile {
        tool: "jf".to_string(),
        created: Utc::now(),
        shared_names: shared.clone(),
        shared_values: report.shared_values.clone(),
        models: fitted,
        solver: SolverStats {
            cost: report.cost,
            iterations: report.iterations,
            residual_evals: report.residual_evals,
            converged: report.converged,
            stop_reason: report.stop_reason.describe().to_string(),
        },
    }
}

/// Write a result JSON file.
pub fn write_result_json(path: &Path, result: &ResultFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create result JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, result)
        .map_err(|e| AppError::input(format!("Failed to write result JSON: {e}")))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Read a result JSON file.
pub fn read_result_json(path: &Path) -> Result<ResultFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open result JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid result JSON: {e}")))
}

/// Write per-point residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, residuals: &[PointResidual]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create residual CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["dataset", "x", "y_obs", "y_fit", "residual"])
        .map_err(|e| AppError::input(format!("Failed to write residual CSV header: {e}")))?;

    for r in residuals {
        writer
            .write_record([
                r.dataset.clone(),
                format!("{:.10}", r.x),
                format!("{:.10}", r.y_obs),
                format!("{:.10}", r.y_fit),
                format!("{:.10}", r.residual),
            ])
            .map_err(|e| AppError::input(format!("Failed to write residual CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush residual CSV: {e}")))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::fit::StopReason;
    use crate::models::BuiltinModel;

    fn sample() -> (Vec<Box<dyn Model1D>>, SharedParams, Vec<Dataset>, JointFitReport) {
        let models: Vec<Box<dyn Model1D>> = vec![
            Box::new(BuiltinModel::new("a", ModelKind::Linear1d, &[1.0, 0.0]).unwrap()),
            Box::new(BuiltinModel::new("b", ModelKind::Linear1d, &[1.0, 2.0]).unwrap()),
        ];
        let shared = SharedParams::from([
            ("a".to_string(), vec!["slope".to_string()]),
            ("b".to_string(), vec!["slope".to_string()]),
        ]);
        let datasets = vec![
            Dataset::new("a", vec![0.0, 2.0], vec![0.0, 2.0]),
            Dataset::new("b", vec![0.0, 4.0], vec![2.0, 6.0]),
        ];
        let report = JointFitReport {
            shared_values: vec![1.0],
            model_values: vec![vec![1.0, 0.0], vec![1.0, 2.0]],
            rmse: vec![0.0, 0.0],
            cost: 0.0,
            iterations: 3,
            residual_evals: 4,
            converged: true,
            stop_reason: StopReason::GradientTolerance,
            trace: None,
        };
        (models, shared, datasets, report)
    }

    #[test]
    fn result_json_round_trips_through_disk() {
        let (models, shared, datasets, report) = sample();
        let result = build_result(&models, &shared, &datasets, &report);
        assert_eq!(result.models[1].grid.x.len(), GRID_POINTS);
        assert_eq!(result.models[1].grid.x[GRID_POINTS - 1], 4.0);
        assert_eq!(result.models[1].grid.y[0], 2.0);

        let path = std::env::temp_dir().join(format!("jf_result_{}.json", std::process::id()));
        write_result_json(&path, &result).unwrap();
        let back = read_result_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, result);
    }

    #[test]
    fn residual_csv_has_header_and_rows() {
        let rows = vec![PointResidual {
            dataset: "a".into(),
            x: 1.0,
            y_obs: 2.0,
            y_fit: 1.5,
            residual: 0.5,
        }];
        let path = std::env::temp_dir().join(format!("jf_residuals_{}.csv", std::process::id()));
        write_residuals_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("dataset,x,y_obs,y_fit,residual"));
        assert_eq!(
            lines.next(),
            Some("a,1.0000000000,2.0000000000,1.5000000000,0.5000000000")
        );
    }
}
