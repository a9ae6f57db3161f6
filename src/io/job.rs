//! Job files.
//!
//! A job file describes one joint fit: the models, which of their parameters
//! are shared, the shared initial values, where each dataset comes from, and
//! optional solver settings. The schema is `domain::JobFile`.

use std::fs::File;
use std::path::Path;

use crate::data::generate_dataset;
use crate::domain::{Dataset, DatasetSource, JobFile, ModelEntry};
use crate::error::AppError;
use crate::io::ingest::load_dataset;
use crate::models::{BuiltinModel, Model1D};

/// Read and parse a job file.
pub fn read_job(path: &Path) -> Result<JobFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open job file '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid job file '{}': {e}", path.display())))
}

/// Instantiate the job's models, in order.
pub fn build_models(job: &JobFile) -> Result<Vec<Box<dyn Model1D>>, AppError> {
    job.models
        .iter()
        .map(|entry| build_model(entry).map(|m| Box::new(m) as Box<dyn Model1D>))
        .collect()
}

fn build_model(entry: &ModelEntry) -> Result<BuiltinModel, AppError> {
    let mut model = match &entry.params {
        Some(values) => BuiltinModel::new(&entry.name, entry.kind, values)?,
        None => BuiltinModel::with_defaults(&entry.name, entry.kind),
    };
    for name in &entry.fixed {
        let p = model.parameter_mut(name).ok_or_else(|| {
            AppError::input(format!("Model '{}' has no parameter '{name}' to fix.", entry.name))
        })?;
        p.fixed = true;
    }
    Ok(model)
}

/// Load the job's datasets, one per model. Relative CSV paths resolve against
/// `base_dir` (normally the job file's directory).
///
/// Synthetic datasets sample the matching model at its initial values.
pub fn load_datasets(job: &JobFile, models: &[Box<dyn Model1D>], base_dir: &Path) -> Result<Vec<Dataset>, AppError> {
    if job.datasets.len() != models.len() {
        return Err(AppError::input(format!(
            "Job lists {} models but {} datasets.",
            models.len(),
            job.datasets.len()
        )));
    }

    job.datasets
        .iter()
        .zip(models)
        .map(|(source, model)| match source {
            DatasetSource::Csv(path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                let ingested = load_dataset(&path)?;
                log::info!(
                    "loaded '{}': {} of {} rows used",
                    path.display(),
                    ingested.dataset.len(),
                    ingested.rows_read
                );
                Ok(ingested.dataset)
            }
            DatasetSource::Synthetic(spec) => generate_dataset(model.as_ref(), spec, model.name()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelKind, SolverSettings, SyntheticSpec};
    use std::collections::BTreeMap;

    fn job() -> JobFile {
        JobFile {
            models: vec![
                ModelEntry {
                    name: "g1".into(),
                    kind: ModelKind::Gaussian1d,
                    params: Some(vec![10.0, 4.6, 0.3]),
                    fixed: vec![],
                },
                ModelEntry {
                    name: "l1".into(),
                    kind: ModelKind::Linear1d,
                    params: None,
                    fixed: vec!["intercept".into()],
                },
            ],
            shared: BTreeMap::new(),
            initvals: vec![],
            datasets: vec![
                DatasetSource::Synthetic(SyntheticSpec {
                    n: 5,
                    x_min: 0.0,
                    x_max: 1.0,
                    noise: 0.0,
                    seed: 0,
                }),
                DatasetSource::Synthetic(SyntheticSpec {
                    n: 3,
                    x_min: 0.0,
                    x_max: 2.0,
                    noise: 0.0,
                    seed: 0,
                }),
            ],
            solver: SolverSettings::default(),
        }
    }

    #[test]
    fn builds_models_with_defaults_and_fixed_flags() {
        let models = build_models(&job()).unwrap();
        assert_eq!(models[0].values(), vec![10.0, 4.6, 0.3]);
        assert_eq!(models[1].values(), vec![1.0, 0.0]);
        assert!(models[1].parameters()[1].fixed);
    }

    #[test]
    fn unknown_fixed_parameter_is_rejected() {
        let mut j = job();
        j.models[0].fixed = vec!["width".into()];
        assert!(build_models(&j).is_err());
    }

    #[test]
    fn synthetic_datasets_follow_their_model() {
        let j = job();
        let models = build_models(&j).unwrap();
        let data = load_datasets(&j, &models, Path::new(".")).unwrap();
        assert_eq!(data[1].label, "l1");
        assert_eq!(data[1].y, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn dataset_count_must_match() {
        let mut j = job();
        j.datasets.pop();
        let models = build_models(&j).unwrap();
        assert!(load_datasets(&j, &models, Path::new(".")).is_err());
    }
}
