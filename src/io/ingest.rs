//! CSV ingest.
//!
//! Turns a CSV file with `x` and `y` columns into a clean `Dataset`.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Dataset;
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the dataset plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a dataset from a CSV file. The dataset label is the file stem.
pub fn load_dataset(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    read_dataset(file, label)
}

/// Read a dataset from any CSV source.
pub fn read_dataset<R: Read>(source: R, label: impl Into<String>) -> Result<IngestedData, AppError> {
    let label = label.into();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV header of '{label}': {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let x_col = require_column(&header_map, "x", &label)?;
    let y_col = require_column(&header_map, "y", &label)?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0;

    for (i, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        rows_read += 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: e.to_string(),
                });
                continue;
            }
        };
        match (parse_f64(&record, x_col), parse_f64(&record, y_col)) {
            (Ok(xv), Ok(yv)) => {
                x.push(xv);
                y.push(yv);
            }
            (Err(msg), _) | (_, Err(msg)) => row_errors.push(RowError { line, message: msg }),
        }
    }

    for e in &row_errors {
        log::warn!("{label}: skipping line {}: {}", e.line, e.message);
    }
    if x.is_empty() {
        return Err(AppError::new(3, format!("No usable rows in '{label}'.")));
    }

    Ok(IngestedData {
        dataset: Dataset::new(label, x, y),
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
        .collect()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str, label: &str) -> Result<usize, AppError> {
    header_map
        .get(name)
        .copied()
        .ok_or_else(|| AppError::input(format!("CSV '{label}' is missing required column '{name}'.")))
}

fn parse_f64(record: &StringRecord, col: usize) -> Result<f64, String> {
    let raw = record.get(col).unwrap_or("");
    let v: f64 = raw
        .parse()
        .map_err(|_| format!("column {} is not a number: '{raw}'", col + 1))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("column {} is not finite: '{raw}'", col + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_columns_in_any_order_and_case() {
        let csv = "Y, X, note\n1.5, 0.0, a\n2.5, 1.0, b\n";
        let data = read_dataset(csv.as_bytes(), "t").unwrap();
        assert_eq!(data.dataset.x, vec![0.0, 1.0]);
        assert_eq!(data.dataset.y, vec![1.5, 2.5]);
        assert!(data.row_errors.is_empty());
    }

    #[test]
    fn skips_bad_rows_and_reports_lines() {
        let csv = "x,y\n0,1\nfoo,2\n2,inf\n3,4\n";
        let data = read_dataset(csv.as_bytes(), "t").unwrap();
        assert_eq!(data.rows_read, 4);
        assert_eq!(data.dataset.len(), 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn missing_column_is_an_input_error() {
        let err = read_dataset("x,z\n1,2\n".as_bytes(), "t").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("'y'"));
    }

    #[test]
    fn no_usable_rows_is_insufficient_data() {
        let err = read_dataset("x,y\na,b\n".as_bytes(), "t").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
