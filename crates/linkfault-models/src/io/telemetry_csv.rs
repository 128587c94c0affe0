//! Preprocessed link-telemetry feature CSV reader.
use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::{Array1, Array2};

use crate::data_handling::Dataset;

/// Configuration for reading a feature CSV.
#[derive(Debug, Clone)]
pub struct FeatureCsvConfig {
    /// Boolean fault label column.
    pub label_column: String,
    /// Columns that are neither features nor the label (index, timestamp).
    /// Names absent from the header are ignored.
    pub drop_columns: Vec<String>,
}

impl Default for FeatureCsvConfig {
    fn default() -> Self {
        Self {
            label_column: "is_fault".to_string(),
            drop_columns: vec!["Unnamed: 0".to_string(), "".to_string(), "ts".to_string()],
        }
    }
}

/// Read a feature CSV into a [`Dataset`].
pub fn read_feature_csv<P: AsRef<Path>>(
    path: P,
    label_column: &str,
    drop_columns: &[String],
) -> Result<Dataset> {
    let config = FeatureCsvConfig {
        label_column: label_column.to_string(),
        drop_columns: drop_columns.to_vec(),
    };
    read_feature_csv_with_config(path, &config)
}

/// Read a feature CSV using a custom configuration.
///
/// Rows with any missing value are dropped, since lagged round-trip features
/// are undefined for the first measurements of a link.
pub fn read_feature_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &FeatureCsvConfig,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open feature CSV: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read feature CSV header row")?
        .clone();

    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;

    let dropped: HashSet<&str> = config.drop_columns.iter().map(String::as_str).collect();
    let feature_indices: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|&(idx, name)| idx != label_idx && !dropped.contains(name.trim()))
        .map(|(idx, _)| idx)
        .collect();
    if feature_indices.is_empty() {
        return Err(anyhow!("No feature columns left after dropping {:?}", config.drop_columns));
    }

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        if record.iter().any(is_missing) {
            skipped += 1;
            continue;
        }

        let label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?;
        labels.push(
            parse_bool(label)
                .ok_or_else(|| anyhow!("Invalid label '{}' at row {}", label, row_idx + 1))?,
        );

        for &idx in &feature_indices {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing feature value at row {}", row_idx + 1))?;
            let parsed = parse_feature(value).with_context(|| {
                format!(
                    "Invalid feature '{}' at row {}",
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1
                )
            })?;
            features.push(parsed);
        }
    }

    if skipped > 0 {
        log::info!("Dropped {} rows with missing values", skipped);
    }

    let n_samples = labels.len();
    let x = Array2::from_shape_vec((n_samples, feature_indices.len()), features)
        .context("Failed to build feature matrix")?;
    let feature_names = feature_indices
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();

    Dataset::new(feature_names, x, Array1::from_vec(labels)).context("Inconsistent feature table")
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header.trim() == name)
}

fn is_missing(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "nan" | "na" | "n/a" | "null"
    )
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" => Some(true),
        "false" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

/// Numeric cells as f32; one-hot and flag columns may be written as booleans.
fn parse_feature(value: &str) -> Result<f32> {
    if let Some(flag) = parse_bool(value) {
        return Ok(if flag { 1.0 } else { 0.0 });
    }
    value
        .trim()
        .parse::<f32>()
        .map_err(|e| anyhow!("{}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CSV: &str = "\
,ts,rssi,rsrq,rtt,node_id_4120,is_fault
0,2023-01-01 00:00:00,-70,-9,20.5,True,False
1,2023-01-01 00:00:01,-71,-12,,False,True
2,2023-01-01 00:00:02,-75,-11,80,False,True
3,2023-01-01 00:00:03,-69,-8,25,True,False
";

    #[test]
    fn test_reads_and_drops_incomplete_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        fs::write(&path, CSV).unwrap();

        let ds = read_feature_csv_with_config(&path, &FeatureCsvConfig::default()).unwrap();
        assert_eq!(ds.feature_names, vec!["rssi", "rsrq", "rtt", "node_id_4120"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.y.to_vec(), vec![false, true, false]);
        assert_eq!(ds.x.row(1).to_vec(), vec![-75.0, -11.0, 80.0, 0.0]);
        assert_eq!(ds.x[[0, 3]], 1.0);
    }

    #[test]
    fn test_missing_label_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        fs::write(&path, CSV).unwrap();

        let err = read_feature_csv(&path, "label", &[]).unwrap_err();
        assert!(err.to_string().contains("Missing label column"));
    }

    #[test]
    fn test_invalid_feature_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        fs::write(&path, "rtt,is_fault\n12,False\nslow,True\n").unwrap();

        let err = read_feature_csv(&path, "is_fault", &[]).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2"));
    }
}
