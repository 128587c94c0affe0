//! Snapshot files: a saved predictor and an 18-row `Metric,Value` table
//! written side by side under `<root>/<dataset>/<DD-Month>-<model>`.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::confusion::ConfusionRates;
use crate::error::{EvalError, Result};

pub const DEFAULT_SNAPSHOT_ROOT: &str = "model-snapshots";
pub const PREDICTOR_EXTENSION: &str = "json";
pub const METRICS_EXTENSION: &str = "csv";

/// Row labels of the metrics table, in file order.
pub const METRIC_LABELS: [&str; 18] = [
    "Model name",
    "Dataset name",
    "Accuracy",
    "Precision",
    "Recall",
    "Specificity",
    "F1 Score",
    "AUC",
    "True Negative Rate",
    "False Positive Rate",
    "False Negative Rate",
    "True Positive Rate",
    "Area under the Precision-Recall",
    "Total Samples",
    "Compute per Analysis",
    "Disk",
    "RAM",
    "Train Time",
];

/// Everything recorded by one `take_snapshot` call.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRecord {
    pub model_name: String,
    pub dataset_name: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1: f64,
    pub auc: f64,
    pub rates: ConfusionRates,
    pub auprc: f64,
    pub total_samples: usize,
    pub compute_per_analysis: f64,
    pub disk_bytes: u64,
    pub ram_bytes: i64,
    pub train_time: f64,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
}

impl SnapshotRecord {
    /// `(label, value)` pairs in the order of [`METRIC_LABELS`].
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let values = [
            self.model_name.clone(),
            self.dataset_name.clone(),
            self.accuracy.to_string(),
            self.precision.to_string(),
            self.recall.to_string(),
            self.specificity.to_string(),
            self.f1.to_string(),
            self.auc.to_string(),
            self.rates.tn_rate.to_string(),
            self.rates.fp_rate.to_string(),
            self.rates.fn_rate.to_string(),
            self.rates.tp_rate.to_string(),
            self.auprc.to_string(),
            self.total_samples.to_string(),
            self.compute_per_analysis.to_string(),
            self.disk_bytes.to_string(),
            self.ram_bytes.to_string(),
            self.train_time.to_string(),
        ];
        METRIC_LABELS.iter().copied().zip(values).collect()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["Metric", "Value"])?;
        for (label, value) in self.rows() {
            writer.write_record([label, value.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// File stem `<DD-Month>-<model_name>`, e.g. `07-March-GBDTClassifier`.
pub fn snapshot_stem(model_name: &str, date: NaiveDate) -> String {
    format!("{}-{}", date.format("%d-%B"), model_name)
}

/// Today's predictor and metrics paths, creating the dataset directory.
pub fn prepare_snapshot_paths(
    root: &Path,
    dataset_name: &str,
    model_name: &str,
) -> Result<(PathBuf, PathBuf)> {
    let dataset_dir = root.join(dataset_name);
    fs::create_dir_all(&dataset_dir)?;

    let stem = snapshot_stem(model_name, Local::now().date_naive());
    Ok((
        dataset_dir.join(format!("{}.{}", stem, PREDICTOR_EXTENSION)),
        dataset_dir.join(format!("{}.{}", stem, METRICS_EXTENSION)),
    ))
}

/// Metrics table of a snapshot, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotMetrics {
    pub rows: Vec<(String, String)>,
}

impl SnapshotMetrics {
    pub fn get(&self, metric: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(label, _)| label == metric)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_f64(&self, metric: &str) -> Option<f64> {
        self.get(metric).and_then(|v| v.parse().ok())
    }
}

pub fn read_snapshot(path: &Path) -> Result<SnapshotMetrics> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() < 2 {
            return Err(EvalError::Serialization(format!(
                "{}: metric row with {} fields",
                path.display(),
                record.len()
            )));
        }
        rows.push((record[0].to_string(), record[1].to_string()));
    }
    Ok(SnapshotMetrics { rows })
}

/// A metrics file found by [`list_snapshots`].
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub file_name: String,
    pub day: u32,
    pub month: String,
    pub model_name: String,
    pub metrics: SnapshotMetrics,
}

/// Parse `<day>-<month>-<model>` into its parts.
fn parse_stem(stem: &str) -> Option<(u32, String, String)> {
    let mut parts = stem.splitn(3, '-');
    let day = parts.next()?.parse().ok()?;
    let month = parts.next()?.to_string();
    let model = parts.next()?.to_string();
    if month.is_empty() || model.is_empty() {
        return None;
    }
    Some((day, month, model))
}

/// Every snapshot metrics file in `dir`, sorted by file name. Files that do
/// not follow the naming scheme are skipped.
pub fn list_snapshots(dir: &Path) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(METRICS_EXTENSION) {
            continue;
        }
        let (Some(file_name), Some(stem)) = (
            path.file_name().and_then(|n| n.to_str()),
            path.file_stem().and_then(|s| s.to_str()),
        ) else {
            continue;
        };
        let Some((day, month, model_name)) = parse_stem(stem) else {
            log::debug!("Skipping {}: not a snapshot file name", path.display());
            continue;
        };
        snapshots.push(Snapshot {
            file_name: file_name.to_string(),
            day,
            month,
            model_name,
            metrics: read_snapshot(&path)?,
        });
    }
    snapshots.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(snapshots)
}
