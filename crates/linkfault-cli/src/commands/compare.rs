//! Tabulate and plot snapshot metrics across models or granularities.
use std::path::Path;

use anyhow::{anyhow, Result};

use linkfault_models::report::plots::{plot_snapshot_metrics, write_plot};
use linkfault_models::snapshot::{list_snapshots, Snapshot};

const COLUMNS: [&str; 8] = [
    "Accuracy",
    "Precision",
    "Recall",
    "F1 Score",
    "AUC",
    "Area under the Precision-Recall",
    "Compute per Analysis",
    "Disk",
];

pub fn run_compare(dir: &Path) -> Result<Vec<Snapshot>> {
    let snapshots = list_snapshots(dir)?;
    if snapshots.is_empty() {
        return Err(anyhow!("No snapshot files found in {}", dir.display()));
    }

    println!("{:<32} {}", "Model", COLUMNS.join("\t"));
    for snapshot in &snapshots {
        let values: Vec<String> = COLUMNS
            .iter()
            .map(|metric| snapshot.metrics.get(metric).unwrap_or("-").to_string())
            .collect();
        println!("{:<32} {}", snapshot.model_name, values.join("\t"));
    }
    Ok(snapshots)
}

/// Scatter of `y_metric` against `x_metric`, one labelled point per
/// snapshot. Snapshots missing either metric are left out.
pub fn plot_compare(snapshots: &[Snapshot], x_metric: &str, y_metric: &str, output: &Path) -> Result<()> {
    let mut labels = Vec::new();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for snapshot in snapshots {
        if let (Some(x), Some(y)) = (snapshot.metrics.get_f64(x_metric), snapshot.metrics.get_f64(y_metric)) {
            labels.push(snapshot.model_name.clone());
            xs.push(x);
            ys.push(y);
        }
    }
    if labels.is_empty() {
        return Err(anyhow!("No snapshot reports both '{}' and '{}'", x_metric, y_metric));
    }

    let title = format!("{} vs {}", y_metric, x_metric);
    let plot = plot_snapshot_metrics(&labels, &xs, &ys, x_metric, y_metric, &title);
    write_plot(&plot, output)?;
    log::info!("Comparison plot written to {}", output.display());
    Ok(())
}
