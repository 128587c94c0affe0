use std::fs;
use std::path::Path;
use std::sync::Mutex;

use plotly::common::{Marker, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{Bar, HeatMap, Plot, Scatter};

use crate::confusion::ConfusionRates;
use crate::error::Result;

/// Plot rendering shares global state; only one writer at a time.
static PLOT_LOCK: Mutex<()> = Mutex::new(());

/// Write `plot` as a standalone HTML file, creating parent directories.
pub fn write_plot(plot: &Plot, path: &Path) -> Result<()> {
    // A poisoned lock only means another writer panicked; the guard is still usable
    let _guard = PLOT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, plot.to_html())?;
    log::debug!("Wrote plot to {}", path.display());
    Ok(())
}

/// Heat map of the 2x2 rate matrix, actual class on the y axis.
pub fn plot_confusion_rates(rates: &ConfusionRates, title: &str) -> Plot {
    let z = vec![
        vec![rates.tn_rate, rates.fp_rate],
        vec![rates.fn_rate, rates.tp_rate],
    ];
    let labels = vec!["No fault".to_string(), "Fault".to_string()];
    let trace = HeatMap::new(labels.clone(), labels, z);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Predicted"))
            .y_axis(Axis::new().title("Actual")),
    );
    plot
}

/// Single operating point in ROC space with the chance diagonal.
pub fn plot_roc_point(fp_rate: f64, tp_rate: f64, auc: f64, title: &str) -> Plot {
    let point = Scatter::new(vec![0.0, fp_rate, 1.0], vec![0.0, tp_rate, 1.0])
        .mode(Mode::LinesMarkers)
        .name(&format!("ROC (AUC = {:.3})", auc));
    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(plotly::common::Line::new().dash(plotly::common::DashType::Dash));

    let mut plot = Plot::new();
    plot.add_trace(point);
    plot.add_trace(chance);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False Positive Rate").range(vec![0.0, 1.0]))
            .y_axis(Axis::new().title("True Positive Rate").range(vec![0.0, 1.0])),
    );
    plot
}

/// Horizontal bar chart of ranked `(feature, score)` pairs, highest on top.
pub fn plot_importances(ranked: &[(String, f64)], title: &str) -> Plot {
    let names: Vec<String> = ranked.iter().rev().map(|(n, _)| n.clone()).collect();
    let scores: Vec<f64> = ranked.iter().rev().map(|(_, s)| *s).collect();
    let trace = Bar::new(scores, names).orientation(plotly::common::Orientation::Horizontal);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Importance")),
    );
    plot
}

/// One marker per snapshot, e.g. disk footprint against F1 score.
pub fn plot_snapshot_metrics(
    labels: &[String],
    x: &[f64],
    y: &[f64],
    x_title: &str,
    y_title: &str,
    title: &str,
) -> Plot {
    let trace = Scatter::new(x.to_vec(), y.to_vec())
        .mode(Mode::MarkersText)
        .text_array(labels.to_vec())
        .marker(Marker::new().size(10));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title(x_title))
            .y_axis(Axis::new().title(y_title)),
    );
    plot
}
