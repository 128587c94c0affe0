use std::io;
use std::path::Path;

use anyhow::{Context, Result};

use linkfault_models::models::driver::ModelDriver;

use crate::commands::load_dataset;
use crate::config::RunConfig;

/// Predict every row of `data` with a snapshot predictor and write
/// `row,prediction` CSV to `output`, or stdout. The feature columns of `data`
/// must match the ones the snapshot was trained on.
pub fn run_predict(snapshot: &Path, data: &Path, config: &RunConfig, output: Option<&Path>) -> Result<Vec<bool>> {
    let snapshot_str = snapshot
        .to_str()
        .with_context(|| format!("Snapshot path is not valid UTF-8: {}", snapshot.display()))?;
    let mut driver = ModelDriver::new(None, snapshot_str)?;
    let dataset = load_dataset(data, config)?;
    driver.model().check_feature_names(&dataset.feature_names)?;
    let predictions = driver.pred(dataset.x.view())?;

    match output {
        Some(path) => {
            let writer = csv::Writer::from_path(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_predictions(writer, &predictions)?;
            log::info!("Wrote {} predictions to {}", predictions.len(), path.display());
        }
        None => write_predictions(csv::Writer::from_writer(io::stdout()), &predictions)?,
    }
    Ok(predictions)
}

fn write_predictions<W: io::Write>(mut writer: csv::Writer<W>, predictions: &[bool]) -> Result<()> {
    writer.write_record(["row", "is_fault"])?;
    for (row, prediction) in predictions.iter().enumerate() {
        writer.write_record([row.to_string(), prediction.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}
