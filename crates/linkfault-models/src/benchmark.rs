//! Compute, disk and memory measurements for a fitted predictor.
//!
//! The resident-memory measurement samples process RSS around a
//! deserialization and is only a rough diagnostic; allocator behaviour makes
//! the delta noisy.
use std::fs;
use std::time::Instant;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::error::Result;
use crate::models::classifier_trait::Predictor;
use crate::models::persist::load_predictor;

const SCRATCH_FILE: &str = "predictor.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Cumulative wall-clock seconds over every run.
    pub compute_time: f64,
    pub disk_bytes: u64,
    /// Signed RSS delta across loading the saved predictor.
    pub ram_bytes: i64,
}

/// Seconds spent predicting `x` `n_runs` times in a row.
pub fn compute_time(predictor: &dyn Predictor, x: ArrayView2<'_, f32>, n_runs: usize) -> Result<f64> {
    let start = Instant::now();
    for _ in 0..n_runs {
        predictor.test(x)?;
    }
    Ok(start.elapsed().as_secs_f64())
}

/// Size in bytes of the file written by `save`.
pub fn disk_footprint(predictor: &dyn Predictor) -> Result<u64> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(SCRATCH_FILE);
    predictor.save(&path)?;
    Ok(fs::metadata(&path)?.len())
}

/// Resident set size of the current process in bytes.
pub fn resident_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return None;
    }
    sys.process(pid).map(|process| process.memory())
}

/// RSS after loading the saved predictor minus RSS before. Zero when the
/// platform does not report process memory.
pub fn ram_footprint(predictor: &dyn Predictor) -> Result<i64> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(SCRATCH_FILE);
    predictor.save(&path)?;

    let before = resident_memory();
    let loaded = load_predictor(&path)?;
    let after = resident_memory();
    drop(loaded);

    match (before, after) {
        (Some(before), Some(after)) => Ok(after as i64 - before as i64),
        _ => {
            log::warn!("Resident memory is unavailable on this platform; reporting 0 bytes");
            Ok(0)
        }
    }
}
