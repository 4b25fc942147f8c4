//! Read/write results JSON files.
//!
//! A results file is the portable record of a run:
//! - every calibrated variant with its parameters, loss, optimizer
//!   diagnostics and the calibration window it was fitted on
//! - optionally, the application results (regression stats, skill scores,
//!   modeled series)
//!
//! `nrf apply` reads the calibration part back, so calibration and
//! application can happen in separate invocations.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ApplicationRun, CalibrationRun};
use crate::error::AppError;

const TOOL: &str = "nrf";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub version: String,
    pub calibration: CalibrationRun,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationRun>,
}

impl ResultsFile {
    pub fn new(calibration: CalibrationRun, application: Option<ApplicationRun>) -> Self {
        Self {
            tool: TOOL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            calibration,
            application,
        }
    }
}

/// Write a results JSON file.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, results)
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON '{}': {e}", path.display())))
}

/// Read a results JSON file.
///
/// Every window and variant is re-validated on load, so a hand-edited file
/// with misaligned series is rejected here rather than deep in a run.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let results: ResultsFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid results JSON: {e}")))?;
    if results.calibration.results.is_empty() {
        return Err(AppError::new(3, "Results JSON contains no calibrated variants."));
    }
    Ok(results)
}
