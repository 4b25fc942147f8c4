//! Shared pipeline logic behind the `calibrate`, `run` and `apply` commands.
//!
//! ingest -> window extraction -> calibration -> (application)
//!
//! The command handlers in `app.rs` only deal with printing and exports.

use tracing::{info, warn};

use crate::apply::apply;
use crate::data::CatchmentSeries;
use crate::domain::{ApplicationRun, ApplyConfig, CalibrationRun, RunConfig, VariantFailure, VariantSet};
use crate::error::AppError;
use crate::fit::calibrate;
use crate::io::ingest::{IngestOptions, IngestedSeries, load_catchment_csv};
use crate::io::results::{ResultsFile, read_results_json};

/// All computed outputs of a `calibrate` or `run` invocation.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedSeries,
    pub variants: VariantSet,
    pub calibration: CalibrationRun,
    /// Present when the config carries an application window.
    pub application: Option<ApplicationRun>,
}

impl RunOutput {
    pub fn results_file(&self) -> ResultsFile {
        ResultsFile::new(self.calibration.clone(), self.application.clone())
    }
}

/// All computed outputs of an `apply` invocation.
#[derive(Debug, Clone)]
pub struct ApplyOutput {
    pub ingest: IngestedSeries,
    /// Calibration read back from the results JSON.
    pub calibration: CalibrationRun,
    pub application: ApplicationRun,
}

impl ApplyOutput {
    pub fn results_file(&self) -> ResultsFile {
        ResultsFile::new(self.calibration.clone(), Some(self.application.clone()))
    }
}

/// Load the dataset from `config.data_path` and run the pipeline.
pub fn run_calibration(config: &RunConfig) -> Result<RunOutput, AppError> {
    let options = IngestOptions {
        temp_unit: config.temp_unit,
        discharge_unit: config.discharge_unit,
    };
    let ingest = load_catchment_csv(&config.data_path, options)?;
    run_calibration_with_data(config, ingest)
}

/// Run the pipeline on an already ingested dataset.
pub fn run_calibration_with_data(config: &RunConfig, ingest: IngestedSeries) -> Result<RunOutput, AppError> {
    config.optim.validate()?;
    let variants = variants_for(&ingest.series, config)?;

    let cal_window = ingest.series.window(config.cal_start, config.cal_end)?;
    info!(
        start = %cal_window.start_date(),
        end = %cal_window.end_date(),
        days = cal_window.len(),
        "calibration window"
    );

    let calibration = calibrate(&variants, &cal_window, &config.optim, config.parallel);
    if calibration.results.is_empty() {
        return Err(all_failed("calibrated", &calibration.failures));
    }

    let application = match config.app_window {
        Some((start, end)) => {
            let app_window = ingest.series.window(start, end)?;
            let run = apply(&calibration.results, &app_window, config.parallel);
            if run.results.is_empty() {
                return Err(all_failed("applied", &run.failures));
            }
            Some(run)
        }
        None => None,
    };

    Ok(RunOutput {
        ingest,
        variants,
        calibration,
        application,
    })
}

/// Apply a saved calibration to the dataset at `config.data_path`.
pub fn run_apply(config: &ApplyConfig) -> Result<ApplyOutput, AppError> {
    let saved = read_results_json(&config.calibration_path)?;
    let options = IngestOptions {
        temp_unit: config.temp_unit,
        discharge_unit: config.discharge_unit,
    };
    let ingest = load_catchment_csv(&config.data_path, options)?;

    let window = ingest.series.window(config.app_start, config.app_end)?;
    let application = apply(&saved.calibration.results, &window, config.parallel);
    if application.results.is_empty() {
        return Err(all_failed("applied", &application.failures));
    }

    Ok(ApplyOutput {
        ingest,
        calibration: saved.calibration,
        application,
    })
}

/// The variant set to fit on `series`.
///
/// Without precipitation in the dataset, the default set drops the variants
/// that need it. Explicitly requested variants are kept and fail on their own.
fn variants_for(series: &CatchmentSeries, config: &RunConfig) -> Result<VariantSet, AppError> {
    if series.has_precip() || config.explicit_variants {
        return Ok(config.variants.clone());
    }
    let dropped: Vec<&str> = config
        .variants
        .iter()
        .filter(|v| v.kind().needs_precip())
        .map(|v| v.name())
        .collect();
    if !dropped.is_empty() {
        warn!(variants = ?dropped, "dataset has no precipitation; skipping variants that need it");
    }
    config
        .variants
        .without_precip()
        .map_err(|e| AppError::new(3, format!("No variant can be fitted without precipitation: {e}")))
}

fn all_failed(stage: &str, failures: &[VariantFailure]) -> AppError {
    let mut msg = format!("No variant could be {stage}:");
    for f in failures {
        msg.push_str(&format!("\n  - {}: {}", f.variant, f.reason));
    }
    AppError::new(4, msg)
}
