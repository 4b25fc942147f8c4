//! Calibration of every variant in a set over one observed window.
//!
//! Variants are independent, so they are fitted on the rayon pool unless the
//! caller asks for a sequential run. Output order follows the variant set in
//! both modes. A variant that fails (missing precipitation, solver error, ...)
//! is recorded in [`CalibrationRun::failures`] and never stops the others.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{CalibrationResult, CalibrationRun, ModelVariant, ObservedWindow, VariantFailure, VariantSet};
use crate::error::ModelError;
use crate::fit::objective::Objective;
use crate::fit::optimizer::{OptimSettings, minimize};

/// Calibrate one variant against `window`.
pub fn calibrate_variant(
    variant: &ModelVariant,
    window: &ObservedWindow,
    settings: &OptimSettings,
) -> Result<CalibrationResult, ModelError> {
    let objective = Objective::for_window(variant.kind(), window)?;
    debug!(
        variant = variant.name(),
        guess = ?variant.initial_guess(),
        days = window.len(),
        "calibrating"
    );

    let min = minimize(objective, variant.initial_guess().to_vec(), settings)?;
    info!(
        variant = variant.name(),
        initial_loss = min.diagnostics.initial_loss,
        loss = min.loss,
        params = ?min.params,
        iterations = min.diagnostics.iterations,
        evaluations = min.diagnostics.evaluations,
        termination = %min.diagnostics.termination,
        "calibrated"
    );

    Ok(CalibrationResult {
        variant: variant.clone(),
        params: min.params,
        loss: min.loss,
        window: window.clone(),
        diagnostics: min.diagnostics,
    })
}

/// Calibrate every variant in `variants` over `window`.
pub fn calibrate(
    variants: &VariantSet,
    window: &ObservedWindow,
    settings: &OptimSettings,
    parallel: bool,
) -> CalibrationRun {
    info!(
        variants = variants.len(),
        start = %window.start_date(),
        end = %window.end_date(),
        method = settings.method.display_name(),
        parallel,
        "starting calibration"
    );

    let fit = |v: &ModelVariant| (v.name().to_string(), calibrate_variant(v, window, settings));
    let outcomes: Vec<(String, Result<CalibrationResult, ModelError>)> = if parallel {
        variants.as_slice().par_iter().map(fit).collect()
    } else {
        variants.iter().map(fit).collect()
    };

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(r) => results.push(r),
            Err(e) => {
                warn!(variant = %name, error = %e, "variant skipped");
                failures.push(VariantFailure {
                    variant: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    CalibrationRun { results, failures }
}
