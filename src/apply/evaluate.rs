//! Forward evaluation and regression scoring.
//!
//! For each calibrated variant:
//! - run the transfer function at the fitted parameters over the window
//! - regress observed discharge on the modeled series
//!   (`observed ≈ slope * modeled + intercept`)
//! - compute hydrological skill scores
//!
//! A degenerate regression (e.g. the modeled series is flat because no day
//! in the window crosses the melt threshold) is recorded as a failure for
//! that variant only.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{ApplicationResult, ApplicationRun, CalibrationResult, ObservedWindow, VariantFailure};
use crate::error::ModelError;
use crate::math::{linregress, skill_scores};
use crate::models::predict;

/// Score one calibrated variant over `window`.
pub fn apply_calibration(
    calibration: &CalibrationResult,
    window: &ObservedWindow,
) -> Result<ApplicationResult, ModelError> {
    let variant = &calibration.variant;
    let modeled = predict(variant.kind(), window.bundle(), &calibration.params)?;
    let stats = linregress(&modeled, window.observed())?;
    let skill = skill_scores(window.observed(), &modeled);

    info!(
        variant = variant.name(),
        slope = stats.slope,
        intercept = stats.intercept,
        r = stats.r_value,
        p = stats.p_value,
        "applied"
    );

    Ok(ApplicationResult {
        variant: variant.clone(),
        params: calibration.params.clone(),
        stats,
        skill,
        window: window.clone(),
        modeled,
    })
}

/// Score every calibrated variant over `window`, keeping input order.
pub fn apply(calibrations: &[CalibrationResult], window: &ObservedWindow, parallel: bool) -> ApplicationRun {
    info!(
        variants = calibrations.len(),
        start = %window.start_date(),
        end = %window.end_date(),
        "starting application"
    );

    let score = |c: &CalibrationResult| (c.variant.name().to_string(), apply_calibration(c, window));
    let outcomes: Vec<(String, Result<ApplicationResult, ModelError>)> = if parallel {
        calibrations.par_iter().map(score).collect()
    } else {
        calibrations.iter().map(score).collect()
    };

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(r) => results.push(r),
            Err(e) => {
                warn!(variant = %name, error = %e, "application skipped");
                failures.push(VariantFailure {
                    variant: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    ApplicationRun { results, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CalibrationDiagnostics, ModelVariant, OptimMethod, SeriesBundle, TransferKind};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calibrated(kind: TransferKind, params: Vec<f64>, window: &ObservedWindow) -> CalibrationResult {
        CalibrationResult {
            variant: ModelVariant::with_defaults(kind),
            params,
            loss: 0.0,
            window: window.clone(),
            diagnostics: CalibrationDiagnostics {
                method: OptimMethod::Powell,
                initial_loss: 1.0,
                iterations: 3,
                evaluations: 40,
                termination: "Solver converged".to_string(),
                budget_exhausted: false,
            },
        }
    }

    fn app_bundle() -> SeriesBundle {
        SeriesBundle::new(
            vec![0.0, 5.0, 1.0, 6.0, 0.0, 7.0, 0.0, 0.0],
            vec![60.0, 55.0, 50.0, 45.0, 40.0, 35.0, 30.0, 25.0],
            None,
        )
        .unwrap()
    }

    #[test]
    fn linear_observed_gives_exact_regression() {
        let bundle = app_bundle();
        let params = vec![2.0, 1.0, 0.5];
        let modeled = predict(TransferKind::ExpDecay, &bundle, &params).unwrap();
        let observed: Vec<f64> = modeled.iter().map(|m| 2.0 * m + 3.0).collect();
        let window = ObservedWindow::new(bundle, observed, day(2006, 5, 1)).unwrap();
        let cal = calibrated(TransferKind::ExpDecay, params, &window);

        let res = apply_calibration(&cal, &window).unwrap();
        assert_relative_eq!(res.stats.slope, 2.0, epsilon = 1e-9);
        assert_relative_eq!(res.stats.intercept, 3.0, epsilon = 1e-9);
        assert_relative_eq!(res.stats.r_value, 1.0, epsilon = 1e-9);
        assert_eq!(res.stats.n, 8);
        assert_eq!(res.modeled, modeled);
    }

    #[test]
    fn perfect_model_has_unit_skill() {
        let bundle = app_bundle();
        let params = vec![2.0, 1.0, 0.5];
        let observed = predict(TransferKind::ExpDecay, &bundle, &params).unwrap();
        let window = ObservedWindow::new(bundle, observed, day(2006, 5, 1)).unwrap();
        let res = apply_calibration(&calibrated(TransferKind::ExpDecay, params, &window), &window).unwrap();
        assert_relative_eq!(res.skill.nse.unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(res.skill.rmse, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_prediction_is_recorded_as_failure() {
        let bundle = app_bundle();
        let window = ObservedWindow::new(bundle, vec![1.0, 2.0, 3.0, 2.0, 1.0, 4.0, 2.0, 1.0], day(2006, 5, 1)).unwrap();
        let good = calibrated(TransferKind::ExpDecay, vec![2.0, 1.0, 0.5], &window);
        // Threshold above every temperature: modeled series is all zeros.
        let flat = CalibrationResult {
            variant: ModelVariant::new("too-cold", TransferKind::ExpDecay, vec![50.0, 1.0, 0.5]).unwrap(),
            ..calibrated(TransferKind::ExpDecay, vec![50.0, 1.0, 0.5], &window)
        };

        let run = apply(&[flat, good], &window, false);
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].variant.name(), "exp-decay");
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].variant, "too-cold");
        assert!(run.failures[0].reason.contains("degenerate"));
    }

    #[test]
    fn missing_precip_in_application_window_fails_variant() {
        let bundle = app_bundle();
        let window = ObservedWindow::new(bundle, vec![1.0; 8], day(2006, 5, 1)).unwrap();
        let cal = calibrated(TransferKind::ExpDecayPrecip, TransferKind::ExpDecayPrecip.default_guess(), &window);
        let err = apply_calibration(&cal, &window).unwrap_err();
        assert!(matches!(err, ModelError::MissingSeries { .. }));
    }
}
