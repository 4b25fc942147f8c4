//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during calibration and application
//! - exported to JSON/CSV
//! - reloaded later to apply a saved calibration to new data
//!
//! Series types keep their fields private: construction is the only place the
//! day-alignment invariant is checked, so nothing downstream ever has to
//! truncate or re-validate.

use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::variants::{ModelVariant, VariantSet};
use crate::error::ModelError;
use crate::fit::OptimSettings;

/// Catchment-aggregated daily inputs for a transfer function.
///
/// All present series share one day-indexing: `temp[i]`, `snowprop[i]` and
/// `precip[i]` describe the same day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeriesBundle")]
pub struct SeriesBundle {
    temp: Vec<f64>,
    snowprop: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    precip: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawSeriesBundle {
    temp: Vec<f64>,
    snowprop: Vec<f64>,
    #[serde(default)]
    precip: Option<Vec<f64>>,
}

impl TryFrom<RawSeriesBundle> for SeriesBundle {
    type Error = ModelError;

    fn try_from(raw: RawSeriesBundle) -> Result<Self, Self::Error> {
        SeriesBundle::new(raw.temp, raw.snowprop, raw.precip)
    }
}

impl SeriesBundle {
    /// Build a bundle, validating alignment and value ranges.
    ///
    /// `snowprop` is the reference length. Every series must be finite and
    /// `snowprop` must lie in `[0, 100]`.
    pub fn new(
        temp: Vec<f64>,
        snowprop: Vec<f64>,
        precip: Option<Vec<f64>>,
    ) -> Result<Self, ModelError> {
        if snowprop.is_empty() {
            return Err(ModelError::InvalidSeries {
                series: "snowprop",
                index: 0,
                reason: "series is empty".to_string(),
            });
        }
        check_aligned("temp", temp.len(), snowprop.len())?;
        if let Some(precip) = &precip {
            check_aligned("precip", precip.len(), snowprop.len())?;
        }

        check_finite("temp", &temp)?;
        check_finite("snowprop", &snowprop)?;
        if let Some(precip) = &precip {
            check_finite("precip", precip)?;
        }
        if let Some(index) = snowprop.iter().position(|v| !(0.0..=100.0).contains(v)) {
            return Err(ModelError::InvalidSeries {
                series: "snowprop",
                index,
                reason: format!("{} is outside [0, 100]", snowprop[index]),
            });
        }

        Ok(Self {
            temp,
            snowprop,
            precip,
        })
    }

    pub fn len(&self) -> usize {
        self.snowprop.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snowprop.is_empty()
    }

    pub fn temp(&self) -> &[f64] {
        &self.temp
    }

    pub fn snowprop(&self) -> &[f64] {
        &self.snowprop
    }

    pub fn precip(&self) -> Option<&[f64]> {
        self.precip.as_deref()
    }
}

/// A bundle plus the discharge observed over the same days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawObservedWindow")]
pub struct ObservedWindow {
    start_date: NaiveDate,
    bundle: SeriesBundle,
    observed: Vec<f64>,
}

#[derive(Deserialize)]
struct RawObservedWindow {
    start_date: NaiveDate,
    bundle: SeriesBundle,
    observed: Vec<f64>,
}

impl TryFrom<RawObservedWindow> for ObservedWindow {
    type Error = ModelError;

    fn try_from(raw: RawObservedWindow) -> Result<Self, Self::Error> {
        ObservedWindow::new(raw.bundle, raw.observed, raw.start_date)
    }
}

impl ObservedWindow {
    pub fn new(
        bundle: SeriesBundle,
        observed: Vec<f64>,
        start_date: NaiveDate,
    ) -> Result<Self, ModelError> {
        check_aligned("discharge", observed.len(), bundle.len())?;
        check_finite("discharge", &observed)?;
        Ok(Self {
            start_date,
            bundle,
            observed,
        })
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    pub fn bundle(&self) -> &SeriesBundle {
        &self.bundle
    }

    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Last day covered by the window (inclusive).
    pub fn end_date(&self) -> NaiveDate {
        self.start_date + Duration::days(self.len().saturating_sub(1) as i64)
    }

    /// Calendar date of each day in the window.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.len()).map(|i| self.start_date + Duration::days(i as i64))
    }
}

fn check_aligned(series: &'static str, actual: usize, expected: usize) -> Result<(), ModelError> {
    if actual != expected {
        return Err(ModelError::Alignment {
            series,
            reference: "snowprop",
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_finite(series: &'static str, values: &[f64]) -> Result<(), ModelError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ModelError::InvalidSeries {
            series,
            index,
            reason: format!("non-finite value {}", values[index]),
        }),
        None => Ok(()),
    }
}

/// Optimizer used by the calibrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OptimMethod {
    /// Powell's conjugate-direction method with Brent line searches.
    Powell,
    /// Nelder–Mead downhill simplex.
    NelderMead,
}

impl OptimMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            OptimMethod::Powell => "Powell",
            OptimMethod::NelderMead => "Nelder-Mead",
        }
    }
}

/// Unit of the `temp` column in input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TempUnit {
    Celsius,
    /// Converted to Celsius on ingest.
    Fahrenheit,
}

/// Unit of the `discharge` column in input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DischargeUnit {
    /// Cubic meters.
    M3,
    /// Cubic feet, converted to cubic meters on ingest.
    Cfs,
}

/// Optimizer bookkeeping for one calibrated variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDiagnostics {
    pub method: OptimMethod,
    /// Loss at the initial guess.
    pub initial_loss: f64,
    pub iterations: u64,
    /// Objective evaluations spent.
    pub evaluations: u64,
    /// Human-readable termination reason reported by the solver.
    pub termination: String,
    /// The iteration or evaluation budget ran out before convergence.
    pub budget_exhausted: bool,
}

/// Best-fit parameters for one variant over a calibration window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub variant: ModelVariant,
    pub params: Vec<f64>,
    /// Objective value at `params`.
    pub loss: f64,
    pub window: ObservedWindow,
    pub diagnostics: CalibrationDiagnostics,
}

/// A variant that could not be processed, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantFailure {
    pub variant: String,
    pub reason: String,
}

/// Output of one calibration pass over a variant set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRun {
    pub results: Vec<CalibrationResult>,
    #[serde(default)]
    pub failures: Vec<VariantFailure>,
}

/// Ordinary least-squares fit of observed (y) on modeled (x) discharge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionStats {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    /// Two-sided p-value for the null hypothesis `slope == 0`.
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
    pub intercept_std_err: f64,
    pub n: usize,
}

/// Hydrological skill scores of modeled against observed discharge.
///
/// `None` marks a score that is undefined for the window (constant or
/// zero-sum observed discharge).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillScores {
    pub nse: Option<f64>,
    pub kge: f64,
    pub rmse: f64,
    pub pbias: Option<f64>,
}

/// Predictive skill of one calibrated variant over an application window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationResult {
    pub variant: ModelVariant,
    pub params: Vec<f64>,
    pub stats: RegressionStats,
    pub skill: SkillScores,
    pub window: ObservedWindow,
    pub modeled: Vec<f64>,
}

/// Output of one application pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRun {
    pub results: Vec<ApplicationResult>,
    #[serde(default)]
    pub failures: Vec<VariantFailure>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_path: PathBuf,
    pub temp_unit: TempUnit,
    pub discharge_unit: DischargeUnit,

    pub cal_start: NaiveDate,
    pub cal_end: NaiveDate,
    /// Application window; `None` for calibrate-only runs.
    pub app_window: Option<(NaiveDate, NaiveDate)>,

    pub variants: VariantSet,
    /// Variants were named on the command line. When false, variants that
    /// need precipitation are dropped for datasets without it.
    pub explicit_variants: bool,
    pub optim: OptimSettings,
    /// Calibrate variants on the rayon pool instead of one after another.
    pub parallel: bool,

    pub export_calibration: Option<PathBuf>,
    pub export_results: Option<PathBuf>,
    pub export_series: Option<PathBuf>,
}

/// Configuration for applying a saved calibration to new data.
#[derive(Debug, Clone)]
pub struct ApplyConfig {
    /// Results JSON written by a calibration run.
    pub calibration_path: PathBuf,
    pub data_path: PathBuf,
    pub temp_unit: TempUnit,
    pub discharge_unit: DischargeUnit,
    pub app_start: NaiveDate,
    pub app_end: NaiveDate,
    pub parallel: bool,

    pub export_results: Option<PathBuf>,
    pub export_series: Option<PathBuf>,
}
