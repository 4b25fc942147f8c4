//! Command-line parsing for the snowmelt NRF calibrator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{DischargeUnit, OptimMethod, TempUnit, TransferKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "nrf",
    version,
    about = "Snowmelt discharge calibration with network response functions"
)]
pub struct Cli {
    /// Log per-variant detail (DEBUG level).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate every selected variant over the calibration window.
    Calibrate(CalibrateArgs),
    /// Calibrate, then apply the fitted variants over the application window.
    Run(RunArgs),
    /// Apply a saved calibration (results JSON) to an application window.
    Apply(ApplyArgs),
    /// Write a seeded synthetic catchment CSV.
    Synth(SynthArgs),
}

/// Input dataset options.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Daily catchment CSV (date, temp, snowprop|snow_total, [precip], [discharge]).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Unit of the `temp` column.
    #[arg(long, value_enum, default_value_t = TempUnit::Celsius)]
    pub temp_unit: TempUnit,

    /// Unit of the `discharge` column (cfs is converted to m³).
    #[arg(long, value_enum, default_value_t = DischargeUnit::M3)]
    pub discharge_unit: DischargeUnit,
}

/// Variant selection and optimizer options.
#[derive(Debug, Args, Clone)]
pub struct OptimArgs {
    /// Transfer functions to calibrate (comma-separated). Defaults to every
    /// kind the dataset supports.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub variants: Vec<TransferKind>,

    /// Override a variant's initial guess, e.g. `exp-decay=2,0.5,0.8`. Repeatable.
    #[arg(long, value_name = "NAME=V1,V2,...", value_parser = parse_guess)]
    pub guess: Vec<GuessOverride>,

    /// Optimizer.
    #[arg(long, value_enum, default_value_t = OptimMethod::Powell)]
    pub method: OptimMethod,

    /// Iteration budget per variant.
    #[arg(long, default_value_t = 10_000)]
    pub max_iters: u64,

    /// Objective evaluation budget per variant.
    #[arg(long, default_value_t = 10_000)]
    pub max_evals: u64,

    /// Fit variants one after another instead of in parallel.
    #[arg(long)]
    pub sequential: bool,
}

/// Calibration window bounds (inclusive).
#[derive(Debug, Args, Clone)]
pub struct CalWindowArgs {
    /// First day of the calibration window (YYYY-MM-DD).
    #[arg(long)]
    pub cal_start: NaiveDate,

    /// Last day of the calibration window (YYYY-MM-DD).
    #[arg(long)]
    pub cal_end: NaiveDate,
}

/// Application window bounds (inclusive).
#[derive(Debug, Args, Clone)]
pub struct AppWindowArgs {
    /// First day of the application window (YYYY-MM-DD).
    #[arg(long)]
    pub app_start: NaiveDate,

    /// Last day of the application window (YYYY-MM-DD).
    #[arg(long)]
    pub app_end: NaiveDate,
}

#[derive(Debug, Args, Clone)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub optim: OptimArgs,

    #[command(flatten)]
    pub window: CalWindowArgs,

    /// Write the calibration results to JSON (readable by `nrf apply`).
    #[arg(long = "export-calibration", value_name = "JSON")]
    pub export_calibration: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub optim: OptimArgs,

    #[command(flatten)]
    pub cal_window: CalWindowArgs,

    #[command(flatten)]
    pub app_window: AppWindowArgs,

    /// Write the calibration results to JSON (readable by `nrf apply`).
    #[arg(long = "export-calibration", value_name = "JSON")]
    pub export_calibration: Option<PathBuf>,

    /// Write calibration and application results to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Write per-day observed vs modeled discharge to CSV.
    #[arg(long = "export-series", value_name = "CSV")]
    pub export_series: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ApplyArgs {
    /// Results JSON from `nrf calibrate --export-calibration` or `nrf run --export`.
    #[arg(long, value_name = "JSON")]
    pub calibration: PathBuf,

    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub window: AppWindowArgs,

    /// Evaluate variants one after another instead of in parallel.
    #[arg(long)]
    pub sequential: bool,

    /// Write calibration and application results to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Write per-day observed vs modeled discharge to CSV.
    #[arg(long = "export-series", value_name = "CSV")]
    pub export_series: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Record length in days.
    #[arg(long, default_value_t = 730)]
    pub days: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Omit the precipitation column (discharge then comes from `exp-decay`).
    #[arg(long)]
    pub no_precip: bool,

    /// Relative standard deviation of the discharge noise.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    /// First day of the record (YYYY-MM-DD).
    #[arg(long, default_value = "2000-10-01")]
    pub start: NaiveDate,
}

/// A `--guess NAME=V1,V2,...` override.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessOverride {
    pub variant: String,
    pub values: Vec<f64>,
}

fn parse_guess(raw: &str) -> Result<GuessOverride, String> {
    let (name, values) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=V1,V2,..., got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("variant name is empty".to_string());
    }
    let values = values
        .split(',')
        .map(|v| {
            let v = v.trim();
            v.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| format!("invalid number `{v}` in guess for `{name}`"))
        })
        .collect::<Result<Vec<f64>, String>>()?;
    Ok(GuessOverride {
        variant: name.to_string(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_override_parses_name_and_values() {
        let g = parse_guess("exp-decay=2, 0.5,0.8").unwrap();
        assert_eq!(g.variant, "exp-decay");
        assert_eq!(g.values, vec![2.0, 0.5, 0.8]);

        assert!(parse_guess("exp-decay").is_err());
        assert!(parse_guess("=1,2").is_err());
        assert!(parse_guess("exp-decay=1,x").is_err());
        assert!(parse_guess("exp-decay=1,NaN").is_err());
    }

    #[test]
    fn run_command_parses_windows_and_variant_list() {
        let cli = Cli::parse_from([
            "nrf",
            "run",
            "--data",
            "basin.csv",
            "--discharge-unit",
            "cfs",
            "--variants",
            "exp-decay,inv-gauss",
            "--guess",
            "exp-decay=1,0.5,0.9",
            "--method",
            "nelder-mead",
            "--cal-start",
            "2001-03-01",
            "--cal-end",
            "2001-07-31",
            "--app-start",
            "2002-03-01",
            "--app-end",
            "2002-07-31",
            "-v",
        ]);
        assert!(cli.verbose);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.optim.variants, vec![TransferKind::ExpDecay, TransferKind::InvGauss]);
        assert_eq!(args.optim.method, OptimMethod::NelderMead);
        assert_eq!(args.data.discharge_unit, DischargeUnit::Cfs);
        assert_eq!(args.data.temp_unit, TempUnit::Celsius);
        assert_eq!(args.optim.guess.len(), 1);
        assert_eq!(args.cal_window.cal_start, NaiveDate::from_ymd_opt(2001, 3, 1).unwrap());
        assert_eq!(args.app_window.app_end, NaiveDate::from_ymd_opt(2002, 7, 31).unwrap());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let res = Cli::try_parse_from(["nrf", "-v", "-q", "synth", "--out", "x.csv"]);
        assert!(res.is_err());
    }

    #[test]
    fn synth_defaults() {
        let cli = Cli::parse_from(["nrf", "synth", "--out", "x.csv"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.days, 730);
        assert_eq!(args.seed, 42);
        assert!(!args.no_precip);
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2000, 10, 1).unwrap());
    }
}
