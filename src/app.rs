//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs the log subscriber
//! - turns flags into a [`RunConfig`] / [`ApplyConfig`]
//! - runs the pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{ApplyArgs, CalibrateArgs, Cli, Command, OptimArgs, RunArgs, SynthArgs};
use crate::data::{SynthConfig, generate_catchment};
use crate::domain::{ApplyConfig, RunConfig, TransferKind, VariantSet};
use crate::error::AppError;
use crate::fit::OptimSettings;

pub mod pipeline;

/// Entry point for the `nrf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(log_level(cli.verbose, cli.quiet))?;

    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Run(args) => handle_run(args),
        Command::Apply(args) => handle_apply(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn log_level(verbose: bool, quiet: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    }
}

fn init_logging(level: Level) -> Result<(), AppError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::new(2, format!("Failed to install log subscriber: {e}")))
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let config = run_config_from_calibrate_args(&args)?;
    let run = pipeline::run_calibration(&config)?;

    println!("{}", crate::report::format_record_summary(&run.ingest));
    println!("{}", crate::report::format_calibration_summary(&run.calibration));

    if let Some(path) = &config.export_calibration {
        crate::io::results::write_results_json(path, &run.results_file())?;
        info!(path = %path.display(), "wrote calibration JSON");
    }
    Ok(())
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_run_args(&args)?;
    let run = pipeline::run_calibration(&config)?;

    println!("{}", crate::report::format_record_summary(&run.ingest));
    println!("{}", crate::report::format_calibration_summary(&run.calibration));
    if let Some(app) = &run.application {
        println!("{}", crate::report::format_application_summary(app));
    }

    if let Some(path) = &config.export_calibration {
        let calibration_only = crate::io::results::ResultsFile::new(run.calibration.clone(), None);
        crate::io::results::write_results_json(path, &calibration_only)?;
        info!(path = %path.display(), "wrote calibration JSON");
    }
    if let Some(path) = &config.export_results {
        crate::io::results::write_results_json(path, &run.results_file())?;
        info!(path = %path.display(), "wrote results JSON");
    }
    if let (Some(path), Some(app)) = (&config.export_series, &run.application) {
        crate::io::export::write_series_csv(path, app)?;
        info!(path = %path.display(), "wrote series CSV");
    }
    Ok(())
}

fn handle_apply(args: ApplyArgs) -> Result<(), AppError> {
    let config = apply_config_from_args(&args);
    let out = pipeline::run_apply(&config)?;

    println!("{}", crate::report::format_record_summary(&out.ingest));
    println!("{}", crate::report::format_application_summary(&out.application));

    if let Some(path) = &config.export_results {
        crate::io::results::write_results_json(path, &out.results_file())?;
        info!(path = %path.display(), "wrote results JSON");
    }
    if let Some(path) = &config.export_series {
        crate::io::export::write_series_csv(path, &out.application)?;
        info!(path = %path.display(), "wrote series CSV");
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        start_date: args.start,
        days: args.days,
        seed: args.seed,
        with_precip: !args.no_precip,
        noise: args.noise,
    };
    let series = generate_catchment(&config)?;
    crate::io::export::write_catchment_csv(&args.out, &series)?;

    println!(
        "Wrote {} days ({} .. {}) to {}",
        series.len(),
        series.start_date,
        series.end_date(),
        args.out.display()
    );
    Ok(())
}

pub fn run_config_from_calibrate_args(args: &CalibrateArgs) -> Result<RunConfig, AppError> {
    let (variants, explicit_variants) = variant_set_from_args(&args.optim)?;
    Ok(RunConfig {
        data_path: args.data.data.clone(),
        temp_unit: args.data.temp_unit,
        discharge_unit: args.data.discharge_unit,
        cal_start: args.window.cal_start,
        cal_end: args.window.cal_end,
        app_window: None,
        variants,
        explicit_variants,
        optim: optim_settings_from_args(&args.optim),
        parallel: !args.optim.sequential,
        export_calibration: args.export_calibration.clone(),
        export_results: None,
        export_series: None,
    })
}

pub fn run_config_from_run_args(args: &RunArgs) -> Result<RunConfig, AppError> {
    let (variants, explicit_variants) = variant_set_from_args(&args.optim)?;
    Ok(RunConfig {
        data_path: args.data.data.clone(),
        temp_unit: args.data.temp_unit,
        discharge_unit: args.data.discharge_unit,
        cal_start: args.cal_window.cal_start,
        cal_end: args.cal_window.cal_end,
        app_window: Some((args.app_window.app_start, args.app_window.app_end)),
        variants,
        explicit_variants,
        optim: optim_settings_from_args(&args.optim),
        parallel: !args.optim.sequential,
        export_calibration: args.export_calibration.clone(),
        export_results: args.export.clone(),
        export_series: args.export_series.clone(),
    })
}

pub fn apply_config_from_args(args: &ApplyArgs) -> ApplyConfig {
    ApplyConfig {
        calibration_path: args.calibration.clone(),
        data_path: args.data.data.clone(),
        temp_unit: args.data.temp_unit,
        discharge_unit: args.data.discharge_unit,
        app_start: args.window.app_start,
        app_end: args.window.app_end,
        parallel: !args.sequential,
        export_results: args.export.clone(),
        export_series: args.export_series.clone(),
    }
}

fn optim_settings_from_args(args: &OptimArgs) -> OptimSettings {
    OptimSettings {
        method: args.method,
        max_iters: args.max_iters,
        max_evals: args.max_evals,
        ..OptimSettings::default()
    }
}

/// Build the variant set (and whether it was named explicitly) from flags.
fn variant_set_from_args(args: &OptimArgs) -> Result<(VariantSet, bool), AppError> {
    let explicit = !args.variants.is_empty();
    let mut variants = if explicit {
        let mut kinds: Vec<TransferKind> = Vec::with_capacity(args.variants.len());
        for kind in &args.variants {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        VariantSet::from_kinds(&kinds)?
    } else {
        VariantSet::all()
    };

    for guess in &args.guess {
        variants = variants.with_guess(&guess.variant, guess.values.clone())?;
    }
    Ok((variants, explicit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Command {
        Cli::parse_from(argv.iter().copied()).command
    }

    #[test]
    fn calibrate_defaults_to_every_kind() {
        let Command::Calibrate(args) = parse(&[
            "nrf",
            "calibrate",
            "--data",
            "basin.csv",
            "--cal-start",
            "2001-03-01",
            "--cal-end",
            "2001-06-30",
        ]) else {
            panic!("expected calibrate");
        };
        let config = run_config_from_calibrate_args(&args).unwrap();
        assert_eq!(config.variants.len(), TransferKind::ALL.len());
        assert!(!config.explicit_variants);
        assert!(config.parallel);
        assert!(config.app_window.is_none());
        assert_eq!(config.optim, OptimSettings::default());
    }

    #[test]
    fn guess_overrides_are_applied_and_validated() {
        let Command::Calibrate(args) = parse(&[
            "nrf",
            "calibrate",
            "--data",
            "basin.csv",
            "--variants",
            "exp-decay,exp-decay",
            "--guess",
            "exp-decay=1.5,0.3,0.7",
            "--sequential",
            "--cal-start",
            "2001-03-01",
            "--cal-end",
            "2001-06-30",
        ]) else {
            panic!("expected calibrate");
        };
        let config = run_config_from_calibrate_args(&args).unwrap();
        assert_eq!(config.variants.len(), 1);
        assert!(config.explicit_variants);
        assert!(!config.parallel);
        assert_eq!(config.variants.get("exp-decay").unwrap().initial_guess(), &[1.5, 0.3, 0.7]);

        let Command::Calibrate(bad) = parse(&[
            "nrf",
            "calibrate",
            "--data",
            "basin.csv",
            "--guess",
            "exp-decay=1.5",
            "--cal-start",
            "2001-03-01",
            "--cal-end",
            "2001-06-30",
        ]) else {
            panic!("expected calibrate");
        };
        assert_eq!(run_config_from_calibrate_args(&bad).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn log_level_follows_flags() {
        assert_eq!(log_level(true, false), Level::DEBUG);
        assert_eq!(log_level(false, true), Level::WARN);
        assert_eq!(log_level(false, false), Level::INFO);
    }
}
