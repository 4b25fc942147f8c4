use approx::assert_abs_diff_eq;
use chrono::NaiveDate;

use snowmelt_nrf::apply::apply;
use snowmelt_nrf::data::{SynthConfig, generate_catchment};
use snowmelt_nrf::domain::{ModelVariant, ObservedWindow, SeriesBundle, TransferKind, VariantSet};
use snowmelt_nrf::fit::{OptimSettings, calibrate};
use snowmelt_nrf::io::{
    IngestOptions, ResultsFile, load_catchment_csv, read_results_json, write_catchment_csv, write_results_json,
    write_series_csv,
};
use snowmelt_nrf::models::predict;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn exp_decay_parameters_are_recovered() {
    // Whole-degree temperatures keep a plateau around the true threshold.
    let temp = vec![
        -3.0, -1.0, 5.0, 0.0, -2.0, -4.0, 8.0, 7.0, -1.0, 0.0, -3.0, -2.0, 6.0, -1.0, -1.0, 0.0, 9.0, -2.0, -3.0, -1.0,
    ];
    let snow = vec![
        95.0, 95.0, 92.0, 90.0, 90.0, 90.0, 80.0, 72.0, 70.0, 70.0, 70.0, 70.0, 61.0, 60.0, 60.0, 60.0, 48.0, 46.0,
        46.0, 46.0,
    ];
    let truth = [2.0, 0.6, 0.9];
    let bundle = SeriesBundle::new(temp, snow, None).unwrap();
    let observed = predict(TransferKind::ExpDecay, &bundle, &truth).unwrap();
    let window = ObservedWindow::new(bundle, observed, day(2003, 4, 1)).unwrap();

    let variants = VariantSet::new(vec![
        ModelVariant::new("exp-decay", TransferKind::ExpDecay, vec![2.0, 0.4, 0.8]).unwrap(),
        ModelVariant::with_defaults(TransferKind::ExpDecayTempDelta),
    ])
    .unwrap();
    let run = calibrate(&variants, &window, &OptimSettings::default(), true);

    assert!(run.failures.is_empty());
    let names: Vec<&str> = run.results.iter().map(|r| r.variant.name()).collect();
    assert_eq!(names, vec!["exp-decay", "exp-decay-temp-delta"]);

    let fit = &run.results[0];
    assert!(fit.loss < 1e-6, "loss {}", fit.loss);
    assert!((0.0..5.0).contains(&fit.params[0]), "thresh {}", fit.params[0]);
    assert_abs_diff_eq!(fit.params[1], truth[1], epsilon = 1e-2);
    assert_abs_diff_eq!(fit.params[2], truth[2], epsilon = 1e-2);
    assert!(fit.loss <= fit.diagnostics.initial_loss);
}

#[test]
fn synthetic_record_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("basin.csv");
    let results_path = dir.path().join("results.json");
    let series_path = dir.path().join("series.csv");

    let series = generate_catchment(&SynthConfig {
        noise: 0.02,
        ..SynthConfig::default()
    })
    .unwrap();
    write_catchment_csv(&csv_path, &series).unwrap();

    let ingest = load_catchment_csv(&csv_path, IngestOptions::default()).unwrap();
    assert_eq!(ingest.rows_read, 730);
    assert!(ingest.series.has_precip());

    let cal_window = ingest.series.window(day(2001, 1, 1), day(2001, 9, 30)).unwrap();
    let app_window = ingest.series.window(day(2002, 1, 1), day(2002, 9, 30)).unwrap();

    let variants = VariantSet::from_kinds(&[TransferKind::ExpDecayPrecip, TransferKind::ExpDecay])
        .unwrap()
        .with_guess("exp-decay-precip", vec![2.0, 0.5, 0.8, 5.0, 0.7, 0.5])
        .unwrap()
        .with_guess("exp-decay", vec![2.0, 0.5, 0.8])
        .unwrap();
    let calibration = calibrate(&variants, &cal_window, &OptimSettings::default(), true);
    assert_eq!(calibration.results.len(), 2);

    let application = apply(&calibration.results, &app_window, true);
    assert_eq!(application.results.len(), 2);
    let precip = &application.results[0];
    assert_eq!(precip.variant.kind(), TransferKind::ExpDecayPrecip);
    assert!(precip.stats.r_value > 0.9, "r = {}", precip.stats.r_value);
    assert_eq!(precip.modeled.len(), app_window.len());

    let file = ResultsFile::new(calibration, Some(application.clone()));
    write_results_json(&results_path, &file).unwrap();
    assert_eq!(read_results_json(&results_path).unwrap(), file);

    write_series_csv(&series_path, &application).unwrap();
    let text = std::fs::read_to_string(&series_path).unwrap();
    assert_eq!(text.lines().count(), 1 + 2 * app_window.len());
    assert!(text.lines().nth(1).unwrap().starts_with("2002-01-01,exp-decay-precip,"));
}
