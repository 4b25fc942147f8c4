//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting/application code stays clean and testable
//! - output changes are localized

use crate::domain::{ApplicationRun, CalibrationRun, VariantFailure};
use crate::io::ingest::IngestedSeries;

/// Dataset header: record span, available series and unit notes.
pub fn format_record_summary(ingest: &IngestedSeries) -> String {
    let s = &ingest.series;
    let mut out = String::new();

    out.push_str("=== nrf - snowmelt NRF calibration ===\n");
    out.push_str(&format!(
        "Record: {} .. {} ({} days, {} with discharge)\n",
        s.start_date,
        s.end_date(),
        s.len(),
        s.discharge_days()
    ));
    out.push_str(&format!(
        "Series: temp, snowprop{}\n",
        if s.has_precip() { ", precip" } else { "" }
    ));
    for note in &ingest.notes {
        out.push_str(&format!("Note: {note}\n"));
    }
    out
}

/// Per-variant calibration table plus fitted parameter vectors.
pub fn format_calibration_summary(run: &CalibrationRun) -> String {
    let mut out = String::new();

    if let Some(first) = run.results.first() {
        out.push_str(&format!(
            "\nCalibration window: {} .. {} ({} days)\n",
            first.window.start_date(),
            first.window.end_date(),
            first.window.len()
        ));
    }

    out.push_str("\nCalibration:\n");
    out.push_str(
        format!(
            "{:<24} {:>14} {:>14} {:>7} {:>7}  {:<}\n",
            "variant", "initial loss", "loss", "iters", "evals", "termination"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<14} {:-<14} {:-<7} {:-<7}  {:-<11}\n", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in &run.results {
        let d = &r.diagnostics;
        let flag = if d.budget_exhausted { " (budget exhausted)" } else { "" };
        out.push_str(
            format!(
                "{:<24} {:>14} {:>14} {:>7} {:>7}  {}{flag}\n",
                truncate(r.variant.name(), 24),
                fmt_loss(d.initial_loss),
                fmt_loss(r.loss),
                d.iterations,
                d.evaluations,
                d.termination,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    push_failures(&mut out, &run.failures);

    out.push_str("\nFitted parameters:\n");
    for r in &run.results {
        out.push_str(&format!("- {} ({})\n", r.variant.name(), r.variant.kind().display_name()));
        out.push_str(&format!("  {}\n", fmt_named(r.variant.kind().param_names(), &r.params)));
    }

    out
}

/// Regression and skill table for an application run.
pub fn format_application_summary(run: &ApplicationRun) -> String {
    let mut out = String::new();

    if let Some(first) = run.results.first() {
        out.push_str(&format!(
            "\nApplication window: {} .. {} ({} days)\n",
            first.window.start_date(),
            first.window.end_date(),
            first.window.len()
        ));
    }

    out.push_str("\nApplication (observed = slope * modeled + intercept):\n");
    out.push_str(
        format!(
            "{:<24} {:>9} {:>10} {:>7} {:>9} {:>9} {:>7} {:>7} {:>8}\n",
            "variant", "slope", "intercept", "r", "p", "stderr", "NSE", "KGE", "PBIAS%"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<24} {:-<9} {:-<10} {:-<7} {:-<9} {:-<9} {:-<7} {:-<7} {:-<8}\n",
            "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in &run.results {
        let st = &r.stats;
        out.push_str(
            format!(
                "{:<24} {:>9.4} {:>10.3} {:>7.4} {:>9.2e} {:>9.4} {:>7} {:>7.3} {:>8}\n",
                truncate(r.variant.name(), 24),
                st.slope,
                st.intercept,
                st.r_value,
                st.p_value,
                st.std_err,
                fmt_opt(r.skill.nse, 3),
                r.skill.kge,
                fmt_opt(r.skill.pbias, 2),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    push_failures(&mut out, &run.failures);

    out
}

fn push_failures(out: &mut String, failures: &[VariantFailure]) {
    for f in failures {
        out.push_str(&format!("  (skipped {}) {}\n", f.variant, f.reason));
    }
}

fn fmt_named(names: &[&str], values: &[f64]) -> String {
    let parts: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(name, v)| format!("{name}={v:.6}"))
        .collect();
    parts.join(" ")
}

fn fmt_loss(v: f64) -> String {
    if v.abs() >= 1e6 || (v != 0.0 && v.abs() < 1e-3) {
        format!("{v:.4e}")
    } else {
        format!("{v:.4}")
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ApplicationResult, CalibrationDiagnostics, CalibrationResult, ModelVariant, ObservedWindow, OptimMethod,
        RegressionStats, SeriesBundle, SkillScores, TransferKind,
    };
    use chrono::NaiveDate;

    fn window() -> ObservedWindow {
        let bundle = SeriesBundle::new(vec![0.0, 5.0, 0.0], vec![50.0, 40.0, 30.0], None).unwrap();
        ObservedWindow::new(bundle, vec![1.0, 20.0, 10.0], NaiveDate::from_ymd_opt(2004, 4, 1).unwrap()).unwrap()
    }

    #[test]
    fn calibration_summary_lists_variants_params_and_failures() {
        let run = CalibrationRun {
            results: vec![CalibrationResult {
                variant: ModelVariant::with_defaults(TransferKind::ExpDecay),
                params: vec![2.0, 0.5, 0.8],
                loss: 0.125,
                window: window(),
                diagnostics: CalibrationDiagnostics {
                    method: OptimMethod::Powell,
                    initial_loss: 1.5e7,
                    iterations: 4,
                    evaluations: 118,
                    termination: "Solver converged".to_string(),
                    budget_exhausted: true,
                },
            }],
            failures: vec![VariantFailure {
                variant: "exp-decay-precip".to_string(),
                reason: "needs precip".to_string(),
            }],
        };

        let text = format_calibration_summary(&run);
        assert!(text.contains("2004-04-01 .. 2004-04-03 (3 days)"));
        assert!(text.contains("exp-decay"));
        assert!(text.contains("1.5000e7"));
        assert!(text.contains("(budget exhausted)"));
        assert!(text.contains("temp_thresh=2.000000 k=0.500000 p=0.800000"));
        assert!(text.contains("(skipped exp-decay-precip) needs precip"));
        assert!(text.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn application_summary_marks_undefined_scores() {
        let run = ApplicationRun {
            results: vec![ApplicationResult {
                variant: ModelVariant::with_defaults(TransferKind::InvGauss),
                params: TransferKind::InvGauss.default_guess(),
                stats: RegressionStats {
                    slope: 2.0,
                    intercept: 3.0,
                    r_value: 1.0,
                    p_value: 1e-12,
                    std_err: 0.0,
                    intercept_std_err: 0.0,
                    n: 3,
                },
                skill: SkillScores {
                    nse: None,
                    kge: 0.5,
                    rmse: 1.0,
                    pbias: Some(-12.5),
                },
                window: window(),
                modeled: vec![0.0, 8.5, 3.5],
            }],
            failures: vec![],
        };

        let text = format_application_summary(&run);
        assert!(text.contains("inv-gauss"));
        assert!(text.contains("2.0000"));
        assert!(text.contains("n/a"));
        assert!(text.contains("-12.50"));
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd.");
    }
}
