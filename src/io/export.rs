//! CSV exports.
//!
//! - per-day observed vs modeled discharge for every applied variant
//! - a full catchment record (used by `nrf synth`)
//!
//! Both are plain CSV meant for spreadsheets or downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::CatchmentSeries;
use crate::domain::ApplicationRun;
use crate::error::AppError;

/// Write `date,variant,observed,modeled` rows for every applied variant.
pub fn write_series_csv(path: &Path, run: &ApplicationRun) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create series CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_series(&mut out, run).map_err(|e| AppError::new(2, format!("Failed to write series CSV: {e}")))
}

fn write_series<W: Write>(out: &mut W, run: &ApplicationRun) -> std::io::Result<()> {
    writeln!(out, "date,variant,observed,modeled")?;
    for r in &run.results {
        for ((date, observed), modeled) in r.window.dates().zip(r.window.observed()).zip(&r.modeled) {
            writeln!(out, "{date},{},{observed:.6},{modeled:.6}", r.variant.name())?;
        }
    }
    out.flush()
}

/// Write a catchment record in the ingest schema.
pub fn write_catchment_csv(path: &Path, series: &CatchmentSeries) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create catchment CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_catchment(&mut out, series).map_err(|e| AppError::new(2, format!("Failed to write catchment CSV: {e}")))
}

fn write_catchment<W: Write>(out: &mut W, series: &CatchmentSeries) -> std::io::Result<()> {
    if series.has_precip() {
        writeln!(out, "date,temp,snowprop,precip,discharge")?;
    } else {
        writeln!(out, "date,temp,snowprop,discharge")?;
    }
    for i in 0..series.len() {
        let date = series.start_date + chrono::Duration::days(i as i64);
        let discharge = series.discharge[i].map(|q| format!("{q:.6}")).unwrap_or_default();
        match &series.precip {
            Some(precip) => writeln!(
                out,
                "{date},{:.4},{:.4},{:.4},{discharge}",
                series.temp[i], series.snowprop[i], precip[i]
            )?,
            None => writeln!(out, "{date},{:.4},{:.4},{discharge}", series.temp[i], series.snowprop[i])?,
        }
    }
    out.flush()
}
