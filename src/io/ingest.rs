//! CSV ingest and normalization.
//!
//! Turns a daily catchment CSV into a [`CatchmentSeries`].
//!
//! Schema (header names are case-insensitive, a UTF-8 BOM is tolerated):
//! - `date` (required): `YYYY-MM-DD`, `YYYY/MM/DD` or `DD/MM/YYYY`
//! - `temp` (required): daily mean air temperature
//! - `snowprop` (percent of the catchment) or `snow_total` (raw summed cover,
//!   rescaled to percent of its maximum); one of the two is required
//! - `precip` (optional)
//! - `discharge` (optional; blank cells mean "not observed"), in m³ or cfs
//!
//! Station records have holes. A blank `temp`/`precip` cell, a `temp` of
//! 1000 or more, or a `precip` of -9999 marks a missing reading; interior
//! holes are filled by linear interpolation over the day index. A hole at
//! either end of the record has nothing to interpolate from and is an error.
//!
//! Design goals:
//! - **Strict schema** for required fields (clear errors + exit code 2)
//! - **Row-level validation** with line numbers in every message
//! - **No gaps**: rows must be consecutive days, since every series is indexed
//!   by day offset

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use csv::StringRecord;
use tracing::{debug, info};

use crate::data::CatchmentSeries;
use crate::domain::{DischargeUnit, TempUnit};
use crate::error::AppError;

/// Row errors listed in the failure message before truncating.
const MAX_REPORTED_ROW_ERRORS: usize = 5;

/// Station temperature readings at or above this are placeholders.
const TEMP_MISSING_AT_OR_ABOVE: f64 = 1000.0;
const PRECIP_MISSING: f64 = -9999.0;
const CUBIC_METERS_PER_CUBIC_FOOT: f64 = 0.028_316_846;

/// Units of the input columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub temp_unit: TempUnit,
    pub discharge_unit: DischargeUnit,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            temp_unit: TempUnit::Celsius,
            discharge_unit: DischargeUnit::M3,
        }
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Ingest output: the normalized record plus notes about what was done to it.
#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub series: CatchmentSeries,
    pub rows_read: usize,
    /// Informational notes on unit conversions and filled gaps.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnowColumn {
    Percent,
    Total,
}

#[derive(Debug, Clone)]
struct DayRow {
    date: NaiveDate,
    /// `None` is a gap to interpolate.
    temp: Option<f64>,
    snow: f64,
    /// `None` is a gap (or no precip column at all).
    precip: Option<f64>,
    discharge: Option<f64>,
}

/// Load a catchment CSV from `path`.
pub fn load_catchment_csv(path: &Path, options: IngestOptions) -> Result<IngestedSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let ingested = read_catchment_csv(file, options)?;
    info!(
        path = %path.display(),
        days = ingested.series.len(),
        start = %ingested.series.start_date,
        end = %ingested.series.end_date(),
        discharge_days = ingested.series.discharge_days(),
        precip = ingested.series.has_precip(),
        "loaded catchment record"
    );
    Ok(ingested)
}

/// Parse a catchment CSV from any reader.
pub fn read_catchment_csv<R: Read>(input: R, options: IngestOptions) -> Result<IngestedSeries, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let snow_column = ensure_required_columns_exist(&header_map)?;
    let has_precip = header_map.contains_key("precip");

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        if record.iter().all(|field| field.is_empty()) {
            rows_read -= 1;
            continue;
        }

        match parse_row(&record, &header_map, snow_column, has_precip) {
            Ok(row) => rows.push((line, row)),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if row_errors.is_empty() {
        check_consecutive(&rows, &mut row_errors);
    }
    if !row_errors.is_empty() {
        return Err(row_error_report(&row_errors));
    }
    if rows.is_empty() {
        return Err(AppError::new(3, "No data rows found in CSV."));
    }

    let mut notes = Vec::new();
    let lines: Vec<usize> = rows.iter().map(|(line, _)| *line).collect();
    let start_date = rows[0].1.date;

    let raw_temp: Vec<Option<f64>> = rows.iter().map(|(_, r)| r.temp).collect();
    let (mut temp, filled) = fill_gaps(&raw_temp, &lines, "temp").map_err(|e| row_error_report(&e))?;
    if filled > 0 {
        notes.push(format!("temp: interpolated {filled} missing day(s)"));
    }
    let precip = if has_precip {
        let raw: Vec<Option<f64>> = rows.iter().map(|(_, r)| r.precip).collect();
        let (precip, filled) = fill_gaps(&raw, &lines, "precip").map_err(|e| row_error_report(&e))?;
        if filled > 0 {
            notes.push(format!("precip: interpolated {filled} missing day(s)"));
        }
        Some(precip)
    } else {
        None
    };
    let mut snowprop: Vec<f64> = rows.iter().map(|(_, r)| r.snow).collect();
    let mut discharge: Vec<Option<f64>> = rows.iter().map(|(_, r)| r.discharge).collect();

    if options.temp_unit == TempUnit::Fahrenheit {
        fahrenheit_to_celsius(&mut temp);
        notes.push("temp: °F → °C".to_string());
    }
    if options.discharge_unit == DischargeUnit::Cfs {
        for q in discharge.iter_mut().flatten() {
            *q *= CUBIC_METERS_PER_CUBIC_FOOT;
        }
        notes.push("discharge: ft³ → m³".to_string());
    }
    if snow_column == SnowColumn::Total {
        if let Some(note) = normalize_snow_total(&mut snowprop) {
            notes.push(note);
        }
    }
    debug!(rows = rows_read, ?notes, "normalized catchment rows");

    Ok(IngestedSeries {
        series: CatchmentSeries {
            start_date,
            temp,
            snowprop,
            precip,
            discharge,
        },
        rows_read,
        notes,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<SnowColumn, AppError> {
    for name in ["date", "temp"] {
        if !header_map.contains_key(name) {
            return Err(AppError::new(2, format!("Missing required column: `{name}`")));
        }
    }
    if header_map.contains_key("snowprop") {
        Ok(SnowColumn::Percent)
    } else if header_map.contains_key("snow_total") {
        Ok(SnowColumn::Total)
    } else {
        Err(AppError::new(
            2,
            "Missing snow column: expected `snowprop` (percent) or `snow_total`.",
        ))
    }
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    snow_column: SnowColumn,
    has_precip: bool,
) -> Result<DayRow, String> {
    let date = parse_date(get_required(record, header_map, "date")?)?;
    let temp = parse_gappy_f64(record, header_map, "temp", |v| v >= TEMP_MISSING_AT_OR_ABOVE)?;

    let snow = match snow_column {
        SnowColumn::Percent => {
            let v = parse_required_f64(record, header_map, "snowprop")?;
            if !(0.0..=100.0).contains(&v) {
                return Err(format!("`snowprop` {v} is outside [0, 100]."));
            }
            v
        }
        SnowColumn::Total => {
            let v = parse_required_f64(record, header_map, "snow_total")?;
            if v < 0.0 {
                return Err(format!("`snow_total` {v} is negative."));
            }
            v
        }
    };

    let precip = if has_precip {
        let v = parse_gappy_f64(record, header_map, "precip", |v| v == PRECIP_MISSING)?;
        if let Some(v) = v.filter(|v| *v < 0.0) {
            return Err(format!("`precip` {v} is negative."));
        }
        v
    } else {
        None
    };

    let discharge = match get_optional(record, header_map, "discharge") {
        Some(s) => Some(parse_f64(s, "discharge")?),
        None => None,
    };

    Ok(DayRow {
        date,
        temp,
        snow,
        precip,
        discharge,
    })
}

fn check_consecutive(rows: &[(usize, DayRow)], row_errors: &mut Vec<RowError>) {
    for pair in rows.windows(2) {
        let (_, prev) = &pair[0];
        let (line, row) = &pair[1];
        let expected = prev.date + Duration::days(1);
        if row.date != expected {
            row_errors.push(RowError {
                line: *line,
                message: format!(
                    "date {} does not follow {} (expected {expected}); rows must be consecutive days",
                    row.date, prev.date
                ),
            });
        }
    }
}

/// Fill interior gaps by linear interpolation over the day index.
///
/// Returns the filled series and how many days were filled.
fn fill_gaps(values: &[Option<f64>], lines: &[usize], name: &str) -> Result<(Vec<f64>, usize), Vec<RowError>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();
    let (Some(&(first, _)), Some(&(last, last_value))) = (known.first(), known.last()) else {
        return Err(vec![RowError {
            line: lines.first().copied().unwrap_or(2),
            message: format!("`{name}` has no readings."),
        }]);
    };

    let edge_errors: Vec<RowError> = (0..first)
        .chain(last + 1..values.len())
        .map(|i| RowError {
            line: lines[i],
            message: format!("`{name}` is missing at the edge of the record and cannot be interpolated."),
        })
        .collect();
    if !edge_errors.is_empty() {
        return Err(edge_errors);
    }

    let mut out = Vec::with_capacity(values.len());
    let mut filled = 0;
    for pair in known.windows(2) {
        let ((a, ya), (b, yb)) = (pair[0], pair[1]);
        out.push(ya);
        for i in a + 1..b {
            let t = (i - a) as f64 / (b - a) as f64;
            out.push(ya + t * (yb - ya));
            filled += 1;
        }
    }
    out.push(last_value);
    Ok((out, filled))
}

fn row_error_report(row_errors: &[RowError]) -> AppError {
    let mut msg = format!("{} invalid row(s) in CSV:", row_errors.len());
    for e in row_errors.iter().take(MAX_REPORTED_ROW_ERRORS) {
        msg.push_str(&format!("\n  {e}"));
    }
    if row_errors.len() > MAX_REPORTED_ROW_ERRORS {
        msg.push_str(&format!("\n  ... and {} more", row_errors.len() - MAX_REPORTED_ROW_ERRORS));
    }
    AppError::new(2, msg)
}

fn fahrenheit_to_celsius(temp: &mut [f64]) {
    for t in temp.iter_mut() {
        *t = (*t - 32.0) * 5.0 / 9.0;
    }
}

/// Rescale raw snow totals to percent of the record maximum.
fn normalize_snow_total(snow: &mut [f64]) -> Option<String> {
    let max = snow.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return Some("snow: `snow_total` is zero throughout".to_string());
    }
    for s in snow.iter_mut() {
        *s = 100.0 * *s / max;
    }
    Some(format!("snow: `snow_total` rescaled to percent of max ({max})"))
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

/// A blank cell or a placeholder reading is a gap (`None`).
fn parse_gappy_f64(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
    is_placeholder: fn(f64) -> bool,
) -> Result<Option<f64>, String> {
    match get_optional(record, header_map, name) {
        Some(s) => parse_f64(s, name).map(|v| (!is_placeholder(v)).then_some(v)),
        None => Ok(None),
    }
}

fn parse_required_f64(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, String> {
    parse_f64(get_required(record, header_map, name)?, name)
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid `{name}` value '{s}'.")),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY."
    ))
}
