//! Full daily record of one catchment, as loaded from disk or generated.
//!
//! Calibration and application work on windows cut from this record. Discharge
//! may be missing on some days (gauges often lag the meteorological record);
//! a window is only valid where discharge is present on every day.

use chrono::{Duration, NaiveDate};

use crate::domain::{ObservedWindow, SeriesBundle};
use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentSeries {
    pub start_date: NaiveDate,
    /// Mean air temperature, °C.
    pub temp: Vec<f64>,
    /// Snow-covered fraction of the catchment, percent.
    pub snowprop: Vec<f64>,
    pub precip: Option<Vec<f64>>,
    pub discharge: Vec<Option<f64>>,
}

impl CatchmentSeries {
    pub fn len(&self) -> usize {
        self.temp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temp.is_empty()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.start_date + Duration::days(self.len().saturating_sub(1) as i64)
    }

    pub fn has_precip(&self) -> bool {
        self.precip.is_some()
    }

    /// Days with a discharge observation.
    pub fn discharge_days(&self) -> usize {
        self.discharge.iter().filter(|q| q.is_some()).count()
    }

    /// Cut the inclusive date range `[start, end]` into an observed window.
    ///
    /// # Errors
    /// `InvalidConfig` for an empty or out-of-record range, and `Alignment`
    /// when discharge is missing inside the range (the error reports how
    /// many leading days do have discharge).
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Result<ObservedWindow, ModelError> {
        if end < start {
            return Err(ModelError::InvalidConfig(format!(
                "window end {end} is before its start {start}"
            )));
        }
        if self.is_empty() || start < self.start_date || end > self.end_date() {
            return Err(ModelError::InvalidConfig(format!(
                "window {start}..{end} is outside the record {}..{}",
                self.start_date,
                self.end_date()
            )));
        }

        let from = (start - self.start_date).num_days() as usize;
        let to = (end - self.start_date).num_days() as usize + 1;

        let observed: Vec<f64> = self.discharge[from..to].iter().map_while(|q| *q).collect();
        let temp = self.temp[from..to].to_vec();
        let snowprop = self.snowprop[from..to].to_vec();
        let precip = self.precip.as_ref().map(|p| p[from..to].to_vec());

        let bundle = SeriesBundle::new(temp, snowprop, precip)?;
        ObservedWindow::new(bundle, observed, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record() -> CatchmentSeries {
        CatchmentSeries {
            start_date: day(2005, 12, 30),
            temp: vec![-1.0, 0.0, 1.0, 2.0, 3.0, 4.0],
            snowprop: vec![90.0, 88.0, 85.0, 80.0, 70.0, 60.0],
            precip: Some(vec![0.0, 1.0, 0.0, 2.0, 0.0, 0.0]),
            discharge: vec![Some(5.0), Some(5.5), Some(6.0), Some(7.0), None, None],
        }
    }

    #[test]
    fn window_slices_every_series() {
        let w = record().window(day(2005, 12, 31), day(2006, 1, 2)).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.start_date(), day(2005, 12, 31));
        assert_eq!(w.observed(), &[5.5, 6.0, 7.0]);
        assert_eq!(w.bundle().temp(), &[0.0, 1.0, 2.0]);
        assert_eq!(w.bundle().precip().unwrap(), &[1.0, 0.0, 2.0]);
    }

    #[test]
    fn missing_discharge_is_alignment_error() {
        let err = record().window(day(2006, 1, 1), day(2006, 1, 4)).unwrap_err();
        assert_eq!(
            err,
            ModelError::Alignment {
                series: "discharge",
                reference: "snowprop",
                expected: 4,
                actual: 2,
            }
        );
    }

    #[test]
    fn out_of_record_windows_are_rejected() {
        let r = record();
        assert!(matches!(r.window(day(2005, 12, 1), day(2006, 1, 1)), Err(ModelError::InvalidConfig(_))));
        assert!(matches!(r.window(day(2006, 1, 2), day(2006, 1, 1)), Err(ModelError::InvalidConfig(_))));
        assert_eq!(r.end_date(), day(2006, 1, 4));
        assert_eq!(r.discharge_days(), 4);
    }
}
