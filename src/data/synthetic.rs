//! Seeded synthetic catchment records.
//!
//! Useful for demos and end-to-end tests: the discharge is generated by a
//! known transfer function, so a calibration run should land near
//! [`SYNTH_MELT_PARAMS`] / [`SYNTH_PRECIP_PARAMS`].
//!
//! - temperature: annual sinusoid plus Gaussian day-to-day noise
//! - precipitation: wet-day Bernoulli draw times an exponential depth
//! - snow cover: accumulates from cold-day precipitation, depletes with
//!   positive degree-days
//! - discharge: transfer-function output with multiplicative noise

use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Exp, Normal};

use crate::data::catchment::CatchmentSeries;
use crate::domain::{SeriesBundle, TransferKind};
use crate::error::AppError;
use crate::models::predict;

/// `exp-decay` parameters used when no precipitation is generated.
pub const SYNTH_MELT_PARAMS: [f64; 3] = [2.0, 0.6, 0.9];

/// `exp-decay-precip` parameters used when precipitation is generated.
pub const SYNTH_PRECIP_PARAMS: [f64; 6] = [2.0, 0.6, 0.9, 5.0, 0.8, 0.6];

const MEAN_TEMP: f64 = 4.0;
const TEMP_AMPLITUDE: f64 = 12.0;
const TEMP_NOISE_SD: f64 = 3.0;
/// Day of year where the seasonal cycle crosses the mean going up.
const SPRING_CROSSING_DOY: f64 = 105.0;
const WET_DAY_PROB: f64 = 0.25;
const MEAN_WET_DEPTH: f64 = 6.0;
/// Snow cover gained per mm of cold-day precipitation (percent points).
const ACCUMULATION_PER_MM: f64 = 3.0;
/// Snow cover lost per positive degree-day (percent points).
const MELT_PER_DEGREE_DAY: f64 = 1.2;

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub start_date: NaiveDate,
    pub days: usize,
    pub seed: u64,
    pub with_precip: bool,
    /// Relative standard deviation of the discharge noise.
    pub noise: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2000, 10, 1).unwrap_or_default(),
            days: 730,
            seed: 42,
            with_precip: true,
            noise: 0.05,
        }
    }
}

/// Generate a complete record (discharge present on every day).
pub fn generate_catchment(config: &SynthConfig) -> Result<CatchmentSeries, AppError> {
    if config.days == 0 {
        return Err(AppError::new(2, "Synthetic record length must be > 0 days."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(2, "Synthetic noise level must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let temp_noise = Normal::new(0.0, TEMP_NOISE_SD)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let flow_noise = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let wet_depth = Exp::new(1.0 / MEAN_WET_DEPTH)
        .map_err(|e| AppError::new(4, format!("Precipitation distribution error: {e}")))?;

    let mut temp = Vec::with_capacity(config.days);
    let mut precip = Vec::with_capacity(config.days);
    let mut snowprop = Vec::with_capacity(config.days);
    let mut cover: f64 = 60.0;

    for i in 0..config.days {
        let date = config.start_date + Duration::days(i as i64);
        let t = seasonal_temp(date) + temp_noise.sample(&mut rng);
        let p = if rng.gen_bool(WET_DAY_PROB) {
            wet_depth.sample(&mut rng)
        } else {
            0.0
        };

        if t <= 0.0 {
            cover += ACCUMULATION_PER_MM * p;
        } else {
            cover -= MELT_PER_DEGREE_DAY * t;
        }
        cover = cover.clamp(0.0, 100.0);

        temp.push(t);
        precip.push(p);
        snowprop.push(cover);
    }

    let (kind, params): (TransferKind, &[f64]) = if config.with_precip {
        (TransferKind::ExpDecayPrecip, &SYNTH_PRECIP_PARAMS)
    } else {
        (TransferKind::ExpDecay, &SYNTH_MELT_PARAMS)
    };
    let precip = config.with_precip.then_some(precip);
    let bundle = SeriesBundle::new(temp.clone(), snowprop.clone(), precip.clone())?;
    let clean = predict(kind, &bundle, params)?;

    let discharge = clean
        .iter()
        .map(|q| Some((q * (1.0 + flow_noise.sample(&mut rng))).max(0.0)))
        .collect();

    Ok(CatchmentSeries {
        start_date: config.start_date,
        temp,
        snowprop,
        precip,
        discharge,
    })
}

fn seasonal_temp(date: NaiveDate) -> f64 {
    let phase = 2.0 * PI * (date.ordinal() as f64 - SPRING_CROSSING_DOY) / 365.25;
    MEAN_TEMP + TEMP_AMPLITUDE * phase.sin()
}
