//! Network response function (NRF) evaluation.
//!
//! Every transfer kind follows the same two steps:
//! - turn days into water pulses: snow cover on days warmer than the melt
//!   threshold, precipitation on days warmer than the rain threshold, or the
//!   day's loss of snow cover
//! - spread each pulse forward in time with the kind's kernel and add the
//!   contributions up
//!
//! Exponential kernels are evaluated with the recursion
//! `y[i] = p * y[i - 1] + water[i]`, which equals `sum_d water[d] * p^(i - d)`
//! without the quadratic cost. The inverse-Gaussian kernel is tabulated and
//! convolved pulse by pulse.

use crate::domain::{SeriesBundle, TransferKind};
use crate::error::ModelError;
use crate::math::{KernelTable, exp_decay, inv_gauss_pdf};

/// Delay parameters are fitted on a 1e-5 scale and truncated to whole days.
const DELAY_SCALE: f64 = 100_000.0;

/// A water pulse entering the river network on `day`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pulse {
    day: usize,
    water: f64,
}

/// Whole-day shift encoded by a delay parameter (truncates toward zero).
pub fn delay_shift(delay: f64) -> i64 {
    (delay * DELAY_SCALE) as i64
}

/// Modeled discharge for `kind` at `params` over the days of `bundle`.
///
/// The output always has `bundle.len()` entries. Out-of-range parameters
/// (e.g. `p > 1`, `mu <= 0`) are not rejected here; they may produce
/// non-finite values, which the objective guards against.
///
/// # Errors
/// `ParamCount` if `params` does not match the kind's layout, and
/// `MissingSeries` when a precipitation kind is given a bundle without
/// precipitation.
pub fn predict(kind: TransferKind, bundle: &SeriesBundle, params: &[f64]) -> Result<Vec<f64>, ModelError> {
    kind.check_params(params)?;
    let len = bundle.len();

    let out = match kind {
        TransferKind::ExpDecay => {
            let pulses = melt_pulses(bundle, params[0], params[1], false);
            geometric_response(len, &pulses, params[2], 0)
        }
        TransferKind::ExpDecayDelay => {
            let pulses = melt_pulses(bundle, params[0], params[1], false);
            geometric_response(len, &pulses, params[2], delay_shift(params[3]))
        }
        TransferKind::ExpDecayTempDelta => {
            let pulses = melt_pulses(bundle, params[0], params[1], true);
            geometric_response(len, &pulses, params[2], 0)
        }
        TransferKind::InvGauss | TransferKind::InvGaussTempDelta => {
            let by_excess = kind == TransferKind::InvGaussTempDelta;
            let pulses = melt_pulses(bundle, params[0], params[1], by_excess);
            let (amp, t_scale, mu, loc, scale) = (params[2], params[3], params[4], params[5], params[6]);
            let kernel = KernelTable::new(len, |n| amp * inv_gauss_pdf(n as f64 * t_scale, mu, loc, scale));
            kernel_response(len, &pulses, &kernel)
        }
        TransferKind::ExpDecayPrecip => {
            let precip = bundle.precip().ok_or(ModelError::MissingSeries {
                model: kind.name(),
                series: "precip",
            })?;
            let melt = melt_pulses(bundle, params[0], params[1], false);
            let rain = rain_pulses(bundle.temp(), precip, params[3], params[4]);
            let mut out = geometric_response(len, &melt, params[2], 0);
            for (o, r) in out.iter_mut().zip(geometric_response(len, &rain, params[5], 0)) {
                *o += r;
            }
            out
        }
        TransferKind::SnowDelta => {
            let pulses = snow_loss_pulses(bundle.snowprop(), params[0]);
            geometric_response(len, &pulses, params[1], 0)
        }
    };

    debug_assert_eq!(out.len(), len);
    Ok(out)
}

/// Melt pulses `k * snowprop[d]` on days with `temp[d] > thresh`,
/// optionally scaled by the exceedance `temp[d] - thresh`.
fn melt_pulses(bundle: &SeriesBundle, thresh: f64, k: f64, by_excess: bool) -> Vec<Pulse> {
    bundle
        .temp()
        .iter()
        .zip(bundle.snowprop())
        .enumerate()
        .filter(|(_, (t, _))| **t > thresh)
        .map(|(day, (t, s))| {
            let mut water = k * s;
            if by_excess {
                water *= t - thresh;
            }
            Pulse { day, water }
        })
        .collect()
}

/// Rain pulses `k * precip[d]` on days with `temp[d] > thresh`.
fn rain_pulses(temp: &[f64], precip: &[f64], thresh: f64, k: f64) -> Vec<Pulse> {
    temp.iter()
        .zip(precip)
        .enumerate()
        .filter(|(_, (t, _))| **t > thresh)
        .map(|(day, (_, p))| Pulse { day, water: k * p })
        .collect()
}

/// Pulses `k * (snowprop[d - 1] - snowprop[d])` on days the snow cover
/// shrinks. Gains and the first day contribute nothing.
fn snow_loss_pulses(snowprop: &[f64], k: f64) -> Vec<Pulse> {
    snowprop
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] > w[1])
        .map(|(i, w)| Pulse {
            day: i + 1,
            water: k * (w[0] - w[1]),
        })
        .collect()
}

/// `out[i] = sum_d water[d] * p^(i - d - shift)` over lags `>= 0`.
fn geometric_response(len: usize, pulses: &[Pulse], p: f64, shift: i64) -> Vec<f64> {
    let mut water = vec![0.0; len];
    for pulse in pulses {
        water[pulse.day] += pulse.water;
    }

    let mut acc = Vec::with_capacity(len);
    let mut prev = 0.0;
    for w in water {
        prev = p * prev + w;
        acc.push(prev);
    }
    if shift == 0 {
        return acc;
    }

    // Reading the unshifted response at `i - shift`; past the last day no
    // new water arrives, so the tail keeps decaying from the final value.
    let last = acc.last().copied().unwrap_or(0.0);
    (0..len)
        .map(|i| match (i as i64).checked_sub(shift) {
            Some(j) if j >= 0 => match usize::try_from(j) {
                Ok(j) if j < len => acc[j],
                Ok(j) if last != 0.0 => last * exp_decay(p, j - len + 1),
                _ => 0.0,
            },
            _ => 0.0,
        })
        .collect()
}

/// `out[i] = sum_d water[d] * kernel(i - d)` for `i >= d`.
fn kernel_response(len: usize, pulses: &[Pulse], kernel: &KernelTable) -> Vec<f64> {
    let mut out = vec![0.0; len];
    for pulse in pulses {
        for (lag, o) in out[pulse.day..].iter_mut().enumerate() {
            *o += pulse.water * kernel.at(lag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bundle(temp: &[f64], snow: &[f64]) -> SeriesBundle {
        SeriesBundle::new(temp.to_vec(), snow.to_vec(), None).unwrap()
    }

    fn assert_series_eq(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_relative_eq!(*a, *e, epsilon = 1e-10);
        }
    }

    /// Parameters that trigger on days warmer than 2 °C for every kind.
    fn sample_params(kind: TransferKind) -> Vec<f64> {
        match kind {
            TransferKind::ExpDecay | TransferKind::ExpDecayTempDelta => vec![2.0, 0.7, 0.6],
            TransferKind::ExpDecayDelay => vec![2.0, 0.7, 0.6, 0.00001],
            TransferKind::InvGauss | TransferKind::InvGaussTempDelta => vec![2.0, 0.7, 2.0, 0.4, 1.2, 0.0, 1.0],
            TransferKind::ExpDecayPrecip => vec![2.0, 0.7, 0.6, 2.0, 1.5, 0.5],
            TransferKind::SnowDelta => vec![0.8, 0.6],
        }
    }

    fn full_bundle(temp: &[f64], snow: &[f64], precip: &[f64]) -> SeriesBundle {
        SeriesBundle::new(temp.to_vec(), snow.to_vec(), Some(precip.to_vec())).unwrap()
    }

    #[test]
    fn single_pulse_decays_geometrically() {
        // The trigger day carries the whole pulse: k * snowprop = 50.
        let b = bundle(&[0.0, 0.0, 5.0, 0.0, 0.0], &[50.0; 5]);
        let out = predict(TransferKind::ExpDecay, &b, &[2.0, 1.0, 0.5]).unwrap();
        assert_series_eq(&out, &[0.0, 0.0, 50.0, 25.0, 12.5]);
    }

    #[test]
    fn no_trigger_gives_zero_series() {
        // Cold throughout and a steady snow cover: nothing melts, rain never
        // falls warm enough to count.
        let b = full_bundle(&[-3.0, 0.0, 1.0, 1.9], &[80.0; 4], &[5.0; 4]);
        for kind in TransferKind::ALL {
            assert_eq!(predict(kind, &b, &sample_params(kind)).unwrap(), vec![0.0; 4], "{}", kind.name());
        }
    }

    #[test]
    fn output_is_causal() {
        let temp = [0.0, 6.0, 0.0, 0.0, 7.0, 0.0, 0.0, 0.0];
        let snow = [40.0, 40.0, 35.0, 30.0, 30.0, 25.0, 20.0, 20.0];
        let precip = [0.0, 1.0, 2.0, 0.0, 3.0, 0.0, 1.0, 0.0];

        // Changing inputs from day 4 on must leave days 0..4 untouched.
        let mut temp2 = temp;
        temp2[5] = 9.0;
        let mut snow2 = snow;
        snow2[4] = 10.0;
        let mut precip2 = precip;
        precip2[6] = 5.0;

        for kind in TransferKind::ALL {
            let params = sample_params(kind);
            let base = predict(kind, &full_bundle(&temp, &snow, &precip), &params).unwrap();
            let changed = predict(kind, &full_bundle(&temp2, &snow2, &precip2), &params).unwrap();
            assert_eq!(&base[..4], &changed[..4], "{}", kind.name());
            assert_ne!(&base[4..], &changed[4..], "{}", kind.name());
        }
    }

    #[test]
    fn responses_superpose() {
        // Two records whose inputs add up day by day. Snow cover only ever
        // shrinks, so the daily losses add up as well.
        let temp = [0.0, 5.0, 0.0, 5.0, 0.0, 0.0];
        let first = full_bundle(&temp, &[30.0, 30.0, 20.0, 20.0, 20.0, 20.0], &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let second = full_bundle(&temp, &[60.0, 60.0, 60.0, 60.0, 40.0, 40.0], &[0.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let both = full_bundle(&temp, &[90.0, 90.0, 80.0, 80.0, 60.0, 60.0], &[0.0, 1.0, 0.0, 2.0, 0.0, 0.0]);

        for kind in TransferKind::ALL {
            let params = sample_params(kind);
            let sum = predict(kind, &both, &params).unwrap();
            let a = predict(kind, &first, &params).unwrap();
            let b = predict(kind, &second, &params).unwrap();
            let added: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
            assert_series_eq(&sum, &added);
            assert!(sum.iter().any(|v| *v != 0.0), "{}", kind.name());
        }
    }

    #[test]
    fn recursion_matches_direct_convolution() {
        let temp = [3.0, 5.0, 1.0, 6.0, 8.0, 0.0, 4.5, 0.0];
        let snow = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];
        let b = bundle(&temp, &snow);
        let (thresh, k, p) = (2.5, 0.3, 0.85);
        let out = predict(TransferKind::ExpDecay, &b, &[thresh, k, p]).unwrap();

        let mut direct = vec![0.0; temp.len()];
        for d in 0..temp.len() {
            if temp[d] > thresh {
                for i in d..temp.len() {
                    direct[i] += k * snow[d] * p.powi((i - d) as i32);
                }
            }
        }
        assert_series_eq(&out, &direct);
    }

    #[test]
    fn delay_shifts_response_by_whole_days() {
        assert_eq!(delay_shift(0.00002), 2);
        assert_eq!(delay_shift(0.0000299), 2);
        assert_eq!(delay_shift(-0.000015), -1);

        let b = bundle(&[0.0, 5.0, 0.0, 0.0, 0.0, 0.0], &[20.0; 6]);
        let out = predict(TransferKind::ExpDecayDelay, &b, &[2.0, 1.0, 0.5, 0.00002]).unwrap();
        assert_series_eq(&out, &[0.0, 0.0, 0.0, 20.0, 10.0, 5.0]);
    }

    #[test]
    fn negative_delay_pulls_response_earlier() {
        let b = bundle(&[0.0, 0.0, 5.0, 0.0], &[20.0; 4]);
        let out = predict(TransferKind::ExpDecayDelay, &b, &[2.0, 1.0, 0.5, -0.00001]).unwrap();
        assert_series_eq(&out, &[0.0, 20.0, 10.0, 5.0]);

        // Tail beyond the last day keeps decaying.
        let b = bundle(&[0.0, 0.0, 0.0, 5.0], &[20.0; 4]);
        let out = predict(TransferKind::ExpDecayDelay, &b, &[2.0, 1.0, 0.5, -0.00002]).unwrap();
        assert_series_eq(&out, &[0.0, 20.0, 10.0, 5.0]);
    }

    #[test]
    fn temp_delta_scales_by_exceedance() {
        let b = bundle(&[0.0, 6.0, 0.0], &[10.0; 3]);
        let out = predict(TransferKind::ExpDecayTempDelta, &b, &[2.0, 0.5, 0.5]).unwrap();
        // water = 0.5 * 10 * (6 - 2) = 20
        assert_series_eq(&out, &[0.0, 20.0, 10.0]);
    }

    #[test]
    fn inv_gauss_kernel_shape() {
        let b = bundle(&[5.0, 0.0, 0.0], &[10.0; 3]);
        let params = [2.0, 1.0, 3.0, 0.5, 1.0, 0.0, 1.0];
        let out = predict(TransferKind::InvGauss, &b, &params).unwrap();
        for (n, v) in out.iter().enumerate() {
            assert_relative_eq!(*v, 10.0 * 3.0 * inv_gauss_pdf(n as f64 * 0.5, 1.0, 0.0, 1.0), epsilon = 1e-12);
        }
        // Lag 0 sits on the support edge.
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn precip_variant_sums_melt_and_rain() {
        let b = full_bundle(&[5.0, 0.0, 1.5, 0.5], &[10.0; 4], &[3.0, 0.0, 4.0, 6.0]);
        // melt: temp > 2 on day 0 only, 1 * 10 = 10, decay 0.5
        // rain: temp > 1 on days 0 and 2, 2 * 3 = 6 and 2 * 4 = 8, decay 0.25;
        // day 3 is too cold for its 6 mm to count
        let out = predict(TransferKind::ExpDecayPrecip, &b, &[2.0, 1.0, 0.5, 1.0, 2.0, 0.25]).unwrap();
        assert_series_eq(
            &out,
            &[10.0 + 6.0, 5.0 + 1.5, 2.5 + 0.375 + 8.0, 1.25 + 0.09375 + 2.0],
        );
    }

    #[test]
    fn rain_needs_warm_days_not_heavy_precip() {
        // Heavy precipitation on cold days never reaches the river as rain.
        let b = full_bundle(&[-5.0, -1.0, 0.0], &[0.0; 3], &[40.0, 25.0, 10.0]);
        let out = predict(TransferKind::ExpDecayPrecip, &b, &[2.0, 1.0, 0.5, 0.5, 1.0, 0.5]).unwrap();
        assert_eq!(out, vec![0.0; 3]);
    }

    #[test]
    fn snow_delta_follows_cover_losses() {
        // Losses of 10 on day 1 and 5 on day 3; the gain on day 2 is ignored.
        let b = bundle(&[0.0; 5], &[50.0, 40.0, 45.0, 40.0, 40.0]);
        let out = predict(TransferKind::SnowDelta, &b, &[2.0, 0.5]).unwrap();
        assert_series_eq(&out, &[0.0, 20.0, 10.0, 5.0 + 10.0, 7.5]);
    }

    #[test]
    fn snow_delta_ignores_temperature() {
        let snow = [60.0, 50.0, 50.0, 20.0];
        let cold = predict(TransferKind::SnowDelta, &bundle(&[-9.0; 4], &snow), &[1.0, 0.3]).unwrap();
        let warm = predict(TransferKind::SnowDelta, &bundle(&[15.0; 4], &snow), &[1.0, 0.3]).unwrap();
        assert_eq!(cold, warm);
        assert_eq!(cold[0], 0.0);
    }

    #[test]
    fn precip_variant_needs_precip() {
        let b = bundle(&[5.0, 0.0], &[10.0; 2]);
        let err = predict(TransferKind::ExpDecayPrecip, &b, &TransferKind::ExpDecayPrecip.default_guess()).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingSeries {
                model: "exp-decay-precip",
                series: "precip"
            }
        );
    }

    #[test]
    fn wrong_param_count_is_rejected() {
        let b = bundle(&[5.0, 0.0], &[10.0; 2]);
        let err = predict(TransferKind::InvGauss, &b, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, ModelError::ParamCount { expected: 7, actual: 3, .. }));
    }

    #[test]
    fn inputs_are_left_untouched() {
        let b = bundle(&[0.0, 5.0, 0.0], &[10.0, 20.0, 30.0]);
        let before = b.clone();
        let _ = predict(TransferKind::ExpDecay, &b, &[2.0, 1.0, 0.5]).unwrap();
        assert_eq!(b, before);
    }
}
