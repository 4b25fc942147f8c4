//! Goodness-of-fit scores for modeled discharge.
//!
//! All scores take observed and modeled slices of equal, non-zero length.

use crate::domain::SkillScores;

/// Nash-Sutcliffe efficiency. Range `(-inf, 1]`, 1 = perfect.
///
/// `None` when observed discharge is constant.
pub fn nse(observed: &[f64], modeled: &[f64]) -> Option<f64> {
    let n = observed.len() as f64;
    let mean_obs = observed.iter().sum::<f64>() / n;
    let numerator: f64 = observed
        .iter()
        .zip(modeled)
        .map(|(o, m)| (o - m).powi(2))
        .sum();
    let denominator: f64 = observed.iter().map(|o| (o - mean_obs).powi(2)).sum();
    if denominator == 0.0 {
        return None;
    }
    Some(1.0 - numerator / denominator)
}

/// Kling-Gupta efficiency. Range `(-inf, 1]`, 1 = perfect.
pub fn kge(observed: &[f64], modeled: &[f64]) -> f64 {
    let n = observed.len() as f64;
    let mean_o = observed.iter().sum::<f64>() / n;
    let mean_m = modeled.iter().sum::<f64>() / n;
    let std_o = (observed.iter().map(|o| (o - mean_o).powi(2)).sum::<f64>() / n).sqrt();
    let std_m = (modeled.iter().map(|m| (m - mean_m).powi(2)).sum::<f64>() / n).sqrt();

    let r = if std_o == 0.0 || std_m == 0.0 {
        0.0
    } else {
        observed
            .iter()
            .zip(modeled)
            .map(|(o, m)| (o - mean_o) * (m - mean_m))
            .sum::<f64>()
            / (n * std_o * std_m)
    };
    let alpha = if std_o == 0.0 { 0.0 } else { std_m / std_o };
    let beta = if mean_o == 0.0 { 0.0 } else { mean_m / mean_o };

    1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt()
}

/// Percent bias. Optimal 0, positive means the model overestimates.
///
/// `None` when observed discharge sums to zero.
pub fn pbias(observed: &[f64], modeled: &[f64]) -> Option<f64> {
    let sum_obs: f64 = observed.iter().sum();
    if sum_obs == 0.0 {
        return None;
    }
    let diff_sum: f64 = modeled.iter().zip(observed).map(|(m, o)| m - o).sum();
    Some(100.0 * diff_sum / sum_obs)
}

/// Root mean square error. Range `[0, inf)`, 0 = perfect.
pub fn rmse(observed: &[f64], modeled: &[f64]) -> f64 {
    let n = observed.len() as f64;
    let mse = observed
        .iter()
        .zip(modeled)
        .map(|(o, m)| (o - m).powi(2))
        .sum::<f64>()
        / n;
    mse.sqrt()
}

pub fn skill_scores(observed: &[f64], modeled: &[f64]) -> SkillScores {
    SkillScores {
        nse: nse(observed, modeled),
        kge: kge(observed, modeled),
        rmse: rmse(observed, modeled),
        pbias: pbias(observed, modeled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_fit_scores() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let s = skill_scores(&obs, &obs);
        assert_relative_eq!(s.nse.unwrap(), 1.0);
        assert_relative_eq!(s.kge, 1.0, epsilon = 1e-12);
        assert_eq!(s.rmse, 0.0);
        assert_relative_eq!(s.pbias.unwrap(), 0.0);
    }

    #[test]
    fn nse_known_value() {
        // num = 0.11, den = 10
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sim = [1.1, 2.2, 2.8, 4.1, 4.9];
        assert_relative_eq!(nse(&obs, &sim).unwrap(), 0.989, epsilon = 1e-10);
    }

    #[test]
    fn nse_mean_model_is_zero() {
        let obs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(nse(&obs, &[3.0; 5]).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn undefined_scores_are_none() {
        assert_eq!(nse(&[5.0; 4], &[1.0, 2.0, 3.0, 4.0]), None);
        assert_eq!(pbias(&[0.0; 3], &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn pbias_sign_follows_overestimation() {
        let obs = [10.0, 10.0, 10.0, 10.0];
        assert_relative_eq!(pbias(&obs, &[11.0; 4]).unwrap(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(pbias(&obs, &[9.0; 4]).unwrap(), -10.0, epsilon = 1e-12);
    }

    #[test]
    fn kge_penalizes_scaled_model() {
        // Perfect correlation but doubled: alpha = beta = 2, r = 1.
        let obs = [1.0, 2.0, 3.0, 4.0];
        let sim: Vec<f64> = obs.iter().map(|v| 2.0 * v).collect();
        assert_relative_eq!(kge(&obs, &sim), 1.0 - 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn rmse_known_value() {
        assert_relative_eq!(rmse(&[0.0, 0.0], &[3.0, 4.0]), 12.5_f64.sqrt(), epsilon = 1e-12);
    }
}
