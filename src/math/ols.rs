//! Least squares and simple linear regression.
//!
//! The applier scores a calibrated model by regressing observed discharge on
//! modeled discharge:
//!
//! ```text
//! observed_i ≈ slope * modeled_i + intercept
//! ```
//!
//! Coefficients come from an SVD least-squares solve; the remaining
//! statistics follow the usual simple-regression formulas (same definitions
//! as scipy's `linregress`):
//!
//! - `r = s_xy / sqrt(s_xx s_yy)`, clipped to `[-1, 1]`
//! - `t = r sqrt(df / ((1 - r)(1 + r)))` with `df = n - 2`
//! - `p = 2 * sf_t(|t|; df)`
//! - `se(slope) = sqrt((1 - r^2) s_yy / s_xx / df)`
//! - `se(intercept) = se(slope) * sqrt(s_xx / n + mean_x^2)`

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::domain::RegressionStats;
use crate::error::ModelError;

/// Guards `t` against division by zero when `|r| == 1`.
const TINY: f64 = 1.0e-20;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Regress `y` on `x` by ordinary least squares.
///
/// # Errors
/// `DegenerateRegression` when fewer than 3 points are given, when any value
/// is non-finite, or when `x` has zero variance (slope undefined). Mismatched
/// lengths are an `Alignment` error.
pub fn linregress(x: &[f64], y: &[f64]) -> Result<RegressionStats, ModelError> {
    if x.len() != y.len() {
        return Err(ModelError::Alignment {
            series: "modeled",
            reference: "observed",
            expected: y.len(),
            actual: x.len(),
        });
    }
    let n = x.len();
    if n < 3 {
        return Err(ModelError::DegenerateRegression(format!(
            "need at least 3 points, got {n}"
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ModelError::DegenerateRegression(
            "non-finite values in regression input".to_string(),
        ));
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    // Centered sums of squares / cross products.
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx <= f64::EPSILON * f64::EPSILON * nf * (1.0 + mean_x * mean_x) {
        return Err(ModelError::DegenerateRegression(
            "modeled series has zero variance".to_string(),
        ));
    }

    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let rhs = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &rhs).ok_or_else(|| {
        ModelError::DegenerateRegression("least squares solve failed".to_string())
    })?;
    let intercept = beta[0];
    let slope = beta[1];

    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let df = nf - 2.0;
    let t = r * (df / ((1.0 - r) * (1.0 + r) + TINY)).sqrt();
    let students_t = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| ModelError::DegenerateRegression(format!("t distribution: {e}")))?;
    let p_value = (2.0 * students_t.sf(t.abs())).min(1.0);

    let std_err = ((1.0 - r * r) * syy / sxx / df).max(0.0).sqrt();
    let intercept_std_err = std_err * (sxx / nf + mean_x * mean_x).sqrt();

    Ok(RegressionStats {
        slope,
        intercept,
        r_value: r,
        p_value,
        std_err,
        intercept_std_err,
        n,
    })
}
