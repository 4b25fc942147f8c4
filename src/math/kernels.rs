//! Network response kernels.
//!
//! A kernel maps a lag `n >= 0` (days since the pulse reached the river) to
//! the fraction of the pulse that shows up as discharge on that day:
//!
//! - exponential: `p^n`
//! - inverse Gaussian: `amp * pdf(n * t_scale; mu, loc, scale)`
//!
//! Lags are tabulated once per evaluation so the convolution loop is a plain
//! multiply-add.

use std::f64::consts::PI;

/// Inverse-Gaussian probability density with location/scale.
///
/// `pdf(x) = f((x - loc) / scale; mu) / scale` where
/// `f(y; mu) = exp(-(y - mu)^2 / (2 y mu^2)) / sqrt(2 pi y^3)` for `y > 0`.
///
/// Returns `NaN` when `mu <= 0` or `scale <= 0` (no such distribution), and
/// `0` outside the support.
pub fn inv_gauss_pdf(x: f64, mu: f64, loc: f64, scale: f64) -> f64 {
    if !(mu > 0.0 && scale > 0.0) {
        return f64::NAN;
    }
    let y = (x - loc) / scale;
    if !(y > 0.0) {
        return 0.0;
    }
    let dev = y - mu;
    let density = (-(dev * dev) / (2.0 * y * mu * mu)).exp() / (2.0 * PI * y * y * y).sqrt();
    density / scale
}

/// Geometric decay `p^n`.
pub fn exp_decay(p: f64, n: usize) -> f64 {
    match i32::try_from(n) {
        Ok(n) => p.powi(n),
        Err(_) => p.powf(n as f64),
    }
}

/// Kernel values tabulated for lags `0..len`.
///
/// A response over `len` days never reads a lag past `len - 1`; such lags
/// read as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelTable {
    values: Vec<f64>,
}

impl KernelTable {
    pub fn new(len: usize, f: impl Fn(usize) -> f64) -> Self {
        Self {
            values: (0..len).map(f).collect(),
        }
    }

    #[inline]
    pub fn at(&self, n: usize) -> f64 {
        self.values.get(n).copied().unwrap_or(0.0)
    }
}
