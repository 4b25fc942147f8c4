//! Scalar loss for a transfer function against observed discharge.
//!
//! The objective is exposed to `argmin` as a [`CostFunction`], so any of its
//! derivative-free solvers can drive it.
//!
//! - base loss: `sum_i (modeled_i - observed_i)^2`
//! - penalized kinds add a fixed penalty while a guarded parameter is negative
//! - a non-finite or overflowing loss is replaced by [`LOSS_CEILING`], so the
//!   optimizer never sees `NaN`

use argmin::core::{CostFunction, Error};

use crate::domain::{ObjectiveKind, ObservedWindow, SeriesBundle, TransferKind};
use crate::error::ModelError;
use crate::models::predict;

/// Largest loss ever reported to the optimizer.
pub const LOSS_CEILING: f64 = 1.0e150;

/// A transfer kind bound to one bundle and its observed discharge.
#[derive(Debug, Clone, Copy)]
pub struct Objective<'a> {
    kind: TransferKind,
    shape: ObjectiveKind,
    bundle: &'a SeriesBundle,
    observed: &'a [f64],
}

impl<'a> Objective<'a> {
    /// # Errors
    /// `Alignment` when `observed` does not cover exactly the bundle's days,
    /// `MissingSeries` when the kind needs precipitation the bundle lacks.
    pub fn new(kind: TransferKind, bundle: &'a SeriesBundle, observed: &'a [f64]) -> Result<Self, ModelError> {
        if observed.len() != bundle.len() {
            return Err(ModelError::Alignment {
                series: "discharge",
                reference: "snowprop",
                expected: bundle.len(),
                actual: observed.len(),
            });
        }
        if kind.needs_precip() && bundle.precip().is_none() {
            return Err(ModelError::MissingSeries {
                model: kind.name(),
                series: "precip",
            });
        }
        Ok(Self {
            kind,
            shape: kind.objective(),
            bundle,
            observed,
        })
    }

    pub fn for_window(kind: TransferKind, window: &'a ObservedWindow) -> Result<Self, ModelError> {
        Self::new(kind, window.bundle(), window.observed())
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Sum of squared residuals at `params`, without penalty or guard.
    pub fn sum_squares(&self, params: &[f64]) -> Result<f64, ModelError> {
        let modeled = predict(self.kind, self.bundle, params)?;
        Ok(modeled
            .iter()
            .zip(self.observed)
            .map(|(m, o)| (m - o) * (m - o))
            .sum())
    }

    /// Guarded loss at `params`; always finite and within `[0, LOSS_CEILING]`.
    pub fn loss(&self, params: &[f64]) -> Result<f64, ModelError> {
        let mut loss = self.sum_squares(params)?;
        if let ObjectiveKind::PenalizedSumSquares { index, penalty } = self.shape {
            if params[index] < 0.0 {
                loss += penalty;
            }
        }
        Ok(guard(loss))
    }
}

fn guard(loss: f64) -> f64 {
    if loss.is_finite() {
        loss.min(LOSS_CEILING)
    } else {
        LOSS_CEILING
    }
}

impl CostFunction for Objective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.loss(params)?)
    }
}
