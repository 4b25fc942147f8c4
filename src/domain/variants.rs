//! Transfer-function kinds and model variant configuration.
//!
//! The set of transfer functions is closed: each `TransferKind` knows its
//! parameter layout, its objective shape and a default initial guess, so a
//! variant can never be paired with the wrong objective or a guess of the
//! wrong length.

use std::collections::HashSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Penalty added to the precipitation objective when the rain coefficient is negative.
pub const PRECIP_PENALTY: f64 = 10_000.0;

/// Parameter position guarded by [`PRECIP_PENALTY`] (`k2`).
pub const PRECIP_GUARDED_INDEX: usize = 4;

/// Network response function variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransferKind {
    /// Geometric decay `p^n` of a melt pulse `k * snowprop`.
    ExpDecay,
    /// `ExpDecay` with the response shifted by an integer number of days.
    ExpDecayDelay,
    /// `ExpDecay` with the pulse scaled by the threshold exceedance.
    ExpDecayTempDelta,
    /// Inverse-Gaussian shaped response.
    InvGauss,
    /// `InvGauss` with the pulse scaled by the threshold exceedance.
    InvGaussTempDelta,
    /// Independent melt and rain kernels, summed.
    ExpDecayPrecip,
    /// Geometric decay of the day-over-day loss in snow cover.
    SnowDelta,
}

/// Shape of the loss built around a transfer function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectiveKind {
    /// Sum of squared residuals.
    SumSquares,
    /// Sum of squared residuals plus `penalty` whenever `params[index] < 0`.
    PenalizedSumSquares { index: usize, penalty: f64 },
}

impl TransferKind {
    pub const ALL: [TransferKind; 7] = [
        TransferKind::ExpDecay,
        TransferKind::ExpDecayDelay,
        TransferKind::ExpDecayTempDelta,
        TransferKind::InvGauss,
        TransferKind::InvGaussTempDelta,
        TransferKind::ExpDecayPrecip,
        TransferKind::SnowDelta,
    ];

    /// Stable identifier, also used as the default variant name.
    pub fn name(self) -> &'static str {
        match self {
            TransferKind::ExpDecay => "exp-decay",
            TransferKind::ExpDecayDelay => "exp-decay-delay",
            TransferKind::ExpDecayTempDelta => "exp-decay-temp-delta",
            TransferKind::InvGauss => "inv-gauss",
            TransferKind::InvGaussTempDelta => "inv-gauss-temp-delta",
            TransferKind::ExpDecayPrecip => "exp-decay-precip",
            TransferKind::SnowDelta => "snow-delta",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            TransferKind::ExpDecay => "Exp decay",
            TransferKind::ExpDecayDelay => "Exp decay + delay",
            TransferKind::ExpDecayTempDelta => "Exp decay (ΔT)",
            TransferKind::InvGauss => "Inv-Gauss",
            TransferKind::InvGaussTempDelta => "Inv-Gauss (ΔT)",
            TransferKind::ExpDecayPrecip => "Exp decay + precip",
            TransferKind::SnowDelta => "Snow-cover loss",
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            TransferKind::ExpDecay | TransferKind::ExpDecayTempDelta => &["temp_thresh", "k", "p"],
            TransferKind::ExpDecayDelay => &["temp_thresh", "k", "p", "delay"],
            TransferKind::InvGauss | TransferKind::InvGaussTempDelta => {
                &["temp_thresh", "k", "amp", "t_scale", "mu", "loc", "scale"]
            }
            TransferKind::ExpDecayPrecip => &["temp_thresh1", "k1", "p1", "temp_thresh2", "k2", "p2"],
            TransferKind::SnowDelta => &["k", "p"],
        }
    }

    /// Number of parameters the transfer function consumes.
    pub fn param_len(self) -> usize {
        self.param_names().len()
    }

    /// Whether the transfer function reads `bundle.precip`.
    pub fn needs_precip(self) -> bool {
        matches!(self, TransferKind::ExpDecayPrecip)
    }

    pub fn objective(self) -> ObjectiveKind {
        match self {
            TransferKind::ExpDecay
            | TransferKind::ExpDecayDelay
            | TransferKind::ExpDecayTempDelta
            | TransferKind::InvGauss
            | TransferKind::InvGaussTempDelta
            | TransferKind::SnowDelta => ObjectiveKind::SumSquares,
            TransferKind::ExpDecayPrecip => ObjectiveKind::PenalizedSumSquares {
                index: PRECIP_GUARDED_INDEX,
                penalty: PRECIP_PENALTY,
            },
        }
    }

    /// Starting point for the optimizer.
    ///
    /// Tuned for `snowprop` in percent and discharge of order 10²–10³; the
    /// 8.4 °C melt threshold comes from earlier fits on the Rio Grande at
    /// Del Norte.
    pub fn default_guess(self) -> Vec<f64> {
        match self {
            TransferKind::ExpDecay => vec![8.4, 1.0, 0.95],
            TransferKind::ExpDecayDelay => vec![8.4, 1.0, 0.95, 0.00002],
            TransferKind::ExpDecayTempDelta => vec![8.4, 0.2, 0.95],
            TransferKind::InvGauss => vec![8.4, 1.0, 1.0, 0.1, 1.0, 0.0, 1.0],
            TransferKind::InvGaussTempDelta => vec![8.4, 0.2, 1.0, 0.1, 1.0, 0.0, 1.0],
            TransferKind::ExpDecayPrecip => vec![8.4, 1.0, 0.95, 0.0, 1.0, 0.9],
            TransferKind::SnowDelta => vec![10.0, 0.95],
        }
    }

    pub(crate) fn check_params(self, params: &[f64]) -> Result<(), ModelError> {
        if params.len() != self.param_len() {
            return Err(ModelError::ParamCount {
                model: self.name(),
                expected: self.param_len(),
                actual: params.len(),
            });
        }
        Ok(())
    }
}

/// A named transfer function with its optimizer starting point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModelVariant")]
pub struct ModelVariant {
    name: String,
    kind: TransferKind,
    initial_guess: Vec<f64>,
}

#[derive(Deserialize)]
struct RawModelVariant {
    name: String,
    kind: TransferKind,
    initial_guess: Vec<f64>,
}

impl TryFrom<RawModelVariant> for ModelVariant {
    type Error = ModelError;

    fn try_from(raw: RawModelVariant) -> Result<Self, Self::Error> {
        ModelVariant::new(raw.name, raw.kind, raw.initial_guess)
    }
}

impl ModelVariant {
    pub fn new(
        name: impl Into<String>,
        kind: TransferKind,
        initial_guess: Vec<f64>,
    ) -> Result<Self, ModelError> {
        kind.check_params(&initial_guess)?;
        if let Some(v) = initial_guess.iter().find(|v| !v.is_finite()) {
            return Err(ModelError::InvalidConfig(format!(
                "initial guess for `{}` contains non-finite value {v}",
                kind.name()
            )));
        }
        Ok(Self {
            name: name.into(),
            kind,
            initial_guess,
        })
    }

    /// Variant named after its kind, seeded with the kind's default guess.
    pub fn with_defaults(kind: TransferKind) -> Self {
        Self {
            name: kind.name().to_string(),
            kind,
            initial_guess: kind.default_guess(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    pub fn objective(&self) -> ObjectiveKind {
        self.kind.objective()
    }

    pub fn initial_guess(&self) -> &[f64] {
        &self.initial_guess
    }
}

/// The model variants active for one run.
///
/// Built once per run and handed to the calibrator by reference; there is no
/// process-wide registry.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    variants: Vec<ModelVariant>,
}

impl VariantSet {
    pub fn new(variants: Vec<ModelVariant>) -> Result<Self, ModelError> {
        if variants.is_empty() {
            return Err(ModelError::InvalidConfig("no model variants selected".to_string()));
        }
        let mut seen = HashSet::new();
        for v in &variants {
            if !seen.insert(v.name()) {
                return Err(ModelError::InvalidConfig(format!(
                    "duplicate model variant name `{}`",
                    v.name()
                )));
            }
        }
        Ok(Self { variants })
    }

    /// One default-seeded variant per kind, in the given order.
    pub fn from_kinds(kinds: &[TransferKind]) -> Result<Self, ModelError> {
        Self::new(kinds.iter().copied().map(ModelVariant::with_defaults).collect())
    }

    /// Every transfer kind with its default guess.
    pub fn all() -> Self {
        Self {
            variants: TransferKind::ALL.iter().copied().map(ModelVariant::with_defaults).collect(),
        }
    }

    /// Replace the initial guess of the variant called `name`.
    pub fn with_guess(mut self, name: &str, guess: Vec<f64>) -> Result<Self, ModelError> {
        let Some(slot) = self.variants.iter_mut().find(|v| v.name() == name) else {
            return Err(ModelError::InvalidConfig(format!(
                "cannot override guess: no variant named `{name}`"
            )));
        };
        *slot = ModelVariant::new(slot.name.clone(), slot.kind, guess)?;
        Ok(self)
    }

    /// Drop variants that read precipitation (for datasets without it).
    pub fn without_precip(&self) -> Result<Self, ModelError> {
        Self::new(
            self.variants
                .iter()
                .filter(|v| !v.kind().needs_precip())
                .cloned()
                .collect(),
        )
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelVariant> {
        self.variants.iter()
    }

    pub fn as_slice(&self) -> &[ModelVariant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ModelVariant> {
        self.variants.iter().find(|v| v.name() == name)
    }
}
