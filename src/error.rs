//! Error types.
//!
//! Two layers:
//! - [`ModelError`]: recoverable failures raised by the modeling core
//!   (transfer functions, objective, calibrator, applier). These are local to
//!   one model variant and are collected per variant rather than aborting a run.
//! - [`AppError`]: what the binary reports, carrying a process exit code.

use thiserror::Error;

/// Errors raised by the calibration / application core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Two series that must share day-indexing have different lengths.
    #[error("series `{series}` has {actual} values but `{reference}` has {expected}")]
    Alignment {
        series: &'static str,
        reference: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A transfer function needs a series the bundle does not carry.
    #[error("model `{model}` requires the `{series}` series, which is not present")]
    MissingSeries {
        model: &'static str,
        series: &'static str,
    },

    /// A series contains values the core cannot work with (NaN, out of range).
    #[error("series `{series}` is invalid at day {index}: {reason}")]
    InvalidSeries {
        series: &'static str,
        index: usize,
        reason: String,
    },

    /// Parameter vector length does not match the transfer kind.
    #[error("model `{model}` expects {expected} parameters, got {actual}")]
    ParamCount {
        model: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Regression statistics are undefined for this input.
    #[error("degenerate regression input: {0}")]
    DegenerateRegression(String),

    /// The optimizer itself failed (not budget exhaustion, which is not an error).
    #[error("optimizer failure: {0}")]
    Optimizer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        let exit_code = match &err {
            ModelError::Alignment { .. }
            | ModelError::MissingSeries { .. }
            | ModelError::InvalidSeries { .. }
            | ModelError::ParamCount { .. }
            | ModelError::InvalidConfig(_) => 2,
            ModelError::DegenerateRegression(_) | ModelError::Optimizer(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_message_names_both_series() {
        let err = ModelError::Alignment {
            series: "discharge",
            reference: "snowprop",
            expected: 365,
            actual: 300,
        };
        let msg = err.to_string();
        assert!(msg.contains("discharge"));
        assert!(msg.contains("snowprop"));
        assert!(msg.contains("365") && msg.contains("300"));
    }

    #[test]
    fn model_errors_map_to_exit_codes() {
        let app: AppError = ModelError::DegenerateRegression("flat".into()).into();
        assert_eq!(app.exit_code(), 4);
        let app: AppError = ModelError::InvalidConfig("bad".into()).into();
        assert_eq!(app.exit_code(), 2);
    }
}
