//! Reporting utilities: formatted terminal output for calibration and
//! application runs.

pub mod format;

pub use format::*;
