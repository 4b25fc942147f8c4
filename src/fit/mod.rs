//! Calibration of transfer functions against observed discharge.
//!
//! Responsibilities:
//!
//! - express a transfer kind plus data as a scalar loss
//! - minimize it with a derivative-free solver (Powell or Nelder-Mead)
//! - calibrate every variant of a run, collecting per-variant failures

pub mod calibrate;
pub mod objective;
pub mod optimizer;
pub mod powell;

pub use calibrate::*;
pub use objective::*;
pub use optimizer::*;
pub use powell::*;
