//! Numerical helpers shared by the transfer functions and the applier.

pub mod kernels;
pub mod metrics;
pub mod ols;

pub use kernels::*;
pub use metrics::*;
pub use ols::*;
