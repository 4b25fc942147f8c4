//! Application of calibrated variants to a new window.
//!
//! Parameters are never re-fitted here: each calibrated variant is evaluated
//! forward and scored against the observed discharge.

pub mod evaluate;

pub use evaluate::*;
