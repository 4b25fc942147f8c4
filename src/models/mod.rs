//! Snowmelt transfer function implementations.
//!
//! Transfer functions are small, pure functions of a series bundle and a
//! parameter vector so that calibration and application code can stay
//! generic over the kind.

pub mod model;

pub use model::*;
