//! Catchment records: the in-memory daily record and a synthetic generator.

pub mod catchment;
pub mod synthetic;

pub use catchment::*;
pub use synthetic::*;
