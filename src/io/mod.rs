//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - per-day series exports (CSV) (`export`)
//! - calibration / application results JSON read/write (`results`)

pub mod export;
pub mod ingest;
pub mod results;

pub use export::*;
pub use ingest::*;
pub use results::*;
