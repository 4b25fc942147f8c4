//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the aligned daily input series (`SeriesBundle`, `ObservedWindow`)
//! - the closed set of transfer-function kinds and their objective shapes
//! - model variant configuration (`ModelVariant`, `VariantSet`)
//! - calibration / application outputs

pub mod types;
pub mod variants;

pub use types::*;
pub use variants::*;
