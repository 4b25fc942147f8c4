//! `snowmelt-nrf` library crate.
//!
//! The binary (`nrf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the transfer functions, calibrator and applier can be driven from other
//!   tools (batch scripts, notebooks via FFI, ...)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod apply;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
