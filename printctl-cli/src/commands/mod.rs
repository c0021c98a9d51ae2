//! CLI command implementations.
//!
//! - [`endpoints`] - Show the compiled endpoint tables
//! - [`status`] - One-shot status readout
//! - [`log`] - CSV data logging
//! - [`job`] - Print job control

pub mod common;
pub mod endpoints;
pub mod job;
pub mod log;
pub mod status;
