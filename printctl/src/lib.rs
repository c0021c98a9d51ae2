//! printctl - Remote control and data logging for networked 3D printers
//!
//! This library drives a printer over its HTTP JSON API. Endpoints are not
//! hard-coded: a descriptor tree is compiled into routing and limits tables,
//! and typed components issue validated requests through a client that can
//! batch reads into one concurrent round trip.
//!
//! # High-Level API
//!
//! ```ignore
//! use printctl::config::DeviceConfig;
//! use printctl::datalog::{producer, CsvSink};
//! use printctl::device::{Printer, MODEL_S3};
//!
//! let config = DeviceConfig::load_from(Path::new("printctl.ini"), "lab-s3")?;
//! let printer = Printer::connect(&config, MODEL_S3)?;
//!
//! let bed = printer.bed().clone();
//! let logger = printer.data_logger(
//!     CsvSink::new("run.csv"),
//!     [("bed_temp", producer(move || bed.temperature()))],
//! );
//! logger.start()?;
//! printer.bed().heat_to(60.0)?;
//! logger.wait_for_value("bed_temp", |v| v.as_f64() >= Some(59.5))?;
//! logger.stop()?;
//! ```

pub mod client;
pub mod config;
pub mod datalog;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod timer;

pub use error::{ControlError, ControlResult};

/// Version of the printctl library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
