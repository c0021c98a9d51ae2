//! Device configuration loaded from an INI file.
//!
//! Each section names one device:
//!
//! ```ini
//! [lab-s3]
//! ip_address = 192.168.0.20
//! username = maker
//! password = secret
//! request_timeout = 30
//! logging_interval = 1.0
//! timer_timeout = 600
//! ```
//!
//! Only `ip_address` is required; everything else falls back to the
//! constants in [`defaults`].

pub mod defaults;
mod file;
mod parser;

pub use file::{device_names, ConfigFileError, DeviceConfig};
