//! High-level printer facade.
//!
//! [`Printer`] compiles an endpoint descriptor against the device address and
//! exposes one component per subsystem:
//!
//! ```ignore
//! let config = DeviceConfig::load_from(Path::new("printctl.ini"), "lab-s3")?;
//! let printer = Printer::connect(&config, MODEL_S3)?;
//!
//! printer.bed().heat_to(60.0)?;
//! let temp = printer.bed().temperature()?.into_value()?;
//! ```

mod component;
mod printer;
mod state;

pub use component::{Bed, Fan, Feeder, Head, Led, Nozzle, Peripherals, System};
pub use printer::{Printer, MODEL_S3};
pub use state::{
    JobTarget, PrinterStatus, JOB_STATE_NONE, JOB_STATE_PRE_PRINT, JOB_STATE_PRINTING,
};
