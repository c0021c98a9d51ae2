//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use clap::Args;
use printctl::config::defaults::DEFAULT_CONFIG_FILE;
use printctl::config::DeviceConfig;
use printctl::datalog::{producer, Producer};
use printctl::device::{Printer, MODEL_S3};

use crate::error::CliError;

/// Arguments that select a configured printer.
#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Device section name in the config file
    pub name: String,

    /// Path to the INI config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Printer model in the bundled endpoint descriptor
    #[arg(long, default_value = MODEL_S3)]
    pub model: String,
}

impl DeviceArgs {
    pub fn load(&self) -> Result<DeviceConfig, CliError> {
        Ok(DeviceConfig::load_from(&self.config, &self.name)?)
    }

    pub fn connect(&self) -> Result<Printer, CliError> {
        let config = self.load()?;
        Ok(Printer::connect(&config, &self.model)?)
    }
}

/// Field names accepted by `log --fields`.
pub const FIELD_NAMES: &[&str] = &[
    "status",
    "job_state",
    "bed_temp",
    "bed_target",
    "bed_pos",
    "head_x",
    "head_y",
    "nozzle1_temp",
    "nozzle2_temp",
    "amb_temp",
    "fan_speed",
    "led",
];

/// Builds the producer for one named field.
pub fn field_producer(printer: &Printer, name: &str) -> Result<Producer, CliError> {
    let producer = match name {
        "status" => {
            let system = printer.system().clone();
            producer(move || system.printer_status())
        }
        "job_state" => {
            let printer = printer.clone();
            producer(move || printer.job_state())
        }
        "bed_temp" => {
            let bed = printer.bed().clone();
            producer(move || bed.temperature())
        }
        "bed_target" => {
            let bed = printer.bed().clone();
            producer(move || bed.target_temperature())
        }
        "bed_pos" => {
            let bed = printer.bed().clone();
            producer(move || bed.position())
        }
        "head_x" => {
            let head = printer.head().clone();
            producer(move || head.position_x())
        }
        "head_y" => {
            let head = printer.head().clone();
            producer(move || head.position_y())
        }
        "nozzle1_temp" => {
            let nozzle = printer.main_nozzle().clone();
            producer(move || nozzle.temperature())
        }
        "nozzle2_temp" => {
            let nozzle = printer.sub_nozzle().clone();
            producer(move || nozzle.temperature())
        }
        "amb_temp" => {
            let peripherals = printer.peripherals().clone();
            producer(move || peripherals.ambient_temperature())
        }
        "fan_speed" => {
            let fan = printer.fan().clone();
            producer(move || fan.speed())
        }
        "led" => {
            let led = printer.led().clone();
            producer(move || led.brightness())
        }
        other => return Err(CliError::UnknownField(other.to_string())),
    };
    Ok(producer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use printctl::client::DeviceClient;
    use printctl::endpoint::{compile_model, BUNDLED_DESCRIPTOR};
    use std::sync::Arc;
    use std::time::Duration;

    fn offline_printer() -> Printer {
        let tables = compile_model(BUNDLED_DESCRIPTOR, MODEL_S3, "http://192.0.2.1").unwrap();
        let client = DeviceClient::connect(Duration::from_secs(1), None).unwrap();
        Printer::new(Arc::new(client), &tables)
    }

    #[test]
    fn test_every_listed_field_has_a_producer() {
        let printer = offline_printer();
        for name in FIELD_NAMES {
            assert!(field_producer(&printer, name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let printer = offline_printer();
        assert!(matches!(
            field_producer(&printer, "warp_drive"),
            Err(CliError::UnknownField(name)) if name == "warp_drive"
        ));
    }
}
