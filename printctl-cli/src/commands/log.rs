//! Log printer state to CSV for a fixed duration.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Args;
use printctl::datalog::CsvSink;

use super::common::{field_producer, DeviceArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// CSV file to append rows to
    #[arg(long, short)]
    pub output: PathBuf,

    /// Comma-separated fields to record
    #[arg(long, value_delimiter = ',', default_value = "status,job_state,bed_temp,nozzle1_temp")]
    pub fields: Vec<String>,

    /// How long to log, in seconds
    #[arg(long, default_value = "60")]
    pub duration: f64,
}

pub fn run(args: LogArgs) -> Result<(), CliError> {
    let printer = args.device.connect()?;

    let producers = args
        .fields
        .iter()
        .map(|name| Ok((name.clone(), field_producer(&printer, name)?)))
        .collect::<Result<Vec<_>, CliError>>()?;

    let logger = printer.data_logger(CsvSink::new(&args.output), producers);
    logger.start()?;
    println!(
        "Logging {} to {} for {}s",
        args.fields.join(", "),
        args.output.display(),
        args.duration
    );

    thread::sleep(Duration::from_secs_f64(args.duration.max(0.0)));
    logger.stop()?;

    println!("Wrote {} rows", logger.cycles());
    Ok(())
}
