//! Print job control.

use std::path::PathBuf;

use clap::Subcommand;

use super::common::DeviceArgs;
use crate::error::CliError;

/// Print job subcommands.
#[derive(Debug, Subcommand)]
pub enum JobAction {
    /// Upload a file and start printing it (skipped if the printer is busy)
    Start {
        #[command(flatten)]
        device: DeviceArgs,
        /// UFP or G-code file to print
        file: PathBuf,
    },
    /// Pause the active job
    Pause {
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Resume a paused job
    Resume {
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Abort the active job
    Abort {
        #[command(flatten)]
        device: DeviceArgs,
    },
}

/// Run a job subcommand.
pub fn run(action: JobAction) -> Result<(), CliError> {
    match action {
        JobAction::Start { device, file } => {
            let printer = device.connect()?;
            if printer.print(&file)? {
                println!("Started {}", file.display());
            } else {
                println!("Printer is busy; {} was not started", file.display());
            }
        }
        JobAction::Pause { device } => {
            device.connect()?.pause()?;
            println!("Paused");
        }
        JobAction::Resume { device } => {
            device.connect()?.resume()?;
            println!("Resumed");
        }
        JobAction::Abort { device } => {
            device.connect()?.abort()?;
            println!("Aborted");
        }
    }
    Ok(())
}
