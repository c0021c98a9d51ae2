//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use printctl::config::ConfigFileError;
use printctl::ControlError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be used
    Config(ConfigFileError),
    /// The device or descriptor rejected an operation
    Device(ControlError),
    /// A `--fields` entry that no producer is known for
    UnknownField(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Device(ControlError::Transport { .. }) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. The printer is off or on another network");
                eprintln!("  2. ip_address in the config file is wrong");
            }
            CliError::Device(ControlError::Request { status: 401, .. }) => {
                eprintln!();
                eprintln!("The printer rejected the credentials. Check username and password.");
            }
            CliError::UnknownField(_) => {
                eprintln!();
                eprintln!("Known fields: {}", crate::commands::common::FIELD_NAMES.join(", "));
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Device(e) => write!(f, "Printer error: {}", e),
            CliError::UnknownField(name) => write!(f, "Unknown field '{}'", name),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<ControlError> for CliError {
    fn from(e: ControlError) -> Self {
        CliError::Device(e)
    }
}
