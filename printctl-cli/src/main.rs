//! printctl CLI - Command-line interface
//!
//! This binary provides a command-line interface to the printctl library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use printctl::logging::{init_logging, LoggingGuard, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};

use commands::endpoints::EndpointsArgs;
use commands::job::JobAction;
use commands::log::LogArgs;
use commands::common::DeviceArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "printctl")]
#[command(version = printctl::VERSION)]
#[command(about = "Control and log networked 3D printers", long_about = None)]
struct Cli {
    /// Directory for the session log file
    #[arg(long, global = true, default_value = DEFAULT_LOG_DIR)]
    log_dir: String,

    /// Log debug events (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the endpoint tables compiled from the bundled descriptor
    Endpoints(EndpointsArgs),
    /// Print a one-shot status report as JSON
    Status(DeviceArgs),
    /// Log printer state to a CSV file
    Log(LogArgs),
    /// Start, pause, resume or abort print jobs
    #[command(subcommand)]
    Job(JobAction),
}

fn init(cli: &Cli) -> Result<LoggingGuard, CliError> {
    let level = if cli.verbose { "printctl=debug,info" } else { "info" };
    init_logging(&cli.log_dir, DEFAULT_LOG_FILE, level)
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

fn main() {
    let cli = Cli::parse();

    let _guard = match init(&cli) {
        Ok(guard) => guard,
        Err(e) => e.exit(),
    };
    tracing::debug!(version = printctl::VERSION, "printctl starting");

    let result = match cli.command {
        Commands::Endpoints(args) => commands::endpoints::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Log(args) => commands::log::run(args),
        Commands::Job(action) => commands::job::run(action),
    };

    if let Err(e) = result {
        e.exit();
    }
}
