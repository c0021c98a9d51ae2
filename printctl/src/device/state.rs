//! Printer and print job state names used by the device API.

use std::fmt;

/// Job state reported when no job is active or the job endpoint is unavailable.
pub const JOB_STATE_NONE: &str = "none";

/// Job state while a job is being prepared (e.g. active leveling).
pub const JOB_STATE_PRE_PRINT: &str = "pre_print";

/// Job state while material is being deposited.
pub const JOB_STATE_PRINTING: &str = "printing";

/// Requested transition of the active print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTarget {
    Pause,
    /// Continue a paused job.
    Print,
    Abort,
}

impl JobTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobTarget::Pause => "pause",
            JobTarget::Print => "print",
            JobTarget::Abort => "abort",
        }
    }
}

impl fmt::Display for JobTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall printer status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterStatus {
    Booting,
    WaitingForPeripherals,
    Idle,
    Printing,
    Error,
    Maintenance,
    /// A status this library does not know about.
    Other(String),
}

impl PrinterStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "booting" => PrinterStatus::Booting,
            "waiting_for_peripherals" => PrinterStatus::WaitingForPeripherals,
            "idle" => PrinterStatus::Idle,
            "printing" => PrinterStatus::Printing,
            "error" => PrinterStatus::Error,
            "maintenance" => PrinterStatus::Maintenance,
            other => PrinterStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PrinterStatus::Booting => "booting",
            PrinterStatus::WaitingForPeripherals => "waiting_for_peripherals",
            PrinterStatus::Idle => "idle",
            PrinterStatus::Printing => "printing",
            PrinterStatus::Error => "error",
            PrinterStatus::Maintenance => "maintenance",
            PrinterStatus::Other(other) => other,
        }
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
