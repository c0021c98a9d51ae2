//! Default values for device configuration keys.

/// Conventional config file name in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "printctl.ini";

/// Per-request HTTP timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 30.0;

/// Pause between data logger cycles in seconds.
pub const DEFAULT_LOGGING_INTERVAL_SECS: f64 = 1.0;

/// How long blocking waits last before timing out, in seconds.
pub const DEFAULT_TIMER_TIMEOUT_SECS: f64 = 600.0;
