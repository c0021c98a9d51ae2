//! Periodic device state logging.
//!
//! A [`DataLogger`] runs a background thread that, once per interval, reads
//! every registered producer inside one batch, publishes the results as a
//! [`Snapshot`] and appends a row to a [`SnapshotSink`].
//!
//! ```text
//! producers ──batch──► Snapshot ──► ArcSwap (readers: get / wait_for_value)
//!                                 └─► SnapshotSink (CSV, memory)
//! ```

mod logger;
mod sink;
mod snapshot;

pub use logger::{
    producer, DataLogger, LoggerConfig, LoggerState, Producer, DEFAULT_LOGGING_INTERVAL,
};
pub use sink::{CsvSink, MemoryRows, MemorySink, SnapshotSink};
pub use snapshot::{Snapshot, TIMESTAMP_FIELD};
