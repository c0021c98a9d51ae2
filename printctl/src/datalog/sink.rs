//! Destinations for logged snapshots.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::snapshot::Snapshot;
use crate::error::{ControlError, ControlResult};

/// Receives one header row when logging starts and one row per cycle.
pub trait SnapshotSink: Send {
    fn write_header(&mut self, names: &[String]) -> ControlResult<()>;

    fn append_row(&mut self, snapshot: &Snapshot) -> ControlResult<()>;

    /// Flushes and releases the destination. No rows follow a close.
    fn close(&mut self) -> ControlResult<()> {
        Ok(())
    }
}

impl<S: SnapshotSink + ?Sized> SnapshotSink for Box<S> {
    fn write_header(&mut self, names: &[String]) -> ControlResult<()> {
        (**self).write_header(names)
    }

    fn append_row(&mut self, snapshot: &Snapshot) -> ControlResult<()> {
        (**self).append_row(snapshot)
    }

    fn close(&mut self) -> ControlResult<()> {
        (**self).close()
    }
}

fn sink_error(path: &Path, error: impl std::fmt::Display) -> ControlError {
    ControlError::Sink(format!("{}: {}", path.display(), error))
}

/// Renders a JSON value as one CSV cell.
///
/// Strings are written bare, null is an empty cell, and compound values keep
/// their JSON text.
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Appends rows to a CSV file.
///
/// The file is opened lazily in append mode when the header is written, so a
/// restarted logger adds a fresh header and keeps earlier runs.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> ControlResult<&mut csv::Writer<File>> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| sink_error(&self.path, e))?;
            debug!(path = %self.path.display(), "Opened CSV sink");
            self.writer = Some(csv::Writer::from_writer(file));
        }
        self.writer
            .as_mut()
            .ok_or_else(|| sink_error(&self.path, "writer unavailable"))
    }

    fn write_record<I>(&mut self, record: I) -> ControlResult<()>
    where
        I: IntoIterator<Item = String>,
    {
        let path = self.path.clone();
        let writer = self.writer()?;
        writer
            .write_record(record)
            .map_err(|e| sink_error(&path, e))?;
        // One row per cycle; flushing keeps the file readable while logging.
        writer.flush().map_err(|e| sink_error(&path, e))
    }
}

impl SnapshotSink for CsvSink {
    fn write_header(&mut self, names: &[String]) -> ControlResult<()> {
        self.write_record(names.iter().cloned())
    }

    fn append_row(&mut self, snapshot: &Snapshot) -> ControlResult<()> {
        let row: Vec<String> = snapshot.values().map(cell).collect();
        self.write_record(row)
    }

    fn close(&mut self) -> ControlResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| sink_error(&self.path, e))?;
            debug!(path = %self.path.display(), "Closed CSV sink");
        }
        Ok(())
    }
}

/// Rows captured by a [`MemorySink`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRows {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub closed: bool,
}

/// In-memory sink. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<MemoryRows>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> MemoryRows {
        self.rows.lock().clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().rows.len()
    }
}

impl SnapshotSink for MemorySink {
    fn write_header(&mut self, names: &[String]) -> ControlResult<()> {
        let mut rows = self.rows.lock();
        rows.header = names.to_vec();
        rows.closed = false;
        Ok(())
    }

    fn append_row(&mut self, snapshot: &Snapshot) -> ControlResult<()> {
        let mut rows = self.rows.lock();
        if rows.closed {
            return Err(ControlError::Sink("memory sink is closed".into()));
        }
        rows.rows.push(snapshot.values().cloned().collect());
        Ok(())
    }

    fn close(&mut self) -> ControlResult<()> {
        self.rows.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn snapshot(ts: f64) -> Snapshot {
        Snapshot::new(
            ts,
            vec![
                ("state".into(), json!("idle")),
                ("temp".into(), json!(21.5)),
                ("missing".into(), Value::Null),
                ("pos".into(), json!({"x": 1})),
            ],
        )
    }

    fn header() -> Vec<String> {
        ["timestamp", "state", "temp", "missing", "pos"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_csv_sink_writes_header_then_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");

        let mut sink = CsvSink::new(&path);
        sink.write_header(&header()).unwrap();
        sink.append_row(&snapshot(1.5)).unwrap();
        sink.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,state,temp,missing,pos");
        assert_eq!(lines[1], r#"1.5,idle,21.5,,"{""x"":1}""#);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_csv_sink_appends_across_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");

        for ts in [1.0, 2.0] {
            let mut sink = CsvSink::new(&path);
            sink.write_header(&header()).unwrap();
            sink.append_row(&snapshot(ts)).unwrap();
            sink.close().unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_csv_sink_reports_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::new(dir.path().join("no_such_dir").join("log.csv"));
        assert!(matches!(
            sink.write_header(&header()),
            Err(ControlError::Sink(_))
        ));
    }

    #[test]
    fn test_memory_sink_rejects_rows_after_close() {
        let mut sink = MemorySink::new();
        let view = sink.clone();
        sink.write_header(&header()).unwrap();
        sink.append_row(&snapshot(1.0)).unwrap();
        sink.close().unwrap();
        assert!(sink.append_row(&snapshot(2.0)).is_err());

        let rows = view.contents();
        assert_eq!(rows.header, header());
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0][1], json!("idle"));
        assert!(rows.closed);
    }
}
