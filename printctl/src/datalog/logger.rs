//! Background snapshot loop.
//!
//! Each cycle opens a batch on the shared [`DeviceClient`], calls every
//! registered producer, executes the batch and publishes the resolved values
//! as one [`Snapshot`]. Readers on other threads see either the previous or
//! the new snapshot, never a mix. A field that cannot be read is published
//! as `null`; a cycle in which no field could be read is skipped.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sink::SnapshotSink;
use super::snapshot::{Snapshot, TIMESTAMP_FIELD};
use crate::client::{DeviceClient, Reply, ReqwestTransport, Transport};
use crate::error::{ControlError, ControlResult};
use crate::timer::{SnapshotSource, Waiter, DEFAULT_WAIT_TIMEOUT};

/// Default pause between cycles, matching the `logging_interval` default.
pub const DEFAULT_LOGGING_INTERVAL: Duration = Duration::from_secs(1);

const THREAD_NAME: &str = "printctl-datalog";

/// Named reading taken once per cycle.
///
/// Producers run on the logger thread while its batch is open, so a producer
/// that calls [`DeviceClient::get`] yields a deferred [`Reply`].
pub type Producer = Arc<dyn Fn() -> ControlResult<Reply> + Send + Sync>;

/// Wraps a closure as a [`Producer`].
pub fn producer<F>(f: F) -> Producer
where
    F: Fn() -> ControlResult<Reply> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Timing for a [`DataLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Target time between cycle starts.
    pub interval: Duration,
    /// How long `get*` and `wait_for_value` block before timing out.
    pub wait_timeout: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_LOGGING_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

/// Lifecycle of a [`DataLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Stopped,
    Running,
    /// Cancellation was requested; the current cycle is finishing.
    StopRequested,
}

type SinkHandle = JoinHandle<Option<Box<dyn SnapshotSink>>>;

struct Worker {
    handle: SinkHandle,
    cancel: CancellationToken,
}

struct Control {
    state: LoggerState,
    producers: Vec<(String, Producer)>,
    /// Held here while stopped, owned by the worker while running.
    sink: Option<Box<dyn SnapshotSink>>,
    worker: Option<Worker>,
}

#[derive(Default)]
struct Published {
    latest: ArcSwapOption<Snapshot>,
    cycles: AtomicU64,
}

/// Periodically snapshots device state on a background thread.
///
/// # Example
///
/// ```ignore
/// let logger = DataLogger::new(client.clone(), CsvSink::new("run.csv"), LoggerConfig::default());
/// let c = client.clone();
/// logger.add("bed_temp", move || c.get(&bed_url, &[]));
/// logger.start()?;
/// logger.wait_for_value("bed_temp", |v| v.as_f64() >= Some(60.0))?;
/// logger.stop()?;
/// ```
pub struct DataLogger<T: Transport + 'static = ReqwestTransport> {
    client: Arc<DeviceClient<T>>,
    config: LoggerConfig,
    waiter: Waiter,
    control: Mutex<Control>,
    /// Signalled whenever a stop completes.
    stopped: Condvar,
    published: Arc<Published>,
}

impl<T: Transport + 'static> DataLogger<T> {
    pub fn new(client: Arc<DeviceClient<T>>, sink: impl SnapshotSink + 'static, config: LoggerConfig) -> Self {
        Self {
            client,
            waiter: Waiter::new(config.wait_timeout),
            config,
            control: Mutex::new(Control {
                state: LoggerState::Stopped,
                producers: Vec::new(),
                sink: Some(Box::new(sink)),
                worker: None,
            }),
            stopped: Condvar::new(),
            published: Arc::new(Published::default()),
        }
    }

    pub fn client(&self) -> &Arc<DeviceClient<T>> {
        &self.client
    }

    pub fn config(&self) -> LoggerConfig {
        self.config
    }

    /// Merges producers into the registry.
    ///
    /// A name that is already registered is replaced in place; new names are
    /// appended. Changes apply from the next [`DataLogger::start`].
    pub fn register<I, N>(&self, producers: I)
    where
        I: IntoIterator<Item = (N, Producer)>,
        N: Into<String>,
    {
        let mut control = self.control.lock();
        for (name, producer) in producers {
            let name = name.into();
            if name == TIMESTAMP_FIELD {
                warn!(field = %name, "Producer name is reserved; ignoring");
                continue;
            }
            match control.producers.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = producer,
                None => control.producers.push((name, producer)),
            }
        }
        if control.state != LoggerState::Stopped {
            debug!("Producers changed while running; applied on next start");
        }
    }

    /// Registers a single closure under `name`.
    pub fn add<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn() -> ControlResult<Reply> + Send + Sync + 'static,
    {
        self.register([(name.into(), producer(f))]);
    }

    /// Field names in row order, starting with `timestamp`.
    pub fn field_names(&self) -> Vec<String> {
        let control = self.control.lock();
        std::iter::once(TIMESTAMP_FIELD.to_string())
            .chain(control.producers.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    pub fn state(&self) -> LoggerState {
        self.control.lock().state
    }

    /// Number of snapshots published since creation.
    pub fn cycles(&self) -> u64 {
        self.published.cycles.load(Ordering::SeqCst)
    }

    /// Writes the header row and starts the background thread.
    ///
    /// Starting a logger that is already running only logs a warning.
    pub fn start(&self) -> ControlResult<()> {
        let mut control = self.control.lock();
        if control.state != LoggerState::Stopped {
            warn!(state = ?control.state, "Data logger is already running");
            return Ok(());
        }

        let mut sink = control
            .sink
            .take()
            .ok_or_else(|| ControlError::Sink("sink was lost by a previous run".into()))?;

        let names: Vec<String> = std::iter::once(TIMESTAMP_FIELD.to_string())
            .chain(control.producers.iter().map(|(name, _)| name.clone()))
            .collect();
        if let Err(e) = sink.write_header(&names) {
            control.sink = Some(sink);
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let cycle = Cycle {
            client: Arc::clone(&self.client),
            producers: control.producers.clone(),
            last_timestamp: f64::MIN,
        };
        let published = Arc::clone(&self.published);
        let interval = self.config.interval;
        let token = cancel.clone();

        let builder = thread::Builder::new().name(THREAD_NAME.into());
        let handle = match spawn_with_sink(builder, sink, move |sink| {
            run_loop(cycle, sink, &published, interval, &token)
        }) {
            Ok(handle) => handle,
            Err((e, sink)) => {
                control.sink = sink;
                return Err(ControlError::Sink(format!("failed to spawn logger thread: {}", e)));
            }
        };

        info!(
            fields = names.len(),
            interval_ms = interval.as_millis() as u64,
            "Data logger started"
        );
        control.worker = Some(Worker { handle, cancel });
        control.state = LoggerState::Running;
        Ok(())
    }

    /// Stops the background thread after its current cycle and closes the sink.
    ///
    /// Stopping a logger that is not running does nothing. A stop issued
    /// while another stop is in progress returns once that one has finished.
    pub fn stop(&self) -> ControlResult<()> {
        let worker = {
            let mut control = self.control.lock();
            loop {
                match control.worker.take() {
                    Some(worker) => {
                        control.state = LoggerState::StopRequested;
                        break worker;
                    }
                    None if control.state == LoggerState::StopRequested => {
                        self.stopped.wait(&mut control);
                    }
                    None => return Ok(()),
                }
            }
        };

        worker.cancel.cancel();
        worker.handle.thread().unpark();
        let joined = worker.handle.join();

        let mut control = self.control.lock();
        let result = match joined {
            Ok(Some(mut sink)) => {
                let closed = sink.close();
                control.sink = Some(sink);
                info!(cycles = self.cycles(), "Data logger stopped");
                closed
            }
            Ok(None) => Err(ControlError::Sink("logger thread never received its sink".into())),
            Err(_) => Err(ControlError::Sink("data logger thread panicked".into())),
        };
        control.state = LoggerState::Stopped;
        self.stopped.notify_all();
        result
    }

    /// Latest snapshot without waiting.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.published.latest.load_full()
    }

    /// Copy of the latest snapshot, waiting for the first one if needed.
    pub fn get_all(&self) -> ControlResult<Snapshot> {
        let mut found = None;
        self.waiter.wait_for(|| {
            found = self.latest();
            found.is_some()
        })?;
        found.map(|snapshot| Snapshot::clone(&snapshot)).ok_or(ControlError::Timeout {
            timeout: self.waiter.timeout(),
        })
    }

    /// Latest value of one field.
    pub fn get(&self, name: &str) -> ControlResult<Value> {
        let snapshot = self.get_all()?;
        snapshot
            .get(name)
            .cloned()
            .ok_or_else(|| ControlError::UnknownField(name.to_string()))
    }

    /// Latest values of several fields, all taken from the same snapshot.
    pub fn get_many(&self, names: &[&str]) -> ControlResult<Vec<Value>> {
        let snapshot = self.get_all()?;
        names
            .iter()
            .map(|name| {
                snapshot
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ControlError::UnknownField(name.to_string()))
            })
            .collect()
    }

    /// Blocks until `predicate` holds for the published value of `key`.
    pub fn wait_for_value<F>(&self, key: &str, predicate: F) -> ControlResult<()>
    where
        F: FnMut(&Value) -> bool,
    {
        self.waiter.wait_for_value(self, key, predicate)
    }

    pub fn waiter(&self) -> Waiter {
        self.waiter
    }
}

impl<T: Transport + 'static> SnapshotSource for DataLogger<T> {
    fn current_value(&self, key: &str) -> Option<Value> {
        self.latest().and_then(|snapshot| snapshot.get(key).cloned())
    }
}

impl<T: Transport + 'static> Drop for DataLogger<T> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Data logger did not stop cleanly");
        }
    }
}

/// Per-thread state of a running logger.
struct Cycle<T: Transport> {
    client: Arc<DeviceClient<T>>,
    producers: Vec<(String, Producer)>,
    last_timestamp: f64,
}

impl<T: Transport> Cycle<T> {
    /// Takes one snapshot. A field whose reply fails is recorded as `null`;
    /// the cycle only fails when the batch cannot be opened or when every
    /// field failed.
    fn run_once(&mut self) -> ControlResult<Snapshot> {
        let timestamp = unix_timestamp().max(self.last_timestamp);

        let batch = self.client.batch()?;
        let replies: Vec<ControlResult<Reply>> = self
            .producers
            .iter()
            .map(|(_, produce)| produce())
            .collect();
        if let Err(e) = batch.execute() {
            debug!(error = %e, "Batch reported failed requests");
        }

        let mut readings = Vec::with_capacity(replies.len());
        let mut first_failure = None;
        let mut failed = 0;
        for ((name, _), reply) in self.producers.iter().zip(replies) {
            let value = match reply.and_then(Reply::into_value) {
                Ok(value) => value,
                Err(e) => {
                    warn!(field = %name, error = %e, "Field could not be read; recording null");
                    failed += 1;
                    first_failure.get_or_insert(e);
                    Value::Null
                }
            };
            readings.push((name.clone(), value));
        }
        if failed == readings.len() {
            if let Some(e) = first_failure {
                return Err(e);
            }
        }

        self.last_timestamp = timestamp;
        Ok(Snapshot::new(timestamp, readings))
    }
}

/// Spawns `body` on a thread built from `builder`, handing it `sink`.
///
/// The sink travels through a shared slot, so it is given back alongside the
/// error when the thread cannot be created.
fn spawn_with_sink<F>(
    builder: thread::Builder,
    sink: Box<dyn SnapshotSink>,
    body: F,
) -> Result<SinkHandle, (io::Error, Option<Box<dyn SnapshotSink>>)>
where
    F: FnOnce(Box<dyn SnapshotSink>) -> Box<dyn SnapshotSink> + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(sink)));
    let handoff = Arc::clone(&slot);
    let spawned = builder.spawn(move || {
        let sink = handoff.lock().take();
        sink.map(body)
    });
    spawned.map_err(|e| (e, slot.lock().take()))
}

fn run_loop<T: Transport>(
    mut cycle: Cycle<T>,
    mut sink: Box<dyn SnapshotSink>,
    published: &Published,
    interval: Duration,
    cancel: &CancellationToken,
) -> Box<dyn SnapshotSink> {
    while !cancel.is_cancelled() {
        let started = Instant::now();

        match cycle.run_once() {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                published.latest.store(Some(Arc::clone(&snapshot)));
                published.cycles.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = sink.append_row(&snapshot) {
                    warn!(error = %e, "Failed to append snapshot row");
                }
            }
            Err(e) => warn!(error = %e, "Snapshot cycle failed; skipping"),
        }

        sleep_until(started + interval, cancel);
    }
    sink
}

/// Parks until `deadline` or cancellation, whichever comes first.
fn sleep_until(deadline: Instant, cancel: &CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::park_timeout(deadline - now);
    }
}

/// Seconds since the Unix epoch with sub-second precision.
fn unix_timestamp() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use crate::datalog::MemorySink;
    use serde_json::json;

    fn fast() -> LoggerConfig {
        LoggerConfig {
            interval: Duration::ZERO,
            wait_timeout: Duration::from_secs(5),
        }
    }

    fn client(mock: MockTransport) -> Arc<DeviceClient<MockTransport>> {
        Arc::new(DeviceClient::new(mock).unwrap())
    }

    fn device_logger(
        mock: MockTransport,
        config: LoggerConfig,
    ) -> (DataLogger<MockTransport>, MemorySink) {
        let client = client(mock);
        let sink = MemorySink::new();
        let logger = DataLogger::new(Arc::clone(&client), sink.clone(), config);

        let a = Arc::clone(&client);
        logger.add("a", move || a.get("http://host/a", &[]));
        let b = Arc::clone(&client);
        logger.add("b", move || b.get("http://host/b", &[]).map(|r| r.at("v")));
        (logger, sink)
    }

    #[test]
    fn test_cycles_publish_rows_in_registration_order() {
        let mock = MockTransport::new()
            .route("http://host/a", 200, json!(1))
            .route("http://host/b", 200, json!({"v": 2}))
            .delay("http://host/a", Duration::from_millis(5));
        let (logger, sink) = device_logger(mock, fast());

        logger.start().unwrap();
        assert_eq!(logger.state(), LoggerState::Running);
        logger.waiter().wait_for(|| logger.cycles() >= 3).unwrap();
        logger.stop().unwrap();
        assert_eq!(logger.state(), LoggerState::Stopped);

        let rows = sink.contents();
        assert_eq!(rows.header, vec!["timestamp", "a", "b"]);
        assert!(rows.rows.len() >= 3);
        assert_eq!(rows.rows.len() as u64, logger.cycles());
        assert!(rows.closed);

        let mut previous = f64::MIN;
        for row in &rows.rows {
            let ts = row[0].as_f64().unwrap();
            assert!(ts >= previous);
            previous = ts;
            assert_eq!(row[1], json!(1));
            assert_eq!(row[2], json!(2));
        }

        assert_eq!(logger.get("a").unwrap(), json!(1));
        assert_eq!(logger.get_many(&["b", "a"]).unwrap(), vec![json!(2), json!(1)]);
    }

    #[test]
    fn test_no_rows_after_stop() {
        let mock = MockTransport::new()
            .route("http://host/a", 200, json!(1))
            .route("http://host/b", 200, json!({"v": 2}));
        let (logger, sink) = device_logger(mock, fast());

        logger.start().unwrap();
        logger.waiter().wait_for(|| logger.cycles() >= 1).unwrap();
        logger.stop().unwrap();

        let count = sink.row_count();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(sink.row_count(), count);
        // Stop is idempotent.
        logger.stop().unwrap();
    }

    #[test]
    fn test_failed_field_is_recorded_as_null() {
        let mock = MockTransport::new()
            .route("http://host/a", 200, json!(1))
            .route("http://host/b", 500, json!("offline"));
        let (logger, sink) = device_logger(mock, fast());

        logger.start().unwrap();
        logger.waiter().wait_for(|| logger.cycles() >= 2).unwrap();
        logger.stop().unwrap();

        assert_eq!(logger.get("a").unwrap(), json!(1));
        assert_eq!(logger.get("b").unwrap(), Value::Null);
        let rows = sink.contents();
        assert!(rows.rows.len() >= 2);
        for row in &rows.rows {
            assert_eq!(&row[1..], &[json!(1), Value::Null]);
        }
    }

    #[test]
    fn test_cycle_with_no_readable_field_is_skipped() {
        let mock = MockTransport::new()
            .route("http://host/a", 503, json!("booting"))
            .route("http://host/b", 500, json!("offline"));
        let config = LoggerConfig {
            interval: Duration::from_millis(2),
            wait_timeout: Duration::from_millis(50),
        };
        let (logger, sink) = device_logger(mock, config);

        logger.start().unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(logger.latest().is_none());
        assert!(matches!(logger.get("a"), Err(ControlError::Timeout { .. })));
        logger.stop().unwrap();

        assert_eq!(sink.row_count(), 0);
        assert!(logger.client().transport().sent.lock().len() >= 2);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let (logger, _sink) = device_logger(
            MockTransport::new()
                .route("http://host/a", 200, json!(1))
                .route("http://host/b", 200, json!({"v": 2})),
            fast(),
        );
        logger.start().unwrap();
        assert!(matches!(
            logger.get("nozzle_temp"),
            Err(ControlError::UnknownField(name)) if name == "nozzle_temp"
        ));
        assert!(logger.get_many(&["a", "zzz"]).is_err());
    }

    #[test]
    fn test_get_before_any_snapshot_times_out() {
        let logger = DataLogger::new(
            client(MockTransport::new()),
            MemorySink::new(),
            LoggerConfig {
                interval: Duration::from_millis(10),
                wait_timeout: Duration::from_millis(20),
            },
        );
        match logger.get_all() {
            Err(ControlError::Timeout { timeout }) => assert_eq!(timeout, Duration::from_millis(20)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_register_overwrites_in_place() {
        let logger = DataLogger::new(client(MockTransport::new()), MemorySink::new(), fast());
        logger.add("x", || Ok(json!(1).into()));
        logger.add("y", || Ok(json!(2).into()));
        logger.add("x", || Ok(json!(3).into()));
        logger.add(TIMESTAMP_FIELD, || Ok(json!(0).into()));
        assert_eq!(logger.field_names(), vec!["timestamp", "x", "y"]);

        logger.start().unwrap();
        logger.waiter().wait_for(|| logger.cycles() >= 1).unwrap();
        assert_eq!(logger.get("x").unwrap(), json!(3));
    }

    #[test]
    fn test_foreign_batch_blocks_cycles_until_released() {
        let mock = MockTransport::new()
            .route("http://host/a", 200, json!(1))
            .route("http://host/b", 200, json!({"v": 2}));
        let (logger, sink) = device_logger(mock, fast());

        let batch = logger.client().batch().unwrap();
        logger.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(sink.row_count(), 0);

        batch.execute().unwrap();
        logger.waiter().wait_for(|| logger.cycles() >= 1).unwrap();
        logger.stop().unwrap();
        assert!(sink.row_count() >= 1);
    }

    #[test]
    fn test_wait_for_value_sees_progress() {
        let logger = DataLogger::new(client(MockTransport::new()), MemorySink::new(), fast());
        let counter = Arc::new(AtomicU64::new(0));
        let n = Arc::clone(&counter);
        logger.add("n", move || Ok(json!(n.fetch_add(1, Ordering::SeqCst)).into()));

        logger.start().unwrap();
        logger
            .wait_for_value("n", |v| v.as_u64().is_some_and(|n| n >= 3))
            .unwrap();
        assert!(logger.get("n").unwrap().as_u64().unwrap() >= 3);
    }

    #[test]
    fn test_restart_writes_new_header() {
        let sink = MemorySink::new();
        let logger = DataLogger::new(client(MockTransport::new()), sink.clone(), fast());
        logger.add("x", || Ok(json!(1).into()));

        logger.start().unwrap();
        logger.start().unwrap();
        logger.waiter().wait_for(|| logger.cycles() >= 1).unwrap();
        logger.stop().unwrap();

        logger.add("y", || Ok(json!(2).into()));
        logger.start().unwrap();
        assert_eq!(sink.contents().header, vec!["timestamp", "x", "y"]);
        assert!(!sink.contents().closed);
    }

    #[test]
    fn test_sink_survives_failed_spawn() {
        let sink = MemorySink::new();
        // No address space can hold this stack, so thread creation fails.
        let builder = thread::Builder::new().stack_size(1 << 60);
        let result = spawn_with_sink(builder, Box::new(sink.clone()), |sink| sink);

        let (_, returned) = result.err().unwrap();
        let mut returned = returned.unwrap();
        returned.write_header(&["timestamp".to_string()]).unwrap();
        assert_eq!(sink.contents().header, vec!["timestamp"]);
    }

    #[test]
    fn test_concurrent_stops_both_wait_for_join() {
        let sink = MemorySink::new();
        let logger = DataLogger::new(client(MockTransport::new()), sink.clone(), fast());
        logger.add("x", || Ok(json!(1).into()));
        logger.start().unwrap();
        logger.waiter().wait_for(|| logger.cycles() >= 1).unwrap();

        thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    logger.stop().unwrap();
                    assert_eq!(logger.state(), LoggerState::Stopped);
                    assert!(sink.contents().closed);
                });
            }
        });

        logger.start().unwrap();
        assert_eq!(logger.state(), LoggerState::Running);
    }

    #[test]
    fn test_drop_stops_running_logger() {
        let sink = MemorySink::new();
        {
            let logger = DataLogger::new(client(MockTransport::new()), sink.clone(), fast());
            logger.add("x", || Ok(json!(1).into()));
            logger.start().unwrap();
            logger.waiter().wait_for(|| logger.cycles() >= 1).unwrap();
        }
        assert!(sink.contents().closed);
    }
}
