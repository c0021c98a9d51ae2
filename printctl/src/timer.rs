//! Polling wait with timeout.
//!
//! [`Waiter`] blocks the calling thread until a predicate holds or a deadline
//! passes. Elapsed time is measured with [`Instant`], so wall-clock
//! adjustments do not affect the deadline.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::trace;

use crate::error::{ControlError, ControlResult};

/// Default timeout, matching the `timer_timeout` configuration default.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default pause between predicate evaluations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Anything that can resolve a named field of the latest published state.
pub trait SnapshotSource {
    /// Current value of `key`, or `None` if nothing is published for it yet.
    fn current_value(&self, key: &str) -> Option<Value>;
}

/// Blocking predicate-with-timeout primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIMEOUT)
    }
}

impl Waiter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Blocks until `predicate` returns true.
    ///
    /// Returns as soon as the predicate first holds. Fails with
    /// [`ControlError::Timeout`] once more than the configured timeout has
    /// elapsed since this call started.
    pub fn wait_for<F>(&self, mut predicate: F) -> ControlResult<()>
    where
        F: FnMut() -> bool,
    {
        self.try_wait_for(|| Ok(predicate()))
    }

    /// Like [`Waiter::wait_for`], but a predicate error ends the wait and is
    /// returned unchanged.
    pub fn try_wait_for<F>(&self, mut predicate: F) -> ControlResult<()>
    where
        F: FnMut() -> ControlResult<bool>,
    {
        let started = Instant::now();
        let mut polls: u64 = 0;

        loop {
            polls += 1;
            if predicate()? {
                trace!(polls, elapsed_ms = started.elapsed().as_millis() as u64, "Wait satisfied");
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed > self.timeout {
                return Err(ControlError::Timeout {
                    timeout: self.timeout,
                });
            }
            // Never sleep past the deadline.
            thread::sleep(self.poll_interval.min(self.timeout - elapsed));
        }
    }

    /// Blocks until `predicate` holds for the current value of `key` in `source`.
    ///
    /// Polls while the source has no value for `key` yet.
    pub fn wait_for_value<S, F>(&self, source: &S, key: &str, mut predicate: F) -> ControlResult<()>
    where
        S: SnapshotSource + ?Sized,
        F: FnMut(&Value) -> bool,
    {
        self.wait_for(|| source.current_value(key).is_some_and(|v| predicate(&v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_returns_immediately_when_true() {
        let calls = AtomicU32::new(0);
        let waiter = Waiter::new(Duration::from_secs(5));
        let started = Instant::now();
        waiter
            .wait_for(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_returns_once_predicate_flips() {
        let calls = AtomicU32::new(0);
        let waiter = Waiter::new(Duration::from_secs(5)).with_poll_interval(Duration::from_millis(1));
        waiter
            .wait_for(|| calls.fetch_add(1, Ordering::SeqCst) >= 3)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_timeout_carries_configured_value() {
        let timeout = Duration::from_millis(50);
        let poll = Duration::from_millis(10);
        let waiter = Waiter::new(timeout).with_poll_interval(poll);

        let started = Instant::now();
        let err = waiter.wait_for(|| false).unwrap_err();
        let elapsed = started.elapsed();

        match err {
            ControlError::Timeout { timeout: reported } => assert_eq!(reported, timeout),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(elapsed >= timeout);
        // Generous slack for scheduler jitter on loaded CI machines.
        assert!(elapsed < timeout + poll + Duration::from_millis(200));
    }

    #[test]
    fn test_zero_timeout_evaluates_once() {
        let calls = AtomicU32::new(0);
        let waiter = Waiter::new(Duration::ZERO);
        let result = waiter.wait_for(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        });
        assert!(matches!(result, Err(ControlError::Timeout { .. })));
        assert!(calls.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_predicate_error_propagates() {
        let waiter = Waiter::new(Duration::from_secs(5));
        let err = waiter
            .try_wait_for(|| Err(ControlError::UnknownField("bed_pos".into())))
            .unwrap_err();
        assert!(matches!(err, ControlError::UnknownField(_)));
    }

    struct MapSource(Mutex<HashMap<String, Value>>);

    impl SnapshotSource for MapSource {
        fn current_value(&self, key: &str) -> Option<Value> {
            self.0.lock().get(key).cloned()
        }
    }

    #[test]
    fn test_wait_for_value_reads_source_each_poll() {
        let source = MapSource(Mutex::new(HashMap::from([(
            "job_state".to_string(),
            json!("pre_print"),
        )])));
        let waiter = Waiter::new(Duration::from_secs(5)).with_poll_interval(Duration::from_millis(1));

        let mut seen = 0;
        waiter
            .wait_for_value(&source, "job_state", |v| {
                seen += 1;
                if seen == 2 {
                    source.0.lock().insert("job_state".into(), json!("printing"));
                }
                v == "printing"
            })
            .unwrap();
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_wait_for_value_times_out_without_value() {
        let source = MapSource(Mutex::new(HashMap::new()));
        let waiter = Waiter::new(Duration::from_millis(20));
        let err = waiter.wait_for_value(&source, "missing", |_| true).unwrap_err();
        assert!(matches!(err, ControlError::Timeout { .. }));
    }
}
