//! Single-assignment placeholders for deferred requests.
//!
//! A [`FutureResult`] is handed out when a `get` is queued inside a batch and
//! is resolved exactly once when the batch executes. Projections queued with
//! [`FutureResult::at`] are applied lazily, one per [`FutureResult::get`]
//! call, oldest first.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{ControlError, ControlResult, FutureResultError};

/// A key or index applied to a stored JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Key(String),
    Index(usize),
}

impl Projection {
    fn apply(&self, value: &Value) -> ControlResult<Value> {
        let projected = match self {
            Projection::Key(key) => value.get(key.as_str()),
            Projection::Index(index) => value.get(*index),
        };
        projected
            .cloned()
            .ok_or_else(|| FutureResultError::MissingKey(self.to_string()).into())
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Key(key) => write!(f, "[{:?}]", key),
            Projection::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for Projection {
    fn from(key: &str) -> Self {
        Projection::Key(key.to_string())
    }
}

impl From<String> for Projection {
    fn from(key: String) -> Self {
        Projection::Key(key)
    }
}

impl From<usize> for Projection {
    fn from(index: usize) -> Self {
        Projection::Index(index)
    }
}

#[derive(Default)]
struct Inner {
    outcome: OnceLock<ControlResult<Value>>,
    /// Read in place of a stored [`ControlError::Request`] failure.
    fallback: OnceLock<Value>,
    projections: Mutex<VecDeque<Projection>>,
}

/// Placeholder for the result of a deferred request.
///
/// Clones share the same cell, so the client can keep one handle in its batch
/// queue while the caller holds another.
#[derive(Clone, Default)]
pub struct FutureResult {
    inner: Arc<Inner>,
}

impl FutureResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a projection and returns the same placeholder.
    pub fn at(self, projection: impl Into<Projection>) -> Self {
        self.inner.projections.lock().push_back(projection.into());
        self
    }

    /// Reads `value` instead of a rejected request (status >= 400) stored by
    /// the batch. Transport failures are still returned. Only the first
    /// fallback registered on a placeholder is kept.
    pub fn or_when_rejected(self, value: Value) -> Self {
        let _ = self.inner.fallback.set(value);
        self
    }

    /// Stores the value. Fails if any outcome is already present.
    pub fn store(&self, value: Value) -> ControlResult<()> {
        self.resolve(Ok(value))
    }

    /// Stores a value or a request failure.
    pub(crate) fn resolve(&self, outcome: ControlResult<Value>) -> ControlResult<()> {
        self.inner
            .outcome
            .set(outcome)
            .map_err(|_| FutureResultError::AlreadyStored.into())
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.outcome.get().is_some()
    }

    /// Reads the stored value, applying the oldest queued projection if any.
    ///
    /// Never blocks: an unresolved placeholder fails with
    /// [`FutureResultError::NotStored`]. A request failure stored by the
    /// batch is returned as that failure on every read, unless it is a
    /// rejected request and a fallback was registered.
    pub fn get(&self) -> ControlResult<Value> {
        let stored = match (self.inner.outcome.get(), self.inner.fallback.get()) {
            (None, _) => return Err(FutureResultError::NotStored.into()),
            (Some(Err(ControlError::Request { .. })), Some(fallback)) => fallback,
            (Some(Err(e)), _) => return Err(e.clone()),
            (Some(Ok(value)), _) => value,
        };

        match self.inner.projections.lock().pop_front() {
            Some(projection) => projection.apply(stored),
            None => Ok(stored.clone()),
        }
    }
}

impl fmt::Debug for FutureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureResult")
            .field("outcome", &self.inner.outcome.get())
            .field("pending_projections", &self.inner.projections.lock().len())
            .finish()
    }
}

/// What a `get` returns: a value in immediate mode, a placeholder in batch mode.
#[derive(Debug, Clone)]
pub enum Reply {
    Ready(Value),
    Deferred(FutureResult),
}

impl Reply {
    /// Projects the reply. Ready values are projected now; deferred ones queue
    /// the projection on their placeholder. Either way a missing key or index
    /// surfaces as [`FutureResultError::MissingKey`] when the reply is read.
    pub fn at(self, projection: impl Into<Projection>) -> Self {
        match self {
            Reply::Ready(value) => match projection.into().apply(&value) {
                Ok(projected) => Reply::Ready(projected),
                Err(e) => Reply::from(e),
            },
            Reply::Deferred(future) => Reply::Deferred(future.at(projection)),
        }
    }

    /// Reads `value` when the request behind this reply was rejected with a
    /// status >= 400. Ready replies already hold a successful value.
    pub fn or_when_rejected(self, value: Value) -> Self {
        match self {
            Reply::Ready(_) => self,
            Reply::Deferred(future) => Reply::Deferred(future.or_when_rejected(value)),
        }
    }

    /// Concrete value of this reply. Deferred replies must be resolved first.
    pub fn value(&self) -> ControlResult<Value> {
        match self {
            Reply::Ready(value) => Ok(value.clone()),
            Reply::Deferred(future) => future.get(),
        }
    }

    pub fn into_value(self) -> ControlResult<Value> {
        match self {
            Reply::Ready(value) => Ok(value),
            Reply::Deferred(future) => future.get(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Reply::Deferred(_))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Ready(value)
    }
}

impl From<ControlError> for Reply {
    fn from(error: ControlError) -> Self {
        let future = FutureResult::new();
        // A fresh placeholder cannot already be resolved.
        let _ = future.resolve(Err(error));
        Reply::Deferred(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_before_store_fails() {
        let future = FutureResult::new();
        assert!(matches!(
            future.get(),
            Err(ControlError::FutureResult(FutureResultError::NotStored))
        ));
        assert!(!future.is_resolved());
    }

    #[test]
    fn test_store_once_then_read_repeatedly() {
        let future = FutureResult::new();
        future.store(json!(0)).unwrap();

        assert_eq!(future.get().unwrap(), json!(0));
        assert_eq!(future.get().unwrap(), json!(0));

        let err = future.store(json!(1)).unwrap_err();
        assert!(matches!(
            err,
            ControlError::FutureResult(FutureResultError::AlreadyStored)
        ));
        assert_eq!(future.get().unwrap(), json!(0));
    }

    #[test]
    fn test_null_counts_as_stored() {
        let future = FutureResult::new();
        future.store(Value::Null).unwrap();
        assert!(future.store(json!(1)).is_err());
        assert_eq!(future.get().unwrap(), Value::Null);
    }

    #[test]
    fn test_projection_queued_before_resolution() {
        let future = FutureResult::new().at("name");
        future.store(json!({"name": "bulbasaur", "id": 1})).unwrap();

        assert_eq!(future.get().unwrap(), json!("bulbasaur"));
        // Projection consumed; the bare value comes back afterwards.
        assert_eq!(future.get().unwrap(), json!({"name": "bulbasaur", "id": 1}));
    }

    #[test]
    fn test_chained_projections_apply_in_registration_order() {
        let future = FutureResult::new().at("x").at("y");
        future.store(json!({"x": 10, "y": 20})).unwrap();

        assert_eq!(future.get().unwrap(), json!(10));
        assert_eq!(future.get().unwrap(), json!(20));
        assert_eq!(future.get().unwrap(), json!({"x": 10, "y": 20}));
    }

    #[test]
    fn test_index_projection_on_array() {
        let future = FutureResult::new().at(2usize);
        future.store(json!([5, 6, 7])).unwrap();
        assert_eq!(future.get().unwrap(), json!(7));
    }

    #[test]
    fn test_missing_key_reports_projection() {
        let future = FutureResult::new().at("nope");
        future.store(json!({"x": 1})).unwrap();
        match future.get() {
            Err(ControlError::FutureResult(FutureResultError::MissingKey(key))) => {
                assert_eq!(key, "[\"nope\"]");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_stored_failure_is_returned_on_read() {
        let future = FutureResult::new();
        future
            .resolve(Err(ControlError::Request {
                url: "http://host/x".into(),
                status: 500,
                body: Value::Null,
            }))
            .unwrap();
        assert_eq!(future.get().unwrap_err().status(), Some(500));
        assert!(future.store(json!(1)).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let held = FutureResult::new();
        let queued = held.clone();
        queued.store(json!("shared")).unwrap();
        assert_eq!(held.get().unwrap(), json!("shared"));
    }

    #[test]
    fn test_reply_ready_projection_is_immediate() {
        let reply = Reply::Ready(json!({"a": {"b": 3}})).at("a").at("b");
        assert_eq!(reply.into_value().unwrap(), json!(3));

        let missing = Reply::Ready(json!({"a": 1})).at("zzz");
        assert!(matches!(
            missing.value(),
            Err(ControlError::FutureResult(FutureResultError::MissingKey(key))) if key == "[\"zzz\"]"
        ));
    }

    #[test]
    fn test_missing_key_fails_the_same_in_both_modes() {
        let ready = Reply::Ready(json!([1, 2])).at(5usize);

        let future = FutureResult::new();
        future.store(json!([1, 2])).unwrap();
        let deferred = Reply::Deferred(future).at(5usize);

        let (ready, deferred) = (ready.value().unwrap_err(), deferred.value().unwrap_err());
        assert!(matches!(
            ready,
            ControlError::FutureResult(FutureResultError::MissingKey(_))
        ));
        assert_eq!(ready.to_string(), deferred.to_string());
    }

    #[test]
    fn test_fallback_replaces_rejected_request_only() {
        let rejected = FutureResult::new().or_when_rejected(json!("none"));
        rejected
            .resolve(Err(ControlError::Request {
                url: "http://host/print_job/state".into(),
                status: 404,
                body: Value::Null,
            }))
            .unwrap();
        assert_eq!(rejected.get().unwrap(), json!("none"));

        let unreachable = FutureResult::new().or_when_rejected(json!("none"));
        unreachable
            .resolve(Err(ControlError::Transport {
                url: "http://host/print_job/state".into(),
                message: "connection refused".into(),
            }))
            .unwrap();
        assert!(matches!(unreachable.get(), Err(ControlError::Transport { .. })));

        let ok = FutureResult::new().or_when_rejected(json!("none"));
        ok.store(json!("printing")).unwrap();
        assert_eq!(ok.get().unwrap(), json!("printing"));
    }

    #[test]
    fn test_reply_from_error_is_resolved_failure() {
        let reply = Reply::from(ControlError::BatchInProgress);
        assert!(reply.is_deferred());
        assert!(matches!(reply.value(), Err(ControlError::BatchInProgress)));
    }
}
