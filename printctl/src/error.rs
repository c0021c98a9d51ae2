//! Error types shared by every printctl subsystem.
//!
//! All fallible operations in the library return [`ControlError`]. The enum is
//! `Clone` so that the outcome of a deferred request can be stored in a
//! [`FutureResult`](crate::client::FutureResult) and handed to every reader.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Result alias used throughout the library.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors raised by the request client, the endpoint compiler, the polling
/// waiter and the data logger.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// The device answered with a status code of 400 or above.
    #[error("request to {url} failed with status {status}: {body}")]
    Request {
        url: String,
        status: u16,
        body: Value,
    },

    /// The request never produced a status (connect failure, timeout, bad URL).
    #[error("request to {url} could not be sent: {message}")]
    Transport { url: String, message: String },

    /// Illegal use of a deferred result placeholder.
    #[error("future result error: {0}")]
    FutureResult(#[from] FutureResultError),

    /// A polled condition did not become true in time.
    #[error("wait time exceeded {timeout:?}")]
    Timeout { timeout: Duration },

    /// A value was rejected by the limits declared for its endpoint.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The endpoint descriptor is missing structure the compiler needs.
    #[error("malformed endpoint descriptor at {location}: {reason}")]
    MalformedDescriptor { location: String, reason: String },

    /// A batch is already open on this client.
    #[error("a batch is already in progress on this client")]
    BatchInProgress,

    /// The requested snapshot field is not produced by the data logger.
    #[error("unknown snapshot field '{0}'")]
    UnknownField(String),

    /// The routing table has no URL for this endpoint.
    #[error("no endpoint registered for {category}.{label}")]
    UnknownEndpoint { category: String, label: String },

    /// The snapshot sink failed to write or close.
    #[error("snapshot sink error: {0}")]
    Sink(String),

    /// A local file (e.g. a print job) could not be read.
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// Misuse of a [`FutureResult`](crate::client::FutureResult).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FutureResultError {
    #[error("value not stored")]
    NotStored,

    #[error("value already stored")]
    AlreadyStored,

    /// A queued projection did not match the shape of the stored value.
    #[error("projection {0} not present in stored value")]
    MissingKey(String),
}

/// A value outside the limits declared by the endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{value} is not in limit range of {min} to {max}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("{value} is not in choices {choices:?}")]
    NotAChoice { value: Value, choices: Vec<Value> },

    #[error("{value} is not a number")]
    NotANumber { value: Value },
}

impl ControlError {
    /// Returns the HTTP status if this is a device-side request failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ControlError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        ControlError::MalformedDescriptor {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
