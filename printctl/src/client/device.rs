//! Dual-mode request client.
//!
//! [`DeviceClient`] executes calls immediately by default. Opening a
//! [`Batch`] switches the calling thread into deferred mode: `get` calls are
//! queued and answered with [`FutureResult`] placeholders, then executed
//! concurrently when the batch is executed or dropped.

use std::thread::{self, ThreadId};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{debug, trace, warn};

use super::future::{FutureResult, Reply};
use super::request::{Method, Request, RequestBody};
use super::transport::{Credentials, ReqwestTransport, Transport};
use crate::error::{ControlError, ControlResult};

struct Deferred {
    request: Request,
    result: FutureResult,
}

#[derive(Default)]
struct BatchState {
    /// Thread that opened the current batch, if any.
    owner: Option<ThreadId>,
    queue: Vec<Deferred>,
}

/// Blocking client for the device's HTTP API.
///
/// Owns a single-threaded Tokio runtime which drives both immediate calls and
/// the concurrent fan-out of a batch. The runtime and the transport's
/// connection pool are released when the client is dropped.
///
/// The blocking methods must not be called from inside an async context.
pub struct DeviceClient<T: Transport = ReqwestTransport> {
    transport: T,
    runtime: Runtime,
    batch: Mutex<BatchState>,
}

impl DeviceClient<ReqwestTransport> {
    /// Creates a client talking HTTP through `reqwest`.
    pub fn connect(timeout: Duration, credentials: Option<Credentials>) -> ControlResult<Self> {
        Self::new(ReqwestTransport::with_options(timeout, credentials)?)
    }
}

impl<T: Transport> DeviceClient<T> {
    /// Creates a client over an arbitrary transport.
    pub fn new(transport: T) -> ControlResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ControlError::Transport {
                url: String::new(),
                message: format!("failed to start request runtime: {}", e),
            })?;

        Ok(Self {
            transport,
            runtime,
            batch: Mutex::new(BatchState::default()),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GET `url`. Returns [`Reply::Deferred`] when a batch is open on this thread.
    pub fn get(&self, url: &str, headers: &[(&str, &str)]) -> ControlResult<Reply> {
        let request = Request::get(url).with_headers(headers);

        {
            let mut state = self.batch.lock();
            if state.owner == Some(thread::current().id()) {
                let result = FutureResult::new();
                trace!(url, position = state.queue.len(), "Queued deferred GET");
                state.queue.push(Deferred {
                    request,
                    result: result.clone(),
                });
                return Ok(Reply::Deferred(result));
            }
        }

        self.execute(request).map(Reply::Ready)
    }

    /// PUT `body` to `url`. Always executes immediately.
    pub fn put(&self, url: &str, body: RequestBody, headers: &[(&str, &str)]) -> ControlResult<Value> {
        self.send_immediate(Method::Put, url, body, headers)
    }

    /// POST `body` to `url`. Always executes immediately.
    pub fn post(&self, url: &str, body: RequestBody, headers: &[(&str, &str)]) -> ControlResult<Value> {
        self.send_immediate(Method::Post, url, body, headers)
    }

    /// Opens a batch on the calling thread.
    ///
    /// Fails with [`ControlError::BatchInProgress`] if a batch is already open
    /// on this client, whether by this thread or another one.
    pub fn batch(&self) -> ControlResult<Batch<'_, T>> {
        let mut state = self.batch.lock();
        if state.owner.is_some() {
            return Err(ControlError::BatchInProgress);
        }
        state.owner = Some(thread::current().id());
        debug!("Batch opened");
        Ok(Batch {
            client: self,
            finished: false,
        })
    }

    /// Whether the calling thread currently has a batch open.
    pub fn in_batch(&self) -> bool {
        self.batch.lock().owner == Some(thread::current().id())
    }

    fn send_immediate(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
        headers: &[(&str, &str)],
    ) -> ControlResult<Value> {
        if self.in_batch() {
            warn!(
                method = %method,
                url,
                "Batch mode does not support this method; executing immediately"
            );
        }
        let request = Request::new(method, url)
            .with_headers(headers)
            .with_body(body);
        self.execute(request)
    }

    fn execute(&self, request: Request) -> ControlResult<Value> {
        self.runtime.block_on(self.transport.send(request))
    }

    /// Runs the queued calls concurrently and resolves their placeholders in
    /// registration order. Returns the number of calls, or the first failure
    /// once every placeholder has been resolved.
    fn drain(&self) -> ControlResult<usize> {
        // The lock is not held across the fan-out; the owner stays set so no
        // other batch can open until this one is resolved.
        let queue = std::mem::take(&mut self.batch.lock().queue);

        let (requests, results): (Vec<Request>, Vec<FutureResult>) = queue
            .into_iter()
            .map(|deferred| (deferred.request, deferred.result))
            .unzip();

        let count = requests.len();
        let outcomes = self.runtime.block_on(join_all(
            requests.into_iter().map(|request| self.transport.send(request)),
        ));

        let mut first_failure = None;
        for (result, outcome) in results.iter().zip(outcomes) {
            if let Err(e) = &outcome {
                first_failure.get_or_insert_with(|| e.clone());
            }
            if result.resolve(outcome).is_err() {
                warn!("Placeholder was resolved before its batch executed");
            }
        }
        self.batch.lock().owner = None;

        debug!(count, failed = first_failure.is_some(), "Batch executed");
        match first_failure {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }
}

/// Scope of deferred execution on one client.
///
/// Executing (or dropping) the batch runs every queued call and returns the
/// client to immediate mode.
pub struct Batch<'a, T: Transport = ReqwestTransport> {
    client: &'a DeviceClient<T>,
    finished: bool,
}

impl<T: Transport> Batch<'_, T> {
    /// Executes the queued calls. See [`DeviceClient::batch`].
    pub fn execute(mut self) -> ControlResult<usize> {
        self.finished = true;
        self.client.drain()
    }

    /// Number of calls queued so far.
    pub fn len(&self) -> usize {
        self.client.batch.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Transport> Drop for Batch<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.client.drain() {
                warn!(error = %e, "Batch dropped with failed requests");
            }
        }
    }
}
