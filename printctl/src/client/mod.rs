//! Request client for the device's HTTP API.
//!
//! # Modes
//!
//! [`DeviceClient`] issues calls immediately unless the calling thread has a
//! [`Batch`] open. Inside a batch, `get` is deferred and answered with a
//! [`FutureResult`]; the queued calls run concurrently when the batch is
//! executed, and the i-th placeholder receives the i-th call's outcome.
//!
//! ```ignore
//! use printctl::client::{DeviceClient, Reply};
//!
//! let client = DeviceClient::connect(Duration::from_secs(30), None)?;
//!
//! let batch = client.batch()?;
//! let status = client.get("http://10.0.0.2/api/v1/printer/status", &[])?;
//! let bed = client.get("http://10.0.0.2/api/v1/printer/bed", &[])?.at("temperature");
//! batch.execute()?;
//!
//! println!("{} {}", status.value()?, bed.value()?);
//! ```
//!
//! `put` and `post` are not deferred. Inside a batch they log a warning and
//! execute immediately.

mod device;
mod future;
mod request;
mod transport;

pub use device::{Batch, DeviceClient};
pub use future::{FutureResult, Projection, Reply};
pub use request::{FormPart, Method, Request, RequestBody, APPLICATION_JSON};
pub use transport::{
    parse_response, Credentials, ReqwestTransport, Transport, DEFAULT_REQUEST_TIMEOUT,
};

#[cfg(test)]
pub use transport::tests::MockTransport;
