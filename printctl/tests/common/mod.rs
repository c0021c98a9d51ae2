//! In-process stand-in for a printer's HTTP API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use printctl::client::{parse_response, DeviceClient, Method, Request, RequestBody, Transport};
use printctl::endpoint::{compile_model, EndpointTables, BUNDLED_DESCRIPTOR};
use printctl::ControlResult;

pub const BASE: &str = "http://printer.test";

pub fn url(path: &str) -> String {
    format!("{BASE}/api/v1{path}")
}

pub fn s3_tables() -> EndpointTables {
    compile_model(BUNDLED_DESCRIPTOR, "s3", BASE).unwrap()
}

/// Key-value device: GET reads a URL, PUT stores the JSON body at it.
#[derive(Default)]
pub struct FakePrinter {
    values: Mutex<HashMap<String, Value>>,
    latency: Mutex<HashMap<String, Duration>>,
    pub requests: Mutex<Vec<(Method, String)>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl FakePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, value: Value) {
        self.values.lock().insert(url.to_string(), value);
    }

    pub fn value(&self, url: &str) -> Option<Value> {
        self.values.lock().get(url).cloned()
    }

    pub fn with_latency(self, url: &str, latency: Duration) -> Self {
        self.latency.lock().insert(url.to_string(), latency);
        self
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests.lock().iter().filter(|(m, _)| *m == method).count()
    }

    fn respond(&self, request: &Request) -> (u16, Value) {
        match (&request.method, &request.body) {
            (Method::Get, _) => match self.value(&request.url) {
                Some(value) => (200, value),
                None => (404, Value::from("not found")),
            },
            (Method::Put, RequestBody::Json(body)) => {
                self.set(&request.url, body.clone());
                (204, Value::Null)
            }
            (Method::Post, _) => (201, Value::Null),
            _ => (400, Value::from("unsupported body")),
        }
    }
}

impl Transport for FakePrinter {
    async fn send(&self, request: Request) -> ControlResult<Value> {
        self.requests
            .lock()
            .push((request.method, request.url.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = self.latency.lock().get(&request.url).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let (status, body) = self.respond(&request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let bytes = serde_json::to_vec(&body).unwrap();
        parse_response(&request.url, status, &bytes)
    }
}

pub fn client(printer: FakePrinter) -> Arc<DeviceClient<FakePrinter>> {
    Arc::new(DeviceClient::new(printer).unwrap())
}
