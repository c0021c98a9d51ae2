//! HTTP transport abstraction for testability.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::request::{Method, Request, RequestBody};
use crate::error::{ControlError, ControlResult};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends a single [`Request`] and yields the parsed JSON body.
///
/// Implementations must map a status of 400 or above to
/// [`ControlError::Request`]. Use [`parse_response`] to get that right.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> impl Future<Output = ControlResult<Value>> + Send;
}

/// Username and password for HTTP Digest authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Production transport backed by a pooled `reqwest::Client`.
///
/// When credentials are configured, a `401` carrying a Digest challenge is
/// answered once and the request is replayed with an `Authorization` header.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl ReqwestTransport {
    /// Creates a transport with the default timeout and no authentication.
    pub fn new() -> ControlResult<Self> {
        Self::with_options(DEFAULT_REQUEST_TIMEOUT, None)
    }

    /// Creates a transport with a custom timeout and optional Digest credentials.
    pub fn with_options(timeout: Duration, credentials: Option<Credentials>) -> ControlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ControlError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }

    fn build(&self, request: &Request, authorization: Option<&str>) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => {
                let form = parts.iter().fold(Form::new(), |form, part| {
                    let mut field = Part::bytes(part.bytes.clone());
                    if let Some(file_name) = &part.file_name {
                        field = field.file_name(file_name.clone());
                    }
                    form.part(part.name.clone(), field)
                });
                builder.multipart(form)
            }
        };

        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> ControlResult<Value> {
        trace!(method = %request.method, url = %request.url, "HTTP request starting");

        let mut response = self
            .build(&request, None)
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(credentials) = &self.credentials {
                if let Some(answer) = digest_authorization(credentials, &request, &response)? {
                    debug!(url = %request.url, "Answering digest challenge");
                    response = self
                        .build(&request, Some(&answer))
                        .send()
                        .await
                        .map_err(|e| transport_error(&request.url, e))?;
                }
            }
        }

        let status = response.status().as_u16();
        debug!(url = %request.url, status, "HTTP response received");

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&request.url, e))?;
        parse_response(&request.url, status, &bytes)
    }
}

/// Turns a raw status and body into the client-facing result.
///
/// A body that is not JSON becomes `Value::Null`.
pub fn parse_response(url: &str, status: u16, body: &[u8]) -> ControlResult<Value> {
    let body = serde_json::from_slice(body).unwrap_or(Value::Null);
    if status >= 400 {
        warn!(url = url, status, "HTTP error status");
        return Err(ControlError::Request {
            url: url.to_string(),
            status,
            body,
        });
    }
    Ok(body)
}

fn transport_error(url: &str, e: reqwest::Error) -> ControlError {
    warn!(
        url = url,
        error = %e,
        is_connect = e.is_connect(),
        is_timeout = e.is_timeout(),
        "HTTP request failed"
    );
    ControlError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    }
}

fn digest_authorization(
    credentials: &Credentials,
    request: &Request,
    response: &reqwest::Response,
) -> ControlResult<Option<String>> {
    let Some(challenge) = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(None);
    };

    let mut prompt = match digest_auth::parse(challenge) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(url = %request.url, error = %e, "Unsupported authentication challenge");
            return Ok(None);
        }
    };

    let uri = request_uri(&request.url);
    let body = request.body.json_bytes();
    let context = digest_auth::AuthContext::new_with_method(
        credentials.username.as_str(),
        credentials.password.as_str(),
        uri.as_str(),
        body.as_deref(),
        digest_auth::HttpMethod::from(request.method.as_str()),
    );

    let answer = prompt
        .respond(&context)
        .map_err(|e| ControlError::Transport {
            url: request.url.clone(),
            message: format!("digest challenge could not be answered: {}", e),
        })?;
    Ok(Some(answer.to_header_string()))
}

/// Path and query of `url`, as used in the digest `uri` field.
fn request_uri(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}
