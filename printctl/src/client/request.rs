//! Request description passed from the client to a [`Transport`](super::Transport).

use std::fmt;

use serde_json::Value;

/// `Content-Type` for JSON request bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP verbs used by the device API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multipart form upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl FormPart {
    /// A plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            bytes: value.into().into_bytes(),
        }
    }

    /// A file field carrying raw bytes.
    pub fn file(name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            bytes,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    /// Serialized bytes used for digest computation. Multipart bodies are
    /// encoded by the transport, so they report no bytes here.
    pub fn json_bytes(&self) -> Option<Vec<u8>> {
        match self {
            RequestBody::Json(value) => serde_json::to_vec(value).ok(),
            _ => None,
        }
    }
}

/// A single HTTP call. Created per call and never retained after it completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn with_headers(mut self, headers: &[(&str, &str)]) -> Self {
        self.headers.extend(
            headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_headers_and_body() {
        let request = Request::new(Method::Put, "http://host/led")
            .with_headers(&[("Accept", APPLICATION_JSON)])
            .with_body(RequestBody::Json(json!(50)));

        assert_eq!(request.method, Method::Put);
        assert_eq!(
            request.headers,
            vec![("Accept".to_string(), APPLICATION_JSON.to_string())]
        );
        assert_eq!(request.body.json_bytes(), Some(b"50".to_vec()));
    }

    #[test]
    fn test_multipart_has_no_json_bytes() {
        let body = RequestBody::Multipart(vec![FormPart::text("job_name", "cube")]);
        assert_eq!(body.json_bytes(), None);
        assert_eq!(Method::Post.to_string(), "POST");
    }
}
