//! HTTP transport seam
//!
//! - `HttpTransport`: blocking reqwest client used against a real server
//! - `MockTransport`: scripted responses, records every request URL

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::TransportError;

const SECRET_KEYS: &[&str] = &["password", "passhash"];

/// Fully built GET request
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    url: Url,
}

impl ApiRequest {
    pub fn get(url: Url) -> Self {
        Self { url }
    }

    pub fn method(&self) -> &'static str {
        "GET"
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL with credential values masked, for logs and errors
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if SECRET_KEYS.contains(&k.as_ref()) {
                    "***".to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), v)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.redacted())
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Delivers one request and returns the raw response body
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<Bytes, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &ApiRequest) -> Result<Bytes, TransportError> {
        (**self).send(request)
    }
}

/// Blocking HTTP(S) transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::Permanent(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<Bytes, TransportError> {
        debug!("HTTP {:?}", request);
        let response = self
            .client
            .get(request.url().clone())
            .send()
            .map_err(|e| classify(e, request))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Transient(format!(
                "HTTP {} for {}",
                status, request
            )));
        }

        response
            .bytes()
            .map_err(|e| TransportError::Transient(format!("reading body of {}: {}", request, e)))
    }
}

fn classify(err: reqwest::Error, request: &ApiRequest) -> TransportError {
    // reqwest errors carry the URL; strip it so secrets never reach the logs
    let err = err.without_url();
    if err.is_builder() {
        TransportError::Permanent(format!("{}: {}", request, err))
    } else {
        TransportError::Transient(format!("{}: {}", request, err))
    }
}

/// Scripted transport for tests and dry runs
///
/// Responses are replayed in push order; once the script is exhausted every
/// request fails permanently.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Bytes, TransportError>>>,
    requests: Mutex<Vec<Url>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, body: impl Into<Bytes>) -> &Self {
        self.responses.lock().push_back(Ok(body.into()));
        self
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// URLs of all requests sent so far, credentials included
    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &ApiRequest) -> Result<Bytes, TransportError> {
        self.requests.lock().push(request.url().clone());
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::Permanent(format!(
                "no scripted response for {}",
                request
            )))
        })
    }
}
