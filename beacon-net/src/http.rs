//! HTTP client abstraction
//!
//! Beacon ships no HTTP stack of its own. Hosts plug one in through
//! [`HttpClient`]; requests complete asynchronously through a one-shot
//! callback.

use std::collections::BTreeMap;
use std::fmt;

/// Outcome of an HTTP exchange at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpResult {
    /// A response was received (any status code)
    #[default]
    Ok,
    /// The request was cancelled before completion
    Aborted,
    /// The request could not be sent
    LocalFailure,
    /// The request was sent but no response arrived
    NetworkFailure,
}

/// Header map keyed case-insensitively.
///
/// Names are stored lower-cased; the last `set` for a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: BTreeMap<String, String>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.entries.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    id: String,
    pub method: String,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: "GET".to_string(),
            url: String::new(),
            headers: HttpHeaders::new(),
            body: Vec::new(),
        }
    }

    /// Identifier used for cancellation
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Response delivered to a request's completion callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Id of the request this answers
    pub id: String,
    pub result: HttpResult,
    pub status_code: u32,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(id: impl Into<String>, status_code: u32) -> Self {
        Self {
            id: id.into(),
            status_code,
            ..Self::default()
        }
    }

    /// Transport-level failure with no status code
    pub fn failed(id: impl Into<String>, result: HttpResult) -> Self {
        Self {
            id: id.into(),
            result,
            ..Self::default()
        }
    }

    /// A response was received and its status is 200
    pub fn is_ok(&self) -> bool {
        self.result == HttpResult::Ok && self.status_code == 200
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, status {})", self.id, self.result, self.status_code)
    }
}

/// Completion callback, called exactly once per sent request.
pub type HttpResponseCallback = Box<dyn FnOnce(HttpResponse) + Send>;

/// Pluggable HTTP stack.
pub trait HttpClient: Send + Sync {
    /// Create an empty request with a fresh id
    fn create_request(&self) -> HttpRequest;

    /// Send `request`; `callback` runs on completion, failure or cancellation.
    /// May run synchronously on the calling thread.
    fn send_request_async(&self, request: HttpRequest, callback: HttpResponseCallback);

    /// Cancel an in-flight request by id; its callback sees [`HttpResult::Aborted`]
    fn cancel_request(&self, id: &str);

    fn cancel_all_requests(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = HttpHeaders::new();
        headers.set("Content-Type", "text/plain");
        headers.set("content-type", "Application/bond-compact-binary");

        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.get("CONTENT-TYPE"),
            Some("Application/bond-compact-binary")
        );
        assert!(!headers.contains("App-Name"));
    }

    #[test]
    fn response_ok_requires_status_200() {
        assert!(HttpResponse::new("r", 200).is_ok());
        assert!(!HttpResponse::new("r", 404).is_ok());
        assert!(!HttpResponse::failed("r", HttpResult::NetworkFailure).is_ok());
    }
}
