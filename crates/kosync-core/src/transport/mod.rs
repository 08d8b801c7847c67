//! Sync service transport
//!
//! The engine builds requests and interprets status codes; a transport only
//! moves bytes. Each `send` is one suspension point, so timeouts and
//! cancellation can be layered on without touching engine logic.
//!
//! ## Endpoints
//!
//! - `GET /users/auth`
//! - `GET /syncs/progress/{document}`
//! - `PUT /syncs/progress` (JSON body)
//!
//! ## Implementations
//!
//! - `HttpTransport`: `reqwest` client against a real server
//! - `MemoryTransport`: in-process emulation of the service

mod http;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use http::{HttpTransport, DEFAULT_SERVER_URL, DEFAULT_TIMEOUT_SECS};
pub use memory::MemoryTransport;

/// Media type the service expects in `Accept`
pub const ACCEPT_HEADER: &str = "application/vnd.koreader.v1+json";

/// Header carrying the username
pub const AUTH_USER_HEADER: &str = "X-Auth-User";

/// Header carrying the hex MD5 of the password
pub const AUTH_KEY_HEADER: &str = "X-Auth-Key";

pub const AUTH_PATH: &str = "/users/auth";
pub const PROGRESS_PATH: &str = "/syncs/progress";

/// HTTP method used by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
        }
    }
}

/// A request ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    pub method: Method,
    /// Path relative to the service root, starting with `/`
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
}

impl SyncRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            headers: vec![("Content-Type", "application/json".to_string())],
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Look up a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response from the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub status: u16,
    pub body: String,
}

impl SyncResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Failures below the HTTP layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Performs requests against the sync service
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn send(&self, request: SyncRequest) -> Result<SyncResponse, TransportError>;
}

#[async_trait]
impl<T: SyncTransport + ?Sized> SyncTransport for Arc<T> {
    async fn send(&self, request: SyncRequest) -> Result<SyncResponse, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_request_has_content_type() {
        let req = SyncRequest::put(PROGRESS_PATH, "{}".to_string());
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_header_lookup() {
        let req = SyncRequest::get(AUTH_PATH)
            .with_header(AUTH_USER_HEADER, "reader")
            .with_header("Accept", ACCEPT_HEADER);

        assert_eq!(req.header("x-auth-user"), Some("reader"));
        assert_eq!(req.header("Accept"), Some(ACCEPT_HEADER));
        assert_eq!(req.header(AUTH_KEY_HEADER), None);
    }
}
