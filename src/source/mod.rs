//! Source module: the boundary to the catalog's internal endpoints
//!
//! This module contains:
//! - The `Transport` trait every outbound call goes through
//! - Request/response types exchanged with a transport
//! - Endpoint url construction from configured templates
//! - A reqwest-backed transport replaying an authenticated session

mod endpoints;
mod http;

pub use endpoints::Endpoints;
pub use http::{build_http_client, HttpTransport};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// A single call to make against the source
///
/// Cookies and browser headers belong to the session; `headers` only carries
/// the per-request additions layered on top of them.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    pub url: Url,
    pub method: Method,
    /// Query parameters, in order
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl SourceRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// The url with query parameters applied, used for logs and errors
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        url
    }

    /// Looks up a query parameter by name
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status code and parsed JSON body of a completed call
///
/// Non-success responses carry whatever JSON the source sent, or `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResponse {
    pub status: u16,
    pub body: Value,
}

impl SourceResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }
}

/// Failure below the HTTP status level
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    /// A success status whose body is not JSON (challenge pages, truncation)
    #[error("response body is not JSON: {0}")]
    InvalidBody(String),

    #[error("{0}")]
    Other(String),
}

/// Produces authenticated responses for source requests
///
/// Session and browser lifecycle belong to the implementation; the scrape
/// engine only issues calls and classifies the results.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: &SourceRequest) -> Result<SourceResponse, TransportError>;
}
