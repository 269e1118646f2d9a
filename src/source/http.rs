//! HTTP transport implementation
//!
//! This module handles raw HTTP exchange with the catalog source:
//! - Building an HTTP client with browser-like headers and session cookies
//! - Sending requests with query parameters and per-request headers
//! - Decoding JSON bodies
//! - Classifying network failures
//!
//! Status codes are passed through untouched; retry decisions belong to the
//! scheduler.

use crate::config::SourceConfig;
use crate::source::{SourceRequest, SourceResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Builds an HTTP client configured like the browser session it stands in for
///
/// # Arguments
///
/// * `config` - The source configuration (user agent, cookie, timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &SourceConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    if let Some(cookie) = &config.cookie {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => tracing::warn!("Configured cookie is not a valid header value, ignoring it"),
        }
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport that replays an authenticated browser session over plain HTTP
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        if !config.headless {
            tracing::warn!(
                "Visible session requested, but the HTTP transport has no window; continuing headless"
            );
        }

        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: &SourceRequest) -> Result<SourceResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .query(&request.params);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_error)?;

        if !status.is_success() {
            // Error bodies are informational only
            let body = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Ok(SourceResponse::new(status.as_u16(), body));
        }

        let body = serde_json::from_str(text.trim()).map_err(|e| {
            let preview: String = text.chars().take(120).collect();
            tracing::debug!("Non-JSON body from {}: {}", request.url, preview);
            TransportError::InvalidBody(e.to_string())
        })?;

        Ok(SourceResponse::new(status.as_u16(), body))
    }
}

fn classify_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
