//! HTTP transport abstraction.
//!
//! The client never talks to the network directly; it hands an [`HttpRequest`]
//! to a [`Transport`]. [`ReqwestTransport`] is the default implementation.

use std::collections::HashMap;
use std::time::Duration;

use log::debug;

use crate::clients::errors::{Error, Result};

/// A GET request with its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// Performs HTTP GET requests.
///
/// Implementations own timeouts, TLS and proxies. A network failure must be
/// reported as [`Error::TransportError`]; any HTTP status, including errors,
/// is a successful exchange and comes back as an [`HttpResponse`].
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Blocking `reqwest` transport.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("metatune/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigurationError(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("GET {}", request.url);
        let mut builder = self.client.get(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .map_err(|e| Error::TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (key.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| Error::TransportError(e.to_string()))?
            .to_vec();

        debug!("GET {} -> {status} ({} bytes)", request.url, body.len());
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_collects_headers() {
        let request =
            HttpRequest::get("http://example.com/lookup").header("Accept", "application/xml");
        assert_eq!(request.url, "http://example.com/lookup");
        assert_eq!(
            request.headers.get("Accept").map(String::as_str),
            Some("application/xml")
        );
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let response = HttpResponse::new(200, "x").with_header("Last-Modified", "yesterday");
        assert_eq!(response.header("last-modified"), Some("yesterday"));
        assert_eq!(response.header("LAST-MODIFIED"), Some("yesterday"));
        assert!(response.is_success());
        assert!(!response.is_not_modified());
        assert!(HttpResponse::new(304, "").is_not_modified());
    }
}
