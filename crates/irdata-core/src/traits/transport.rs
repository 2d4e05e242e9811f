//! Persistent HTTP transport trait.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::Result;

/// Response headers with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header; names are stored lower-cased.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the first value of the named header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Status, headers and body of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A long-lived HTTP client shared by the authenticator and the resolver.
///
/// Implementations keep connections and session cookies alive between
/// calls. They never retry: every status, including 401 and 429, is handed
/// back to the caller untouched. Only transport failures become errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request.
    async fn get(&self, url: &Url) -> Result<TransportResponse>;

    /// Issue a POST request with a JSON body.
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<TransportResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        (**self).get(url).await
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<TransportResponse> {
        (**self).post_json(url, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let headers = Headers::new().with("X-RateLimit-Reset", "1700000000");
        assert_eq!(headers.get("x-ratelimit-reset"), Some("1700000000"));
        assert_eq!(headers.get("X-RATELIMIT-RESET"), Some("1700000000"));
        assert_eq!(headers.get("x-ratelimit-limit"), None);
    }

    #[test]
    fn success_covers_2xx_only() {
        assert!(TransportResponse::new(204, Headers::new(), Vec::new()).is_success());
        assert!(!TransportResponse::new(301, Headers::new(), Vec::new()).is_success());
        assert!(!TransportResponse::new(429, Headers::new(), Vec::new()).is_success());
    }
}
