//! reqwest-backed HTTP transport.

use async_trait::async_trait;
use tracing::{instrument, trace};
use url::Url;

use irdata_core::error::{Error, TransportError};
use irdata_core::{ClientConfig, Headers, Result, Transport, TransportResponse};

/// A persistent HTTP client.
///
/// One instance is created per client and shared by the authenticator and
/// the resolver, so connections are pooled and the session cookies set by
/// the auth endpoint ride along on every later request. Dropping the last
/// handle closes the pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the timeouts from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("irdata/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(map_reqwest)?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    ///
    /// The client should have a cookie store enabled, or the session will
    /// not survive past the login request.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read(response: reqwest::Response) -> Result<TransportResponse> {
        let status = response.status().as_u16();

        let headers = collect_headers(response.headers());
        let body = response.bytes().await.map_err(map_reqwest)?;
        trace!(status, bytes = body.len(), "HTTP response");

        Ok(TransportResponse::new(status, headers, body.to_vec()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self), fields(%url))]
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest)?;

        Self::read(response).await
    }

    #[instrument(skip(self, body), fields(%url))]
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<TransportResponse> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(map_reqwest)?;

        Self::read(response).await
    }
}

/// Copy response headers, skipping values that are not valid UTF-8.
fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        match value.to_str() {
            Ok(value) => headers.insert(name.as_str(), value),
            Err(_) => trace!(header = %name, bytes = value.len(), "Skipping non-UTF-8 header value"),
        }
    }
    headers
}

/// Classify a reqwest failure.
pub(crate) fn map_reqwest(err: reqwest::Error) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout {
            message: err.to_string(),
        }
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}
