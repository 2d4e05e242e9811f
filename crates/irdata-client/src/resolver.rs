//! Authenticated resource resolution.
//!
//! [`ResourceResolver::fetch`] turns "endpoint + parameters" into a
//! [`Resource`]: it logs in when needed, re-authenticates after a 401, backs
//! off after a 429 and follows a single level of `link` indirection. Every
//! retry is counted against a per-fetch budget, so a misbehaving server
//! produces an error instead of an endless loop.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};
use url::Url;

use irdata_core::error::{AuthError, Error, ResolutionError};
use irdata_core::payload::check_linked_body;
use irdata_core::{
    BaseUrl, ClientConfig, Credentials, Endpoint, QueryParams, Resource, ResourcePayload, Result,
    Transport,
};

use crate::authenticator::{LoginOutcome, SessionAuthenticator};
use crate::rate_limit::{RateLimitPolicy, suspend};

/// Retry counters for one fetch, shared by the primary and link requests.
#[derive(Debug, Default)]
struct RetryBudget {
    reauthentications: u32,
    rate_limited: u32,
}

/// Drives authentication, back-off and link indirection for data requests.
///
/// Fetches are serialised: at most one is in flight per resolver, so one
/// caller can never invalidate the session under another caller's request.
pub struct ResourceResolver<T> {
    transport: Arc<T>,
    authenticator: SessionAuthenticator<T>,
    base_url: BaseUrl,
    policy: RateLimitPolicy,
    max_reauthentications: u32,
    max_rate_limit_retries: u32,
    cancel: CancellationToken,
    in_flight: Mutex<()>,
}

impl<T: Transport> ResourceResolver<T> {
    /// Create a resolver and its authenticator over a shared transport.
    pub fn new(transport: Arc<T>, credentials: Credentials, config: &ClientConfig) -> Result<Self> {
        Self::with_cancellation(transport, credentials, config, CancellationToken::new())
    }

    /// Like [`new`](Self::new), with a token that aborts back-off waits.
    pub fn with_cancellation(
        transport: Arc<T>,
        credentials: Credentials,
        config: &ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let authenticator =
            SessionAuthenticator::new(Arc::clone(&transport), credentials, config, cancel.clone())?;

        Ok(Self {
            transport,
            authenticator,
            base_url: config.base_url.clone(),
            policy: RateLimitPolicy::from_config(config),
            max_reauthentications: config.max_reauthentications,
            max_rate_limit_retries: config.max_rate_limit_retries,
            cancel,
            in_flight: Mutex::new(()),
        })
    }

    /// Returns the authenticator owning this resolver's session.
    pub fn authenticator(&self) -> &SessionAuthenticator<T> {
        &self.authenticator
    }

    /// Returns the token that cancels this resolver's back-off waits.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Log in now, waiting for any fetch in flight to finish first.
    pub async fn login(&self) -> Result<LoginOutcome> {
        let _guard = self.in_flight.lock().await;
        self.authenticator.login().await
    }

    /// Fetch an endpoint and resolve it to its final content.
    ///
    /// # Errors
    ///
    /// - login failures, unchanged
    /// - [`AuthError::SessionRejected`] after too many 401s
    /// - [`Error::RateLimitExceeded`] after too many 429s
    /// - [`ResolutionError`] for any other non-2xx or an unusable body
    /// - transport errors and [`Error::Cancelled`]
    #[instrument(skip(self, params), fields(%endpoint, params = params.len()))]
    pub async fn fetch(&self, endpoint: &Endpoint, params: &QueryParams) -> Result<Resource> {
        let _guard = self.in_flight.lock().await;

        let url = self.base_url.endpoint_url(endpoint, params)?;
        let mut budget = RetryBudget::default();

        let body = self.get_with_retries(&url, &mut budget).await?;
        match ResourcePayload::parse(&url, &body)? {
            ResourcePayload::Direct(map) => {
                debug!(keys = map.len(), "Resolved direct payload");
                Ok(Resource::Direct(map))
            }
            ResourcePayload::Indirect(link) => {
                debug!(%link, "Following link");
                let body = self.get_with_retries(&link, &mut budget).await?;
                check_linked_body(&link, &body)?;
                debug!(bytes = body.len(), "Resolved linked payload");
                Ok(Resource::Linked { link, body })
            }
        }
    }

    /// GET `url` until it answers 2xx, handling 401 and 429 within `budget`.
    async fn get_with_retries(&self, url: &Url, budget: &mut RetryBudget) -> Result<Vec<u8>> {
        loop {
            if !self.authenticator.is_authenticated() {
                self.authenticator.login().await?;
            }

            let response = self.transport.get(url).await?;
            trace!(status = response.status, %url, "Response received");

            match response.status {
                401 => {
                    self.authenticator.invalidate();
                    budget.reauthentications += 1;
                    if budget.reauthentications > self.max_reauthentications {
                        return Err(AuthError::SessionRejected {
                            attempts: self.max_reauthentications,
                        }
                        .into());
                    }
                    warn!(
                        attempt = budget.reauthentications,
                        "Unauthorized, re-authenticating"
                    );
                }
                429 => {
                    budget.rate_limited += 1;
                    if budget.rate_limited > self.max_rate_limit_retries {
                        return Err(Error::RateLimitExceeded {
                            attempts: budget.rate_limited,
                        });
                    }
                    let delay = self.policy.compute_delay(&response.headers);
                    warn!(
                        attempt = budget.rate_limited,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, waiting"
                    );
                    suspend(delay, &self.cancel).await?;
                }
                _ if response.is_success() => return Ok(response.body),
                status => {
                    return Err(ResolutionError::UnexpectedStatus {
                        status,
                        url: url.to_string(),
                        body: response.text(),
                    }
                    .into());
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for ResourceResolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("base_url", &self.base_url)
            .field("authenticator", &self.authenticator)
            .field("max_reauthentications", &self.max_reauthentications)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .finish()
    }
}
