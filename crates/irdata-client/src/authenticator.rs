//! Session authentication against the auth endpoint.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use irdata_core::error::{AuthError, Error};
use irdata_core::{ClientConfig, Credentials, Result, Transport};

use crate::rate_limit::{RateLimitPolicy, suspend};

/// Field whose presence in a login response marks success.
pub const AUTH_MARKER: &str = "authcode";

/// Whether the transport currently carries a valid session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated,
}

/// Summary of a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Requests made to the auth endpoint, including rate-limited ones.
    pub attempts: u32,
    /// Total time spent backing off.
    pub waited: Duration,
}

/// Owns the session state and performs logins.
///
/// Only this type changes the session state: [`login`](Self::login) moves it
/// to `Authenticated`, [`invalidate`](Self::invalidate) back to
/// `Unauthenticated`.
pub struct SessionAuthenticator<T> {
    transport: Arc<T>,
    credentials: Credentials,
    auth_url: Url,
    policy: RateLimitPolicy,
    max_attempts: u32,
    cancel: CancellationToken,
    state: RwLock<SessionState>,
}

impl<T: Transport> SessionAuthenticator<T> {
    /// Create an unauthenticated authenticator.
    pub fn new(
        transport: Arc<T>,
        credentials: Credentials,
        config: &ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            credentials,
            auth_url: config.base_url.auth_url()?,
            policy: RateLimitPolicy::from_config(config),
            max_attempts: config.max_login_attempts.max(1),
            cancel,
            state: RwLock::new(SessionState::Unauthenticated),
        })
    }

    /// Log in, backing off while the auth endpoint rate limits us.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Rejected`] for a non-2xx, non-429 answer
    /// - [`AuthError::MissingAuthMarker`] for a 2xx without `authcode`
    /// - [`Error::RateLimitExceeded`] once the attempt cap is spent
    /// - transport errors unchanged
    #[instrument(skip(self), fields(username = %self.credentials.username()))]
    pub async fn login(&self) -> Result<LoginOutcome> {
        info!("Logging in");

        let body = json!({
            "email": self.credentials.username(),
            "password": self.credentials.token().as_str(),
        });

        let mut waited = Duration::ZERO;
        for attempt in 1..=self.max_attempts {
            let response = self.transport.post_json(&self.auth_url, &body).await?;

            if response.status == 429 {
                if attempt == self.max_attempts {
                    break;
                }
                let delay = self.policy.compute_delay(&response.headers);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited during login, waiting"
                );
                suspend(delay, &self.cancel).await?;
                waited += delay;
                continue;
            }

            if !response.is_success() {
                return Err(AuthError::Rejected {
                    status: response.status,
                    body: response.text(),
                }
                .into());
            }

            let has_marker = serde_json::from_slice::<Value>(&response.body)
                .ok()
                .and_then(|v| v.as_object().map(|o| o.contains_key(AUTH_MARKER)))
                .unwrap_or(false);
            if !has_marker {
                return Err(AuthError::MissingAuthMarker {
                    body: response.text(),
                }
                .into());
            }

            self.set_state(SessionState::Authenticated);
            debug!(attempt, "Login succeeded");
            return Ok(LoginOutcome {
                attempts: attempt,
                waited,
            });
        }

        warn!(attempts = self.max_attempts, "Login still rate limited, giving up");
        Err(Error::RateLimitExceeded {
            attempts: self.max_attempts,
        })
    }

    /// Forget the session, e.g. after the server answered 401.
    pub fn invalidate(&self) {
        if self.state() == SessionState::Authenticated {
            info!("Session invalidated");
        }
        self.set_state(SessionState::Unauthenticated);
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the username this authenticator logs in with.
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl<T> std::fmt::Debug for SessionAuthenticator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("credentials", &self.credentials)
            .field("auth_url", &self.auth_url.as_str())
            .field(
                "state",
                &*self.state.read().unwrap_or_else(PoisonError::into_inner),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LOGIN_OK, ScriptedTransport, Seen};
    use irdata_core::Headers;
    use irdata_core::error::TransportError;

    fn config() -> ClientConfig {
        ClientConfig {
            rate_limit_fallback_ms: 0,
            ..ClientConfig::default()
        }
    }

    fn authenticator(transport: ScriptedTransport) -> SessionAuthenticator<ScriptedTransport> {
        authenticator_with(transport, &config())
    }

    fn authenticator_with(
        transport: ScriptedTransport,
        config: &ClientConfig,
    ) -> SessionAuthenticator<ScriptedTransport> {
        SessionAuthenticator::new(
            Arc::new(transport),
            Credentials::new("Alice@Example.com", "hunter2"),
            config,
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn starts_unauthenticated() {
        let auth = authenticator(ScriptedTransport::new());
        assert!(!auth.is_authenticated());
        assert_eq!(auth.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn login_then_invalidate() {
        let auth = authenticator(ScriptedTransport::new().on_post(200, LOGIN_OK));

        let outcome = auth.login().await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.waited, Duration::ZERO);
        assert!(auth.is_authenticated());

        auth.invalidate();
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn login_posts_encoded_token_not_password() {
        let auth = authenticator(ScriptedTransport::new().on_post(200, LOGIN_OK));
        auth.login().await.unwrap();

        let seen = auth.transport.seen();
        assert_eq!(
            seen,
            vec![Seen::Post(
                "https://members-ng.iracing.com/auth".to_string(),
                json!({
                    "email": "Alice@Example.com",
                    "password": "i3CgMiw1dzMbPU9mjs+PAl7ftwuPN8FbVUpXQnQ3T24=",
                })
            )]
        );
    }

    #[tokio::test]
    async fn missing_marker_fails_and_stays_unauthenticated() {
        let auth = authenticator(ScriptedTransport::new().on_post(200, r#"{"verificationRequired": true}"#));

        let err = auth.login().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::MissingAuthMarker { ref body }) if body.contains("verificationRequired")));
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn non_success_is_rejected_with_body() {
        let auth = authenticator(ScriptedTransport::new().on_post(401, "bad credentials"));

        let err = auth.login().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::Rejected { status: 401, ref body }) if body == "bad credentials"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_login_waits_then_succeeds() {
        let reset = (chrono::Utc::now().timestamp() + 3).to_string();
        let transport = ScriptedTransport::new()
            .on_post_with(429, Headers::new().with("x-ratelimit-reset", reset), "")
            .on_post(200, LOGIN_OK);
        let auth = authenticator(transport);

        let start = tokio::time::Instant::now();
        let outcome = auth.login().await.unwrap();

        assert_eq!(outcome.attempts, 2);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(auth.is_authenticated());
    }

    #[tokio::test]
    async fn login_gives_up_after_attempt_cap() {
        let config = ClientConfig {
            max_login_attempts: 4,
            rate_limit_fallback_ms: 0,
            ..ClientConfig::default()
        };
        let auth = authenticator_with(ScriptedTransport::new().on_post_repeat(4, 429, ""), &config);

        let err = auth.login().await.unwrap_err();
        assert!(matches!(err, Error::RateLimitExceeded { attempts: 4 }));
        assert_eq!(auth.transport.post_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn final_rate_limited_attempt_does_not_wait() {
        let config = ClientConfig {
            max_login_attempts: 2,
            rate_limit_fallback_ms: 60_000,
            ..ClientConfig::default()
        };
        let auth = authenticator_with(ScriptedTransport::new().on_post_repeat(2, 429, ""), &config);

        let start = tokio::time::Instant::now();
        let err = auth.login().await.unwrap_err();

        assert!(matches!(err, Error::RateLimitExceeded { attempts: 2 }));
        // Only the wait between the two attempts; none after the last.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(120), "waited {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_gives_up_immediately() {
        let config = ClientConfig {
            max_login_attempts: 1,
            rate_limit_fallback_ms: 60_000,
            ..ClientConfig::default()
        };
        let auth = authenticator_with(ScriptedTransport::new().on_post(429, ""), &config);

        let start = tokio::time::Instant::now();
        let err = auth.login().await.unwrap_err();

        assert!(matches!(err, Error::RateLimitExceeded { attempts: 1 }));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn timeout_surfaces_as_transport_error() {
        let auth = authenticator(ScriptedTransport::new().post_timeout());

        let err = auth.login().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_back_off_aborts_login() {
        let config = ClientConfig {
            rate_limit_fallback_ms: 60_000,
            ..ClientConfig::default()
        };
        let cancel = CancellationToken::new();
        let auth = SessionAuthenticator::new(
            Arc::new(ScriptedTransport::new().on_post(429, "")),
            Credentials::new("alice@example.com", "hunter2"),
            &config,
            cancel.clone(),
        )
        .unwrap();
        cancel.cancel();

        let err = auth.login().await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn debug_hides_token() {
        let auth = authenticator(ScriptedTransport::new());
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("i3CgMiw1"));
        assert!(debug.contains("Unauthenticated"));
    }
}
