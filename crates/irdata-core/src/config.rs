//! Client configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::InvalidInputError;
use crate::types::BaseUrl;

/// Tunables for the client: where to connect and how hard to retry.
///
/// Every field has a default, so a partial JSON document (or none at all)
/// yields a usable configuration.
///
/// # Example
///
/// ```
/// use irdata_core::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{"max_reauthentications": 1}"#).unwrap();
/// assert_eq!(config.max_reauthentications, 1);
/// assert_eq!(config.max_rate_limit_retries, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: BaseUrl,
    /// Attempts at the auth endpoint before giving up on a rate-limited login.
    pub max_login_attempts: u32,
    /// Re-authentications allowed per fetch after a 401.
    pub max_reauthentications: u32,
    /// Rate-limit retries allowed per fetch.
    pub max_rate_limit_retries: u32,
    /// Wait applied when a 429 carries no usable reset header.
    pub rate_limit_fallback_ms: u64,
    /// Upper bound on any single rate-limit wait.
    pub max_rate_limit_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BaseUrl::default(),
            max_login_attempts: 10,
            max_reauthentications: 3,
            max_rate_limit_retries: 20,
            rate_limit_fallback_ms: 1_000,
            max_rate_limit_delay_ms: 15 * 60 * 1_000,
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with any `IRDATA_*` environment variables.
    ///
    /// Recognised variables: `IRDATA_BASE_URL`, `IRDATA_MAX_LOGIN_ATTEMPTS`,
    /// `IRDATA_MAX_REAUTHENTICATIONS`, `IRDATA_MAX_RATE_LIMIT_RETRIES`,
    /// `IRDATA_RATE_LIMIT_FALLBACK_MS`, `IRDATA_MAX_RATE_LIMIT_DELAY_MS`,
    /// `IRDATA_REQUEST_TIMEOUT_MS` and `IRDATA_CONNECT_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed like
    /// [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("IRDATA_BASE_URL") {
            config.base_url = BaseUrl::new(value)?;
        }
        overlay(&lookup, "IRDATA_MAX_LOGIN_ATTEMPTS", &mut config.max_login_attempts)?;
        overlay(
            &lookup,
            "IRDATA_MAX_REAUTHENTICATIONS",
            &mut config.max_reauthentications,
        )?;
        overlay(
            &lookup,
            "IRDATA_MAX_RATE_LIMIT_RETRIES",
            &mut config.max_rate_limit_retries,
        )?;
        overlay(
            &lookup,
            "IRDATA_RATE_LIMIT_FALLBACK_MS",
            &mut config.rate_limit_fallback_ms,
        )?;
        overlay(
            &lookup,
            "IRDATA_MAX_RATE_LIMIT_DELAY_MS",
            &mut config.max_rate_limit_delay_ms,
        )?;
        overlay(&lookup, "IRDATA_REQUEST_TIMEOUT_MS", &mut config.request_timeout_ms)?;
        overlay(&lookup, "IRDATA_CONNECT_TIMEOUT_MS", &mut config.connect_timeout_ms)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        if self.max_login_attempts == 0 {
            return Err(config_error("max_login_attempts", "must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(config_error("request_timeout_ms", "must be positive"));
        }
        if self.rate_limit_fallback_ms > self.max_rate_limit_delay_ms {
            return Err(config_error(
                "rate_limit_fallback_ms",
                "must not exceed max_rate_limit_delay_ms",
            ));
        }
        Ok(())
    }

    pub fn rate_limit_fallback(&self) -> Duration {
        Duration::from_millis(self.rate_limit_fallback_ms)
    }

    pub fn max_rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.max_rate_limit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn overlay<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e: T::Err| config_error(key, &e.to_string()))?;
    }
    Ok(())
}

fn config_error(key: &str, reason: &str) -> crate::Error {
    InvalidInputError::Config {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
