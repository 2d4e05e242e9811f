//! API base URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use super::{Endpoint, QueryParams};
use crate::error::{Error, InvalidInputError};

/// Path of the login endpoint relative to the base URL.
pub const AUTH_PATH: &str = "/auth";

/// A validated API base URL.
///
/// Base URLs must use HTTPS; plain HTTP is accepted only for localhost so
/// tests can point the client at a mock server.
///
/// # Example
///
/// ```
/// use irdata_core::{BaseUrl, Endpoint, QueryParams};
///
/// let base = BaseUrl::new("https://members-ng.iracing.com/").unwrap();
/// assert_eq!(base.auth_url().unwrap().as_str(), "https://members-ng.iracing.com/auth");
///
/// let endpoint = Endpoint::new("/data/car/get").unwrap();
/// let url = base.endpoint_url(&endpoint, &QueryParams::new()).unwrap();
/// assert_eq!(url.as_str(), "https://members-ng.iracing.com/data/car/get");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Create a new base URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::BaseUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Returns the base without a trailing slash.
    fn trimmed(&self) -> &str {
        // The URL crate always adds a trailing slash to root paths.
        self.0.as_str().trim_end_matches('/')
    }

    /// Returns the login endpoint URL.
    pub fn auth_url(&self) -> Result<Url, Error> {
        self.join_path(AUTH_PATH)
    }

    /// Returns the URL for an endpoint with URL-encoded query parameters.
    ///
    /// No `?` is appended when `params` is empty.
    pub fn endpoint_url(&self, endpoint: &Endpoint, params: &QueryParams) -> Result<Url, Error> {
        let mut url = self.join_path(endpoint.as_str())?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url)
    }

    fn join_path(&self, path: &str) -> Result<Url, Error> {
        let joined = format!("{}{}", self.trimmed(), path);
        Url::parse(&joined).map_err(|e| {
            InvalidInputError::Endpoint {
                value: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the inner URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must not carry a query or fragment".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self(Url::parse(super::DEFAULT_BASE_URL).expect("default base URL is valid"))
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trimmed())
    }
}

impl FromStr for BaseUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for BaseUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.trimmed())
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BaseUrl::new(&s).map_err(serde::de::Error::custom)
    }
}
