//! Error types for the irdata client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, rate limiting, resolution, storage and input
//! validation failures.

use thiserror::Error;

/// The unified error type for irdata operations.
///
/// Every failure surfaced to a caller keeps enough detail (status code
/// and/or response body) to log or display the root cause.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (bad credentials, missing auth marker).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server kept rate limiting until the retry budget ran out.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// A resource could not be resolved (unexpected status, bad body).
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// The persistence collaborator failed to store a payload.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (base URL, endpoint, names, configuration).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// A back-off wait was aborted through the cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Auth(AuthError::Rejected { status, .. }) => Some(*status),
            Error::Auth(AuthError::SessionRejected { .. }) => Some(401),
            Error::RateLimitExceeded { .. } => Some(429),
            Error::Resolution(ResolutionError::UnexpectedStatus { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Generic HTTP error (request building, body read).
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The auth endpoint answered with a non-success status.
    #[error("login rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The auth endpoint answered 2xx but without an `authcode` field.
    #[error("login response carried no auth marker: {body}")]
    MissingAuthMarker { body: String },

    /// The server kept answering 401 after repeated re-authentication.
    #[error("session rejected after {attempts} re-authentications")]
    SessionRejected { attempts: u32 },
}

/// Errors raised while turning a response into a resource.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A status other than 2xx, 401 or 429.
    #[error("unexpected status: {status} from {url}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// A 2xx response with nothing in it.
    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    /// A 2xx response whose body is not a JSON object.
    #[error("malformed response body from {url}: {reason}")]
    MalformedBody { url: String, reason: String },

    /// A `link` value that is not a usable URL.
    #[error("invalid link '{link}': {reason}")]
    InvalidLink { link: String, reason: String },
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// A stored manifest entry could not be decoded.
    #[error("corrupt manifest entry: {message}")]
    Manifest { message: String },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid base URL.
    #[error("invalid base URL '{value}': {reason}")]
    BaseUrl { value: String, reason: String },

    /// Invalid endpoint path.
    #[error("invalid endpoint '{value}': {reason}")]
    Endpoint { value: String, reason: String },

    /// Invalid storage name.
    #[error("invalid store name '{value}': {reason}")]
    StoreName { value: String, reason: String },

    /// Invalid configuration value.
    #[error("invalid configuration {key}: {reason}")]
    Config { key: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_keeps_code() {
        let err: Error = ResolutionError::UnexpectedStatus {
            status: 500,
            url: "https://example.com/data".to_string(),
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn rejected_login_displays_body() {
        let err: Error = AuthError::Rejected {
            status: 403,
            body: "bad password".to_string(),
        }
        .into();
        assert!(err.is_auth_error());
        assert!(err.to_string().contains("bad password"));
    }

    #[test]
    fn transport_errors_have_no_status() {
        let err: Error = TransportError::Timeout {
            message: "deadline".to_string(),
        }
        .into();
        assert_eq!(err.status(), None);
    }
}
