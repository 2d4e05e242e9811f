//! Login credentials and the password encoder.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

/// Derive the login token for a username/password pair.
///
/// The token is `base64(sha256(password + lowercase(username)))`, so it is
/// stable across runs and insensitive to the case of the username.
///
/// # Example
///
/// ```
/// use irdata_core::credentials::encode_password;
///
/// assert_eq!(
///     encode_password("Alice@Example.com", "hunter2"),
///     encode_password("alice@example.com", "hunter2"),
/// );
/// ```
pub fn encode_password(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(username.to_lowercase().as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// The encoded password sent in login requests.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct LoginToken(String);

impl LoginToken {
    /// Wrap an already-encoded token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in login requests.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LoginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LoginToken").field(&"[REDACTED]").finish()
    }
}

/// Login credentials for the data API.
///
/// The raw password is encoded once at construction and then dropped; only
/// the derived [`LoginToken`] is kept and transmitted.
///
/// # Example
///
/// ```
/// use irdata_core::Credentials;
///
/// let creds = Credentials::new("alice@example.com", "hunter2");
/// assert_eq!(creds.username(), "alice@example.com");
/// assert!(!format!("{creds:?}").contains("hunter2"));
/// ```
#[derive(Clone)]
pub struct Credentials {
    username: String,
    token: LoginToken,
}

impl Credentials {
    /// Create credentials from a username and a raw password.
    pub fn new(username: impl Into<String>, password: impl AsRef<str>) -> Self {
        let username = username.into();
        let token = LoginToken::new(encode_password(&username, password.as_ref()));
        Self { username, token }
    }

    /// Create credentials from a username and an already-encoded token.
    pub fn from_token(username: impl Into<String>, token: LoginToken) -> Self {
        Self {
            username: username.into(),
            token,
        }
    }

    /// Returns the username (account email).
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the encoded login token.
    ///
    /// # Security
    ///
    /// Use this only when constructing authentication requests.
    pub fn token(&self) -> &LoginToken {
        &self.token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
