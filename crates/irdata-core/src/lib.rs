//! irdata-core - Core types, traits and errors for the irdata API client.
//!
//! The protocol itself lives in `irdata-client`; this crate holds what the
//! protocol and its collaborators share: credentials, request types, the
//! payload model, the [`Transport`] and [`Store`] traits and the error
//! taxonomy.

pub mod config;
pub mod credentials;
pub mod error;
pub mod payload;
pub mod traits;
pub mod types;

pub use config::ClientConfig;
pub use credentials::{Credentials, LoginToken};
pub use error::Error;
pub use payload::{Resource, ResourcePayload};
pub use traits::{Headers, Store, Transport, TransportResponse};
pub use types::{BaseUrl, Endpoint, QueryParams};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
