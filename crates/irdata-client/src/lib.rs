//! irdata-client - Authenticated, rate-limit aware client for the data API.
//!
//! The moving parts, leaves first:
//!
//! - [`RateLimitPolicy`] turns `x-ratelimit-reset` into a wait
//! - [`SessionAuthenticator`] logs in and owns the session state
//! - [`ResourceResolver`] fetches endpoints, re-authenticating after 401,
//!   backing off after 429 and following `link` indirection
//! - [`HttpTransport`] is the shared, cookie-keeping reqwest client
//! - [`IrDataClient`] ties them together behind a small API
//!
//! # Example
//!
//! ```no_run
//! use irdata_client::IrDataClient;
//! use irdata_core::{ClientConfig, Credentials, QueryParams};
//!
//! # async fn example() -> Result<(), irdata_core::Error> {
//! let config = ClientConfig::from_env()?;
//! let client = IrDataClient::with_config(Credentials::new("alice@example.com", "hunter2"), config)?;
//!
//! let tracks = client.tracks().await?;
//! let info = client
//!     .get_resource("/data/member/info", &QueryParams::new())
//!     .await?
//!     .value()?;
//! println!("{} bytes of tracks, member {}", tracks.to_bytes().len(), info);
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod client;
pub mod endpoints;
pub mod rate_limit;
pub mod resolver;
pub mod transport;

#[cfg(test)]
mod testing;

pub use authenticator::{LoginOutcome, SessionAuthenticator, SessionState};
pub use client::IrDataClient;
pub use rate_limit::{RateLimitHint, RateLimitPolicy};
pub use resolver::ResourceResolver;
pub use transport::HttpTransport;
