//! Core request types.
//!
//! These types enforce their invariants at construction time, so a request
//! URL built from them is always well formed.

mod base_url;
mod endpoint;

pub use base_url::{AUTH_PATH, BaseUrl};
pub use endpoint::{Endpoint, QueryParams};

/// Base URL of the production data API.
pub const DEFAULT_BASE_URL: &str = "https://members-ng.iracing.com";
