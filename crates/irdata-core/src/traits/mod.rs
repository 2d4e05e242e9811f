//! Core traits for the transport and persistence collaborators.

mod store;
mod transport;

pub use store::Store;
pub use transport::{Headers, Transport, TransportResponse};
