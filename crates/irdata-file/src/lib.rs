//! irdata-file - Filesystem store for resolved payloads.

mod store;

pub use store::{FileStore, SavedEntry};
