//! Persistence collaborator trait.

use async_trait::async_trait;

use crate::Result;

/// Somewhere resolved payloads can be saved under a logical name.
///
/// The client only needs the ability to hand over bytes; the layout and
/// format on the other side belong to the implementation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Save `bytes` under `name`, replacing any previous value.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;
}
