use async_trait::async_trait;

use palaver_common::ConversationState;

use crate::{Result, SessionKey};

/// Persists one conversation-state snapshot per session key.
///
/// Implementations must provide per-key consistency under concurrent
/// access: a `load`/`save` pair for one key never interleaves with a
/// concurrent writer of the same key, and unrelated keys never block each
/// other behind a single global lock.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Load the state for a key. An unknown key yields a fresh default
    /// state (empty history, no category) — that is how a new
    /// conversation begins.
    async fn load(&self, key: &SessionKey) -> Result<ConversationState>;

    /// Replace the stored snapshot for a key entirely (last-write-wins,
    /// no partial merge).
    async fn save(&self, key: &SessionKey, state: &ConversationState) -> Result<()>;

    /// Remove the snapshot for a key. A subsequent `load` starts a new
    /// conversation.
    async fn clear(&self, key: &SessionKey) -> Result<()>;
}
