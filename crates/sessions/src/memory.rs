use async_trait::async_trait;
use dashmap::DashMap;

use palaver_common::ConversationState;

use crate::{Checkpointer, Result, SessionKey};

/// In-process checkpointer backed by a sharded concurrent map.
///
/// Each key locks only its shard, so sessions never contend on a global
/// lock. Snapshots are cloned on load; mutations only become visible
/// through `save`.
#[derive(Default)]
pub struct MemoryCheckpointer {
    entries: DashMap<String, ConversationState>,
}

impl MemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn load(&self, key: &SessionKey) -> Result<ConversationState> {
        Ok(self
            .entries
            .get(key.as_str())
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, key: &SessionKey, state: &ConversationState) -> Result<()> {
        self.entries.insert(key.as_str().to_string(), state.clone());
        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<()> {
        self.entries.remove(key.as_str());
        Ok(())
    }
}
