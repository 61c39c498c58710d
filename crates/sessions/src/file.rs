use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use {async_trait::async_trait, fd_lock::RwLock};

use palaver_common::ConversationState;

use crate::{Checkpointer, Error, Result, SessionKey};

/// Checkpointer storing one JSON snapshot file per session under a base
/// directory, with file locking for concurrent writers.
pub struct FileCheckpointer {
    pub base_dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.base_dir.join(format!("{}.json", key.to_filename()))
    }

    /// List all session keys by scanning snapshot files in the base
    /// directory. Sanitized characters are not reversed; keys containing
    /// them come back in filename form.
    #[must_use]
    pub fn list_keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.base_dir) else {
            return vec![];
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(|s| s.to_string())
            })
            .collect()
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn load(&self, key: &SessionKey) -> Result<ConversationState> {
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || -> Result<ConversationState> {
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no session snapshot, starting fresh");
                return Ok(ConversationState::default());
            }
            let data = fs::read_to_string(&path)?;
            let state = serde_json::from_str(&data)?;
            Ok(state)
        })
        .await?
    }

    async fn save(&self, key: &SessionKey, state: &ConversationState) -> Result<()> {
        let path = self.path_for(key);
        let data = serde_json::to_string_pretty(state)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            let mut lock = RwLock::new(file);
            let mut guard = lock
                .write()
                .map_err(|e| Error::lock_failed(e.to_string()))?;
            writeln!(*guard, "{data}")?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<()> {
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || -> Result<()> {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            Ok(())
        })
        .await??;

        Ok(())
    }
}
