use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque session identifier supplied by the caller per conversation.
///
/// Stable across turns of one conversation, unique across conversations.
/// The engine and stores treat it as a plain string; only the file backend
/// cares about its shape, and sanitizes it for filename use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Fresh random key for callers without their own conversation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sanitize the key for use as a filename.
    #[must_use]
    pub fn to_filename(&self) -> String {
        self.0.replace([':', '/', '\\'], "_")
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
