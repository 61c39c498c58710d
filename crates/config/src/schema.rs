use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PalaverConfig {
    pub provider: ProviderConfig,
    pub routing: RoutingConfig,
    pub chat: ChatConfig,
    pub sessions: SessionsConfig,
}

/// Classifier/handler LLM provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Model ID used for both classification and the LLM-backed handlers.
    pub model: String,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".into(),
            api_key: None,
            base_url: "https://api.anthropic.com".into(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve the API key: config value first, then the
    /// `ANTHROPIC_API_KEY` environment variable. Empty values count as
    /// absent. The key stays wrapped in `Secret` so it cannot leak into
    /// logs.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<Secret<String>> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    fn resolve_api_key_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Secret<String>> {
        self.api_key
            .clone()
            .or_else(|| {
                lookup("ANTHROPIC_API_KEY")
                    .filter(|k| !k.is_empty())
                    .map(Secret::new)
            })
            .filter(|s| !s.expose_secret().is_empty())
    }
}

/// Routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Upper bound on one classifier call.
    pub classify_timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            classify_timeout_ms: 10_000,
        }
    }
}

/// Chat engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Upper bound on one domain-handler call.
    pub handler_timeout_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: 30_000,
        }
    }
}

/// Which checkpointer backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    File,
}

/// Session checkpoint storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub backend: SessionBackend,
    /// Base directory for the file backend. Defaults to
    /// `<user data dir>/palaver/sessions` when unset.
    pub dir: Option<PathBuf>,
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
