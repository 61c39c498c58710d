//! Text-completion providers.
//!
//! [`CompletionProvider`] is the seam to the external language-model
//! service: the router classifies through it and the LLM-backed domain
//! handlers answer through it. Tests substitute deterministic stubs.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use {async_trait::async_trait, palaver_common::TurnMessage};

/// A service that completes a conversation with assistant text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Model identifier (e.g. "claude-3-5-haiku-latest").
    fn id(&self) -> &str;

    /// Run one completion over the conversation and return the assistant
    /// text.
    async fn complete(
        &self,
        system: Option<&str>,
        messages: &[TurnMessage],
    ) -> anyhow::Result<String>;
}
