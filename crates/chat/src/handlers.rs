use std::sync::Arc;

use {async_trait::async_trait, tracing::debug};

use {
    palaver_common::ConversationState,
    palaver_providers::CompletionProvider,
    palaver_sessions::SessionKey,
};

/// Request-scoped configuration passed to handlers for one turn.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub session_key: SessionKey,
}

/// A domain handler: answers the current turn given the conversation
/// state.
///
/// Handlers are external collaborators. The engine only relies on this
/// contract; a handler error never aborts a turn (the calling node
/// substitutes fallback text).
#[async_trait]
pub trait DomainHandler: Send + Sync {
    /// Handler name for logs.
    fn name(&self) -> &str;

    /// Produce the raw answer text for the latest user message.
    async fn handle(
        &self,
        state: &ConversationState,
        config: &TurnConfig,
    ) -> anyhow::Result<String>;
}

const PRODUCT_INFO_PROMPT: &str = "\
You are a product information assistant for an online store. Answer the \
user's latest question about product features, specifications, prices, \
availability, reviews, warranty, shipping, or compatibility, using the \
conversation so far. Be concise and factual. If you don't know, say so \
plainly instead of guessing.";

const GENERIC_PROMPT: &str = "\
You are a customer support assistant for an online store. Answer the \
user's latest question about accounts, orders, billing, returns, website \
help, or the company itself, using the conversation so far. Be concise \
and helpful.";

/// LLM-backed domain handler: a completion provider plus a fixed system
/// prompt.
pub struct CompletionHandler {
    name: String,
    system_prompt: String,
    provider: Arc<dyn CompletionProvider>,
}

impl CompletionHandler {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            provider,
        }
    }

    /// Handler answering product-information queries.
    pub fn product_info(provider: Arc<dyn CompletionProvider>) -> Self {
        Self::new("product_info", PRODUCT_INFO_PROMPT, provider)
    }

    /// Handler answering everything else.
    pub fn generic(provider: Arc<dyn CompletionProvider>) -> Self {
        Self::new("generic", GENERIC_PROMPT, provider)
    }
}

#[async_trait]
impl DomainHandler for CompletionHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        state: &ConversationState,
        config: &TurnConfig,
    ) -> anyhow::Result<String> {
        debug!(
            session_key = %config.session_key,
            handler = %self.name,
            history_len = state.messages.len(),
            "invoking completion handler"
        );
        self.provider
            .complete(Some(&self.system_prompt), &state.messages)
            .await
    }
}
