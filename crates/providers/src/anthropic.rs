use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use palaver_common::{Role, TurnMessage};

use crate::CompletionProvider;

/// Anthropic Messages API client.
pub struct AnthropicProvider {
    api_key: secrecy::Secret<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: secrecy::Secret<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from configuration. Fails when no API key is
    /// configured and none is in the environment.
    pub fn from_config(config: &palaver_config::ProviderConfig) -> anyhow::Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            anyhow::anyhow!("no Anthropic API key (set provider.api_key or ANTHROPIC_API_KEY)")
        })?;
        Ok(Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
        ))
    }
}

/// Convert conversation history to Anthropic message format.
fn to_anthropic_messages(messages: &[TurnMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            serde_json::json!({ "role": role, "content": msg.content })
        })
        .collect()
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system: Option<&str>,
        messages: &[TurnMessage],
    ) -> anyhow::Result<String> {
        let anthropic_messages = to_anthropic_messages(messages);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": anthropic_messages,
        });
        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        debug!(
            model = %self.model,
            messages_count = anthropic_messages.len(),
            has_system = system.is_some(),
            "anthropic complete request"
        );

        let http_resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "anthropic API error");
            anyhow::bail!("Anthropic API error HTTP {status}: {body_text}");
        }

        let resp = http_resp.json::<serde_json::Value>().await?;

        let text = resp["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|block| {
                if block["type"].as_str() == Some("text") {
                    block["text"].as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .reduce(|a, b| a + &b);

        match text {
            Some(text) => Ok(text),
            None => anyhow::bail!("Anthropic response contained no text content"),
        }
    }
}
