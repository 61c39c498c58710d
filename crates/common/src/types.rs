use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Who authored a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single role-tagged entry in a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: Role,
    pub content: String,
    /// Unix millis at creation.
    pub created_at: u64,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: now_ms(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: now_ms(),
        }
    }
}

/// Routing classification of a query.
///
/// The set is closed: the router normalizes any unrecognized classifier
/// output to `Generic` at the boundary, so downstream dispatch never sees
/// another value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ProductReview,
    Generic,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProductReview => "product_review",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted, mutable session state. One per session key.
///
/// Field ownership across a turn: `category` is written by the route node,
/// `handler_result` by exactly one of the two handler nodes, and
/// `final_response` by the compose node. Nothing reads `final_response`
/// after the compose node within a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    /// Conversation history, append-only, insertion order significant.
    pub messages: Vec<TurnMessage>,
    /// Set each turn by the router, never unset.
    pub category: Option<Category>,
    /// Raw text from whichever handler ran this turn. Cleared when the
    /// next turn begins.
    pub handler_result: Option<String>,
    /// Composed output for this turn. Overwritten each turn.
    pub final_response: Option<String>,
}

impl ConversationState {
    /// Reset the per-turn fields and append the incoming user message.
    pub fn begin_turn(&mut self, query: impl Into<String>) {
        self.handler_result = None;
        self.final_response = None;
        self.messages.push(TurnMessage::user(query));
    }

    /// The most recent user entry, if any.
    #[must_use]
    pub fn latest_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}
