use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::{info, warn};

use {
    palaver_common::{Category, TurnMessage},
    palaver_providers::CompletionProvider,
};

pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed instruction sent to the classifier alongside each query.
const CLASSIFY_INSTRUCTION: &str = "\
Decide whether the user's query asks for product information or is a generic support question.

Product information queries include:
- questions about product features, specifications, or capabilities
- product prices and availability
- requests for product reviews or comparisons
- product warranty or guarantee questions
- product shipping or delivery inquiries
- product compatibility or dimension questions
- product recommendations

Generic queries include:
- customer service inquiries
- account-related questions
- technical support issues
- website navigation help
- payment or billing queries
- return policy questions
- company information requests

Respond with ONLY 'product_review' or 'generic'.";

/// Ephemeral record of one routing decision, emitted for observability
/// and then discarded.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub session_key: String,
    pub category: Category,
    /// Unix millis at decision time.
    pub decided_at: u64,
}

/// Classifies queries into the closed category set.
pub struct Router {
    provider: Arc<dyn CompletionProvider>,
    classify_timeout: Duration,
}

impl Router {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self::with_timeout(provider, DEFAULT_CLASSIFY_TIMEOUT)
    }

    pub fn with_timeout(provider: Arc<dyn CompletionProvider>, classify_timeout: Duration) -> Self {
        Self {
            provider,
            classify_timeout,
        }
    }

    /// Classify a query. Infallible: classifier errors, timeouts, and
    /// unrecognized output all normalize to [`Category::Generic`], the
    /// safe fallback.
    pub async fn classify(&self, query: &str, session_key: &str) -> Category {
        let category = match self.ask_classifier(query).await {
            Ok(response) => parse_category(&response),
            Err(e) => {
                warn!(
                    session_key,
                    error = %e,
                    "classifier unavailable, defaulting to generic"
                );
                Category::Generic
            },
        };

        let decision = RoutingDecision {
            session_key: session_key.to_string(),
            category,
            decided_at: now_ms(),
        };
        info!(
            session_key = %decision.session_key,
            category = %decision.category,
            decided_at = decision.decided_at,
            query_preview = %query.chars().take(50).collect::<String>(),
            "routed query"
        );

        category
    }

    async fn ask_classifier(&self, query: &str) -> anyhow::Result<String> {
        let message = TurnMessage::user(query);
        tokio::time::timeout(
            self.classify_timeout,
            self.provider
                .complete(Some(CLASSIFY_INSTRUCTION), std::slice::from_ref(&message)),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "classification timed out after {}ms",
                self.classify_timeout.as_millis()
            )
        })?
    }
}

/// Map raw classifier output onto the closed category set.
///
/// Lowercase + trim, then a permissive substring match on the
/// product-review token; everything else is the generic fallback. This is
/// the only place classifier text enters the system, so no other category
/// value can reach dispatch.
fn parse_category(response: &str) -> Category {
    let normalized = response.trim().to_lowercase();
    if normalized.contains(Category::ProductReview.as_str()) {
        Category::ProductReview
    } else {
        Category::Generic
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
