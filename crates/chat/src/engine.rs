use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use {
    tokio::sync::Mutex,
    tracing::{debug, error, warn},
};

use {
    palaver_common::{Category, ConversationState, TurnMessage},
    palaver_config::{PalaverConfig, SessionBackend},
    palaver_providers::CompletionProvider,
    palaver_routing::Router,
    palaver_sessions::{Checkpointer, FileCheckpointer, MemoryCheckpointer, SessionKey},
};

use crate::{
    error::Result,
    handlers::{CompletionHandler, DomainHandler, TurnConfig},
};

/// Written into `handler_result` when a domain handler fails or times
/// out. The state machine stays total: every reachable node produces a
/// result.
pub const HANDLER_FAILED: &str = "I apologize, but I ran into a problem while handling your \
                                  request. Please try again.";

/// Composed when a turn reaches the compose node with no handler result.
pub const COULD_NOT_PROCESS: &str = "I apologize, but I couldn't process your request properly. \
                                     Please try again.";

pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Nodes of the orchestration graph. The topology is fixed:
///
/// ```text
/// RouteQuery ──product_review──► GetProductInfo ────┐
///     │                                             ▼
///     └────────generic─────────► HandleGenericQuery ──► ComposeResponse ──► End
/// ```
///
/// One graph invocation is exactly one traversal from `RouteQuery` to
/// `End`; nodes are never revisited within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    RouteQuery,
    GetProductInfo,
    HandleGenericQuery,
    ComposeResponse,
    End,
}

/// Drives one conversational turn through the orchestration graph.
pub struct ChatEngine {
    router: Router,
    product: Arc<dyn DomainHandler>,
    generic: Arc<dyn DomainHandler>,
    checkpointer: Arc<dyn Checkpointer>,
    handler_timeout: Duration,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatEngine {
    pub fn new(
        router: Router,
        product: Arc<dyn DomainHandler>,
        generic: Arc<dyn DomainHandler>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        Self::with_handler_timeout(
            router,
            product,
            generic,
            checkpointer,
            DEFAULT_HANDLER_TIMEOUT,
        )
    }

    pub fn with_handler_timeout(
        router: Router,
        product: Arc<dyn DomainHandler>,
        generic: Arc<dyn DomainHandler>,
        checkpointer: Arc<dyn Checkpointer>,
        handler_timeout: Duration,
    ) -> Self {
        Self {
            router,
            product,
            generic,
            checkpointer,
            handler_timeout,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Assemble an engine from configuration: router and LLM-backed
    /// handlers over `provider`, checkpointer per the configured sessions
    /// backend.
    pub fn from_config(config: &PalaverConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        let router = Router::with_timeout(
            provider.clone(),
            Duration::from_millis(config.routing.classify_timeout_ms),
        );
        let product = Arc::new(CompletionHandler::product_info(provider.clone()));
        let generic = Arc::new(CompletionHandler::generic(provider));
        let checkpointer: Arc<dyn Checkpointer> = match config.sessions.backend {
            SessionBackend::Memory => Arc::new(MemoryCheckpointer::new()),
            SessionBackend::File => {
                let dir = config
                    .sessions
                    .dir
                    .clone()
                    .or_else(palaver_config::loader::default_sessions_dir)
                    .unwrap_or_else(|| PathBuf::from(".palaver/sessions"));
                Arc::new(FileCheckpointer::new(dir))
            },
        };
        Self::with_handler_timeout(
            router,
            product,
            generic,
            checkpointer,
            Duration::from_millis(config.chat.handler_timeout_ms),
        )
    }

    /// Run one full turn and return the composed reply.
    ///
    /// Turns on the same session are serialized; unrelated sessions run
    /// concurrently. State is persisted only after the traversal
    /// completes, and store failures propagate.
    pub async fn run_turn(&self, query: &str, session_key: &str) -> Result<String> {
        let config = TurnConfig {
            session_key: SessionKey::new(session_key),
        };
        let lock = self.session_lock(&config.session_key).await;
        let _turn = lock.lock().await;

        let mut state = self.checkpointer.load(&config.session_key).await?;
        state.begin_turn(query);

        self.run_graph(&mut state, &config).await;

        self.checkpointer.save(&config.session_key, &state).await?;

        Ok(state
            .final_response
            .unwrap_or_else(|| COULD_NOT_PROCESS.to_string()))
    }

    /// Top-level entry point: run one turn, mapping any failure to an
    /// error-prefixed string instead of raising.
    pub async fn process_query(&self, query: &str, session_key: &str) -> String {
        match self.run_turn(query, session_key).await {
            Ok(text) => text,
            Err(e) => {
                error!(session_key, error = %e, "turn failed");
                format!("Error: {e}")
            },
        }
    }

    /// Remove the persisted state for a session. The next
    /// [`Self::process_query`] on the key starts a new conversation.
    pub async fn clear_context(&self, session_key: &str) -> Result<()> {
        let key = SessionKey::new(session_key);
        let lock = self.session_lock(&key).await;
        let _turn = lock.lock().await;

        self.checkpointer.clear(&key).await?;
        Ok(())
    }

    /// One traversal from `RouteQuery` to `End`.
    async fn run_graph(&self, state: &mut ConversationState, config: &TurnConfig) {
        let mut node = Node::RouteQuery;
        loop {
            debug!(session_key = %config.session_key, node = ?node, "entering node");
            node = match node {
                Node::RouteQuery => {
                    let query = state.latest_user_message().unwrap_or_default();
                    let category = self
                        .router
                        .classify(query, config.session_key.as_str())
                        .await;
                    state.category = Some(category);
                    match category {
                        Category::ProductReview => Node::GetProductInfo,
                        Category::Generic => Node::HandleGenericQuery,
                    }
                },
                Node::GetProductInfo => {
                    let result = self
                        .run_handler(self.product.as_ref(), state, config)
                        .await;
                    state.handler_result = Some(result);
                    Node::ComposeResponse
                },
                Node::HandleGenericQuery => {
                    let result = self
                        .run_handler(self.generic.as_ref(), state, config)
                        .await;
                    state.handler_result = Some(result);
                    Node::ComposeResponse
                },
                Node::ComposeResponse => {
                    let raw = state.handler_result.as_deref().unwrap_or("");
                    let source = if raw.trim().is_empty() {
                        COULD_NOT_PROCESS
                    } else {
                        raw
                    };
                    let reply = palaver_composer::compose(source);
                    state.messages.push(TurnMessage::assistant(reply.clone()));
                    state.final_response = Some(reply);
                    Node::End
                },
                Node::End => break,
            };
        }
    }

    /// Invoke a handler under the timeout, substituting the fixed
    /// fallback text on error or timeout.
    async fn run_handler(
        &self,
        handler: &dyn DomainHandler,
        state: &ConversationState,
        config: &TurnConfig,
    ) -> String {
        match tokio::time::timeout(self.handler_timeout, handler.handle(state, config)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(
                    session_key = %config.session_key,
                    handler = handler.name(),
                    error = %e,
                    "handler failed, using fallback"
                );
                HANDLER_FAILED.to_string()
            },
            Err(_) => {
                warn!(
                    session_key = %config.session_key,
                    handler = handler.name(),
                    timeout_ms = self.handler_timeout.as_millis() as u64,
                    "handler timed out, using fallback"
                );
                HANDLER_FAILED.to_string()
            },
        }
    }

    async fn session_lock(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks.entry(key.as_str().to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use {
        palaver_common::Role,
        palaver_providers::CompletionProvider,
        palaver_sessions::{MemoryCheckpointer, Result as SessionResult},
    };

    use super::*;

    /// Classifier stub returning a fixed response.
    struct StubClassifier {
        response: String,
    }

    #[async_trait]
    impl CompletionProvider for StubClassifier {
        fn name(&self) -> &str {
            "stub"
        }

        fn id(&self) -> &str {
            "stub-model"
        }

        async fn complete(
            &self,
            _system: Option<&str>,
            _messages: &[TurnMessage],
        ) -> anyhow::Result<String> {
            Ok(self.response.clone())
        }
    }

    /// Handler stub counting invocations.
    struct StubHandler {
        name: &'static str,
        reply: std::result::Result<String, String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl StubHandler {
        fn replying(name: &'static str, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Ok(reply.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Err("backend unavailable".to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Ok("too late".to_string()),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DomainHandler for StubHandler {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(
            &self,
            _state: &ConversationState,
            _config: &TurnConfig,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(anyhow::anyhow!("{message}")),
            }
        }
    }

    /// Checkpointer stub whose loads always fail.
    struct BrokenCheckpointer;

    #[async_trait]
    impl Checkpointer for BrokenCheckpointer {
        async fn load(&self, _key: &SessionKey) -> SessionResult<ConversationState> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn save(
            &self,
            _key: &SessionKey,
            _state: &ConversationState,
        ) -> SessionResult<()> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn clear(&self, _key: &SessionKey) -> SessionResult<()> {
            Ok(())
        }
    }

    fn engine_with(
        classifier_response: &str,
        product: Arc<StubHandler>,
        generic: Arc<StubHandler>,
    ) -> (ChatEngine, Arc<MemoryCheckpointer>) {
        let checkpointer = Arc::new(MemoryCheckpointer::new());
        let router = Router::new(Arc::new(StubClassifier {
            response: classifier_response.to_string(),
        }));
        let engine = ChatEngine::new(router, product, generic, checkpointer.clone());
        (engine, checkpointer)
    }

    #[tokio::test]
    async fn test_generic_query_visits_generic_handler_only() {
        let product = StubHandler::replying("product", "the phone costs $299");
        let generic = StubHandler::replying("generic", "returns are free within 30 days");
        let (engine, _) = engine_with("generic", product.clone(), generic.clone());

        let reply = engine
            .process_query("What's your return policy?", "s1")
            .await;

        assert_eq!(reply, "Returns are free within 30 days.");
        assert_eq!(generic.calls(), 1);
        assert_eq!(product.calls(), 0);
    }

    #[tokio::test]
    async fn test_product_query_visits_product_handler_only() {
        let product = StubHandler::replying("product", "assistant: the phone costs $299");
        let generic = StubHandler::replying("generic", "unused");
        let (engine, checkpointer) = engine_with("product_review", product.clone(), generic.clone());

        let reply = engine.process_query("How much is the phone?", "s1").await;

        assert_eq!(reply, "The phone costs $299.");
        assert_eq!(product.calls(), 1);
        assert_eq!(generic.calls(), 0);

        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert_eq!(state.category, Some(Category::ProductReview));
    }

    #[tokio::test]
    async fn test_turns_persist_across_calls() {
        let product = StubHandler::replying("product", "unused");
        let generic = StubHandler::replying("generic", "sure thing");
        let (engine, checkpointer) = engine_with("generic", product, generic);

        engine.process_query("first question", "s1").await;
        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert_eq!(state.messages.len(), 2);

        engine.process_query("second question", "s1").await;
        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert_eq!(state.messages.len(), 4);

        let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(state.messages[2].content, "second question");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let product = StubHandler::replying("product", "unused");
        let generic = StubHandler::replying("generic", "hello");
        let (engine, checkpointer) = engine_with("generic", product, generic);

        engine.process_query("from alice", "session-a").await;
        engine.process_query("from bob", "session-b").await;

        let a = checkpointer.load(&SessionKey::new("session-a")).await.unwrap();
        let b = checkpointer.load(&SessionKey::new("session-b")).await.unwrap();

        assert_eq!(a.messages.len(), 2);
        assert_eq!(b.messages.len(), 2);
        assert_eq!(a.messages[0].content, "from alice");
        assert_eq!(b.messages[0].content, "from bob");
    }

    #[tokio::test]
    async fn test_clear_context_starts_fresh() {
        let product = StubHandler::replying("product", "unused");
        let generic = StubHandler::replying("generic", "hello");
        let (engine, checkpointer) = engine_with("generic", product, generic);

        engine.process_query("first", "s1").await;
        engine.clear_context("s1").await.unwrap();

        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert!(state.messages.is_empty());

        engine.process_query("after reset", "s1").await;
        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "after reset");
    }

    #[tokio::test]
    async fn test_handler_failure_becomes_apology() {
        let product = StubHandler::replying("product", "unused");
        let generic = StubHandler::failing("generic");
        let (engine, checkpointer) = engine_with("generic", product, generic);

        let reply = engine.process_query("anything", "s1").await;

        assert_eq!(reply, HANDLER_FAILED);
        // The failed turn is still persisted.
        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.handler_result.as_deref(), Some(HANDLER_FAILED));
    }

    #[tokio::test]
    async fn test_handler_timeout_becomes_apology() {
        let product = StubHandler::replying("product", "unused");
        let generic = StubHandler::slow("generic", Duration::from_secs(5));
        let checkpointer = Arc::new(MemoryCheckpointer::new());
        let router = Router::new(Arc::new(StubClassifier {
            response: "generic".to_string(),
        }));
        let engine = ChatEngine::with_handler_timeout(
            router,
            product,
            generic,
            checkpointer,
            Duration::from_millis(50),
        );

        let reply = engine.process_query("anything", "s1").await;
        assert_eq!(reply, HANDLER_FAILED);
    }

    #[tokio::test]
    async fn test_empty_handler_result_becomes_stock_reply() {
        let product = StubHandler::replying("product", "unused");
        let generic = StubHandler::replying("generic", "   ");
        let (engine, _) = engine_with("generic", product, generic);

        let reply = engine.process_query("anything", "s1").await;
        assert_eq!(reply, COULD_NOT_PROCESS);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_error_string() {
        let router = Router::new(Arc::new(StubClassifier {
            response: "generic".to_string(),
        }));
        let engine = ChatEngine::new(
            router,
            StubHandler::replying("product", "unused"),
            StubHandler::replying("generic", "unused"),
            Arc::new(BrokenCheckpointer),
        );

        let reply = engine.process_query("anything", "s1").await;
        assert!(reply.starts_with("Error:"), "got {reply:?}");
    }

    #[tokio::test]
    async fn test_turns_persist_through_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Arc::new(FileCheckpointer::new(dir.path().to_path_buf()));
        let router = Router::new(Arc::new(StubClassifier {
            response: "generic".to_string(),
        }));
        let engine = ChatEngine::new(
            router,
            StubHandler::replying("product", "unused"),
            StubHandler::replying("generic", "noted"),
            checkpointer.clone(),
        );

        engine.process_query("first", "s1").await;
        engine.process_query("second", "s1").await;

        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.final_response.as_deref(), Some("Noted."));
    }

    #[tokio::test]
    async fn test_from_config_runs_turns() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PalaverConfig::default();
        config.sessions.backend = SessionBackend::File;
        config.sessions.dir = Some(dir.path().to_path_buf());
        config.chat.handler_timeout_ms = 1_000;

        let engine = ChatEngine::from_config(
            &config,
            Arc::new(StubClassifier {
                response: "generic".to_string(),
            }),
        );

        // The stub answers both the classifier and the generic handler,
        // so the reply is the composed classifier text.
        let reply = engine.process_query("hello there", "s1").await;
        assert_eq!(reply, "Generic.");
        assert!(dir.path().join("s1.json").exists());
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session_all_land() {
        let product = StubHandler::replying("product", "unused");
        let generic = StubHandler::replying("generic", "ok");
        let (engine, checkpointer) = engine_with("generic", product, generic);
        let engine = Arc::new(engine);

        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.process_query("one", "s1").await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.process_query("two", "s1").await }
        });
        a.await.unwrap();
        b.await.unwrap();

        let state = checkpointer.load(&SessionKey::new("s1")).await.unwrap();
        assert_eq!(state.messages.len(), 4);
    }
}
