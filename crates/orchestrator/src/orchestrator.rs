//! Per-request chat pipeline.

use std::env;
use std::sync::Arc;

use agent_actions::{
    match_action, ActionExecutor, ActionOutcome, HttpTransport, ReqwestTransport, SecretVault,
    TemplateContext,
};
use brain_core::{hash_prompt, Brain, BrainError, CompletionRequest, Embedder, Role};
use chrono::{SecondsFormat, Utc};
use database::{Database, NewTurn};
use openai_brain::OpenAiBrain;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{env_parse, OrchestratorConfig};
use crate::context::{build_system_prompt, PromptContext};
use crate::corrections::{Correction, MAX_CORRECTION_CHARS};
use crate::deadline::RequestDeadline;
use crate::error::{OrchestratorError, StoreError};
use crate::history::HistoryWindow;
use crate::recorder::TurnRecorder;
use crate::retrieval::RetrievalEngine;
use crate::store::{ChatStore, KnowledgeWriter, SqliteStore, TextSearch, VectorIndex};

/// Database used when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:chat.db?mode=rwc";

/// A user question addressed to one chatbot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub query: String,
    pub chatbot_id: String,
    /// Conversation to continue; a new one is started when absent.
    pub session_id: Option<String>,
    /// Authenticated caller, if any.
    pub user_id: Option<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>, chatbot_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            chatbot_id: chatbot_id.into(),
            session_id: None,
            user_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// What produced an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSource {
    /// A triggered action, successful or not.
    Action { name: String, succeeded: bool },
    /// The completion service, grounded on retrieved context.
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: String,
    pub source: AnswerSource,
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn new_turn(chatbot_id: &str, session_id: &str, role: Role, content: &str, created_at: String) -> NewTurn {
    NewTurn {
        chatbot_id: chatbot_id.to_string(),
        session_id: session_id.to_string(),
        role: role.as_str().to_string(),
        content: content.to_string(),
        created_at,
    }
}

/// Coordinates action matching, retrieval, prompt assembly, and completion.
///
/// Stateless across requests apart from pending turn writes, so one
/// instance can serve concurrent sessions.
pub struct Orchestrator {
    store: Arc<dyn ChatStore>,
    knowledge: Option<Arc<dyn KnowledgeWriter>>,
    brain: Arc<dyn Brain>,
    embedder: Arc<dyn Embedder>,
    executor: ActionExecutor,
    retrieval: RetrievalEngine,
    history: HistoryWindow,
    recorder: TurnRecorder,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Wire a SQLite store, the OpenAI-compatible brain, and the HTTP transport
    /// from environment variables.
    ///
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `ACTION_ALLOW_PRIVATE_ENDPOINTS` here; see [`OrchestratorConfig::from_env`]
    /// and [`openai_brain::OpenAiBrainConfig::from_env`] for the rest.
    pub async fn from_env() -> Result<Self, OrchestratorError> {
        let config = OrchestratorConfig::from_env();

        let url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let pool_size =
            env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(Database::DEFAULT_POOL_SIZE);
        let db = Database::connect_with_pool_size(&url, pool_size)
            .await
            .map_err(StoreError::from)?;
        db.migrate().await.map_err(StoreError::from)?;

        let brain = Arc::new(
            OpenAiBrain::from_env().map_err(|e| OrchestratorError::Configuration(e.to_string()))?,
        );

        let allow_private = env_parse("ACTION_ALLOW_PRIVATE_ENDPOINTS").unwrap_or(false);
        let transport = ReqwestTransport::new()
            .map_err(|e| OrchestratorError::Configuration(e.to_string()))?
            .allow_private_endpoints(allow_private);

        info!(
            "Orchestrator using {} with model {}",
            url,
            brain.config().chat_model
        );

        Self::builder()
            .sqlite(SqliteStore::new(db))
            .brain(brain.clone())
            .embedder(brain)
            .transport(Arc::new(transport))
            .config(config)
            .build()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Answer one chat request.
    ///
    /// Fails only when no answer can be produced at all: invalid input, an
    /// unknown chatbot, or a failed or empty completion. Action failures are
    /// returned as apology answers.
    pub async fn process(&self, request: ChatRequest) -> Result<ChatResponse, OrchestratorError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(OrchestratorError::InvalidRequest("query is required".to_string()));
        }
        if query.chars().count() > self.config.max_query_chars {
            return Err(OrchestratorError::InvalidRequest(format!(
                "query exceeds {} characters",
                self.config.max_query_chars
            )));
        }
        let chatbot_id = request.chatbot_id.trim();
        if chatbot_id.is_empty() {
            return Err(OrchestratorError::InvalidRequest("chatbotId is required".to_string()));
        }

        let deadline = RequestDeadline::after(self.config.request_timeout);
        let started_at = now_timestamp();
        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let chatbot = deadline
            .run(self.store.find_chatbot(chatbot_id))
            .await
            .map_err(|_| StoreError::Unavailable("chatbot lookup timed out".to_string()))??
            .ok_or_else(|| OrchestratorError::NotFound(format!("chatbot '{}'", chatbot_id)))?;

        info!("Processing query for chatbot {} session {}", chatbot_id, session_id);
        self.recorder.record(new_turn(
            chatbot_id,
            &session_id,
            Role::User,
            query,
            started_at.clone(),
        ));

        let template_context = TemplateContext {
            user_query: query.to_string(),
            chatbot_id: chatbot_id.to_string(),
            timestamp: started_at.clone(),
            user_id: request.user_id.clone(),
        };
        if let Some(outcome) = self.run_action(&template_context, &deadline).await {
            let source = match &outcome {
                ActionOutcome::Succeeded { action, .. } => AnswerSource::Action {
                    name: action.clone(),
                    succeeded: true,
                },
                ActionOutcome::Failed { action, .. } => AnswerSource::Action {
                    name: action.clone(),
                    succeeded: false,
                },
            };
            let answer = outcome.into_message();
            self.record_answer(chatbot_id, &session_id, &answer);
            return Ok(ChatResponse {
                answer,
                session_id,
                source,
            });
        }

        let embedding = self.embed(query, &deadline).await;
        let retrieval = self
            .retrieval
            .retrieve(chatbot_id, query, embedding.as_deref(), &deadline)
            .await;

        let system_prompt = build_system_prompt(chatbot.system_prompt.as_deref(), &retrieval);
        debug!(
            "System prompt {} with {} context chunk(s)",
            hash_prompt(&system_prompt),
            retrieval.chunks().len()
        );

        let history = self
            .history
            .load(chatbot_id, &session_id, &started_at, &deadline)
            .await;
        let messages = PromptContext {
            system_prompt,
            history,
            user_query: query.to_string(),
        }
        .into_messages();

        let completion = deadline
            .run(self.brain.complete(CompletionRequest::new(messages, self.config.sampling)))
            .await
            .map_err(|_| BrainError::Timeout)??;
        let answer = completion
            .answer()
            .map(|text| text.trim().to_string())
            .ok_or(OrchestratorError::CompletionEmpty)?;

        info!("Answer generated by {} for session {}", self.brain.name(), session_id);
        self.record_answer(chatbot_id, &session_id, &answer);

        Ok(ChatResponse {
            answer,
            session_id,
            source: AnswerSource::Completion,
        })
    }

    /// Store an operator correction for a chatbot, returning the chunk ID.
    ///
    /// Unlike chat retrieval, a failed embedding is an error: an unembedded
    /// correction would never be retrieved.
    pub async fn add_correction(
        &self,
        chatbot_id: &str,
        correction: Correction,
    ) -> Result<i64, OrchestratorError> {
        let chatbot_id = chatbot_id.trim();
        if chatbot_id.is_empty() {
            return Err(OrchestratorError::InvalidRequest("chatbotId is required".to_string()));
        }
        correction.validate(MAX_CORRECTION_CHARS)?;
        let knowledge = self.knowledge.as_ref().ok_or_else(|| {
            OrchestratorError::Configuration("knowledge writer is not configured".to_string())
        })?;

        let deadline = RequestDeadline::after(self.config.request_timeout);
        deadline
            .run(self.store.find_chatbot(chatbot_id))
            .await
            .map_err(|_| StoreError::Unavailable("chatbot lookup timed out".to_string()))??
            .ok_or_else(|| OrchestratorError::NotFound(format!("chatbot '{}'", chatbot_id)))?;

        let content = correction.render();
        let embedding = deadline
            .run(self.embedder.embed(&content))
            .await
            .map_err(|_| BrainError::Timeout)??;
        if embedding.is_empty() {
            return Err(BrainError::ProcessingFailed("empty embedding".to_string()).into());
        }

        let id = deadline
            .run(knowledge.add_correction(chatbot_id, &content, &embedding))
            .await
            .map_err(|_| StoreError::Unavailable("correction write timed out".to_string()))??;
        info!(
            "Stored correction {} ({}) for chatbot {}",
            id,
            correction.error_type.trim(),
            chatbot_id
        );
        Ok(id)
    }

    /// Wait for pending turn writes.
    pub async fn flush(&self) {
        self.recorder.flush().await;
    }

    /// Run the first action triggered by the query, if any.
    async fn run_action(
        &self,
        context: &TemplateContext,
        deadline: &RequestDeadline,
    ) -> Option<ActionOutcome> {
        let actions = match deadline.run(self.store.list_actions(&context.chatbot_id)).await {
            Ok(Ok(actions)) => actions,
            Ok(Err(e)) => {
                warn!("Could not load actions for chatbot {}: {}", context.chatbot_id, e);
                return None;
            }
            Err(_) => {
                warn!("Loading actions for chatbot {} timed out", context.chatbot_id);
                return None;
            }
        };

        let action = match_action(&actions, &context.user_query)?;
        let budget = deadline.cap(self.config.action_timeout);
        Some(self.executor.execute(action, context, budget).await)
    }

    async fn embed(&self, query: &str, deadline: &RequestDeadline) -> Option<Vec<f32>> {
        match deadline.run(self.embedder.embed(query)).await {
            Ok(Ok(embedding)) if !embedding.is_empty() => Some(embedding),
            Ok(Ok(_)) => {
                warn!("Retrieval degraded: embedding service returned an empty vector");
                None
            }
            Ok(Err(e)) => {
                warn!("Retrieval degraded: embedding failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Retrieval degraded: embedding timed out");
                None
            }
        }
    }

    fn record_answer(&self, chatbot_id: &str, session_id: &str, answer: &str) {
        self.recorder.record(new_turn(
            chatbot_id,
            session_id,
            Role::Assistant,
            answer,
            now_timestamp(),
        ));
    }
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    store: Option<Arc<dyn ChatStore>>,
    knowledge: Option<Arc<dyn KnowledgeWriter>>,
    vectors: Option<Arc<dyn VectorIndex>>,
    text: Option<Arc<dyn TextSearch>>,
    vault: Option<Arc<dyn SecretVault>>,
    transport: Option<Arc<dyn HttpTransport>>,
    brain: Option<Arc<dyn Brain>>,
    embedder: Option<Arc<dyn Embedder>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    /// Use one SQLite store for turns, actions, knowledge, and secrets.
    pub fn sqlite(self, store: SqliteStore) -> Self {
        let store = Arc::new(store);
        self.store(store.clone())
            .knowledge_writer(store.clone())
            .vector_index(store.clone())
            .text_search(store.clone())
            .vault(store)
    }

    pub fn store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enables [`Orchestrator::add_correction`].
    pub fn knowledge_writer(mut self, knowledge: Arc<dyn KnowledgeWriter>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn vector_index(mut self, vectors: Arc<dyn VectorIndex>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn text_search(mut self, text: Arc<dyn TextSearch>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn vault(mut self, vault: Arc<dyn SecretVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn brain(mut self, brain: Arc<dyn Brain>) -> Self {
        self.brain = Some(brain);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T, OrchestratorError> {
            value.ok_or_else(|| OrchestratorError::Configuration(format!("{} is required", name)))
        }

        let store = required(self.store, "store")?;
        let vectors = required(self.vectors, "vector index")?;
        let text = required(self.text, "text search")?;
        let vault = required(self.vault, "secret vault")?;
        let transport = required(self.transport, "HTTP transport")?;
        let brain = required(self.brain, "brain")?;
        let embedder = required(self.embedder, "embedder")?;
        let config = self.config;

        Ok(Orchestrator {
            executor: ActionExecutor::new(vault, transport),
            retrieval: RetrievalEngine::new(vectors, text, config.retrieval.clone()),
            history: HistoryWindow::new(store.clone(), config.history),
            recorder: TurnRecorder::new(store.clone()),
            store,
            knowledge: self.knowledge,
            brain,
            embedder,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_actions::{ActionError, OutboundRequest, OutboundResponse};
    use async_trait::async_trait;
    use mock_brain::{DelayedBrain, FixedEmbedder, ScriptedBrain};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct NoSecrets;

    #[async_trait]
    impl SecretVault for NoSecrets {
        async fn fetch_secrets(
            &self,
            _chatbot_id: &str,
            names: &[String],
        ) -> Result<HashMap<String, Option<String>>, ActionError> {
            Ok(names.iter().map(|n| (n.clone(), None)).collect())
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl HttpTransport for CountingTransport {
        async fn send(&self, _request: OutboundRequest) -> Result<OutboundResponse, ActionError> {
            *self.calls.lock().unwrap() += 1;
            Ok(OutboundResponse {
                status: 200,
                body: "{}".to_string(),
            })
        }
    }

    async fn orchestrator(brain: Arc<ScriptedBrain>) -> (Orchestrator, Database) {
        orchestrator_with(brain, OrchestratorConfig::default()).await
    }

    async fn orchestrator_with(
        brain: Arc<dyn Brain>,
        config: OrchestratorConfig,
    ) -> (Orchestrator, Database) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        database::chatbot::create_chatbot(db.pool(), "bot", "Bot", None)
            .await
            .unwrap();
        let orchestrator = Orchestrator::builder()
            .sqlite(SqliteStore::new(db.clone()))
            .brain(brain)
            .embedder(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])))
            .vault(Arc::new(NoSecrets))
            .transport(Arc::new(CountingTransport::default()))
            .config(config)
            .build()
            .unwrap();
        (orchestrator, db)
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let brain = Arc::new(ScriptedBrain::replying("unused"));
        let (orchestrator, _db) = orchestrator(brain.clone()).await;

        let err = orchestrator.process(ChatRequest::new("   ", "bot")).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = orchestrator.process(ChatRequest::new("hello", "")).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let long = "x".repeat(4001);
        let err = orchestrator.process(ChatRequest::new(long, "bot")).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert_eq!(brain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_chatbot() {
        let (orchestrator, _db) = orchestrator(Arc::new(ScriptedBrain::replying("unused"))).await;
        let err = orchestrator
            .process(ChatRequest::new("hello", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_session_id_generated_and_kept() {
        let (orchestrator, _db) = orchestrator(Arc::new(ScriptedBrain::replying("Hi there."))).await;

        let first = orchestrator.process(ChatRequest::new("hello", "bot")).await.unwrap();
        assert!(Uuid::parse_str(&first.session_id).is_ok());
        assert_eq!(first.source, AnswerSource::Completion);

        let second = orchestrator
            .process(ChatRequest::new("again", "bot").with_session("abc"))
            .await
            .unwrap();
        assert_eq!(second.session_id, "abc");
    }

    #[tokio::test]
    async fn test_empty_completion() {
        let (orchestrator, _db) = orchestrator(Arc::new(ScriptedBrain::empty())).await;
        let err = orchestrator.process(ChatRequest::new("hello", "bot")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::CompletionEmpty));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_completion_failure_surfaces() {
        let (orchestrator, _db) = orchestrator(Arc::new(ScriptedBrain::failing("down"))).await;
        let err = orchestrator.process(ChatRequest::new("hello", "bot")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::CompletionService(_)));
    }

    #[tokio::test]
    async fn test_slow_completion_hits_request_deadline() {
        let config = OrchestratorConfig {
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let slow = DelayedBrain::with_millis(ScriptedBrain::replying("too late"), 2_000);
        let (orchestrator, _db) = orchestrator_with(Arc::new(slow), config).await;

        let err = orchestrator.process(ChatRequest::new("hello", "bot")).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::CompletionService(BrainError::Timeout)
        ));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_correction_rejected_without_embedding() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        database::chatbot::create_chatbot(db.pool(), "bot", "Bot", None)
            .await
            .unwrap();
        let orchestrator = Orchestrator::builder()
            .sqlite(SqliteStore::new(db.clone()))
            .brain(Arc::new(ScriptedBrain::replying("unused")))
            .embedder(Arc::new(FixedEmbedder::failing()))
            .transport(Arc::new(CountingTransport::default()))
            .build()
            .unwrap();

        let err = orchestrator
            .add_correction("bot", Correction::new("wrong_hours", "We open at 8am."))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::CompletionService(_)));

        let stored = database::knowledge::search_chunks_by_text(db.pool(), "bot", "8am", 5)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_correction_validation_and_lookup() {
        let (orchestrator, _db) = orchestrator(Arc::new(ScriptedBrain::replying("unused"))).await;

        let err = orchestrator
            .add_correction("bot", Correction::new("wrong_hours", "  "))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = orchestrator
            .add_correction("ghost", Correction::new("wrong_hours", "8am"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_correction_needs_writer() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let store = Arc::new(SqliteStore::new(db));
        let orchestrator = Orchestrator::builder()
            .store(store.clone())
            .vector_index(store.clone())
            .text_search(store)
            .vault(Arc::new(NoSecrets))
            .brain(Arc::new(ScriptedBrain::replying("unused")))
            .embedder(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])))
            .transport(Arc::new(CountingTransport::default()))
            .build()
            .unwrap();

        let err = orchestrator
            .add_correction("bot", Correction::new("wrong_hours", "8am"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_builder_requires_components() {
        let err = Orchestrator::builder().build().err().unwrap();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }
}
