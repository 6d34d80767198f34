//! Conversation Orchestrator: runs one turn end to end.
//!
//! RECEIVED → (ATTACHING_ARTIFACT) → RETRIEVING → CALLING_MODEL → PERSISTING → DONE,
//! with FAILED reachable from every state before DONE.
//!
//! The session lock is taken right after the request is validated and held
//! until the turn pair is appended, so a second turn on the same session
//! waits and then sees the first one in its history. Neither the artifact
//! nor the turn pair is written unless the model call succeeded.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use chat_types::{
    artifact::{ArtifactMetadata, ArtifactSource},
    config::AppConfig,
    event::{TurnEvent, TurnState},
    message::Message,
    retrieval::RetrievedContext,
    session::{Modality, Session, SessionSummary, Transcript, Turn},
    ChatError, Result,
};

use crate::event_bus::EventBus;
use crate::inspect::ArtifactInspector;
use crate::ports::{ChatRequest, CompletionPort};
use crate::retrieval::{format_context, Retrieval, RetrievalAugmenter};
use crate::retry::RetryExecutor;
use crate::session_store::SessionStore;
use crate::strategy::{ModalityStrategy, StrategySet};

/// Model and prompt settings applied to every turn.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: usize,
    pub max_message_chars: usize,
    pub history_window: Option<usize>,
}

impl From<&AppConfig> for TurnSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            top_k: config.retrieval.top_k,
            max_message_chars: config.session.max_message_chars,
            history_window: config.session.history_window,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Input for one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// `None` starts a new session of `modality`
    pub session_id: Option<String>,
    pub modality: Modality,
    pub message: Option<String>,
    pub attachment: Option<ArtifactSource>,
}

impl TurnRequest {
    pub fn start(modality: Modality) -> Self {
        Self {
            session_id: None,
            modality,
            message: None,
            attachment: None,
        }
    }

    /// Continue an existing session; its stored modality wins over `modality`.
    pub fn resume(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            modality: Modality::Text,
            message: Some(message.into()),
            attachment: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn attachment(mut self, source: ArtifactSource) -> Self {
        self.attachment = Some(source);
        self
    }
}

/// What a turn has touched so far, for cleanup when it fails.
#[derive(Default)]
struct TurnTrace {
    session_id: Option<String>,
    created: bool,
}

pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    llm: Arc<dyn CompletionPort>,
    inspector: ArtifactInspector,
    augmenter: RetrievalAugmenter,
    retry: RetryExecutor,
    strategies: StrategySet,
    settings: TurnSettings,
    events: EventBus,
}

impl Orchestrator {
    pub fn new(sessions: Arc<SessionStore>, llm: Arc<dyn CompletionPort>, settings: TurnSettings) -> Self {
        Self {
            sessions,
            llm,
            inspector: ArtifactInspector::new(None, Default::default()),
            augmenter: RetrievalAugmenter::disabled(),
            retry: RetryExecutor::default(),
            strategies: StrategySet::default(),
            settings,
            events: EventBus::new(),
        }
    }

    pub fn with_inspector(mut self, inspector: ArtifactInspector) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_augmenter(mut self, augmenter: RetrievalAugmenter) -> Self {
        self.augmenter = augmenter;
        self
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_strategies(mut self, strategies: StrategySet) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Create a session, inspecting and binding `source` when given.
    /// The artifact is inspected first, so a bad artifact never leaves an
    /// empty session behind.
    pub async fn start_session(
        &self,
        modality: Modality,
        source: Option<ArtifactSource>,
    ) -> Result<SessionSummary> {
        let artifact = match &source {
            Some(src) => Some(self.inspector.inspect(modality, src).await?),
            None => None,
        };

        let mut session = self.sessions.create(modality).await?;
        self.events.emit(TurnEvent::SessionStarted {
            session_id: session.id.clone(),
        });
        if let Some(meta) = artifact {
            session = self.sessions.attach_artifact(&session.id, meta).await?;
        }
        Ok(session.summary())
    }

    pub async fn continue_session(&self, session_id: &str, message: &str) -> Result<Transcript> {
        self.run_turn(TurnRequest::resume(session_id, message), &CancellationToken::new())
            .await
    }

    pub async fn continue_session_with_cancel(
        &self,
        session_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<Transcript> {
        self.run_turn(TurnRequest::resume(session_id, message), cancel).await
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.sessions.get(session_id).await
    }

    /// Drive one turn through the state machine.
    ///
    /// A turn that fails leaves nothing behind: history and artifact are
    /// written together after the model replies, and a session created for
    /// the turn is deleted again.
    pub async fn run_turn(&self, req: TurnRequest, cancel: &CancellationToken) -> Result<Transcript> {
        let mut trace = TurnTrace::default();
        let result = self.turn(req, cancel, &mut trace).await;
        if let Err(e) = &result {
            log::warn!(
                "Turn failed for session {}: {}",
                trace.session_id.as_deref().unwrap_or("<new>"),
                e
            );
            if let Some(id) = &trace.session_id {
                self.events.state(id, TurnState::Failed { reason: e.to_string() });
                if trace.created {
                    if let Err(cleanup) = self.sessions.delete(id).await {
                        log::warn!("Could not remove session {} after failed turn: {}", id, cleanup);
                    }
                }
            }
        }
        result
    }

    async fn turn(
        &self,
        req: TurnRequest,
        cancel: &CancellationToken,
        trace: &mut TurnTrace,
    ) -> Result<Transcript> {
        let modality = match &req.session_id {
            Some(id) => self.sessions.get(id).await?.modality,
            None => req.modality,
        };
        let strategy = self.strategies.get(modality);

        let message = match (&req.message, &req.attachment) {
            (Some(text), _) => self.validate_message(text)?,
            (None, Some(_)) => strategy.opening_message().to_string(),
            (None, None) => return Err(ChatError::InvalidInput("Message must not be empty.".into())),
        };

        // Artifact I/O happens before the lock is taken
        let artifact = match &req.attachment {
            Some(src) => Some(self.inspector.inspect(modality, src).await?),
            None => None,
        };

        let id = match req.session_id {
            Some(id) => id,
            None => {
                let created = self.sessions.create(modality).await?;
                self.events.emit(TurnEvent::SessionStarted {
                    session_id: created.id.clone(),
                });
                trace.created = true;
                created.id
            }
        };
        trace.session_id = Some(id.clone());
        self.events.state(&id, TurnState::Received);

        let guard = self.sessions.begin_turn(&id).await?;
        let received_at = Utc::now();

        if let Some(meta) = &artifact {
            self.events.state(&id, TurnState::AttachingArtifact);
            guard.check_attachable(meta)?;
        }
        let bound = artifact.as_ref().or(guard.session().artifact_metadata.as_ref());

        if strategy.requires_artifact() && bound.is_none() {
            return Err(ChatError::InvalidInput(format!(
                "Attach a file before chatting in a {} conversation.",
                modality
            )));
        }

        let contexts = self.retrieve(&id, &message).await;

        // The opening turn carries the artifact reference, including when the
        // artifact was bound by `start_session`
        let mut user_turn = Turn::user(&message, received_at);
        let opening = artifact.is_some() || guard.session().history.is_empty();
        if let Some(meta) = bound.filter(|_| opening) {
            user_turn = user_turn.with_attachment(meta.reference());
        }

        self.events.state(&id, TurnState::CallingModel);
        let request = self.build_request(strategy, guard.session(), bound, &user_turn, &contexts);
        let response = self
            .retry
            .execute_cancellable(cancel, || self.llm.complete(request.clone()))
            .await?;

        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        self.events.state(&id, TurnState::Persisting);
        let reply = response.text;
        let assistant_turn = Turn::assistant(&reply, Utc::now());
        let session = guard.commit(artifact, user_turn, assistant_turn).await?;

        self.events.state(&id, TurnState::Done);
        log::debug!("Session {} now has {} messages", id, session.history.len());
        Ok(Transcript::from_session(session, reply))
    }

    fn validate_message(&self, text: &str) -> Result<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidInput("Message must not be empty.".into()));
        }
        let len = trimmed.chars().count();
        if len > self.settings.max_message_chars {
            return Err(ChatError::InvalidInput(format!(
                "Message is {} characters; the limit is {}.",
                len, self.settings.max_message_chars
            )));
        }
        Ok(trimmed.to_string())
    }

    async fn retrieve(&self, id: &str, query: &str) -> Vec<RetrievedContext> {
        if !self.augmenter.is_enabled() {
            return Vec::new();
        }
        self.events.state(id, TurnState::Retrieving);
        match self.augmenter.retrieve(id, query, self.settings.top_k).await {
            Retrieval::Found(contexts) => contexts,
            Retrieval::Skipped => Vec::new(),
            Retrieval::Degraded(reason) => {
                self.events.emit(TurnEvent::RetrievalDegraded {
                    session_id: id.to_string(),
                    reason,
                });
                Vec::new()
            }
        }
    }

    fn build_request(
        &self,
        strategy: &dyn ModalityStrategy,
        session: &Session,
        artifact: Option<&ArtifactMetadata>,
        user_turn: &Turn,
        contexts: &[RetrievedContext],
    ) -> ChatRequest {
        let mut system = strategy.system_prompt(artifact);
        if let Some(context) = format_context(contexts) {
            system.push_str("\n\n");
            system.push_str(&context);
        }

        let history = replay_window(&session.history, self.settings.history_window)
            .iter()
            .map(|turn| strategy.history_message(turn, artifact))
            .collect::<Vec<Message>>();

        ChatRequest {
            system,
            history,
            prompt: strategy.history_message(user_turn, artifact),
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

/// The most recent `window` entries, starting on a user turn, in append order.
fn replay_window(history: &[Turn], window: Option<usize>) -> &[Turn] {
    let Some(window) = window else {
        return history;
    };
    let mut start = history.len().saturating_sub(window);
    start += start % 2;
    &history[start.min(history.len())..]
}

