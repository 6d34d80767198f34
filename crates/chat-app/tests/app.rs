//! Composition-root tests: configuration in, working backend out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use chat_app::App;
use chat_core::ports::{ChatRequest, ChatResponse, CompletionPort};
use chat_types::config::{AppConfig, StorageBackendType};
use chat_types::event::TurnEvent;
use chat_types::session::Modality;
use chat_types::{ChatError, Result};

/// Echoes the system prompt's last line so tests can see retrieved context.
#[derive(Default)]
struct EchoLlm {
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionPort for EchoLlm {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let context = req.system.lines().last().unwrap_or_default().to_string();
        Ok(ChatResponse {
            text: context,
            usage: None,
        })
    }

    fn provider_name(&self) -> &str {
        "echo"
    }
}

fn config(toml: &str) -> AppConfig {
    AppConfig::from_toml_str(toml).unwrap()
}

#[tokio::test]
async fn builds_from_default_config() {
    let llm = Arc::new(EchoLlm::default());
    let app = App::builder(AppConfig::default())
        .completion(llm.clone())
        .build()
        .await
        .unwrap();

    let id = app
        .orchestrator()
        .start_session(Modality::Text, None)
        .await
        .unwrap()
        .id;
    let transcript = app.orchestrator().continue_session(&id, "hello").await.unwrap();
    assert_eq!(transcript.history.len(), 2);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    app.teardown().await.unwrap();
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut bad = AppConfig::default();
    bad.retry.max_attempts = 0;
    let result = App::builder(bad)
        .completion(Arc::new(EchoLlm::default()))
        .build()
        .await;
    assert!(matches!(result, Err(ChatError::Config(_))));
}

#[tokio::test]
async fn ingested_text_reaches_the_prompt() {
    let app = App::builder(AppConfig::default())
        .completion(Arc::new(EchoLlm::default()))
        .build()
        .await
        .unwrap();
    let orch = app.orchestrator();
    let id = orch.start_session(Modality::Text, None).await.unwrap().id;

    let chunks = app
        .ingest(&id, "The warehouse in Lyon ships orders every Tuesday.")
        .await
        .unwrap();
    assert_eq!(chunks, 1);

    let transcript = orch.continue_session(&id, "When does Lyon ship?").await.unwrap();
    assert!(transcript.reply.contains("every Tuesday"), "{}", transcript.reply);
}

#[tokio::test]
async fn ingest_requires_retrieval_and_a_live_session() {
    let app = App::builder(config("[retrieval]\nenabled = false\n"))
        .completion(Arc::new(EchoLlm::default()))
        .build()
        .await
        .unwrap();
    assert!(matches!(app.ingest("any", "text").await, Err(ChatError::Config(_))));

    let app = App::builder(AppConfig::default())
        .completion(Arc::new(EchoLlm::default()))
        .build()
        .await
        .unwrap();
    assert!(matches!(
        app.ingest("missing", "text").await,
        Err(ChatError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn file_backed_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.storage.backend = StorageBackendType::File;
    cfg.storage.dir = Some(dir.path().to_path_buf());

    let id = {
        let app = App::builder(cfg.clone())
            .completion(Arc::new(EchoLlm::default()))
            .build()
            .await
            .unwrap();
        let id = app
            .orchestrator()
            .start_session(Modality::Text, None)
            .await
            .unwrap()
            .id;
        app.orchestrator().continue_session(&id, "remember me").await.unwrap();
        app.teardown().await.unwrap();
        id
    };

    let app = App::builder(cfg)
        .completion(Arc::new(EchoLlm::default()))
        .build()
        .await
        .unwrap();
    let session = app.orchestrator().session(&id).await.unwrap();
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.history[0].content, "remember me");

    let listed = app.sessions().list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].message_count, 2);
}

#[tokio::test]
async fn delete_session_forgets_history() {
    let app = App::builder(AppConfig::default())
        .completion(Arc::new(EchoLlm::default()))
        .build()
        .await
        .unwrap();
    let id = app
        .orchestrator()
        .start_session(Modality::Text, None)
        .await
        .unwrap()
        .id;
    app.ingest(&id, "secret plans").await.unwrap();

    assert!(app.delete_session(&id).await.unwrap());
    assert!(!app.delete_session(&id).await.unwrap());
    assert!(matches!(
        app.orchestrator().session(&id).await,
        Err(ChatError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn events_are_observable_through_the_app() {
    let app = App::builder(config("[session]\nmax_turns = 1\n"))
        .completion(Arc::new(EchoLlm::default()))
        .build()
        .await
        .unwrap();
    let id = app
        .orchestrator()
        .start_session(Modality::Text, None)
        .await
        .unwrap()
        .id;
    app.orchestrator().continue_session(&id, "only one").await.unwrap();
    assert!(matches!(
        app.orchestrator().continue_session(&id, "two?").await,
        Err(ChatError::SessionExpired(_))
    ));

    let events = app.events().drain();
    assert!(matches!(events.first(), Some(TurnEvent::SessionStarted { .. })));
    assert!(events.len() > 4);
}

#[test]
fn init_logging_is_idempotent() {
    chat_app::init_logging("debug");
    assert!(!chat_app::init_logging("debug"));
}
