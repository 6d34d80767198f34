//! Application wiring: one orchestrator plus the adapters it runs on.

use std::sync::Arc;
use std::time::Duration;

use chat_core::event_bus::EventBus;
use chat_core::inspect::ArtifactInspector;
use chat_core::orchestrator::TurnSettings;
use chat_core::ports::{CompletionPort, FetchPort, StoragePort, VectorStorePort};
use chat_core::retrieval::{Ingestor, RetrievalAugmenter};
use chat_core::session_store::ExpiryPolicy;
use chat_core::{Orchestrator, RetryExecutor, RetryPolicy, SessionStore};
use chat_platform::fetch::HttpFetcher;
use chat_platform::llm::OpenAiCompatProvider;
use chat_platform::storage::open_storage;
use chat_platform::vector::MemoryVectorStore;
use chat_types::{config::AppConfig, ChatError, Result};

/// A running chat backend. Cheap to share behind an `Arc`.
pub struct App {
    config: AppConfig,
    sessions: Arc<SessionStore>,
    orchestrator: Arc<Orchestrator>,
    ingestor: Option<Ingestor>,
}

/// Overrides for individual adapters; anything left unset is built from
/// the configuration.
pub struct AppBuilder {
    config: AppConfig,
    completion: Option<Arc<dyn CompletionPort>>,
    storage: Option<Arc<dyn StoragePort>>,
    vector_store: Option<Arc<dyn VectorStorePort>>,
    fetcher: Option<Arc<dyn FetchPort>>,
    events: EventBus,
}

impl AppBuilder {
    pub fn completion(mut self, completion: Arc<dyn CompletionPort>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StoragePort>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Used only when `retrieval.enabled` is set.
    pub fn vector_store(mut self, store: Arc<dyn VectorStorePort>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn FetchPort>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub async fn build(self) -> Result<App> {
        let config = self.config;
        config.validate()?;

        let storage = match self.storage {
            Some(storage) => storage,
            None => open_storage(&config.storage).await?,
        };
        let completion: Arc<dyn CompletionPort> = match self.completion {
            Some(completion) => completion,
            None => Arc::new(OpenAiCompatProvider::new(config.llm.clone())?),
        };
        let fetcher: Arc<dyn FetchPort> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(Duration::from_secs(
                config.artifact.fetch_timeout_secs,
            ))?),
        };
        let vectors: Option<Arc<dyn VectorStorePort>> = if config.retrieval.enabled {
            Some(self.vector_store.unwrap_or_else(|| {
                Arc::new(MemoryVectorStore::new()) as Arc<dyn VectorStorePort>
            }))
        } else {
            None
        };

        let sessions = Arc::new(SessionStore::new(storage, ExpiryPolicy::from(&config.session)));
        let augmenter = RetrievalAugmenter::new(
            vectors.clone(),
            Duration::from_millis(config.retrieval.timeout_ms),
        );
        let ingestor = vectors.map(|store| Ingestor::new(store, &config.retrieval));

        log::info!(
            "Chat backend ready: provider={} model={} retry={}x retrieval={}",
            completion.provider_name(),
            config.llm.model,
            config.retry.max_attempts,
            if ingestor.is_some() { "on" } else { "off" }
        );

        let orchestrator = Orchestrator::new(sessions.clone(), completion, TurnSettings::from(&config))
            .with_inspector(ArtifactInspector::new(Some(fetcher), config.artifact.clone()))
            .with_augmenter(augmenter)
            .with_retry(RetryExecutor::new(RetryPolicy::from(&config.retry)))
            .with_event_bus(self.events);

        Ok(App {
            config,
            sessions,
            orchestrator: Arc::new(orchestrator),
            ingestor,
        })
    }
}

impl App {
    pub fn builder(config: AppConfig) -> AppBuilder {
        AppBuilder {
            config,
            completion: None,
            storage: None,
            vector_store: None,
            fetcher: None,
            events: EventBus::new(),
        }
    }

    /// Build every adapter from configuration.
    pub async fn init(config: AppConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn events(&self) -> &EventBus {
        self.orchestrator.events()
    }

    /// Index reference text for a session's retrieval namespace.
    /// Returns the number of chunks written.
    pub async fn ingest(&self, session_id: &str, text: &str) -> Result<usize> {
        let ingestor = self
            .ingestor
            .as_ref()
            .ok_or_else(|| ChatError::Config("retrieval is disabled".to_string()))?;
        self.sessions.get(session_id).await?;
        ingestor.index(session_id, text).await
    }

    /// Delete a session and everything indexed for it.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let existed = self.sessions.delete(session_id).await?;
        if let Some(ingestor) = &self.ingestor {
            if let Err(e) = ingestor.forget(session_id).await {
                log::warn!("Could not drop retrieval namespace {}: {}", session_id, e);
            }
        }
        Ok(existed)
    }

    /// Flush persistence. Call once on shutdown.
    pub async fn teardown(&self) -> Result<()> {
        self.sessions.teardown().await?;
        log::info!("Chat backend stopped");
        Ok(())
    }
}
