//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Implementations live in `chat-platform` (HTTP, disk, in-memory adapters).
//! The core never imports platform code; it only depends on these traits.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use chat_types::{message::Message, retrieval::RetrievedContext, Result};

// ─── Completion Port ─────────────────────────────────────────

/// Request to send to a completion provider
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    /// Prior turns, replayed in append order
    pub history: Vec<Message>,
    /// The new user message
    pub prompt: Message,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    /// System message, then history, then the prompt.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if !self.system.is_empty() {
            messages.push(Message::system(&self.system));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(self.prompt.clone());
        messages
    }
}

/// Complete (non-streaming) response from a provider
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Failures must be reported as `ChatError::Upstream` with the matching
/// `UpstreamKind` so the retry executor can classify them.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse>;

    /// Name of this provider (for logging/debug)
    fn provider_name(&self) -> &str;
}

// ─── Vector Store Port ───────────────────────────────────────

#[async_trait]
pub trait VectorStorePort: Send + Sync {
    /// Snippets from `namespace` most similar to `text`, best first
    async fn query(&self, namespace: &str, text: &str, top_k: usize) -> Result<Vec<RetrievedContext>>;

    /// Index one piece of content; write path only
    async fn upsert(&self, namespace: &str, content: &str) -> Result<()>;

    /// Drop everything indexed under `namespace`
    async fn delete_namespace(&self, namespace: &str) -> Result<()>;
}

// ─── Storage Port ────────────────────────────────────────────

#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// List keys with a given prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Push buffered writes to durable media
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}

// ─── Fetch Port ──────────────────────────────────────────────

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Remote artifact retrieval. Implementations apply their own time limit;
/// callers enforce the size limit while consuming the stream.
#[async_trait]
pub trait FetchPort: Send + Sync {
    async fn open(&self, url: &str) -> Result<ByteStream>;
}
