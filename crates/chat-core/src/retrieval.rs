//! Retrieval augmentation (read path) and ingestion (write path).

use std::sync::Arc;
use std::time::Duration;

use chat_types::{config::RetrievalConfig, retrieval::RetrievedContext, Result};

use crate::ports::VectorStorePort;

/// Read-only view over the vector store used while building a prompt.
///
/// Failures never propagate: an unreachable store, an error or a timeout all
/// yield an empty context and the turn proceeds on history alone.
#[derive(Clone)]
pub struct RetrievalAugmenter {
    store: Option<Arc<dyn VectorStorePort>>,
    timeout: Duration,
}

/// Outcome of a retrieval attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// No store configured; the step is skipped
    Skipped,
    Found(Vec<RetrievedContext>),
    /// Store failed soft; carries the reason for observability
    Degraded(String),
}

impl Retrieval {
    pub fn into_contexts(self) -> Vec<RetrievedContext> {
        match self {
            Retrieval::Found(contexts) => contexts,
            Retrieval::Skipped | Retrieval::Degraded(_) => Vec::new(),
        }
    }
}

impl RetrievalAugmenter {
    pub fn new(store: Option<Arc<dyn VectorStorePort>>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn augment(&self, session_id: &str, query: &str, top_k: usize) -> Vec<RetrievedContext> {
        self.retrieve(session_id, query, top_k).await.into_contexts()
    }

    pub async fn retrieve(&self, session_id: &str, query: &str, top_k: usize) -> Retrieval {
        let Some(store) = &self.store else {
            return Retrieval::Skipped;
        };
        if top_k == 0 || query.trim().is_empty() {
            return Retrieval::Found(Vec::new());
        }

        let outcome = tokio::time::timeout(self.timeout, store.query(session_id, query, top_k)).await;
        match outcome {
            Ok(Ok(found)) => Retrieval::Found(rank(found, top_k)),
            Ok(Err(e)) => {
                log::warn!("Retrieval for session {} degraded: {}", session_id, e);
                Retrieval::Degraded(e.to_string())
            }
            Err(_) => {
                log::warn!(
                    "Retrieval for session {} timed out after {}ms",
                    session_id,
                    self.timeout.as_millis()
                );
                Retrieval::Degraded(format!("timed out after {}ms", self.timeout.as_millis()))
            }
        }
    }
}

/// Best-first, NaN scores dropped, at most `top_k`.
fn rank(mut found: Vec<RetrievedContext>, top_k: usize) -> Vec<RetrievedContext> {
    found.retain(|c| !c.score.is_nan());
    found.sort_by(|a, b| b.score.total_cmp(&a.score));
    found.truncate(top_k);
    found
}

/// Render retrieved snippets as a system-prompt section.
pub fn format_context(contexts: &[RetrievedContext]) -> Option<String> {
    if contexts.is_empty() {
        return None;
    }
    let mut out = String::from("Relevant context:\n");
    for (i, c) in contexts.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, c.snippet.trim()));
    }
    Some(out)
}

// ─── Ingestion ───────────────────────────────────────────────

/// Write path: chunks documents and upserts them into a namespace.
/// Never used while answering a turn.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn VectorStorePort>,
    chunk_size: usize,
    overlap: usize,
}

impl Ingestor {
    pub fn new(store: Arc<dyn VectorStorePort>, config: &RetrievalConfig) -> Self {
        Self {
            store,
            chunk_size: config.chunk_size.max(1),
            overlap: config.chunk_overlap.min(config.chunk_size.saturating_sub(1)),
        }
    }

    /// Returns the number of chunks written.
    pub async fn index(&self, namespace: &str, text: &str) -> Result<usize> {
        let chunks = chunk_text(text, self.chunk_size, self.overlap);
        for chunk in &chunks {
            self.store.upsert(namespace, chunk).await?;
        }
        log::info!("Indexed {} chunks into namespace {}", chunks.len(), namespace);
        Ok(chunks.len())
    }

    pub async fn forget(&self, namespace: &str) -> Result<()> {
        self.store.delete_namespace(namespace).await
    }
}

const BREAK_CHARS: [char; 5] = [' ', '\n', '\t', '.', ','];

/// Split `text` into chunks of at most `chunk_size` characters, consecutive
/// chunks sharing `overlap` characters. A chunk that would end mid-word is
/// shortened to its last space.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() && !BREAK_CHARS.contains(&chars[end]) {
            if let Some(space) = chars[start..end].iter().rposition(|&c| c == ' ') {
                if space > 0 {
                    end = start + space;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end >= chars.len() {
            break;
        }
        // Always advance, even when the overlap swallows a short chunk
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}
