//! In-memory lexical vector store.
//!
//! Scores are the fraction of distinct query words that appear in a
//! snippet, so they fall in `[0, 1]` and need no embedding model.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chat_core::ports::VectorStorePort;
use chat_types::{retrieval::RetrievedContext, ChatError, Result};

struct Entry {
    content: String,
    words: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    namespaces: RwLock<HashMap<String, Vec<Entry>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snippets stored under `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .map(|ns| ns.get(namespace).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> ChatError {
    ChatError::Storage("vector store lock poisoned".to_string())
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl VectorStorePort for MemoryVectorStore {
    async fn query(&self, namespace: &str, text: &str, top_k: usize) -> Result<Vec<RetrievedContext>> {
        let query = words(text);
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let namespaces = self.namespaces.read().map_err(poisoned)?;
        let Some(entries) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<RetrievedContext> = entries
            .iter()
            .filter_map(|entry| {
                let hits = query.iter().filter(|w| entry.words.contains(*w)).count();
                if hits == 0 {
                    return None;
                }
                let score = hits as f32 / query.len() as f32;
                Some(RetrievedContext::new(entry.content.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn upsert(&self, namespace: &str, content: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().map_err(poisoned)?;
        let entries = namespaces.entry(namespace.to_string()).or_default();
        if entries.iter().any(|e| e.content == content) {
            return Ok(());
        }
        entries.push(Entry {
            content: content.to_string(),
            words: words(content),
        });
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.namespaces.write().map_err(poisoned)?.remove(namespace);
        Ok(())
    }
}
