use serde::{Deserialize, Serialize};

/// A snippet returned by the vector store for one turn. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub snippet: String,
    pub score: f32,
}

impl RetrievedContext {
    pub fn new(snippet: impl Into<String>, score: f32) -> Self {
        Self {
            snippet: snippet.into(),
            score,
        }
    }
}
