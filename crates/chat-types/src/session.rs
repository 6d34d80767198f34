use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactMetadata;
use crate::message::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Csv,
}

impl Modality {
    pub fn all() -> &'static [Modality] {
        &[Modality::Text, Modality::Image, Modality::Csv]
    }

    pub fn label(&self) -> &str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Csv => "csv",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
}

/// One entry of a session's history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment_ref: None,
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachment_ref: None,
            timestamp,
        }
    }

    pub fn with_attachment(mut self, reference: impl Into<String>) -> Self {
        self.attachment_ref = Some(reference.into());
        self
    }
}

/// A persisted conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub modality: Modality,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_metadata: Option<ArtifactMetadata>,
    pub history: Vec<Turn>,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(id: String, modality: Modality) -> Self {
        let now = Utc::now();
        Self {
            id,
            modality,
            created_at: now,
            updated_at: now,
            artifact_metadata: None,
            history: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    /// Completed user/assistant pairs
    pub fn turn_count(&self) -> usize {
        self.history.len() / 2
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            modality: self.modality,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.history.len(),
            artifact: self.artifact_metadata.clone(),
        }
    }
}

/// Summary of a session for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub modality: Modality,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactMetadata>,
}

/// Authoritative state returned after a completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: String,
    pub modality: Modality,
    pub reply: String,
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactMetadata>,
}

impl Transcript {
    pub fn from_session(session: Session, reply: String) -> Self {
        Self {
            session_id: session.id,
            modality: session.modality,
            reply,
            history: session.history,
            artifact: session.artifact_metadata,
        }
    }
}
