use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes reported by a completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamKind {
    Overloaded,
    RateLimited,
    Timeout,
    InvalidRequest,
    Unknown,
}

impl UpstreamKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamKind::Overloaded | UpstreamKind::RateLimited | UpstreamKind::Timeout
        )
    }
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpstreamKind::Overloaded => "overloaded",
            UpstreamKind::RateLimited => "rate limited",
            UpstreamKind::Timeout => "timed out",
            UpstreamKind::InvalidRequest => "invalid request",
            UpstreamKind::Unknown => "unknown failure",
        };
        f.write_str(s)
    }
}

/// Coarse error taxonomy used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Overload / rate limit that survived the retry budget
    TransientUpstream,
    /// Malformed request or unsupported content
    TerminalUpstream,
    /// Unsupported format, unreachable source, malformed CSV
    Artifact,
    /// Unknown, expired or already-bound session
    Session,
    /// Rejected user input
    Input,
    /// Storage, serialization, configuration, cancellation
    Internal,
}

#[derive(Error, Debug, Clone)]
pub enum ChatError {
    #[error("Upstream {kind}: {message}")]
    Upstream { kind: UpstreamKind, message: String },

    #[error("Upstream exhausted after {attempts} attempts: {last}")]
    UpstreamExhausted { attempts: u32, last: Box<ChatError> },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unreachable source: {0}")]
    UnreachableSource(String),

    #[error("Malformed CSV: {0}")]
    MalformedCsv(String),

    #[error("Artifact exceeds {limit} bytes")]
    ArtifactTooLarge { limit: u64 },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Session {0} already has an artifact attached")]
    ArtifactAlreadyAttached(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cancelled")]
    Cancelled,
}

impl ChatError {
    pub fn upstream(kind: UpstreamKind, message: impl Into<String>) -> Self {
        ChatError::Upstream {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Upstream { kind, .. } if kind.is_transient() => ErrorKind::TransientUpstream,
            ChatError::Upstream { .. } => ErrorKind::TerminalUpstream,
            ChatError::UpstreamExhausted { .. } => ErrorKind::TransientUpstream,
            ChatError::UnsupportedFormat(_)
            | ChatError::UnreachableSource(_)
            | ChatError::MalformedCsv(_)
            | ChatError::ArtifactTooLarge { .. } => ErrorKind::Artifact,
            ChatError::SessionNotFound(_)
            | ChatError::SessionExpired(_)
            | ChatError::ArtifactAlreadyAttached(_) => ErrorKind::Session,
            ChatError::InvalidInput(_) => ErrorKind::Input,
            ChatError::Storage(_)
            | ChatError::Serialization(_)
            | ChatError::Config(_)
            | ChatError::Cancelled => ErrorKind::Internal,
        }
    }

    /// Default retryable predicate: overload, rate limit and timeout signals.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChatError::Upstream { kind, .. } if kind.is_transient())
    }

    /// Message safe to show an end user. Provider response bodies are never included.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Upstream { kind, .. } if kind.is_transient() => {
                "The model is busy right now. Please try again shortly.".to_string()
            }
            ChatError::Upstream { kind: UpstreamKind::InvalidRequest, .. } => {
                "The model rejected this request.".to_string()
            }
            ChatError::Upstream { .. } => "The model failed to answer.".to_string(),
            ChatError::UpstreamExhausted { attempts, .. } => format!(
                "The model is still busy after {} attempts. Please retry your message.",
                attempts
            ),
            ChatError::UnsupportedFormat(_) => {
                "Unsupported file format. Please upload a PNG, JPEG, GIF, WebP or BMP image."
                    .to_string()
            }
            ChatError::UnreachableSource(_) => "The file could not be fetched.".to_string(),
            ChatError::MalformedCsv(reason) => format!("The CSV file could not be parsed: {}", reason),
            ChatError::ArtifactTooLarge { limit } => {
                format!("The file is larger than the {} KB limit.", limit / 1024)
            }
            ChatError::SessionNotFound(_) => {
                "Session not found. Please start a new conversation.".to_string()
            }
            ChatError::SessionExpired(_) => {
                "This conversation has expired. Please start a new one.".to_string()
            }
            ChatError::ArtifactAlreadyAttached(_) => {
                "This conversation already has a file attached.".to_string()
            }
            ChatError::InvalidInput(reason) => reason.clone(),
            ChatError::Cancelled => "The request was cancelled.".to_string(),
            ChatError::Storage(_) | ChatError::Serialization(_) | ChatError::Config(_) => {
                "Internal error.".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for ChatError {
    fn from(e: toml::de::Error) -> Self {
        ChatError::Config(e.to_string())
    }
}
