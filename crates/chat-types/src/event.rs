use serde::{Deserialize, Serialize};

/// States a single turn moves through inside the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Received,
    AttachingArtifact,
    Retrieving,
    CallingModel,
    Persisting,
    Done,
    Failed { reason: String },
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed { .. })
    }
}

/// Events emitted by the orchestrator.
/// Callers drain these for progress reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TurnEvent {
    /// A session was created
    SessionStarted { session_id: String },

    /// A turn entered a new state
    StateChanged { session_id: String, state: TurnState },

    /// Retrieval failed soft; the turn continues without context
    RetrievalDegraded { session_id: String, reason: String },
}
