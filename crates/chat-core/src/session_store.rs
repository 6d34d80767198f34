//! Session Store Adapter: lifecycle and append-only history over a
//! [`StoragePort`].
//!
//! Every mutation of a session happens under that session's lock, so
//! concurrent turns on one id serialize while different ids never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use chat_types::{
    artifact::ArtifactMetadata,
    config::SessionConfig,
    session::{Modality, Session, SessionStatus, SessionSummary, Turn},
    ChatError, Result,
};

use crate::ports::StoragePort;

const SESSION_PREFIX: &str = "session/";
const MAX_ID_LEN: usize = 64;

/// When the store considers a session expired.
#[derive(Debug, Clone, Default)]
pub struct ExpiryPolicy {
    pub ttl: Option<Duration>,
    pub max_turns: Option<usize>,
}

impl From<&SessionConfig> for ExpiryPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ttl: config.ttl_secs.map(Duration::from_secs),
            max_turns: config.max_turns,
        }
    }
}

impl ExpiryPolicy {
    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        if session.status == SessionStatus::Expired {
            return true;
        }
        match self.ttl {
            Some(ttl) => (now - session.created_at)
                .to_std()
                .map(|age| age >= ttl)
                .unwrap_or(false),
            None => false,
        }
    }
}

pub struct SessionStore {
    storage: Arc<dyn StoragePort>,
    policy: ExpiryPolicy,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn StoragePort>, policy: ExpiryPolicy) -> Self {
        log::info!("Session store using {} backend", storage.backend_name());
        Self {
            storage,
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// Allocate a fresh session with a unique id and empty history.
    pub async fn create(&self, modality: Modality) -> Result<Session> {
        let id = loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if !self.storage.exists(&key(&candidate)).await? {
                break candidate;
            }
        };
        let session = Session::new(id, modality);
        self.save(&session).await?;
        log::info!("Created {} session {}", modality, session.id);
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Result<Session> {
        let session = self.load(id).await?;
        self.check_active(&session)?;
        Ok(session)
    }

    /// Append one user/assistant pair atomically.
    pub async fn append(&self, id: &str, user: Turn, assistant: Turn) -> Result<Session> {
        self.begin_turn(id).await?.append(user, assistant).await
    }

    /// Bind an artifact to the session. Allowed once per session.
    pub async fn attach_artifact(&self, id: &str, metadata: ArtifactMetadata) -> Result<Session> {
        self.begin_turn(id).await?.attach_artifact(metadata).await
    }

    /// Take the session's lock and load its current state. Writes made
    /// through the returned guard are serialized with every other writer of
    /// the same id; dropping the guard without writing leaves the session
    /// untouched.
    pub async fn begin_turn(&self, id: &str) -> Result<TurnGuard<'_>> {
        if !valid_id(id) {
            return Err(ChatError::SessionNotFound(id.to_string()));
        }
        let lock = self.lock_for(id).lock_owned().await;
        let session = match self.get(id).await {
            Ok(session) => session,
            Err(e) => {
                drop(lock);
                self.forget_lock(id);
                return Err(e);
            }
        };
        Ok(TurnGuard {
            store: self,
            session,
            lock: Some(lock),
        })
    }

    /// Mark a session expired. Its history stays readable through `list`.
    pub async fn expire(&self, id: &str) -> Result<()> {
        if !valid_id(id) {
            return Err(ChatError::SessionNotFound(id.to_string()));
        }
        let lock = self.lock_for(id).lock_owned().await;
        let result = self.mark_expired(id).await;
        drop(lock);
        self.forget_lock(id);
        result
    }

    async fn mark_expired(&self, id: &str) -> Result<()> {
        let mut session = self.load(id).await?;
        if session.status != SessionStatus::Expired {
            session.status = SessionStatus::Expired;
            session.updated_at = Utc::now();
            self.save(&session).await?;
            log::info!("Expired session {}", id);
        }
        Ok(())
    }

    /// Remove a session entirely. Returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        if !valid_id(id) {
            return Ok(false);
        }
        let lock = self.lock_for(id);
        let existed = {
            let _guard = lock.lock().await;
            let existed = self.storage.exists(&key(id)).await?;
            if existed {
                self.storage.delete(&key(id)).await?;
                log::info!("Deleted session {}", id);
            }
            existed
        };
        drop(lock);
        self.forget_lock(id);
        Ok(existed)
    }

    /// Summaries of all stored sessions, most recently updated first.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for k in self.storage.list_keys(SESSION_PREFIX).await? {
            let id = &k[SESSION_PREFIX.len()..];
            match self.load(id).await {
                Ok(mut session) => {
                    if self.policy.is_expired(&session, Utc::now()) {
                        session.status = SessionStatus::Expired;
                    }
                    summaries.push(session.summary());
                }
                Err(e) => log::warn!("Skipping unreadable session {}: {}", id, e),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Flush the persistence backend on shutdown.
    pub async fn teardown(&self) -> Result<()> {
        self.storage.flush().await?;
        self.locks.lock().map(|mut locks| locks.clear()).ok();
        log::info!("Session store ({}) flushed", self.storage.backend_name());
        Ok(())
    }

    fn check_active(&self, session: &Session) -> Result<()> {
        if self.policy.is_expired(session, Utc::now()) {
            return Err(ChatError::SessionExpired(session.id.clone()));
        }
        Ok(())
    }

    /// Session ids that currently have a lock entry.
    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.to_string()).or_default().clone()
    }

    fn forget_lock(&self, id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Keep it while another task still holds or awaits it
        let idle = locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(id);
        }
    }

    async fn load(&self, id: &str) -> Result<Session> {
        let bytes = self
            .storage
            .get(&key(id))
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let bytes = serde_json::to_vec(session)?;
        self.storage.set(&key(&session.id), &bytes).await
    }
}

/// Exclusive write access to one session for the duration of a turn.
/// The lock is released, and its entry dropped once idle, when the guard
/// goes out of scope.
pub struct TurnGuard<'a> {
    store: &'a SessionStore,
    session: Session,
    lock: Option<OwnedMutexGuard<()>>,
}

impl TurnGuard<'_> {
    /// Session state as of acquiring the lock, including earlier writes
    /// made through this guard.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Fails unless `metadata` could be bound to this session now.
    pub fn check_attachable(&self, metadata: &ArtifactMetadata) -> Result<()> {
        if self.session.artifact_metadata.is_some() {
            return Err(ChatError::ArtifactAlreadyAttached(self.session.id.clone()));
        }
        if metadata.modality() != self.session.modality {
            return Err(ChatError::InvalidInput(format!(
                "{} artifact cannot be attached to a {} session",
                metadata.modality(),
                self.session.modality
            )));
        }
        Ok(())
    }

    pub async fn attach_artifact(&mut self, metadata: ArtifactMetadata) -> Result<Session> {
        self.check_attachable(&metadata)?;

        let mut updated = self.session.clone();
        updated.artifact_metadata = Some(metadata);
        updated.updated_at = Utc::now();
        self.store.save(&updated).await?;
        log::info!("Attached {} artifact to session {}", updated.modality, updated.id);
        self.session = updated;
        Ok(self.session.clone())
    }

    /// Append a user/assistant pair and release the lock.
    pub async fn append(self, user: Turn, assistant: Turn) -> Result<Session> {
        self.commit(None, user, assistant).await
    }

    /// Bind `artifact` (when given) and append a user/assistant pair in one
    /// write, then release the lock.
    pub async fn commit(
        self,
        artifact: Option<ArtifactMetadata>,
        user: Turn,
        assistant: Turn,
    ) -> Result<Session> {
        self.store.check_active(&self.session)?;

        let mut updated = self.session.clone();
        if let Some(metadata) = artifact {
            self.check_attachable(&metadata)?;
            log::info!("Attached {} artifact to session {}", updated.modality, updated.id);
            updated.artifact_metadata = Some(metadata);
        }
        updated.history.push(user);
        updated.history.push(assistant);
        updated.updated_at = Utc::now();
        if let Some(max) = self.store.policy.max_turns {
            if updated.turn_count() >= max {
                updated.status = SessionStatus::Expired;
                log::info!("Session {} reached {} turns and expired", updated.id, max);
            }
        }
        self.store.save(&updated).await?;
        Ok(updated)
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        self.store.forget_lock(&self.session.id);
    }
}

fn key(id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
