//! Simple event bus for decoupled communication between the orchestrator
//! and whoever reports progress to the user.
//!
//! Turns run on many tasks at once, so the queue sits behind a mutex.
//! Events are buffered and drained by the caller; once `capacity` events
//! are pending, the oldest is dropped for each new one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chat_types::event::{TurnEvent, TurnState};

pub const DEFAULT_CAPACITY: usize = 1024;

/// Shared event bus: clone-cheap via Arc.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<VecDeque<TurnEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)))),
            capacity,
        }
    }

    /// Publish an event. Called by the orchestrator.
    pub fn emit(&self, event: TurnEvent) {
        let mut queue = self.queue();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event);
    }

    pub fn state(&self, session_id: &str, state: TurnState) {
        self.emit(TurnEvent::StateChanged {
            session_id: session_id.to_string(),
            state,
        });
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<TurnEvent> {
        self.queue().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue().is_empty()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<TurnEvent>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
