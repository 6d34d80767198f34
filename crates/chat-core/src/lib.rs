//! Conversation-session orchestration for text, image and CSV chats.
//!
//! Everything here talks to the outside world through the traits in
//! [`ports`]; concrete adapters live in `chat-platform`.

pub mod ports;
pub mod retry;
pub mod inspect;
pub mod retrieval;
pub mod session_store;
pub mod strategy;
pub mod event_bus;
pub mod orchestrator;


pub use orchestrator::{Orchestrator, TurnRequest};
pub use retry::{RetryExecutor, RetryPolicy};
pub use session_store::SessionStore;
