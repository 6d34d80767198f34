pub mod message;
pub mod session;
pub mod artifact;
pub mod retrieval;
pub mod event;
pub mod config;
pub mod error;

#[cfg(test)]
mod tests;

pub use error::{ChatError, ErrorKind, UpstreamKind};
pub type Result<T> = std::result::Result<T, ChatError>;
