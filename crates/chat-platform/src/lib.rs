//! Native platform adapters for the chat-core ports.
//!
//! - [`llm`]: OpenAI-compatible chat completions over reqwest
//! - [`fetch`]: streaming HTTP download for URL artifacts
//! - [`storage`]: in-memory and file-backed session persistence
//! - [`vector`]: in-memory lexical vector store

pub mod llm;
pub mod fetch;
pub mod storage;
pub mod vector;

#[cfg(test)]
mod tests;
