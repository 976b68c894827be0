//! Text-generation service access.
//!
//! Prompt rendering and the chat-completion client.

pub mod client;
pub mod prompt;

pub use client::{ChatClient, ClientConfig, CompletionBackend, Provider};
pub use prompt::build_prompt;
