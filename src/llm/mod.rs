//! LLM client abstraction layer
//!
//! This module provides a trait-based abstraction for the chat-completion
//! endpoint, so the Ollama HTTP client and the scripted mock can be used
//! interchangeably, plus the retry loop shared by every caller.

mod client;
mod error;
mod mock;
mod ollama;
pub mod parse;
pub mod retry;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use mock::{MockLLMClient, MockResponse};
pub use ollama::OllamaClient;
pub use retry::{retry_with_timeout, RetryError, RetryPolicy};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
