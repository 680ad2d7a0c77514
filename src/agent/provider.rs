//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls, keeping the agent loop and retrieval
//! helpers decoupled from any particular LLM vendor.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Stream of text deltas from a streaming completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer (HTTP, SDK calls, retries)
/// for a specific provider while presenting a uniform interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Executes a streaming chat completion request, returning text deltas
    /// as they arrive from the provider.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection or streaming failures.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError>;
}
