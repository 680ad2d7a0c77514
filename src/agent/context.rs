//! Per-invocation agent state.

use serde_json::Value;

use super::message::ChatMessage;
use crate::core::{ImageRef, SourceRef};

/// Everything one agent loop invocation needs to operate.
///
/// Sources and image references accumulate across rounds as retrieval
/// runs; `depth` tracks sub-agent nesting and starts at zero for a
/// top-level query.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// User whose documents are in scope.
    pub user_id: String,
    /// The user's latest query.
    pub query: String,
    /// Conversation history, latest message last.
    pub chat_messages: Vec<ChatMessage>,
    /// System prompt for this invocation.
    pub system_prompt: String,
    /// Optional metadata filter applied to vector search.
    pub metadata_filter: Option<Value>,
    /// Sources gathered by retrieval so far.
    pub sources: Vec<SourceRef>,
    /// Images selected for display so far.
    pub image_refs: Vec<ImageRef>,
    /// Sub-agent nesting depth (0 for a top-level query).
    pub depth: usize,
}

impl AgentContext {
    /// Creates a top-level context for a user query.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        query: impl Into<String>,
        chat_messages: Vec<ChatMessage>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            chat_messages,
            system_prompt: system_prompt.into(),
            metadata_filter: None,
            sources: Vec::new(),
            image_refs: Vec::new(),
            depth: 0,
        }
    }

    /// Sets the metadata filter for vector search.
    #[must_use]
    pub fn with_metadata_filter(mut self, filter: Value) -> Self {
        self.metadata_filter = Some(filter);
        self
    }
}
