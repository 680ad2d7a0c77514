//! Events emitted by the agent loop.
//!
//! The loop communicates its progress as a stream of [`AgentEvent`]s:
//! tool activity, retrieval metadata, sub-agent activity, and the text
//! deltas of the final answer.

use std::pin::Pin;

use futures_util::Stream;
use serde::Serialize;

use crate::core::{ImageRef, SourceRef};
use crate::error::AgentError;

/// A single event from the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The model decided to call a tool.
    ToolCall {
        /// Tool name as proposed by the model.
        name: String,
        /// Parsed tool arguments (empty object when unparseable).
        arguments: serde_json::Value,
    },
    /// A tool finished executing.
    ToolResult {
        /// Tool name.
        name: String,
        /// Tool result text (error text on failure).
        result: String,
    },
    /// Document sources gathered by retrieval this round.
    Sources {
        /// Source files with their best relevance scores.
        sources: Vec<SourceRef>,
    },
    /// Document images selected for display this round.
    Images {
        /// Selected image references.
        images: Vec<ImageRef>,
    },
    /// An event from a nested document-analysis agent.
    SubAgent {
        /// The wrapped inner event.
        inner: Box<AgentEvent>,
    },
    /// A text delta of the final streamed answer.
    Text {
        /// The delta text.
        text: String,
    },
}

impl AgentEvent {
    /// Wraps this event for a parent stream.
    #[must_use]
    pub fn into_sub_agent(self) -> Self {
        Self::SubAgent {
            inner: Box::new(self),
        }
    }
}

/// The stream of events produced by one loop invocation.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tags() {
        let event = AgentEvent::ToolCall {
            name: "retrieve_documents".to_string(),
            arguments: serde_json::json!({"query": "revenue"}),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"type\":\"tool_call\""));
        assert!(json.contains("retrieve_documents"));
    }

    #[test]
    fn test_text_event_serialization() {
        let event = AgentEvent::Text {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"type\":\"text\""));
    }

    #[test]
    fn test_sub_agent_wrapping() {
        let inner = AgentEvent::Text {
            text: "partial".to_string(),
        };
        let wrapped = inner.clone().into_sub_agent();
        assert_eq!(
            wrapped,
            AgentEvent::SubAgent {
                inner: Box::new(inner)
            }
        );
    }
}
