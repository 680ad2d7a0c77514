//! Whole-document analysis via a nested agent.
//!
//! The `analyze_document` tool loads a document's full text into a fresh
//! system prompt and runs the agent loop one level deeper. Inner events
//! are forwarded to the parent stream wrapped as
//! [`AgentEvent::SubAgent`]; inner sources and images are dropped, and
//! the accumulated answer text becomes the tool result.

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::agentic_loop::AgentLoop;
use super::context::AgentContext;
use super::event::AgentEvent;
use super::message::user_message;
use crate::error::AgentError;

const SUB_AGENT_SYSTEM_PROMPT: &str = "You are a document analysis assistant. You have the \
full text of a document in your context. Answer the user's question about this document \
thoroughly and accurately.\n\n\
You have access to the retrieve_documents tool to search within this document for specific \
sections if needed.\n\n\
## Document Text\n\n";

const TRUNCATION_MARKER: &str = "\n\n[... truncated ...]";

/// How a sub-agent invocation ended.
#[derive(Debug)]
pub(super) enum SubAgentStatus {
    /// The sub-agent produced a tool result (answer or error text).
    Completed(String),
    /// The parent stream's receiver went away mid-run.
    Cancelled,
}

/// Assembles a document's text within the character budget.
fn assemble_text(chunks: Vec<crate::core::Chunk>, budget: usize) -> String {
    let full_text = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    if full_text.chars().count() <= budget {
        return full_text;
    }
    let mut truncated: String = full_text.chars().take(budget).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Runs the `analyze_document` tool.
///
/// Never returns an error: lookup failures, depth exhaustion, and inner
/// loop failures all become readable tool result text, so one bad
/// analysis call cannot end the parent conversation.
pub(super) async fn analyze_document(
    engine: &AgentLoop,
    ctx: &AgentContext,
    arguments: &Value,
    tx: &mpsc::Sender<Result<AgentEvent, AgentError>>,
) -> SubAgentStatus {
    let filename = arguments
        .get("filename")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let question = arguments
        .get("question")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let config = engine.config();
    if ctx.depth + 1 > config.max_subagent_depth {
        return SubAgentStatus::Completed(format!(
            "Cannot analyze '{filename}': maximum analysis depth reached."
        ));
    }

    let doc = match engine
        .store()
        .get_document_by_filename(&ctx.user_id, filename)
        .await
    {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            return SubAgentStatus::Completed(format!(
                "Document '{filename}' not found or not yet processed."
            ));
        }
        Err(e) => {
            error!(error = %e, filename, "document lookup failed");
            return SubAgentStatus::Completed(format!("Tool execution failed: {e}"));
        }
    };

    let chunks = match engine.store().get_chunks_by_document(&doc.id).await {
        Ok(chunks) => chunks,
        Err(e) => {
            error!(error = %e, filename, "chunk load failed");
            return SubAgentStatus::Completed(format!("Tool execution failed: {e}"));
        }
    };
    if chunks.is_empty() {
        return SubAgentStatus::Completed(format!(
            "No content found for document '{filename}'."
        ));
    }

    let document_text = assemble_text(chunks, config.max_document_chars);
    let system_prompt = format!("{SUB_AGENT_SYSTEM_PROMPT}{document_text}");

    let sub_ctx = AgentContext {
        user_id: ctx.user_id.clone(),
        query: question.to_string(),
        chat_messages: vec![user_message(question)],
        system_prompt,
        metadata_filter: None,
        sources: Vec::new(),
        image_refs: Vec::new(),
        depth: ctx.depth + 1,
    };

    info!(filename, depth = sub_ctx.depth, "running document analysis sub-agent");

    let mut stream = engine.run(sub_ctx);
    let mut answer = String::new();

    while let Some(item) = stream.next().await {
        match item {
            // Inner retrieval metadata stays with the sub-agent.
            Ok(AgentEvent::Sources { .. } | AgentEvent::Images { .. }) => {}
            Ok(AgentEvent::Text { text: delta }) => {
                answer.push_str(&delta);
                if tx
                    .send(Ok(AgentEvent::Text { text: delta }.into_sub_agent()))
                    .await
                    .is_err()
                {
                    return SubAgentStatus::Cancelled;
                }
            }
            Ok(event) => {
                if tx.send(Ok(event.into_sub_agent())).await.is_err() {
                    return SubAgentStatus::Cancelled;
                }
            }
            Err(e) => {
                error!(error = %e, filename, "sub-agent failed");
                return SubAgentStatus::Completed(format!("Tool execution failed: {e}"));
            }
        }
    }

    SubAgentStatus::Completed(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> crate::core::Chunk {
        crate::core::Chunk {
            id: "c".to_string(),
            document_id: "d".to_string(),
            content: content.to_string(),
            chunk_index: 0,
            metadata: serde_json::Map::new(),
            similarity: 0.0,
            rank: 0.0,
        }
    }

    #[test]
    fn test_assemble_joins_with_blank_lines() {
        let text = assemble_text(vec![chunk("first"), chunk("second")], 100);
        assert_eq!(text, "first\n\nsecond");
    }

    #[test]
    fn test_assemble_truncates_at_budget() {
        let text = assemble_text(vec![chunk(&"x".repeat(50))], 10);
        assert!(text.starts_with("xxxxxxxxxx"));
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.chars().count(), 10 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_assemble_within_budget_untouched() {
        let text = assemble_text(vec![chunk("short")], 100);
        assert_eq!(text, "short");
    }
}
