//! LLM-backed query rewriting.
//!
//! Turns the latest conversational message into 1-3 focused search
//! queries, resolving pronouns against recent chat history. Rewriting is
//! best-effort: any failure falls back to the original query.

use tracing::warn;

use crate::agent::message::{ChatMessage, ChatRequest, Role, system_message, user_message};
use crate::agent::provider::LlmProvider;

/// At most this many rewritten queries are used.
const MAX_QUERIES: usize = 3;
/// Recent messages included as rewrite context.
const CONTEXT_MESSAGES: usize = 6;

const REWRITE_SYSTEM_PROMPT: &str = "Given the conversation above, rewrite the user's latest \
    message into 1-3 focused search queries for a vector similarity search over document \
    chunks. Resolve pronouns and references using conversation context. Extract specific \
    keywords and noun phrases. Return ONLY the queries, one per line. No numbering, no \
    explanation.";

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "SYSTEM",
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
        Role::Tool => "TOOL",
    }
}

/// Builds the compact `ROLE: content` transcript of the most recent
/// messages.
fn transcript(chat_messages: &[ChatMessage]) -> String {
    let start = chat_messages.len().saturating_sub(CONTEXT_MESSAGES);
    chat_messages
        .get(start..)
        .unwrap_or_default()
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrites `query` into up to three focused search queries.
///
/// Returns `[query]` unchanged when the model call fails or produces no
/// usable lines.
pub async fn rewrite_query(
    provider: &dyn LlmProvider,
    model: &str,
    query: &str,
    chat_messages: &[ChatMessage],
) -> Vec<String> {
    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![
            system_message(REWRITE_SYSTEM_PROMPT),
            user_message(&transcript(chat_messages)),
        ],
        max_tokens: Some(150),
        stream: false,
        tools: Vec::new(),
    };

    let response = match provider.chat(&request).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "query rewriting failed, using original query");
            return vec![query.to_string()];
        }
    };

    let queries: Vec<String> = response
        .content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(MAX_QUERIES)
        .map(String::from)
        .collect();

    if queries.is_empty() {
        vec![query.to_string()]
    } else {
        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::agent::message::ChatResponse;
    use crate::agent::provider::TextStream;
    use crate::error::AgentError;

    struct FixedProvider {
        content: Option<String>,
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.content.clone().map_or(
                Err(AgentError::ApiRequest {
                    message: "unavailable".to_string(),
                    status: Some(503),
                }),
                |content| {
                    Ok(ChatResponse {
                        content,
                        tool_calls: Vec::new(),
                        finish_reason: Some("stop".to_string()),
                    })
                },
            )
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> Result<TextStream, AgentError> {
            Err(AgentError::Stream {
                message: "not supported".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_rewrite_splits_lines() {
        let provider = FixedProvider {
            content: Some("pricing tiers\nenterprise discount\n".to_string()),
        };
        let queries = rewrite_query(&provider, "gpt-4o-mini", "what about pricing?", &[]).await;
        assert_eq!(queries, vec!["pricing tiers", "enterprise discount"]);
    }

    #[tokio::test]
    async fn test_rewrite_caps_at_three() {
        let provider = FixedProvider {
            content: Some("a\nb\nc\nd\ne".to_string()),
        };
        let queries = rewrite_query(&provider, "gpt-4o-mini", "q", &[]).await;
        assert_eq!(queries.len(), 3);
    }

    #[tokio::test]
    async fn test_rewrite_failure_falls_back() {
        let provider = FixedProvider { content: None };
        let queries = rewrite_query(&provider, "gpt-4o-mini", "original query", &[]).await;
        assert_eq!(queries, vec!["original query"]);
    }

    #[tokio::test]
    async fn test_rewrite_blank_response_falls_back() {
        let provider = FixedProvider {
            content: Some("   \n\n  ".to_string()),
        };
        let queries = rewrite_query(&provider, "gpt-4o-mini", "original query", &[]).await;
        assert_eq!(queries, vec!["original query"]);
    }

    #[test]
    fn test_transcript_takes_last_six() {
        let messages: Vec<ChatMessage> = (0..10).map(|i| user_message(&format!("m{i}"))).collect();
        let text = transcript(&messages);
        assert!(!text.contains("m3"));
        assert!(text.contains("m4"));
        assert!(text.contains("m9"));
        assert!(text.starts_with("USER: m4"));
    }
}
