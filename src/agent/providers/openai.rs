//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`EngineConfig`].

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestToolMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionStreamResponse,
    FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role};
use crate::agent::provider::{LlmProvider, TextStream};
use crate::agent::tool::ToolCall;
use crate::config::EngineConfig;
use crate::error::AgentError;

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions. Compatible
/// with any API that follows the `OpenAI` chat completion spec.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                        msg.content.clone(),
                    ),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                    msg.content.clone(),
                ),
                name: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                let content = if msg.content.is_empty() {
                    None
                } else {
                    Some(
                        async_openai::types::ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        ),
                    )
                };

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: async_openai::types::ChatCompletionRequestToolMessageContent::Text(
                    msg.content.clone(),
                ),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|td| ChatCompletionTool {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionObject {
                            name: td.name.clone(),
                            description: Some(td.description.clone()),
                            parameters: Some(td.parameters.clone()),
                            strict: None,
                        },
                    })
                    .collect(),
            )
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            max_completion_tokens: request.max_tokens,
            stream: if request.stream { Some(true) } else { None },
            tools,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError> {
        let mut stream_request = request.clone();
        stream_request.stream = true;
        let openai_request = Self::build_request(&stream_request);

        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;

        let mapped = stream.map(
            |result: Result<
                CreateChatCompletionStreamResponse,
                async_openai::error::OpenAIError,
            >| {
                match result {
                    Ok(response) => {
                        let text = response
                            .choices
                            .first()
                            .and_then(|c| c.delta.content.as_ref())
                            .cloned()
                            .unwrap_or_default();
                        Ok(text)
                    }
                    Err(e) => Err(AgentError::Stream {
                        message: e.to_string(),
                    }),
                }
            },
        );

        Ok(Box::pin(mapped))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::ToolDefinition;

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_user_message() {
        let msg = message::user_message("hello");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_convert_tool_message() {
        let msg = message::tool_message("call_123", "result data");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let msg = message::assistant_message(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "retrieve_documents".to_string(),
                arguments: r#"{"query":"revenue"}"#.to_string(),
            }],
        );
        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Assistant(a) = converted {
            assert!(a.tool_calls.is_some());
            let tcs = a.tool_calls.as_ref().map_or(0, Vec::len);
            assert_eq!(tcs, 1);
        } else {
            panic!("Expected Assistant message");
        }
    }

    #[test]
    fn test_build_request_streaming() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![message::user_message("test")],
            max_tokens: None,
            stream: true,
            tools: Vec::new(),
        };
        let built = OpenAiProvider::build_request(&request);
        assert_eq!(built.stream, Some(true));
    }

    #[test]
    fn test_build_request_with_tools() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![message::user_message("test")],
            max_tokens: Some(100),
            stream: false,
            tools: vec![ToolDefinition {
                name: "retrieve_documents".to_string(),
                description: "Search documents".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
        };
        let built = OpenAiProvider::build_request(&request);
        assert!(built.tools.is_some());
        let tools = built.tools.as_ref().map_or(0, Vec::len);
        assert_eq!(tools, 1);
        assert_eq!(built.max_completion_tokens, Some(100));
    }

    #[test]
    fn test_build_request_no_tools_omitted() {
        let request = ChatRequest::new(
            "gpt-4o-mini".to_string(),
            vec![message::user_message("test")],
        );
        let built = OpenAiProvider::build_request(&request);
        assert!(built.tools.is_none());
        assert!(built.stream.is_none());
    }
}
