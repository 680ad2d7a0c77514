//! Agentic tool-calling loop.
//!
//! Drives the LLM ↔ tool round-trip: asks the model what to do with a
//! non-streaming tools call, executes any requested tools, appends the
//! results, and repeats. When the model answers without tool calls (or
//! the round cap is hit) the final answer is re-run as a streaming call
//! and its deltas flow out as [`AgentEvent::Text`].
//!
//! Events travel through a bounded channel; a vanished receiver simply
//! ends the run. Only a model transport failure terminates the stream
//! with an error — tool failures become tool result text.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use super::context::AgentContext;
use super::event::{AgentEvent, EventStream};
use super::executor::ToolExecutor;
use super::message::{ChatMessage, ChatRequest, assistant_message, system_message, tool_message};
use super::provider::LlmProvider;
use super::subagent::{self, SubAgentStatus};
use super::tool::{ToolKind, ToolSet};
use crate::config::EngineConfig;
use crate::embedding::Embedder;
use crate::error::AgentError;
use crate::storage::DocumentStore;

/// Event channel capacity. Tool results are produced far slower than
/// they are consumed, so a small buffer suffices.
const EVENT_BUFFER: usize = 32;

/// The retrieval-and-tools agent loop.
///
/// Cheap to clone; all backends are shared.
#[derive(Clone)]
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    executor: Arc<ToolExecutor>,
    store: Arc<dyn DocumentStore>,
    config: Arc<EngineConfig>,
}

impl AgentLoop {
    /// Creates a loop over the given backends.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let executor = Arc::new(ToolExecutor::new(
            Arc::clone(&provider),
            embedder,
            Arc::clone(&store),
            Arc::clone(&config),
        ));
        Self {
            provider,
            executor,
            store,
            config,
        }
    }

    pub(super) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(super) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Runs the loop for one invocation, returning its event stream.
    ///
    /// The loop itself runs on a spawned task; dropping the stream
    /// cancels it cooperatively at the next event boundary.
    #[must_use]
    pub fn run(&self, ctx: AgentContext) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.drive(ctx, &tx).await {
                // Receiver may already be gone; nothing left to do then.
                let _ = tx.send(Err(e)).await;
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }

    async fn drive(
        &self,
        mut ctx: AgentContext,
        tx: &mpsc::Sender<Result<AgentEvent, AgentError>>,
    ) -> Result<(), AgentError> {
        let tools = ToolSet::enabled(&self.config);

        let mut messages: Vec<ChatMessage> = Vec::with_capacity(ctx.chat_messages.len() + 1);
        messages.push(system_message(&ctx.system_prompt));
        messages.extend(ctx.chat_messages.iter().cloned());

        for round in 0..self.config.max_rounds {
            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: messages.clone(),
                max_tokens: None,
                stream: false,
                tools: tools.definitions().to_vec(),
            };
            let response = self.provider.chat(&request).await?;

            if response.tool_calls.is_empty() {
                debug!(round, "model produced a final answer");
                return self.stream_final(&messages, tx).await;
            }

            debug!(
                round,
                tool_count = response.tool_calls.len(),
                "executing tool calls"
            );
            messages.push(assistant_message(
                &response.content,
                response.tool_calls.clone(),
            ));

            let mut sources_emitted = false;
            let mut images_emitted = false;

            for call in &response.tool_calls {
                let arguments: Value =
                    serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));

                if !emit(
                    tx,
                    AgentEvent::ToolCall {
                        name: call.name.clone(),
                        arguments: arguments.clone(),
                    },
                )
                .await
                {
                    return Ok(());
                }

                let result = match ToolKind::from_name(&call.name) {
                    None => format!("Unknown tool: {}", call.name),
                    Some(ToolKind::AnalyzeDocument) => {
                        match subagent::analyze_document(self, &ctx, &arguments, tx).await {
                            SubAgentStatus::Completed(result) => result,
                            SubAgentStatus::Cancelled => return Ok(()),
                        }
                    }
                    Some(kind) => match self.executor.execute(kind, &arguments, &ctx).await {
                        Ok(outcome) => {
                            if !outcome.sources.is_empty() {
                                ctx.sources = outcome.sources;
                            }
                            ctx.image_refs.extend(outcome.images);
                            outcome.result
                        }
                        Err(e) => {
                            error!(tool = call.name, error = %e, "tool failed");
                            format!("Tool execution failed: {e}")
                        }
                    },
                };

                if !emit(
                    tx,
                    AgentEvent::ToolResult {
                        name: call.name.clone(),
                        result: result.clone(),
                    },
                )
                .await
                {
                    return Ok(());
                }

                if ToolKind::from_name(&call.name) == Some(ToolKind::RetrieveDocuments) {
                    if !ctx.sources.is_empty() && !sources_emitted {
                        sources_emitted = true;
                        if !emit(
                            tx,
                            AgentEvent::Sources {
                                sources: ctx.sources.clone(),
                            },
                        )
                        .await
                        {
                            return Ok(());
                        }
                    }
                    if !ctx.image_refs.is_empty() && !images_emitted {
                        images_emitted = true;
                        if !emit(
                            tx,
                            AgentEvent::Images {
                                images: ctx.image_refs.clone(),
                            },
                        )
                        .await
                        {
                            return Ok(());
                        }
                    }
                }

                messages.push(tool_message(&call.id, &result));
            }
        }

        // Round cap reached: answer with whatever has been gathered.
        debug!(max_rounds = self.config.max_rounds, "round cap reached");
        self.stream_final(&messages, tx).await
    }

    /// Streams the final answer over the accumulated messages.
    async fn stream_final(
        &self,
        messages: &[ChatMessage],
        tx: &mpsc::Sender<Result<AgentEvent, AgentError>>,
    ) -> Result<(), AgentError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            max_tokens: None,
            stream: true,
            tools: Vec::new(),
        };
        let mut stream = self.provider.chat_stream(&request).await?;

        while let Some(item) = stream.next().await {
            let delta = item?;
            if delta.is_empty() {
                continue;
            }
            if !emit(tx, AgentEvent::Text { text: delta }).await {
                return Ok(());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("provider", &self.provider.name())
            .field("max_rounds", &self.config.max_rounds)
            .finish_non_exhaustive()
    }
}

async fn emit(tx: &mpsc::Sender<Result<AgentEvent, AgentError>>, event: AgentEvent) -> bool {
    tx.send(Ok(event)).await.is_ok()
}
