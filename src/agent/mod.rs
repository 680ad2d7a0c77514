//! Streaming tool-calling agent.
//!
//! The loop lets an LLM answer questions over a user's documents with
//! function-calling tools: hybrid retrieval, text-to-SQL over document
//! metadata, live web search, and recursive whole-document analysis.
//!
//! # Architecture
//!
//! ```text
//! AgentContext → AgentLoop::run → EventStream
//!   ├── model decides (non-streaming, with tools)
//!   ├── tools execute sequentially → ToolCall / ToolResult events
//!   │     ├── retrieve_documents → Sources / Images events
//!   │     └── analyze_document → nested loop, SubAgent-wrapped events
//!   └── final answer re-run as a streaming call → Text deltas
//! ```

pub mod agentic_loop;
pub mod context;
pub mod event;
pub mod executor;
pub mod message;
pub mod provider;
pub mod providers;
pub mod subagent;
pub mod tool;

// Re-export key types
pub use agentic_loop::AgentLoop;
pub use context::AgentContext;
pub use event::{AgentEvent, EventStream};
pub use executor::{ToolExecutor, ToolOutcome};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role};
pub use provider::{LlmProvider, TextStream};
pub use providers::OpenAiProvider;
pub use tool::{ToolCall, ToolDefinition, ToolKind, ToolSet};
