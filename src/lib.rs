//! ragent-rs: hybrid retrieval and a streaming tool-calling agent over
//! user documents.
//!
//! The crate has two halves:
//!
//! - **Retrieval**: vector plus keyword search over a document store,
//!   fused with Reciprocal Rank Fusion, optionally reranked by a
//!   cross-encoder, with LLM query rewriting and image discovery.
//! - **Agent**: a bounded tool-calling loop that streams its progress
//!   as events — tool activity, retrieved sources and images, nested
//!   document-analysis agents, and the text deltas of the final answer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use futures_util::StreamExt;
//! use ragent_rs::agent::{AgentContext, AgentLoop, OpenAiProvider, message};
//! use ragent_rs::config::EngineConfig;
//! use ragent_rs::embedding::OpenAiEmbedder;
//! use ragent_rs::storage::PostgrestStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(EngineConfig::from_env()?);
//! let provider = Arc::new(OpenAiProvider::new(&config));
//! let embedder = Arc::new(OpenAiEmbedder::new(&config));
//! let store = Arc::new(PostgrestStore::new(&config)?);
//!
//! let agent = AgentLoop::new(provider, embedder, store, config);
//! let ctx = AgentContext::new(
//!     "user-id",
//!     "What do my documents say about pricing?",
//!     vec![message::user_message("What do my documents say about pricing?")],
//!     "You are a helpful assistant.",
//! );
//!
//! let mut events = agent.run(ctx);
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chunking;
pub mod config;
pub mod core;
pub mod embedding;
pub mod error;
pub mod search;
pub mod sql;
pub mod storage;
pub mod websearch;

pub use agent::{AgentContext, AgentEvent, AgentLoop, EventStream};
pub use config::{EngineConfig, ImageDiscovery, SearchMode};
pub use core::{Chunk, Document, ImageRef, RetrievalResult, SourceRef};
pub use error::{AgentError, RetrievalError};
pub use search::HybridRetriever;
