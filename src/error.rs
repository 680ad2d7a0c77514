//! Error types for the retrieval and agent subsystems.
//!
//! Two enums split the failure taxonomy along the degradation boundary:
//! [`RetrievalError`] covers collaborator failures that callers absorb
//! (retrieval proceeds with empty context), while [`AgentError`] covers
//! failures of the agent loop itself. Only model transport failures are
//! allowed to terminate an event stream; tool failures are converted to
//! textual tool results inside the loop and never escape.

use thiserror::Error;

/// Failures from the retrieval collaborators (embedding, document store).
///
/// Fatal to a single `retrieve` call; callers catch and degrade.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding backend rejected or failed the request.
    #[error("embedding request failed: {message}")]
    Embedding {
        /// Description of the underlying failure.
        message: String,
    },

    /// The document store rejected or failed a search or lookup.
    #[error("document store request failed: {message}")]
    Store {
        /// Description of the underlying failure.
        message: String,
    },
}

/// Failures from the agent loop and its language-model transport.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was provided or found in the environment.
    #[error("no API key found: set RAGENT_API_KEY or OPENAI_API_KEY")]
    ApiKeyMissing,

    /// A required collaborator endpoint is not configured.
    #[error("missing configuration: {message}")]
    Configuration {
        /// What is missing and how to provide it.
        message: String,
    },

    /// A language-model completion request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Description of the API failure.
        message: String,
        /// HTTP status code, if one was received.
        status: Option<u16>,
    },

    /// A streaming completion failed mid-stream.
    #[error("stream error: {message}")]
    Stream {
        /// Description of the streaming failure.
        message: String,
    },

    /// A tool executor failed.
    ///
    /// The agent loop converts this into a textual tool result; it only
    /// surfaces as an error from direct executor calls in isolation.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Name of the failing tool.
        name: String,
        /// Description of the failure.
        message: String,
    },
}
