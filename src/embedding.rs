//! Embedding backend for vector retrieval.
//!
//! Defines the [`Embedder`] trait consumed by the hybrid retriever and an
//! `OpenAI`-compatible implementation via the `async-openai` crate.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequest, EmbeddingInput};
use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::RetrievalError;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `text` into a fixed-dimension vector.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Embedding`] on API failures or an empty
    /// response.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// `OpenAI`-compatible embedding backend.
///
/// Works with any API that follows the `OpenAI` embeddings spec via the
/// base URL override in [`EngineConfig`].
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: u32,
}

impl OpenAiEmbedder {
    /// Creates a new embedder from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(openai_config),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        }
    }

    /// Configured embedding dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> u32 {
        self.dimensions
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::String(text.to_string()),
            ..Default::default()
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| RetrievalError::Embedding {
                message: e.to_string(),
            })?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::Embedding {
                message: "empty embedding response".to_string(),
            })
    }
}
