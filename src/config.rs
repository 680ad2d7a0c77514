//! Engine configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::str::FromStr;

use crate::error::AgentError;

/// Default chat model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// Default embedding vector dimensions.
const DEFAULT_EMBEDDING_DIMENSIONS: u32 = 1536;
/// Default final retrieval limit.
const DEFAULT_RETRIEVAL_LIMIT: usize = 5;
/// Default vector similarity threshold.
const DEFAULT_RETRIEVAL_THRESHOLD: f32 = 0.7;
/// Default per-backend candidate limit in hybrid mode. Wider than the
/// final limit so rank fusion has enough material to work with.
const DEFAULT_HYBRID_CANDIDATE_LIMIT: usize = 20;
/// Default RRF vector-list weight.
const DEFAULT_HYBRID_ALPHA: f64 = 0.5;
/// Default RRF rank constant.
const DEFAULT_RRF_K: u32 = 60;
/// Default rerank model.
const DEFAULT_RERANK_MODEL: &str = "rerank-v3.5";
/// Default rerank candidate count.
const DEFAULT_RERANK_TOP_N: usize = 10;
/// Default minimum ratio of an image chunk's similarity to the top result.
const DEFAULT_IMAGE_SIMILARITY_MIN_RATIO: f64 = 0.6;
/// Default maximum images surfaced per answer.
const DEFAULT_IMAGE_MAX_RESULTS: usize = 4;
/// Default chunk size in characters.
const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default chunk overlap in characters.
const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Default tool-calling round cap.
const DEFAULT_MAX_ROUNDS: usize = 5;
/// Default sub-agent recursion depth cap.
const DEFAULT_MAX_SUBAGENT_DEPTH: usize = 2;
/// Default character budget for whole-document analysis.
const DEFAULT_MAX_DOCUMENT_CHARS: usize = 80_000;

/// Search mode for the hybrid retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Embedding cosine similarity only.
    Vector,
    /// Lexical full-text search only.
    Keyword,
    /// Both backends, fused via Reciprocal Rank Fusion.
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vector" => Ok(Self::Vector),
            "keyword" => Ok(Self::Keyword),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

/// How document images are discovered for an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageDiscovery {
    /// Select image-description chunks matched directly by search,
    /// filtered by a similarity ratio against the top result.
    #[default]
    ImageChunks,
    /// Discover images via each retrieved chunk's owning document and
    /// ask the model which are relevant to the query.
    DocumentMetadata,
}

/// Configuration for the retrieval and agent engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chat model identifier.
    pub model: String,
    /// API key for the LLM provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Embedding vector dimensions.
    pub embedding_dimensions: u32,
    /// Search mode for retrieval.
    pub search_mode: SearchMode,
    /// Final number of results returned by retrieval.
    pub retrieval_limit: usize,
    /// Minimum cosine similarity for vector search candidates.
    pub retrieval_threshold: f32,
    /// Per-backend candidate limit in hybrid mode.
    pub hybrid_candidate_limit: usize,
    /// RRF weight on the vector list (clamped to [0, 1] at fusion time).
    pub hybrid_alpha: f64,
    /// RRF rank constant.
    pub rrf_k: u32,
    /// Whether cross-encoder reranking is enabled.
    pub rerank_enabled: bool,
    /// Rerank API key. Reranking is skipped when absent.
    pub rerank_api_key: Option<String>,
    /// Rerank model identifier.
    pub rerank_model: String,
    /// Number of candidates the reranker keeps.
    pub rerank_top_n: usize,
    /// Whether conversational queries are rewritten before retrieval.
    pub query_rewrite_enabled: bool,
    /// Image discovery strategy.
    pub image_discovery: ImageDiscovery,
    /// Minimum ratio of an image chunk's similarity to the top result.
    pub image_similarity_min_ratio: f64,
    /// Maximum images surfaced per answer.
    pub image_max_results: usize,
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Chunk overlap in characters.
    pub chunk_overlap: usize,
    /// Tavily API key. Web search is disabled when absent.
    pub tavily_api_key: Option<String>,
    /// Document store base URL (PostgREST-style REST API).
    pub store_url: Option<String>,
    /// Document store service key.
    pub store_service_key: Option<String>,
    /// Hard cap on tool-calling rounds per loop invocation.
    pub max_rounds: usize,
    /// Hard cap on sub-agent recursion depth.
    pub max_subagent_depth: usize,
    /// Character budget for whole-document analysis.
    pub max_document_chars: usize,
}

impl EngineConfig {
    /// Creates a new builder for `EngineConfig`.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    embedding_model: Option<String>,
    embedding_dimensions: Option<u32>,
    search_mode: Option<SearchMode>,
    retrieval_limit: Option<usize>,
    retrieval_threshold: Option<f32>,
    hybrid_candidate_limit: Option<usize>,
    hybrid_alpha: Option<f64>,
    rrf_k: Option<u32>,
    rerank_enabled: Option<bool>,
    rerank_api_key: Option<String>,
    rerank_model: Option<String>,
    rerank_top_n: Option<usize>,
    query_rewrite_enabled: Option<bool>,
    image_discovery: Option<ImageDiscovery>,
    image_similarity_min_ratio: Option<f64>,
    image_max_results: Option<usize>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    tavily_api_key: Option<String>,
    store_url: Option<String>,
    store_service_key: Option<String>,
    max_rounds: Option<usize>,
    max_subagent_depth: Option<usize>,
    max_document_chars: Option<usize>,
}

impl EngineConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.model.is_none() {
            self.model = std::env::var("RAGENT_MODEL").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("RAGENT_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("RAGENT_BASE_URL")
                .or_else(|_| std::env::var("OPENAI_BASE_URL"))
                .ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("RAGENT_EMBEDDING_MODEL").ok();
        }
        if self.search_mode.is_none() {
            self.search_mode = std::env::var("RAGENT_SEARCH_MODE")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.retrieval_limit.is_none() {
            self.retrieval_limit = std::env::var("RAGENT_RETRIEVAL_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.retrieval_threshold.is_none() {
            self.retrieval_threshold = std::env::var("RAGENT_RETRIEVAL_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.hybrid_alpha.is_none() {
            self.hybrid_alpha = std::env::var("RAGENT_HYBRID_ALPHA")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.rerank_api_key.is_none() {
            self.rerank_api_key = std::env::var("RAGENT_RERANK_API_KEY").ok();
        }
        if self.tavily_api_key.is_none() {
            self.tavily_api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if self.store_url.is_none() {
            self.store_url = std::env::var("RAGENT_STORE_URL").ok();
        }
        if self.store_service_key.is_none() {
            self.store_service_key = std::env::var("RAGENT_STORE_SERVICE_KEY").ok();
        }
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the search mode.
    #[must_use]
    pub const fn search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = Some(mode);
        self
    }

    /// Sets the final retrieval limit.
    #[must_use]
    pub const fn retrieval_limit(mut self, n: usize) -> Self {
        self.retrieval_limit = Some(n);
        self
    }

    /// Sets the vector similarity threshold.
    #[must_use]
    pub const fn retrieval_threshold(mut self, t: f32) -> Self {
        self.retrieval_threshold = Some(t);
        self
    }

    /// Sets the hybrid candidate limit.
    #[must_use]
    pub const fn hybrid_candidate_limit(mut self, n: usize) -> Self {
        self.hybrid_candidate_limit = Some(n);
        self
    }

    /// Sets the RRF vector-list weight.
    #[must_use]
    pub const fn hybrid_alpha(mut self, alpha: f64) -> Self {
        self.hybrid_alpha = Some(alpha);
        self
    }

    /// Sets the RRF rank constant.
    #[must_use]
    pub const fn rrf_k(mut self, k: u32) -> Self {
        self.rrf_k = Some(k);
        self
    }

    /// Enables or disables reranking.
    #[must_use]
    pub const fn rerank_enabled(mut self, enabled: bool) -> Self {
        self.rerank_enabled = Some(enabled);
        self
    }

    /// Sets the rerank API key.
    #[must_use]
    pub fn rerank_api_key(mut self, key: impl Into<String>) -> Self {
        self.rerank_api_key = Some(key.into());
        self
    }

    /// Sets the rerank model.
    #[must_use]
    pub fn rerank_model(mut self, model: impl Into<String>) -> Self {
        self.rerank_model = Some(model.into());
        self
    }

    /// Sets the rerank candidate count.
    #[must_use]
    pub const fn rerank_top_n(mut self, n: usize) -> Self {
        self.rerank_top_n = Some(n);
        self
    }

    /// Enables or disables query rewriting.
    #[must_use]
    pub const fn query_rewrite_enabled(mut self, enabled: bool) -> Self {
        self.query_rewrite_enabled = Some(enabled);
        self
    }

    /// Sets the image discovery strategy.
    #[must_use]
    pub const fn image_discovery(mut self, discovery: ImageDiscovery) -> Self {
        self.image_discovery = Some(discovery);
        self
    }

    /// Sets the minimum image similarity ratio.
    #[must_use]
    pub const fn image_similarity_min_ratio(mut self, ratio: f64) -> Self {
        self.image_similarity_min_ratio = Some(ratio);
        self
    }

    /// Sets the maximum images per answer.
    #[must_use]
    pub const fn image_max_results(mut self, n: usize) -> Self {
        self.image_max_results = Some(n);
        self
    }

    /// Sets the chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Sets the chunk overlap.
    #[must_use]
    pub const fn chunk_overlap(mut self, n: usize) -> Self {
        self.chunk_overlap = Some(n);
        self
    }

    /// Sets the Tavily API key.
    #[must_use]
    pub fn tavily_api_key(mut self, key: impl Into<String>) -> Self {
        self.tavily_api_key = Some(key.into());
        self
    }

    /// Sets the document store base URL.
    #[must_use]
    pub fn store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = Some(url.into());
        self
    }

    /// Sets the document store service key.
    #[must_use]
    pub fn store_service_key(mut self, key: impl Into<String>) -> Self {
        self.store_service_key = Some(key.into());
        self
    }

    /// Sets the tool-calling round cap.
    #[must_use]
    pub const fn max_rounds(mut self, n: usize) -> Self {
        self.max_rounds = Some(n);
        self
    }

    /// Sets the sub-agent recursion depth cap.
    #[must_use]
    pub const fn max_subagent_depth(mut self, n: usize) -> Self {
        self.max_subagent_depth = Some(n);
        self
    }

    /// Sets the document analysis character budget.
    #[must_use]
    pub const fn max_document_chars(mut self, n: usize) -> Self {
        self.max_document_chars = Some(n);
        self
    }

    /// Builds the [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<EngineConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        Ok(EngineConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            base_url: self.base_url,
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimensions: self
                .embedding_dimensions
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS),
            search_mode: self.search_mode.unwrap_or_default(),
            retrieval_limit: self.retrieval_limit.unwrap_or(DEFAULT_RETRIEVAL_LIMIT),
            retrieval_threshold: self
                .retrieval_threshold
                .unwrap_or(DEFAULT_RETRIEVAL_THRESHOLD),
            hybrid_candidate_limit: self
                .hybrid_candidate_limit
                .unwrap_or(DEFAULT_HYBRID_CANDIDATE_LIMIT),
            hybrid_alpha: self.hybrid_alpha.unwrap_or(DEFAULT_HYBRID_ALPHA),
            rrf_k: self.rrf_k.unwrap_or(DEFAULT_RRF_K),
            rerank_enabled: self.rerank_enabled.unwrap_or(false),
            rerank_api_key: self.rerank_api_key,
            rerank_model: self
                .rerank_model
                .unwrap_or_else(|| DEFAULT_RERANK_MODEL.to_string()),
            rerank_top_n: self.rerank_top_n.unwrap_or(DEFAULT_RERANK_TOP_N),
            query_rewrite_enabled: self.query_rewrite_enabled.unwrap_or(true),
            image_discovery: self.image_discovery.unwrap_or_default(),
            image_similarity_min_ratio: self
                .image_similarity_min_ratio
                .unwrap_or(DEFAULT_IMAGE_SIMILARITY_MIN_RATIO),
            image_max_results: self.image_max_results.unwrap_or(DEFAULT_IMAGE_MAX_RESULTS),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            chunk_overlap: self.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            tavily_api_key: self.tavily_api_key,
            store_url: self.store_url,
            store_service_key: self.store_service_key,
            max_rounds: self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
            max_subagent_depth: self
                .max_subagent_depth
                .unwrap_or(DEFAULT_MAX_SUBAGENT_DEPTH),
            max_document_chars: self
                .max_document_chars
                .unwrap_or(DEFAULT_MAX_DOCUMENT_CHARS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.search_mode, SearchMode::Hybrid);
        assert_eq!(config.retrieval_limit, DEFAULT_RETRIEVAL_LIMIT);
        assert_eq!(config.rrf_k, DEFAULT_RRF_K);
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert!(config.query_rewrite_enabled);
        assert!(!config.rerank_enabled);
        assert!(config.tavily_api_key.is_none());
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = EngineConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = EngineConfig::builder()
            .api_key("key")
            .model("gpt-4o")
            .search_mode(SearchMode::Keyword)
            .hybrid_alpha(0.7)
            .retrieval_limit(10)
            .max_rounds(3)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.search_mode, SearchMode::Keyword);
        assert!((config.hybrid_alpha - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.retrieval_limit, 10);
        assert_eq!(config.max_rounds, 3);
    }

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!("vector".parse(), Ok(SearchMode::Vector));
        assert_eq!("keyword".parse(), Ok(SearchMode::Keyword));
        assert_eq!("hybrid".parse(), Ok(SearchMode::Hybrid));
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }
}
