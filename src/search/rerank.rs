//! Cross-encoder reranking over fused candidates.
//!
//! Wraps the Cohere v2 rerank API. Reranking is strictly best-effort: any
//! failure logs a warning and returns the candidates unchanged, so an
//! outage of the rerank provider never breaks retrieval.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::core::Chunk;

const RERANK_URL: &str = "https://api.cohere.com/v2/rerank";
const RERANK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f64,
}

/// Best-effort cross-encoder reranker.
pub struct Reranker {
    client: reqwest::Client,
    enabled: bool,
    api_key: Option<String>,
    model: String,
    top_n: usize,
}

impl Reranker {
    /// Creates a reranker from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            enabled: config.rerank_enabled,
            api_key: config.rerank_api_key.clone(),
            model: config.rerank_model.clone(),
            top_n: config.rerank_top_n,
        }
    }

    /// Whether a rerank call would actually be made.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }

    /// Reorders `chunks` by cross-encoder relevance to `query`.
    ///
    /// Returns the input unchanged when reranking is disabled, no API key
    /// is configured, the candidate list is empty, or the API call fails
    /// in any way. On success each returned chunk carries the rerank
    /// relevance score as its similarity.
    pub async fn rerank(&self, query: &str, chunks: Vec<Chunk>) -> Vec<Chunk> {
        if chunks.is_empty() {
            return chunks;
        }
        let Some(api_key) = self.api_key.as_ref().filter(|_| self.enabled) else {
            return chunks;
        };

        let documents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let payload = json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": self.top_n.min(chunks.len()),
        });

        let response = match self
            .client
            .post(RERANK_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .timeout(RERANK_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "rerank request failed, keeping fused order");
                return chunks;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "rerank returned error, keeping fused order");
            return chunks;
        }

        let parsed: RerankResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "rerank response invalid, keeping fused order");
                return chunks;
            }
        };

        let mut slots: Vec<Option<Chunk>> = chunks.into_iter().map(Some).collect();
        let mut reranked = Vec::with_capacity(parsed.results.len());
        for result in parsed.results {
            if let Some(slot) = slots.get_mut(result.index) {
                if let Some(mut chunk) = slot.take() {
                    chunk.similarity = result.relevance_score;
                    reranked.push(chunk);
                }
            }
        }

        if reranked.is_empty() {
            warn!("rerank returned no usable indices, keeping fused order");
            return slots.into_iter().flatten().collect();
        }

        debug!(count = reranked.len(), "reranked candidates");
        reranked
    }
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("enabled", &self.enabled)
            .field("model", &self.model)
            .field("top_n", &self.top_n)
            .finish_non_exhaustive()
    }
}
