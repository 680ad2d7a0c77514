//! Hybrid retrieval pipeline.
//!
//! Vector and keyword search over the document store, fused via
//! Reciprocal Rank Fusion, optionally reranked, trimmed, and enriched
//! with the owning documents' filenames. Also hosts query rewriting and
//! image discovery, which feed the retrieval tool of the agent loop.

pub mod fusion;
pub mod images;
pub mod rerank;
pub mod rewrite;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{EngineConfig, SearchMode};
use crate::core::{Chunk, RetrievalResult};
use crate::embedding::Embedder;
use crate::error::RetrievalError;
use crate::storage::DocumentStore;

pub use fusion::reciprocal_rank_fusion;
pub use rerank::Reranker;

/// Retrieval pipeline over a document store and embedding backend.
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    reranker: Reranker,
    config: Arc<EngineConfig>,
}

impl HybridRetriever {
    /// Creates a retriever over the given backends.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let reranker = Reranker::new(&config);
        Self {
            embedder,
            store,
            reranker,
            config,
        }
    }

    /// Retrieves the most relevant chunks for `query`, scoped to one user.
    ///
    /// Runs the configured search mode, fuses and optionally reranks the
    /// candidates, trims to the final limit, and resolves each chunk's
    /// owning filename.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] when embedding or the store fails. A
    /// rerank failure is absorbed and keeps the fused order.
    pub async fn retrieve(
        &self,
        query: &str,
        user_id: &str,
        metadata_filter: Option<&Value>,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let mode = self.config.search_mode;
        let limit = self.config.retrieval_limit;
        let candidate_limit = if mode == SearchMode::Hybrid {
            self.config.hybrid_candidate_limit
        } else {
            limit
        };

        let mut vector_results = Vec::new();
        let mut keyword_results = Vec::new();

        if matches!(mode, SearchMode::Vector | SearchMode::Hybrid) {
            let embedding = self.embedder.embed(query).await?;
            vector_results = self
                .store
                .search_by_vector(
                    user_id,
                    &embedding,
                    candidate_limit,
                    self.config.retrieval_threshold,
                    metadata_filter,
                )
                .await?;
        }

        if matches!(mode, SearchMode::Keyword | SearchMode::Hybrid) {
            keyword_results = self
                .store
                .search_by_keyword(user_id, query, candidate_limit)
                .await?;
        }

        let mut results = match mode {
            SearchMode::Hybrid => reciprocal_rank_fusion(
                vector_results,
                keyword_results,
                self.config.hybrid_alpha,
                self.config.rrf_k,
            ),
            SearchMode::Keyword => {
                // Text-search rank stands in for similarity downstream.
                for chunk in &mut keyword_results {
                    chunk.similarity = chunk.rank;
                }
                keyword_results
            }
            SearchMode::Vector => vector_results,
        };

        if self.config.rerank_enabled {
            results = self.reranker.rerank(query, results).await;
        }

        results.truncate(limit);

        if results.is_empty() {
            info!(user_id, mode = ?mode, "no chunks found for query");
            return Ok(Vec::new());
        }

        let filenames = self.resolve_filenames(&results, user_id).await;
        let enriched: Vec<RetrievalResult> = results
            .into_iter()
            .map(|chunk| {
                let filename = filenames
                    .get(&chunk.document_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string());
                let similarity = chunk.similarity;
                RetrievalResult {
                    chunk,
                    filename,
                    similarity,
                }
            })
            .collect();

        info!(
            count = enriched.len(),
            user_id,
            mode = ?mode,
            threshold = self.config.retrieval_threshold,
            "retrieved chunks for query"
        );

        Ok(enriched)
    }

    /// Retrieves for several queries and merges the results, keeping the
    /// highest similarity per chunk.
    ///
    /// A failing query is logged and skipped; the merge is trimmed to the
    /// configured retrieval limit.
    pub async fn retrieve_many(
        &self,
        queries: &[String],
        user_id: &str,
        metadata_filter: Option<&Value>,
    ) -> Vec<RetrievalResult> {
        let mut merged: HashMap<String, RetrievalResult> = HashMap::new();

        for query in queries {
            match self.retrieve(query, user_id, metadata_filter).await {
                Ok(results) => {
                    for result in results {
                        let entry = merged.entry(result.chunk.id.clone());
                        match entry {
                            std::collections::hash_map::Entry::Occupied(mut slot) => {
                                if result.similarity > slot.get().similarity {
                                    slot.insert(result);
                                }
                            }
                            std::collections::hash_map::Entry::Vacant(slot) => {
                                slot.insert(result);
                            }
                        }
                    }
                }
                Err(e) => warn!(query, error = %e, "retrieval failed for query"),
            }
        }

        let mut results: Vec<RetrievalResult> = merged.into_values().collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(self.config.retrieval_limit);
        results
    }

    async fn resolve_filenames(
        &self,
        chunks: &[Chunk],
        user_id: &str,
    ) -> HashMap<String, String> {
        let mut filenames = HashMap::new();
        for chunk in chunks {
            if filenames.contains_key(&chunk.document_id) {
                continue;
            }
            match self.store.get_document(&chunk.document_id, user_id).await {
                Ok(Some(doc)) => {
                    filenames.insert(chunk.document_id.clone(), doc.filename);
                }
                Ok(None) => {}
                Err(e) => warn!(document_id = %chunk.document_id, error = %e, "filename lookup failed"),
            }
        }
        filenames
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("mode", &self.config.search_mode)
            .field("reranker", &self.reranker)
            .finish_non_exhaustive()
    }
}

/// Formats retrieved chunks into a context block for the system prompt.
///
/// Each chunk becomes a `[Source N: filename (relevance: x.xx)]` header
/// followed by its content; entries are separated by `---` rules. Empty
/// input yields an empty string.
#[must_use]
pub fn format_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Source {}: {} (relevance: {:.2})]\n{}",
                i + 1,
                r.filename,
                r.similarity,
                r.chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
