//! Tool executor for the agent loop.
//!
//! Dispatches [`ToolKind`]s to the retrieval pipeline, the text-to-SQL
//! tool, and web search. Document analysis is not dispatched here: it
//! recurses into the loop itself and is driven by the loop directly.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::context::AgentContext;
use super::provider::LlmProvider;
use super::tool::ToolKind;
use crate::config::{EngineConfig, ImageDiscovery};
use crate::core::{ImageRef, SourceRef};
use crate::embedding::Embedder;
use crate::error::AgentError;
use crate::search::{HybridRetriever, format_context, images, rewrite};
use crate::sql::SqlTool;
use crate::storage::DocumentStore;
use crate::websearch::WebSearch;

/// Outcome of one tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    /// Result text fed back to the model.
    pub result: String,
    /// Sources gathered by this execution (retrieval only).
    pub sources: Vec<SourceRef>,
    /// Images selected by this execution (retrieval only).
    pub images: Vec<ImageRef>,
}

impl ToolOutcome {
    fn text(result: String) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }
}

/// Executes tool calls against the engine's backends.
pub struct ToolExecutor {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn DocumentStore>,
    retriever: HybridRetriever,
    websearch: WebSearch,
    sql: SqlTool,
    config: Arc<EngineConfig>,
}

impl ToolExecutor {
    /// Creates an executor over the given backends.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let retriever = HybridRetriever::new(embedder, Arc::clone(&store), Arc::clone(&config));
        let websearch = WebSearch::new(&config);
        let sql = SqlTool::new(Arc::clone(&provider), Arc::clone(&store), &config.model);
        Self {
            provider,
            store,
            retriever,
            websearch,
            sql,
            config,
        }
    }

    /// Dispatches one tool call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolExecution`] when retrieval's image
    /// discovery hits a store failure, or for kinds this executor does
    /// not own. The loop converts errors into tool result text, so a
    /// failure never escapes the round.
    pub async fn execute(
        &self,
        kind: ToolKind,
        arguments: &Value,
        ctx: &AgentContext,
    ) -> Result<ToolOutcome, AgentError> {
        match kind {
            ToolKind::RetrieveDocuments => self.execute_retrieve(arguments, ctx).await,
            ToolKind::TextToSql => {
                let question = arguments
                    .get("question")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(ToolOutcome::text(
                    self.sql.execute(question, &ctx.user_id).await,
                ))
            }
            ToolKind::WebSearch => {
                let query = arguments
                    .get("query")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(ToolOutcome::text(self.websearch.search(query).await))
            }
            ToolKind::AnalyzeDocument => Err(AgentError::ToolExecution {
                name: kind.name().to_string(),
                message: "document analysis runs through the agent loop".to_string(),
            }),
        }
    }

    async fn execute_retrieve(
        &self,
        arguments: &Value,
        ctx: &AgentContext,
    ) -> Result<ToolOutcome, AgentError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or(&ctx.query);

        let queries = if self.config.query_rewrite_enabled {
            let rewritten = rewrite::rewrite_query(
                self.provider.as_ref(),
                &self.config.model,
                query,
                &ctx.chat_messages,
            )
            .await;
            info!(?rewritten, "rewritten queries");
            rewritten
        } else {
            vec![query.to_string()]
        };

        let results = self
            .retriever
            .retrieve_many(&queries, &ctx.user_id, ctx.metadata_filter.as_ref())
            .await;

        if results.is_empty() {
            return Ok(ToolOutcome::text("No relevant documents found.".to_string()));
        }

        let sources: Vec<SourceRef> = results
            .iter()
            .map(|r| SourceRef {
                filename: r.filename.clone(),
                similarity: r.similarity,
            })
            .collect();

        let image_refs = match self.config.image_discovery {
            ImageDiscovery::ImageChunks => images::collect_image_refs(
                &results,
                self.config.image_similarity_min_ratio,
                self.config.image_max_results,
            ),
            ImageDiscovery::DocumentMetadata => images::filter_document_images(
                self.provider.as_ref(),
                &self.config.model,
                self.store.as_ref(),
                &ctx.user_id,
                &ctx.query,
                &results,
            )
            .await
            .map_err(|e| AgentError::ToolExecution {
                name: ToolKind::RetrieveDocuments.name().to_string(),
                message: e.to_string(),
            })?,
        };

        let mut context = format_context(&results);
        if !image_refs.is_empty() {
            context.push_str("\n\n## Attached Figures\n\n");
            for image in &image_refs {
                let page = image
                    .page
                    .map_or_else(|| "?".to_string(), |p| p.to_string());
                context.push_str(&format!(
                    "- **{}** — {}, p.{page}: {}\n",
                    image.label, image.source, image.alt
                ));
            }
            context.push_str(
                "\nThese figures are displayed below your answer. Reference relevant ones by \
                 label (e.g. 'see **Figure 1**'). Do NOT describe figures the user can already \
                 see — just refer to them. Do NOT include image URLs.",
            );
        }

        Ok(ToolOutcome {
            result: context,
            sources,
            images: image_refs,
        })
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("provider", &self.provider.name())
            .field("retriever", &self.retriever)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::agent::message::{ChatRequest, ChatResponse};
    use crate::agent::provider::TextStream;
    use crate::core::{Chunk, Document};
    use crate::error::RetrievalError;

    struct StubProvider {
        reply: String,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: self.reply.clone(),
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            })
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> Result<TextStream, AgentError> {
            Err(AgentError::Stream {
                message: "not supported".to_string(),
            })
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![0.0; 3])
        }
    }

    struct StubStore {
        keyword: Vec<Chunk>,
        sql_rows: Value,
    }

    #[async_trait]
    impl DocumentStore for StubStore {
        async fn search_by_vector(
            &self,
            _user_id: &str,
            _embedding: &[f32],
            _limit: usize,
            _threshold: f32,
            _metadata_filter: Option<&Value>,
        ) -> Result<Vec<Chunk>, RetrievalError> {
            Ok(Vec::new())
        }

        async fn search_by_keyword(
            &self,
            _user_id: &str,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<Chunk>, RetrievalError> {
            Ok(self.keyword.clone())
        }

        async fn get_document(
            &self,
            document_id: &str,
            _user_id: &str,
        ) -> Result<Option<Document>, RetrievalError> {
            Ok(serde_json::from_value(
                json!({"id": document_id, "filename": "notes.md"}),
            )
            .ok())
        }

        async fn get_document_by_filename(
            &self,
            _user_id: &str,
            _filename: &str,
        ) -> Result<Option<Document>, RetrievalError> {
            Ok(None)
        }

        async fn get_chunks_by_document(
            &self,
            _document_id: &str,
        ) -> Result<Vec<Chunk>, RetrievalError> {
            Ok(Vec::new())
        }

        async fn execute_readonly_sql(
            &self,
            _query: &str,
            _user_id: &str,
        ) -> Result<Value, RetrievalError> {
            Ok(self.sql_rows.clone())
        }
    }

    fn chunk(id: &str, rank: f64) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "d1".to_string(),
            content: format!("content {id}"),
            chunk_index: 0,
            metadata: serde_json::Map::new(),
            similarity: 0.0,
            rank,
        }
    }

    fn executor(store: StubStore, reply: &str) -> ToolExecutor {
        let config = EngineConfig::builder()
            .api_key("test")
            .search_mode(crate::config::SearchMode::Keyword)
            .query_rewrite_enabled(false)
            .build()
            .unwrap_or_else(|_| unreachable!());
        ToolExecutor::new(
            Arc::new(StubProvider {
                reply: reply.to_string(),
            }),
            Arc::new(StubEmbedder),
            Arc::new(store),
            Arc::new(config),
        )
    }

    fn context() -> AgentContext {
        AgentContext::new("u1", "what do my notes say?", Vec::new(), "prompt")
    }

    #[tokio::test]
    async fn test_retrieve_no_results() {
        let store = StubStore {
            keyword: Vec::new(),
            sql_rows: json!([]),
        };
        let outcome = executor(store, "")
            .execute(ToolKind::RetrieveDocuments, &json!({}), &context())
            .await
            .unwrap_or_default();
        assert_eq!(outcome.result, "No relevant documents found.");
        assert!(outcome.sources.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_builds_context_and_sources() {
        let store = StubStore {
            keyword: vec![chunk("a", 0.9), chunk("b", 0.5)],
            sql_rows: json!([]),
        };
        let outcome = executor(store, "")
            .execute(
                ToolKind::RetrieveDocuments,
                &json!({"query": "notes"}),
                &context(),
            )
            .await
            .unwrap_or_default();
        assert!(outcome.result.starts_with("[Source 1: notes.md"));
        assert_eq!(outcome.sources.len(), 2);
        assert_eq!(outcome.sources[0].filename, "notes.md");
        assert!(outcome.images.is_empty());
    }

    #[tokio::test]
    async fn test_text_to_sql_flows_through() {
        let store = StubStore {
            keyword: Vec::new(),
            sql_rows: json!([{"count": 3}]),
        };
        let outcome = executor(store, "SELECT count(*) FROM documents")
            .execute(
                ToolKind::TextToSql,
                &json!({"question": "how many documents?"}),
                &context(),
            )
            .await
            .unwrap_or_default();
        assert!(outcome.result.contains("Results (1 rows):"));
        assert!(outcome.result.contains("\"count\": 3"));
    }

    #[tokio::test]
    async fn test_web_search_unconfigured() {
        let store = StubStore {
            keyword: Vec::new(),
            sql_rows: json!([]),
        };
        let outcome = executor(store, "")
            .execute(ToolKind::WebSearch, &json!({"query": "news"}), &context())
            .await
            .unwrap_or_default();
        assert!(outcome.result.starts_with("Web search is not configured"));
    }

    #[tokio::test]
    async fn test_analyze_document_not_dispatched_here() {
        let store = StubStore {
            keyword: Vec::new(),
            sql_rows: json!([]),
        };
        let result = executor(store, "")
            .execute(ToolKind::AnalyzeDocument, &json!({}), &context())
            .await;
        assert!(result.is_err());
    }
}
