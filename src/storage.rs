//! Document store access.
//!
//! Defines the [`DocumentStore`] trait consumed by retrieval and the agent
//! tools, plus [`PostgrestStore`], an implementation over a PostgREST-style
//! REST API with RPC endpoints for vector search, keyword search, and
//! read-only SQL execution.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::EngineConfig;
use crate::core::{Chunk, Document};
use crate::error::RetrievalError;

/// Timeout for the read-only SQL RPC, which can run arbitrary
/// model-generated queries.
const SQL_TIMEOUT: Duration = Duration::from_secs(15);

/// Trait for document store backends.
///
/// All lookups are scoped to a single user; the store is responsible for
/// enforcing that scoping server-side.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Vector similarity search over chunk embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] on backend failures.
    async fn search_by_vector(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
        metadata_filter: Option<&Value>,
    ) -> Result<Vec<Chunk>, RetrievalError>;

    /// Lexical full-text search over chunk content.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] on backend failures.
    async fn search_by_keyword(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>, RetrievalError>;

    /// Fetches a document by id, scoped to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] on backend failures.
    async fn get_document(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> Result<Option<Document>, RetrievalError>;

    /// Finds a completed document by filename.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] on backend failures.
    async fn get_document_by_filename(
        &self,
        user_id: &str,
        filename: &str,
    ) -> Result<Option<Document>, RetrievalError>;

    /// Fetches all chunks for a document, ordered by chunk index.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] on backend failures.
    async fn get_chunks_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<Chunk>, RetrievalError>;

    /// Executes a validated read-only SQL query scoped to one user,
    /// returning the result rows as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] on backend failures or query
    /// errors.
    async fn execute_readonly_sql(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<Value, RetrievalError>;
}

/// Document store backed by a PostgREST-style REST API.
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl PostgrestStore {
    /// Creates a new store from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] if the store URL or service key
    /// is not configured.
    pub fn new(config: &EngineConfig) -> Result<Self, RetrievalError> {
        let base_url = config
            .store_url
            .clone()
            .ok_or_else(|| RetrievalError::Store {
                message: "document store URL not configured (RAGENT_STORE_URL)".to_string(),
            })?;
        let service_key =
            config
                .store_service_key
                .clone()
                .ok_or_else(|| RetrievalError::Store {
                    message: "document store service key not configured (RAGENT_STORE_SERVICE_KEY)"
                        .to_string(),
                })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            service_key,
        })
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn rpc(&self, function: &str, payload: &Value) -> Result<Value, RetrievalError> {
        let url = format!("{}/rest/v1/rpc/{function}", self.base_url);
        let response = self
            .auth(self.client.post(&url).json(payload))
            .send()
            .await
            .map_err(|e| RetrievalError::Store {
                message: format!("rpc {function}: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Store {
                message: format!("rpc {function}: HTTP {status}: {body}"),
            });
        }

        response.json().await.map_err(|e| RetrievalError::Store {
            message: format!("rpc {function}: invalid response: {e}"),
        })
    }

    async fn get_rows(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Value, RetrievalError> {
        let url = format!("{}/rest/v1/{table}", self.base_url);
        let response = self
            .auth(self.client.get(&url).query(params))
            .send()
            .await
            .map_err(|e| RetrievalError::Store {
                message: format!("get {table}: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Store {
                message: format!("get {table}: HTTP {status}: {body}"),
            });
        }

        response.json().await.map_err(|e| RetrievalError::Store {
            message: format!("get {table}: invalid response: {e}"),
        })
    }

    fn parse_chunks(value: Value) -> Result<Vec<Chunk>, RetrievalError> {
        serde_json::from_value(value).map_err(|e| RetrievalError::Store {
            message: format!("invalid chunk rows: {e}"),
        })
    }

    fn parse_first_document(value: &Value) -> Option<Document> {
        value
            .as_array()
            .and_then(|rows| rows.first())
            .and_then(|row| serde_json::from_value(row.clone()).ok())
    }
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentStore for PostgrestStore {
    async fn search_by_vector(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
        metadata_filter: Option<&Value>,
    ) -> Result<Vec<Chunk>, RetrievalError> {
        let mut payload = json!({
            "query_embedding": embedding,
            "match_count": limit,
            "match_threshold": threshold,
            "filter_user_id": user_id,
        });
        if let (Some(filter), Some(obj)) = (metadata_filter, payload.as_object_mut()) {
            obj.insert("filter_metadata".to_string(), filter.clone());
        }
        let rows = self.rpc("search_chunks", &payload).await?;
        Self::parse_chunks(rows)
    }

    async fn search_by_keyword(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>, RetrievalError> {
        let payload = json!({
            "query_text": query,
            "match_count": limit,
            "filter_user_id": user_id,
        });
        let rows = self.rpc("search_chunks_keyword", &payload).await?;
        Self::parse_chunks(rows)
    }

    async fn get_document(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> Result<Option<Document>, RetrievalError> {
        let rows = self
            .get_rows(
                "documents",
                &[
                    ("id", format!("eq.{document_id}")),
                    ("user_id", format!("eq.{user_id}")),
                ],
            )
            .await?;
        Ok(Self::parse_first_document(&rows))
    }

    async fn get_document_by_filename(
        &self,
        user_id: &str,
        filename: &str,
    ) -> Result<Option<Document>, RetrievalError> {
        let rows = self
            .get_rows(
                "documents",
                &[
                    ("user_id", format!("eq.{user_id}")),
                    ("filename", format!("eq.{filename}")),
                    ("status", "eq.completed".to_string()),
                    ("order", "created_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(Self::parse_first_document(&rows))
    }

    async fn get_chunks_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<Chunk>, RetrievalError> {
        let rows = self
            .get_rows(
                "chunks",
                &[
                    ("document_id", format!("eq.{document_id}")),
                    ("order", "chunk_index.asc".to_string()),
                    (
                        "select",
                        "id,document_id,content,chunk_index,metadata".to_string(),
                    ),
                ],
            )
            .await?;
        Self::parse_chunks(rows)
    }

    async fn execute_readonly_sql(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<Value, RetrievalError> {
        let url = format!("{}/rest/v1/rpc/execute_readonly_sql", self.base_url);
        let payload = json!({
            "query_text": query,
            "filter_user_id": user_id,
        });
        let response = self
            .auth(self.client.post(&url).json(&payload).timeout(SQL_TIMEOUT))
            .send()
            .await
            .map_err(|e| RetrievalError::Store {
                message: format!("sql execution: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Store {
                message: format!("HTTP {status}: {body}"),
            });
        }

        response.json().await.map_err(|e| RetrievalError::Store {
            message: format!("sql execution: invalid response: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_requires_url() {
        let config = EngineConfig::builder()
            .api_key("k")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = PostgrestStore::new(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_store_requires_service_key() {
        let config = EngineConfig::builder()
            .api_key("k")
            .store_url("http://localhost:54321")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = PostgrestStore::new(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_store_builds_with_full_config() {
        let config = EngineConfig::builder()
            .api_key("k")
            .store_url("http://localhost:54321")
            .store_service_key("service-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(PostgrestStore::new(&config).is_ok());
    }
}
