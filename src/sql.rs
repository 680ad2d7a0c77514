//! Text-to-SQL over document metadata.
//!
//! Backs the `text_to_sql` tool: generates a PostgreSQL `SELECT` from a
//! natural-language question, validates it against a keyword denylist,
//! executes it read-only through the document store, and formats the
//! rows. Like the other tools, failures come back as readable text.

use std::sync::Arc;

use tracing::error;

use crate::agent::message::{ChatRequest, user_message};
use crate::agent::provider::LlmProvider;
use crate::storage::DocumentStore;

/// Rows beyond this count are dropped from the formatted output.
const MAX_ROWS: usize = 50;

/// Statement keywords that disqualify a generated query.
const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
];

const SCHEMA_DESCRIPTION: &str = "You have access to a PostgreSQL database with these tables:

TABLE documents (
  id UUID PRIMARY KEY,
  user_id UUID NOT NULL,
  filename TEXT NOT NULL,
  file_type TEXT,             -- MIME type e.g. 'application/pdf'
  file_size BIGINT,           -- bytes
  status TEXT,                -- 'pending', 'processing', 'completed', 'failed'
  chunk_count INTEGER DEFAULT 0,
  content_hash TEXT,
  metadata JSONB,             -- extracted metadata with keys: title, summary, topics (text[]), document_type, language, entities (object[])
  created_at TIMESTAMPTZ,
  updated_at TIMESTAMPTZ
)

TABLE chunks (
  id UUID PRIMARY KEY,
  document_id UUID REFERENCES documents(id) ON DELETE CASCADE,
  content TEXT NOT NULL,
  chunk_index INTEGER,
  metadata JSONB,             -- chunk-level metadata, may include: page, section, topics
  embedding vector(1536),
  created_at TIMESTAMPTZ
)

IMPORTANT:
- Always filter by user_id = '{user_id}' to only access the current user's data.
- Use JSONB operators: metadata->>'key' for text, metadata->'key' for nested JSON, metadata @> '{...}'::jsonb for containment.
- For arrays inside JSONB (like topics), use jsonb_array_elements_text(metadata->'topics').
- Return only SELECT statements. No INSERT, UPDATE, DELETE, DROP, ALTER, CREATE, or TRUNCATE.
";

/// Generates and executes read-only SQL from natural language.
pub struct SqlTool {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn DocumentStore>,
    model: String,
}

impl SqlTool {
    /// Creates the tool over the given provider and store.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, store: Arc<dyn DocumentStore>, model: &str) -> Self {
        Self {
            provider,
            store,
            model: model.to_string(),
        }
    }

    /// Answers `question` by generating, validating, and executing SQL.
    ///
    /// The returned string always includes the generated query so the
    /// model can reason about what was actually run.
    pub async fn execute(&self, question: &str, user_id: &str) -> String {
        let schema = SCHEMA_DESCRIPTION.replace("{user_id}", user_id);
        let prompt = format!(
            "{schema}\n\nGenerate a single PostgreSQL SELECT query that answers the following \
             question. Return ONLY the SQL query, no explanation, no markdown code fences.\n\n\
             Question: {question}"
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![user_message(&prompt)],
            max_tokens: Some(500),
            stream: false,
            tools: Vec::new(),
        };
        let sql = match self.provider.chat(&request).await {
            Ok(response) => strip_fences(response.content.trim()),
            Err(e) => {
                error!(error = %e, "SQL generation failed");
                return format!("Failed to generate SQL query: {e}");
            }
        };

        if let Some(reason) = validate_query(&sql) {
            return format!("Generated query was rejected: {reason}\nQuery: {sql}");
        }

        let rows = match self.store.execute_readonly_sql(&sql, user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "SQL execution failed");
                return format!("SQL execution failed: {e}");
            }
        };

        format_rows(&sql, rows)
    }
}

impl std::fmt::Debug for SqlTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlTool")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Removes markdown code fences from a generated query.
fn strip_fences(sql: &str) -> String {
    if !sql.starts_with("```") {
        return sql.to_string();
    }
    sql.lines()
        .filter(|line| !line.starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Checks that the query is a plain `SELECT` with no mutating keywords.
/// Returns the rejection reason, or `None` when the query is acceptable.
fn validate_query(sql: &str) -> Option<String> {
    let stripped = sql.trim().trim_end_matches(';').trim();
    let upper = stripped.to_uppercase();
    if !upper.starts_with("SELECT") {
        return Some("Only SELECT queries are allowed.".to_string());
    }

    // Word-boundary match so column names like "created_at" pass.
    let padded = format!(" {upper} ");
    for keyword in FORBIDDEN_KEYWORDS {
        if padded.contains(&format!(" {keyword} ")) {
            return Some(format!("Forbidden keyword: {keyword}"));
        }
    }
    None
}

fn format_rows(sql: &str, rows: serde_json::Value) -> String {
    let rows = rows.as_array().cloned().unwrap_or_default();
    if rows.is_empty() {
        return format!("Query: {sql}\n\nNo results found.");
    }

    let truncated = rows.len() > MAX_ROWS;
    let shown: Vec<_> = rows.into_iter().take(MAX_ROWS).collect();
    let marker = if truncated { "+" } else { "" };
    let body = serde_json::to_string_pretty(&shown)
        .unwrap_or_else(|_| "<unprintable rows>".to_string());
    format!(
        "Query: {sql}\n\nResults ({}{marker} rows):\n{body}",
        shown.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_select() {
        assert!(validate_query("SELECT count(*) FROM documents;").is_none());
        assert!(validate_query("  select filename from documents  ").is_none());
    }

    #[test]
    fn test_validate_rejects_non_select() {
        let reason = validate_query("WITH x AS (SELECT 1) SELECT * FROM x");
        assert_eq!(reason, Some("Only SELECT queries are allowed.".to_string()));
    }

    #[test]
    fn test_validate_rejects_forbidden_keyword() {
        let reason = validate_query("SELECT 1; DROP TABLE documents");
        assert!(reason.is_some());
    }

    #[test]
    fn test_validate_allows_keyword_substrings() {
        // "created_at" contains CREATE but is not the keyword itself.
        assert!(validate_query("SELECT created_at FROM documents").is_none());
    }

    #[test]
    fn test_strip_fences() {
        let fenced = "```sql\nSELECT 1\n```";
        assert_eq!(strip_fences(fenced), "SELECT 1");
        assert_eq!(strip_fences("SELECT 2"), "SELECT 2");
    }

    #[test]
    fn test_format_rows_empty() {
        let out = format_rows("SELECT 1", json!([]));
        assert!(out.ends_with("No results found."));
        assert!(out.starts_with("Query: SELECT 1"));
    }

    #[test]
    fn test_format_rows_counts() {
        let out = format_rows("SELECT 1", json!([{"n": 1}, {"n": 2}]));
        assert!(out.contains("Results (2 rows):"));
    }

    #[test]
    fn test_format_rows_truncates() {
        let rows: Vec<_> = (0..60).map(|i| json!({"n": i})).collect();
        let out = format_rows("SELECT n", serde_json::Value::Array(rows));
        assert!(out.contains("Results (50+ rows):"));
        assert!(!out.contains("\"n\": 55"));
    }
}
