//! Web search via the Tavily API.
//!
//! Backs the `web_search` tool. Failures are reported as readable text
//! rather than errors, so a search outage degrades to an unhelpful tool
//! result instead of killing the agent loop.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::config::EngineConfig;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Results requested per search.
const MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily-backed web search client.
pub struct WebSearch {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl WebSearch {
    /// Creates a client from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.tavily_api_key.clone(),
        }
    }

    /// Searches the web and formats the results as markdown blocks.
    ///
    /// Returns explanatory text when search is unconfigured, fails, or
    /// finds nothing.
    pub async fn search(&self, query: &str) -> String {
        let Some(api_key) = self.api_key.as_ref() else {
            return "Web search is not configured. Please add a Tavily API key in Settings."
                .to_string();
        };

        let payload = json!({
            "api_key": api_key,
            "query": query,
            "max_results": MAX_RESULTS,
            "include_answer": false,
        });

        let response = match self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&payload)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "web search failed");
                return format!("Web search failed: {e}");
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body, "web search failed");
            return format!("Web search failed: {body}");
        }

        let data: SearchResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "web search response invalid");
                return format!("Web search failed: {e}");
            }
        };

        format_results(&data.results)
    }
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No web results found.".to_string();
    }
    results
        .iter()
        .map(|r| format!("**{}**\nURL: {}\n{}", r.title, r.url, r.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

impl std::fmt::Debug for WebSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearch")
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_returns_message() {
        let config = EngineConfig::builder()
            .api_key("k")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let search = WebSearch::new(&config);
        let result = search.search("anything").await;
        assert!(result.starts_with("Web search is not configured"));
    }

    #[test]
    fn test_format_results() {
        let results = vec![
            SearchResult {
                title: "Rust 1.88 released".to_string(),
                url: "https://example.com/rust".to_string(),
                content: "The release adds...".to_string(),
            },
            SearchResult {
                title: "Second".to_string(),
                url: "https://example.com/2".to_string(),
                content: "More".to_string(),
            },
        ];
        let text = format_results(&results);
        assert!(text.starts_with("**Rust 1.88 released**\nURL: https://example.com/rust\n"));
        assert!(text.contains("\n\n---\n\n**Second**"));
    }

    #[test]
    fn test_format_no_results() {
        assert_eq!(format_results(&[]), "No web results found.");
    }

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let parsed: SearchResponse =
            serde_json::from_str(r#"{"results":[{"title":"t"}]}"#).unwrap_or_else(|_| {
                SearchResponse {
                    results: Vec::new(),
                }
            });
        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.results[0].url.is_empty());
    }
}
