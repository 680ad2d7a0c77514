//! Tool type definitions for the agent loop.
//!
//! Provides provider-agnostic types for tool definitions and calls, the
//! [`ToolKind`] enum that drives dispatch in the executor, and the
//! [`ToolSet`] assembled from engine configuration.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::EngineConfig;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must round-trip through [`ToolKind::from_name`]).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The tools the agent loop can dispatch.
///
/// Model-proposed names are mapped through [`ToolKind::from_name`]; an
/// unrecognized name never reaches execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Hybrid search over the user's documents.
    RetrieveDocuments,
    /// Natural-language question answered via generated read-only SQL
    /// over document metadata.
    TextToSql,
    /// Live web search.
    WebSearch,
    /// Whole-document analysis via a recursive sub-agent.
    AnalyzeDocument,
}

impl ToolKind {
    /// Maps a model-proposed tool name to a kind, or `None` for unknown
    /// names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "retrieve_documents" => Some(Self::RetrieveDocuments),
            "text_to_sql" => Some(Self::TextToSql),
            "web_search" => Some(Self::WebSearch),
            "analyze_document" => Some(Self::AnalyzeDocument),
            _ => None,
        }
    }

    /// The wire name of this tool.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RetrieveDocuments => "retrieve_documents",
            Self::TextToSql => "text_to_sql",
            Self::WebSearch => "web_search",
            Self::AnalyzeDocument => "analyze_document",
        }
    }
}

/// The set of tool definitions offered to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Assembles the enabled tools from configuration.
    ///
    /// Document retrieval, text-to-SQL, and document analysis are always
    /// available; web search only when a Tavily API key is configured.
    #[must_use]
    pub fn enabled(config: &EngineConfig) -> Self {
        let mut definitions = vec![
            def_retrieve_documents(),
            def_text_to_sql(),
            def_analyze_document(),
        ];
        if config.tavily_api_key.is_some() {
            definitions.push(def_web_search());
        }
        Self { definitions }
    }
}

// ---------------------------------------------------------------------------
// Tool schema definitions
// ---------------------------------------------------------------------------

/// Defines the `retrieve_documents` tool.
fn def_retrieve_documents() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::RetrieveDocuments.name().to_string(),
        description: "Search the user's uploaded documents for relevant information. ALWAYS use \
                      this tool when the user asks ANY question that could relate to their \
                      documents. Do not skip retrieval and answer from your own knowledge. You \
                      can call this tool multiple times with different queries to find more \
                      information. Use specific keywords and noun phrases rather than full \
                      conversational questions as the query."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query using specific keywords or noun phrases \
                                    (e.g. 'pricing tiers enterprise' instead of 'what does it \
                                    say about pricing?'). Be specific and focused."
                }
            },
            "required": ["query"]
        }),
    }
}

/// Defines the `text_to_sql` tool.
fn def_text_to_sql() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::TextToSql.name().to_string(),
        description: "Query metadata about the user's documents using SQL. Use this for \
                      questions about document counts, types, topics, upload dates, or other \
                      aggregate/metadata questions. Do NOT use this for searching document \
                      content."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "Natural language question about document metadata (e.g. \
                                    'how many documents have I uploaded?', 'what topics are \
                                    covered?')."
                }
            },
            "required": ["question"]
        }),
    }
}

/// Defines the `analyze_document` tool.
fn def_analyze_document() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::AnalyzeDocument.name().to_string(),
        description: "Analyze an entire document in depth. Use this for questions that require \
                      understanding the full document such as summarization, identifying key \
                      themes, structural analysis, or comprehensive review. Do NOT use this for \
                      simple fact-finding, use retrieve_documents instead. Requires the exact \
                      filename."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "The exact filename of the document to analyze (e.g. 'report.pdf')."
                },
                "question": {
                    "type": "string",
                    "description": "The question or analysis task to perform on the document."
                }
            },
            "required": ["filename", "question"]
        }),
    }
}

/// Defines the `web_search` tool.
fn def_web_search() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::WebSearch.name().to_string(),
        description: "Search the web for current information. Use this when the user asks about \
                      recent events, needs up-to-date information, or asks about topics not \
                      covered in their uploaded documents."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The web search query."
                }
            },
            "required": ["query"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tavily: Option<&str>) -> EngineConfig {
        let mut builder = EngineConfig::builder().api_key("test");
        if let Some(key) = tavily {
            builder = builder.tavily_api_key(key);
        }
        builder.build().unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_toolset_without_web_search() {
        let ts = ToolSet::enabled(&config(None));
        assert_eq!(ts.len(), 3);
        let names: Vec<&str> = ts.definitions().iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"retrieve_documents"));
        assert!(names.contains(&"text_to_sql"));
        assert!(names.contains(&"analyze_document"));
        assert!(!names.contains(&"web_search"));
    }

    #[test]
    fn test_toolset_with_web_search() {
        let ts = ToolSet::enabled(&config(Some("tvly-key")));
        assert_eq!(ts.len(), 4);
        let names: Vec<&str> = ts.definitions().iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"web_search"));
    }

    #[test]
    fn test_tool_kind_round_trips() {
        for kind in [
            ToolKind::RetrieveDocuments,
            ToolKind::TextToSql,
            ToolKind::WebSearch,
            ToolKind::AnalyzeDocument,
        ] {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_tool_kind_unknown_name() {
        assert_eq!(ToolKind::from_name("delete_everything"), None);
        assert_eq!(ToolKind::from_name(""), None);
    }

    #[test]
    fn test_tool_call_serialization() {
        let call = ToolCall {
            id: "call_123".to_string(),
            name: "retrieve_documents".to_string(),
            arguments: r#"{"query":"pricing tiers"}"#.to_string(),
        };
        let json = serde_json::to_string(&call).unwrap_or_default();
        assert!(json.contains("call_123"));
        assert!(json.contains("retrieve_documents"));
    }

    #[test]
    fn test_all_definitions_have_valid_schemas() {
        let ts = ToolSet::enabled(&config(Some("tvly-key")));
        for def in ts.definitions() {
            assert!(!def.name.is_empty());
            assert!(!def.description.is_empty());
            assert!(def.parameters.is_object());
            assert_eq!(def.parameters["type"], "object");
            assert!(ToolKind::from_name(&def.name).is_some());
        }
    }
}
