//! Core data model: chunks, documents, and retrieval results.
//!
//! These types mirror the rows the document store returns, plus the
//! query-time enrichments (similarity, filename) the retrieval pipeline
//! attaches. Chunks are immutable once created and owned by the document
//! they were derived from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A bounded segment of document text stored with its embedding.
///
/// `similarity` is transient: zero at rest, populated per query with a
/// mode-dependent score (cosine similarity, text-search rank, RRF-fused
/// score, or rerank relevance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk identifier.
    pub id: String,
    /// Identifier of the owning document.
    pub document_id: String,
    /// Chunk text content.
    pub content: String,
    /// Sequential position within the owning document.
    #[serde(default)]
    pub chunk_index: usize,
    /// Chunk-level metadata (e.g. `chunk_type`, `image_index`, `image_page`).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Query-time relevance score. Meaning depends on search mode.
    #[serde(default)]
    pub similarity: f64,
    /// Full-text search rank, present only on keyword search results.
    #[serde(default)]
    pub rank: f64,
}

impl Chunk {
    /// Returns the `chunk_type` metadata value, if present.
    #[must_use]
    pub fn chunk_type(&self) -> Option<&str> {
        self.metadata.get("chunk_type").and_then(Value::as_str)
    }

    /// Returns `true` if this chunk is an image-derived description.
    #[must_use]
    pub fn is_image_description(&self) -> bool {
        self.chunk_type() == Some("image_description")
    }

    /// Returns the `image_index` metadata value, if present.
    #[must_use]
    pub fn image_index(&self) -> Option<u64> {
        self.metadata.get("image_index").and_then(Value::as_u64)
    }

    /// Returns the `image_page` metadata value, if present.
    #[must_use]
    pub fn image_page(&self) -> Option<u64> {
        self.metadata.get("image_page").and_then(Value::as_u64)
    }
}

/// A document row as stored by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// Extracted document metadata (title, topics, `images`, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// An image reference recorded in document metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentImage {
    /// Index of the image within the document.
    pub index: u64,
    /// Page the image was extracted from, if known.
    #[serde(default)]
    pub page: Option<u64>,
}

impl Document {
    /// Returns the images recorded in this document's metadata.
    #[must_use]
    pub fn images(&self) -> Vec<DocumentImage> {
        self.metadata
            .get("images")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A chunk enriched at query time with its owning document's filename
/// and a final relevance score.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Filename of the owning document (`"Unknown"` if unresolved).
    pub filename: String,
    /// Final relevance score after fusion/rerank.
    pub similarity: f64,
}

/// A document source surfaced to the caller alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source filename.
    pub filename: String,
    /// Relevance score of the best matching chunk.
    pub similarity: f64,
}

/// A document image selected for display alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Servable URL for the image.
    pub url: String,
    /// Alt text (label plus short description).
    pub alt: String,
    /// Display label (e.g. `"Figure 1"`).
    pub label: String,
    /// Identifier of the owning document.
    pub doc_id: String,
    /// Index of the image within the document.
    pub index: u64,
    /// Page the image was extracted from, if known.
    pub page: Option<u64>,
    /// Filename of the owning document.
    pub source: String,
}
