//! Image discovery for retrieved context.
//!
//! Two strategies, selected by configuration:
//!
//! - image-description chunks matched directly by search, gated by a
//!   similarity ratio against the top result;
//! - images recorded in document metadata, filtered by asking the model
//!   which entries of a numbered list are relevant to the query.

use std::collections::HashSet;

use regex::Regex;
use tracing::{info, warn};

use crate::agent::message::{ChatRequest, system_message, user_message};
use crate::agent::provider::LlmProvider;
use crate::core::{ImageRef, RetrievalResult};
use crate::error::RetrievalError;
use crate::storage::DocumentStore;

/// Characters of the description excerpt carried in alt text.
const EXCERPT_CHARS: usize = 120;

fn image_url(doc_id: &str, index: u64) -> String {
    format!("/api/documents/{doc_id}/images/{index}")
}

/// Short description from an image chunk's content, skipping the header
/// line.
fn description_excerpt(content: &str) -> String {
    content
        .split_once('\n')
        .map(|(_, rest)| rest.trim().chars().take(EXCERPT_CHARS).collect())
        .unwrap_or_default()
}

/// Selects images from image-description chunks in the result set.
///
/// Only chunks whose similarity reaches `min_ratio` of the top result
/// qualify; duplicates per `(document, image index)` are dropped and the
/// output is capped at `max_results`, labelled `Figure 1..N` in result
/// order.
#[must_use]
pub fn collect_image_refs(
    results: &[RetrievalResult],
    min_ratio: f64,
    max_results: usize,
) -> Vec<ImageRef> {
    let Some(top) = results.first() else {
        return Vec::new();
    };
    let min_similarity = top.similarity * min_ratio;

    let mut seen: HashSet<(String, u64)> = HashSet::new();
    let mut refs = Vec::new();
    let mut image_chunks = 0_usize;

    for result in results {
        if !result.chunk.is_image_description() {
            continue;
        }
        image_chunks += 1;
        if result.similarity < min_similarity {
            continue;
        }
        let Some(index) = result.chunk.image_index() else {
            continue;
        };
        let doc_id = result.chunk.document_id.clone();
        if !seen.insert((doc_id.clone(), index)) {
            continue;
        }

        let label = format!("Figure {}", refs.len() + 1);
        let description = description_excerpt(&result.chunk.content);
        let alt = if description.is_empty() {
            label.clone()
        } else {
            format!("{label}: {description}")
        };
        refs.push(ImageRef {
            url: image_url(&doc_id, index),
            alt,
            label,
            doc_id,
            index,
            page: result.chunk.image_page(),
            source: result.filename.clone(),
        });
        if refs.len() >= max_results {
            break;
        }
    }

    if image_chunks > 0 {
        info!(
            found = image_chunks,
            passed = refs.len(),
            min_ratio,
            "filtered image chunks"
        );
    }

    refs
}

/// Discovers images via document metadata and asks the model which are
/// relevant to `query`.
///
/// Walks the distinct documents behind the result set, gathers their
/// recorded images, and presents them to the model as a numbered list.
/// A `none` reply clears the set; a model failure keeps all candidates.
///
/// # Errors
///
/// Returns [`RetrievalError::Store`] if a document lookup fails.
pub async fn filter_document_images(
    provider: &dyn LlmProvider,
    model: &str,
    store: &dyn DocumentStore,
    user_id: &str,
    query: &str,
    results: &[RetrievalResult],
) -> Result<Vec<ImageRef>, RetrievalError> {
    let mut candidates: Vec<ImageRef> = Vec::new();
    let mut seen_docs: HashSet<&str> = HashSet::new();

    for result in results {
        let doc_id = result.chunk.document_id.as_str();
        if doc_id.is_empty() || !seen_docs.insert(doc_id) {
            continue;
        }
        let Some(doc) = store.get_document(doc_id, user_id).await? else {
            continue;
        };
        for image in doc.images() {
            candidates.push(ImageRef {
                url: image_url(doc_id, image.index),
                alt: format!("Image {} from {}", image.index, result.filename),
                label: format!("Image {}", image.index),
                doc_id: doc_id.to_string(),
                index: image.index,
                page: image.page,
                source: result.filename.clone(),
            });
        }
    }

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let image_list = candidates
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.page.map_or_else(
                || format!("{i}: {}", r.alt),
                |page| format!("{i}: {} (page {page})", r.alt),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "The user asked a question about a document. Below is a numbered list of images \
         extracted from that document. Return ONLY the comma-separated numbers of images that \
         are relevant to the user's question. If none are relevant, return \"none\".\n\n\
         Images:\n{image_list}"
    );
    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![system_message(&system), user_message(query)],
        max_tokens: Some(50),
        stream: false,
        tools: Vec::new(),
    };

    let response = match provider.chat(&request).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "image filtering failed, including all images");
            return Ok(candidates);
        }
    };

    let reply = response.content.trim().to_lowercase();
    if reply == "none" {
        return Ok(Vec::new());
    }

    let digits = match Regex::new(r"\d+") {
        Ok(re) => re,
        Err(_) => return Ok(candidates),
    };
    let selected: Vec<usize> = digits
        .find_iter(&reply)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let mut slots: Vec<Option<ImageRef>> = candidates.into_iter().map(Some).collect();
    Ok(selected
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect())
}
