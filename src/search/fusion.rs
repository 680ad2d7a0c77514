//! Reciprocal Rank Fusion for hybrid search.
//!
//! Combines the ranked output of vector and keyword search into a single
//! list: `score(c) = alpha * 1/(k + vector_rank) + (1-alpha) * 1/(k + keyword_rank)`,
//! with a missing-list term contributing zero. Chunks appearing in both
//! lists get naturally boosted.

use std::collections::HashMap;

use crate::core::Chunk;

/// Fuses vector and keyword result lists by reciprocal rank.
///
/// `alpha` weights the vector list and is clamped to `[0, 1]`; ranks start
/// at 1. Deduplicates by chunk id, keeping the first-seen chunk data, and
/// returns the fused list sorted by descending score. The sort is stable,
/// so ties preserve insertion order (vector results first).
#[must_use]
pub fn reciprocal_rank_fusion(
    vector_results: Vec<Chunk>,
    keyword_results: Vec<Chunk>,
    alpha: f64,
    k: u32,
) -> Vec<Chunk> {
    let alpha = alpha.clamp(0.0, 1.0);
    let k = f64::from(k);

    let mut fused: Vec<Chunk> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let mut accumulate = |results: Vec<Chunk>, weight: f64| {
        for (rank, mut chunk) in results.into_iter().enumerate() {
            let contribution = weight * (1.0 / (k + (rank + 1) as f64));
            if let Some(&i) = index.get(&chunk.id) {
                if let Some(existing) = fused.get_mut(i) {
                    existing.similarity += contribution;
                }
            } else {
                chunk.similarity = contribution;
                index.insert(chunk.id.clone(), fused.len());
                fused.push(chunk);
            }
        }
    };

    accumulate(vector_results, alpha);
    accumulate(keyword_results, 1.0 - alpha);

    fused.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "d1".to_string(),
            content: format!("content {id}"),
            chunk_index: 0,
            metadata: serde_json::Map::new(),
            similarity: 0.0,
            rank: 0.0,
        }
    }

    #[test]
    fn test_rrf_known_scores() {
        // Vector ranks: A=1, B=2. Keyword ranks: B=1, C=2. alpha=0.5, k=60.
        let fused = reciprocal_rank_fusion(
            vec![chunk("A"), chunk("B")],
            vec![chunk("B"), chunk("C")],
            0.5,
            60,
        );

        let ids: Vec<&str> = fused.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);

        let score = |id: &str| {
            fused
                .iter()
                .find(|c| c.id == id)
                .map_or(0.0, |c| c.similarity)
        };
        assert!((score("A") - 0.5 / 61.0).abs() < 1e-12);
        assert!((score("B") - (0.5 / 62.0 + 0.5 / 61.0)).abs() < 1e-12);
        assert!((score("C") - 0.5 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn test_rrf_alpha_clamped_high() {
        let over = reciprocal_rank_fusion(vec![chunk("A")], vec![chunk("B")], 1.5, 60);
        let exact = reciprocal_rank_fusion(vec![chunk("A")], vec![chunk("B")], 1.0, 60);
        for (o, e) in over.iter().zip(exact.iter()) {
            assert_eq!(o.id, e.id);
            assert!((o.similarity - e.similarity).abs() < 1e-12);
        }
        // alpha=1 means the keyword-only chunk contributes nothing.
        assert!(
            (over
                .iter()
                .find(|c| c.id == "B")
                .map_or(1.0, |c| c.similarity))
            .abs()
                < 1e-12
        );
    }

    #[test]
    fn test_rrf_alpha_clamped_low() {
        let under = reciprocal_rank_fusion(vec![chunk("A")], vec![chunk("B")], -2.0, 60);
        let exact = reciprocal_rank_fusion(vec![chunk("A")], vec![chunk("B")], 0.0, 60);
        for (u, e) in under.iter().zip(exact.iter()) {
            assert_eq!(u.id, e.id);
            assert!((u.similarity - e.similarity).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rrf_deduplicates() {
        let fused = reciprocal_rank_fusion(
            vec![chunk("A"), chunk("B")],
            vec![chunk("A"), chunk("B")],
            0.5,
            60,
        );
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_rrf_empty_lists() {
        let fused = reciprocal_rank_fusion(Vec::new(), Vec::new(), 0.5, 60);
        assert!(fused.is_empty());
    }

    #[test]
    fn test_rrf_single_list() {
        let fused = reciprocal_rank_fusion(vec![chunk("A"), chunk("B")], Vec::new(), 0.5, 60);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].id, "A");
        assert!(fused[0].similarity > fused[1].similarity);
    }
}
