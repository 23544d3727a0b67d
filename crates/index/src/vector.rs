//! Vector similarity and ranking utilities.
//!
//! Both index backends rank through [`rerank`] so they agree on threshold
//! handling and tie-breaks.

use biochat_core::index::{PassageRecord, ScoredPassage};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ, either vector is empty, or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

/// Score every record against `query` and keep the best `k` at or above `threshold`.
///
/// Records whose dimension differs from the query are skipped.
pub fn rank_passages(
    records: &[PassageRecord],
    query: &[f32],
    threshold: f64,
    k: usize,
) -> Vec<ScoredPassage> {
    let scored = records
        .iter()
        .filter(|r| r.embedding.len() == query.len())
        .map(|r| ScoredPassage {
            id: r.id,
            content: r.content.clone(),
            score: cosine_similarity(&r.embedding, query),
        })
        .collect();

    rerank(scored, threshold, k)
}

/// Drop candidates below `threshold`, order best first, keep `k`.
///
/// Exact score ties are ordered by ascending id.
pub fn rerank(mut candidates: Vec<ScoredPassage>, threshold: f64, k: usize) -> Vec<ScoredPassage> {
    candidates.retain(|c| c.score.is_finite() && c.score >= threshold);
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, embedding: Vec<f32>) -> PassageRecord {
        PassageRecord {
            id,
            content: format!("Content for {id}"),
            embedding,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn rank_never_returns_below_threshold() {
        let records = vec![
            record(1, vec![1.0, 0.0]),
            record(2, vec![0.0, 1.0]),
            record(3, vec![0.7, 0.7]),
        ];
        let ranked = rank_passages(&records, &[1.0, 0.0], 0.5, 10);
        assert!(ranked.iter().all(|p| p.score >= 0.5));
        let ids: Vec<i64> = ranked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn rank_empty_store() {
        assert!(rank_passages(&[], &[1.0, 0.0], 0.0, 1).is_empty());
    }

    #[test]
    fn ties_resolve_to_lowest_id() {
        let records = vec![
            record(9, vec![2.0, 0.0]),
            record(4, vec![1.0, 0.0]),
            record(6, vec![3.0, 0.0]),
        ];
        for _ in 0..5 {
            let ranked = rank_passages(&records, &[1.0, 0.0], 0.5, 1);
            assert_eq!(ranked[0].id, 4);
        }
    }

    #[test]
    fn mismatched_dimensions_are_skipped() {
        let records = vec![record(1, vec![1.0, 0.0, 0.0]), record(2, vec![1.0, 0.0])];
        let ranked = rank_passages(&records, &[1.0, 0.0], 0.0, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, 2);
    }

    #[test]
    fn rerank_filters_sorts_and_truncates() {
        let candidates = vec![
            ScoredPassage { id: 5, content: "a".into(), score: 0.6 },
            ScoredPassage { id: 2, content: "b".into(), score: 0.9 },
            ScoredPassage { id: 1, content: "c".into(), score: 0.4 },
            ScoredPassage { id: 3, content: "d".into(), score: 0.9 },
        ];
        let out = rerank(candidates, 0.5, 2);
        let ids: Vec<i64> = out.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
