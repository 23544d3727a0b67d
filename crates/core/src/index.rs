//! Similarity index trait — nearest-passage lookup over stored embeddings.
//!
//! Passages are written by an offline ingestion job; the index is read-only
//! to this service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// One stored unit of biographical text with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub id: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A passage scored against a query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub id: i64,
    pub content: String,
    /// Cosine similarity in [-1, 1]
    pub score: f64,
}

/// Outcome of a nearest-passage lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    Match { id: i64, content: String, score: f64 },
    /// Nothing scored at or above the threshold, or the store is empty.
    NoMatch,
}

impl MatchResult {
    /// Take the best candidate from a list already ranked best-first.
    pub fn from_ranked(ranked: Vec<ScoredPassage>) -> Self {
        match ranked.into_iter().next() {
            Some(best) => Self::Match {
                id: best.id,
                content: best.content,
                score: best.score,
            },
            None => Self::NoMatch,
        }
    }

    /// Passage text, empty on no match.
    pub fn content(&self) -> &str {
        match self {
            Self::Match { content, .. } => content,
            Self::NoMatch => "",
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }
}

/// The core SimilarityIndex trait.
///
/// Implementations: in-memory (seed file or tests), Supabase RPC.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// The backend name (e.g., "memory", "supabase").
    fn name(&self) -> &str;

    /// Up to `k` passages scoring at least `threshold`, best first.
    ///
    /// Exact score ties are ordered by ascending id.
    async fn search(
        &self,
        query: &[f32],
        threshold: f64,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, IndexError>;

    /// The single closest passage at or above `threshold`.
    async fn find_nearest(
        &self,
        query: &[f32],
        threshold: f64,
        k: usize,
    ) -> Result<MatchResult, IndexError> {
        let ranked = self.search(query, threshold, k.max(1)).await?;
        Ok(MatchResult::from_ranked(ranked))
    }
}
