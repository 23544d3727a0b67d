//! In-memory index — brute-force ranking over passages held in a Vec.
//!
//! Loaded from a JSON seed file of precomputed `{id, content, embedding}`
//! rows, or built directly in tests.

use async_trait::async_trait;
use biochat_core::error::IndexError;
use biochat_core::index::{PassageRecord, ScoredPassage, SimilarityIndex};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::vector::rank_passages;

pub struct InMemoryIndex {
    records: Arc<RwLock<Vec<PassageRecord>>>,
}

impl InMemoryIndex {
    pub fn new(records: Vec<PassageRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Load passages from a JSON array of `{id, content, embedding}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IndexError::NotConfigured(format!("cannot read {}: {e}", path.display()))
        })?;
        let records: Vec<PassageRecord> = serde_json::from_str(&raw).map_err(|e| {
            IndexError::MalformedRows(format!("{}: {e}", path.display()))
        })?;

        info!(path = %path.display(), passages = records.len(), "Loaded passages");
        Ok(Self::new(records))
    }

    /// Add a passage; used to seed indexes in tests and local runs.
    pub async fn insert(&self, record: PassageRecord) {
        self.records.write().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(
        &self,
        query: &[f32],
        threshold: f64,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        let records = self.records.read().await;
        let ranked = rank_passages(&records, query, threshold, k);
        debug!(candidates = records.len(), hits = ranked.len(), "In-memory search");
        Ok(ranked)
    }
}
