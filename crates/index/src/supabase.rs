//! Supabase index — similarity search through a PostgREST RPC function.
//!
//! Calls `POST {url}/rest/v1/rpc/{function}` with
//! `{query_embedding, match_threshold, match_count}` and expects rows of
//! `{id, content, similarity}`. The RPC is asked for at least
//! [`CANDIDATE_POOL`] rows so that tied rows cut by the server's limit are
//! still seen, then rows are re-ranked locally with the same rules as the
//! in-memory backend and truncated to `k`.

use std::time::Duration;

use async_trait::async_trait;
use biochat_core::error::IndexError;
use biochat_core::index::{ScoredPassage, SimilarityIndex};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::vector::rerank;

/// Default RPC function name.
pub const DEFAULT_RPC_FUNCTION: &str = "match_documents";

/// Minimum number of rows requested from the RPC.
pub const CANDIDATE_POOL: usize = 8;

pub struct SupabaseIndex {
    base_url: String,
    api_key: String,
    function: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl SupabaseIndex {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        function: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            function: function.into(),
            timeout,
            client,
        })
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, self.function)
    }
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    id: i64,
    content: String,
    similarity: f64,
}

#[async_trait]
impl SimilarityIndex for SupabaseIndex {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn search(
        &self,
        query: &[f32],
        threshold: f64,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        let match_count = k.max(CANDIDATE_POOL);
        let body = serde_json::json!({
            "query_embedding": query,
            "match_threshold": threshold,
            "match_count": match_count,
        });

        debug!(function = %self.function, dims = query.len(), k, match_count, "Calling match RPC");

        let response = self
            .client
            .post(self.rpc_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IndexError::Timeout(self.timeout.as_secs())
                } else {
                    IndexError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Match RPC failed");
            return Err(IndexError::QueryFailed {
                status_code: status,
                message,
            });
        }

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .map_err(|e| IndexError::MalformedRows(e.to_string()))?;

        let candidates = rows
            .into_iter()
            .map(|r| ScoredPassage {
                id: r.id,
                content: r.content,
                score: r.similarity,
            })
            .collect();

        Ok(rerank(candidates, threshold, k))
    }
}
