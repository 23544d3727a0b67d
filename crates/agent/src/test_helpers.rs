//! Shared test helpers: scripted provider and fixed index.

use async_trait::async_trait;
use biochat_core::error::{IndexError, ProviderError};
use biochat_core::index::{ScoredPassage, SimilarityIndex};
use biochat_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A provider that replies from a script and embeds deterministically.
///
/// Each call to `complete` pops the next scripted outcome; once the script
/// runs out it answers with [`ScriptedProvider::DEFAULT_REPLY`].
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    embed_calls: Arc<AtomicUsize>,
    fail_embeddings: bool,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub const DIMENSIONS: usize = 8;
    pub const DEFAULT_REPLY: &'static str = "scripted reply";

    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            fail_embeddings: false,
            delay: None,
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        let p = Self::new();
        {
            let mut queue = p.replies.lock().unwrap();
            queue.extend(replies.iter().map(|r| Ok(r.to_string())));
        }
        p
    }

    /// Queue a generation failure.
    pub fn then_fail(self, error: ProviderError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    /// Sleep before every call; pair with a paused tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn embed_calls(&self) -> Arc<AtomicUsize> {
        self.embed_calls.clone()
    }

    /// Every completion request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Deterministic bag-of-bytes vector for `text`.
    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; Self::DIMENSIONS];
        v[0] = 1.0;
        for b in text.bytes() {
            v[b as usize % Self::DIMENSIONS] += 1.0;
        }
        v
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.pause().await;
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        let next = self.replies.lock().unwrap().pop_front();
        let content = match next {
            Some(outcome) => outcome?,
            None => Self::DEFAULT_REPLY.to_string(),
        };
        Ok(ProviderResponse {
            content,
            model,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.pause().await;
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embeddings {
            return Err(ProviderError::Network("connection refused".into()));
        }
        Ok(EmbeddingResponse {
            embedding: Self::vector_for(&request.input),
            model: request.model,
            usage: None,
        })
    }
}

/// An index that always returns the same outcome.
pub struct FixedIndex {
    outcome: Result<Vec<ScoredPassage>, IndexError>,
    delay: Option<Duration>,
    queries: AtomicUsize,
}

impl FixedIndex {
    pub fn passage(id: i64, content: &str) -> Self {
        Self {
            outcome: Ok(vec![ScoredPassage {
                id,
                content: content.into(),
                score: 0.9,
            }]),
            delay: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            outcome: Ok(Vec::new()),
            delay: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: IndexError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimilarityIndex for FixedIndex {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(
        &self,
        _query: &[f32],
        threshold: f64,
        k: usize,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        let hits = self.outcome.clone()?;
        Ok(hits
            .into_iter()
            .filter(|p| p.score >= threshold)
            .take(k)
            .collect())
    }
}
