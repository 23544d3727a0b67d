//! Embedder — turns visitor text into a query vector.

use std::sync::Arc;
use std::time::Duration;

use biochat_core::error::{Error, ProviderError, Result};
use biochat_core::provider::{EmbeddingRequest, Provider};
use tracing::{debug, warn};

use crate::context::token;

pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
    /// Expected vector length, when pinned by configuration.
    dimensions: Option<usize>,
    max_input_tokens: usize,
    timeout: Duration,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            dimensions: None,
            max_input_tokens: 8191,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_max_input_tokens(mut self, max: usize) -> Self {
        self.max_input_tokens = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed one piece of text. No retries.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::EmbeddingUnavailable(ProviderError::InvalidInput(
                "cannot embed empty text".into(),
            )));
        }

        let estimated = token::estimate_tokens(text);
        if estimated > self.max_input_tokens {
            return Err(Error::EmbeddingUnavailable(ProviderError::InvalidInput(format!(
                "input of ~{estimated} tokens exceeds the {} token limit",
                self.max_input_tokens
            ))));
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        debug!(model = %self.model, tokens = estimated, "Embedding text");

        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Embedding timed out");
                Error::EmbeddingUnavailable(ProviderError::Timeout(format!(
                    "no embedding after {}s",
                    self.timeout.as_secs()
                )))
            })?
            .map_err(Error::EmbeddingUnavailable)?;

        if let Some(expected) = self.dimensions {
            if response.embedding.len() != expected {
                return Err(Error::config(format!(
                    "embedding model '{}' returned {} dimensions, configured for {expected}",
                    self.model,
                    response.embedding.len()
                )));
            }
        }

        Ok(response.embedding)
    }
}
