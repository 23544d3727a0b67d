//! LLM provider implementations for biochat.
//!
//! All providers implement the `biochat_core::Provider` trait. One hosted
//! backend serves both chat completions and embeddings.

pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use biochat_config::AppConfig;
use biochat_core::error::ProviderError;
use biochat_core::provider::{Provider, SamplingParams};

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
///
/// The HTTP client timeout is the larger of the generation and embedding
/// budgets; callers bound each operation more tightly on their side.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .generation
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::NotConfigured("no API key configured".into()))?;

    let base_url = config.generation.api_url.trim_end_matches('/');
    let name = if base_url == openai_compat::OPENAI_BASE_URL {
        "openai"
    } else {
        "openai-compat"
    };

    let timeout_secs = config
        .generation
        .timeout_secs
        .max(config.embedding.timeout_secs);

    let provider = OpenAiCompatProvider::new(
        name,
        base_url,
        api_key,
        Duration::from_secs(timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

/// Sampling parameters from the generation config.
pub fn sampling_from_config(config: &AppConfig) -> SamplingParams {
    let g = &config.generation;
    SamplingParams {
        temperature: g.temperature,
        top_p: g.top_p,
        frequency_penalty: g.frequency_penalty,
        presence_penalty: g.presence_penalty,
        max_tokens: g.max_tokens,
    }
}
