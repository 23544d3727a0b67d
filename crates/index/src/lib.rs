//! Similarity index implementations for biochat.
//!
//! All backends implement the `biochat_core::SimilarityIndex` trait.

pub mod in_memory;
pub mod supabase;
pub mod vector;

use std::sync::Arc;
use std::time::Duration;

use biochat_config::{AppConfig, IndexBackend};
use biochat_core::error::IndexError;
use biochat_core::index::SimilarityIndex;

pub use in_memory::InMemoryIndex;
pub use supabase::SupabaseIndex;
pub use vector::{cosine_similarity, rank_passages, rerank};

/// Build the configured index backend.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn SimilarityIndex>, IndexError> {
    let cfg = &config.index;
    match cfg.backend {
        IndexBackend::Supabase => {
            let url = cfg
                .url
                .clone()
                .ok_or_else(|| IndexError::NotConfigured("SUPABASE_URL is not set".into()))?;
            let api_key = cfg
                .api_key
                .clone()
                .ok_or_else(|| IndexError::NotConfigured("SUPABASE_API_KEY is not set".into()))?;
            let index = SupabaseIndex::new(
                url,
                api_key,
                cfg.rpc_function.clone(),
                Duration::from_secs(cfg.timeout_secs),
            )?;
            Ok(Arc::new(index))
        }
        IndexBackend::Memory => {
            let index = match &cfg.passages_file {
                Some(path) => InMemoryIndex::from_json_file(path)?,
                None => InMemoryIndex::default(),
            };
            Ok(Arc::new(index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supabase_backend_needs_credentials() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, IndexError::NotConfigured(_)));
    }

    #[test]
    fn builds_each_backend() {
        let mut config = AppConfig::default();
        config.index.url = Some("https://proj.supabase.co".into());
        config.index.api_key = Some("key".into());
        assert_eq!(build_from_config(&config).unwrap().name(), "supabase");

        config.index.backend = IndexBackend::Memory;
        assert_eq!(build_from_config(&config).unwrap().name(), "memory");
    }
}
