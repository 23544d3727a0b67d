//! Error types for the biochat domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level [`Error`]
//! carries the request-level taxonomy; backends report through their own
//! bounded-context enums ([`ProviderError`], [`IndexError`]).

use thiserror::Error;

/// The top-level error type for all biochat operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request fields. User-correctable.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(#[source] ProviderError),

    #[error("Similarity index unavailable: {0}")]
    IndexUnavailable(#[source] IndexError),

    #[error("Generation failed: {0}")]
    GenerationFailed(#[source] ProviderError),

    /// Internal invariant violation. Fatal to the session.
    #[error("Conversation state corrupt: {0}")]
    StateCorrupt(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], used for logging and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    EmbeddingUnavailable,
    IndexUnavailable,
    GenerationFailed,
    StateCorrupt,
    Config,
    Serialization,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputValidation(_) => ErrorKind::InputValidation,
            Self::EmbeddingUnavailable(_) => ErrorKind::EmbeddingUnavailable,
            Self::IndexUnavailable(_) => ErrorKind::IndexUnavailable,
            Self::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Self::StateCorrupt(_) => ErrorKind::StateCorrupt,
            Self::Config { .. } => ErrorKind::Config,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InputValidation(_))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Input rejected: {0}")]
    InvalidInput(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Vector store unreachable: {0}")]
    Unreachable(String),

    #[error("Query failed: {message} (status: {status_code})")]
    QueryFailed { status_code: u16, message: String },

    #[error("Malformed rows: {0}")]
    MalformedRows(String),

    #[error("Query timed out after {0}s")]
    Timeout(u64),

    #[error("Index not configured: {0}")]
    NotConfigured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::GenerationFailed(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
        assert_eq!(err.kind(), ErrorKind::GenerationFailed);
    }

    #[test]
    fn only_input_validation_is_client_error() {
        assert!(Error::InputValidation("message is required".into()).is_client_error());
        assert!(!Error::IndexUnavailable(IndexError::Timeout(10)).is_client_error());
        assert!(!Error::StateCorrupt("assistant turn without question".into()).is_client_error());
    }

    #[test]
    fn index_error_kind() {
        let err = Error::IndexUnavailable(IndexError::Unreachable("connection refused".into()));
        assert_eq!(err.kind(), ErrorKind::IndexUnavailable);
        assert!(err.to_string().contains("connection refused"));
    }
}
