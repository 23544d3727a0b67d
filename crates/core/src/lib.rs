//! # biochat core
//!
//! Domain types, traits, and error definitions for the biochat profile
//! assistant. This crate has **no HTTP or runtime dependencies**: it defines
//! the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each external backend (generation, embeddings, vector store) is a trait
//! here. Implementations live in their own crates, which keeps the request
//! pipeline testable with scripted stand-ins.

pub mod conversation;
pub mod error;
pub mod index;
pub mod message;
pub mod persona;
pub mod provider;
pub mod visitor;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationState, SessionId};
pub use error::{Error, ErrorKind, IndexError, ProviderError, Result};
pub use index::{MatchResult, PassageRecord, ScoredPassage, SimilarityIndex};
pub use message::{Role, Turn};
pub use persona::Persona;
pub use provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, SamplingParams};
pub use visitor::{NameSignal, VisitorIdentity};
