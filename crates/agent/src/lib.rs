//! The request pipeline for biochat.
//!
//! Every visitor message follows the same path:
//!
//! 1. **Embed** the message into a query vector
//! 2. **Retrieve** the closest stored passage above the threshold
//! 3. **Assemble** persona, visitor facts, history, and `Context/Question` turn
//! 4. **Generate** one reply, or the fixed apology on failure
//! 5. **Record** the exchange in the visitor's session
//!
//! Per-session state lives in the [`SessionStore`]; requests for one session
//! are serialized by that session's mutex.

pub mod context;
pub mod embedder;
pub mod generator;
pub mod pipeline;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use context::{
    AssembledPrompt, AssemblyMetadata, DropInfo, HistoryBudget, LayerStats, PromptAssembler,
};
pub use embedder::Embedder;
pub use generator::{APOLOGY, Generator};
pub use pipeline::{ChatPipeline, PipelineStage, RetrievalSettings};
pub use session::{SessionHandle, SessionStore};
