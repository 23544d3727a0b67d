//! Prompt assembly.
//!
//! Builds the exact ordered turn list sent to the generator:
//!
//! | Position | Source | Trim Strategy |
//! |----------|--------|---------------|
//! | System | Persona + visitor facts | Never trimmed |
//! | Demonstration | Persona few-shot pair | Included only when enabled |
//! | History | Session turns | Oldest visitor/assistant pairs dropped |
//! | Question | Retrieved passage + visitor message | Never trimmed |

pub mod assembler;
pub mod token;

pub use assembler::{
    AssembledPrompt, AssemblyMetadata, DropInfo, HistoryBudget, LayerStats, PromptAssembler,
};
