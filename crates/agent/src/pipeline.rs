//! The request pipeline — embed, retrieve, assemble, generate.
//!
//! # Flow
//!
//! 1. **Received**: validate the visitor message
//! 2. **Embedding**: text to query vector (skipped when the caller sends one)
//! 3. **Retrieving**: nearest passage above the threshold, or no match
//! 4. **Assembling**: lock the session, remember the visitor's name, build the prompt
//! 5. **Generating**: reply (or apology) appended to the session
//! 6. **Responded**
//!
//! Any failure jumps straight to Responded with the error. No partial
//! replies are ever returned.

use std::sync::Arc;
use std::time::Duration;

use biochat_config::AppConfig;
use biochat_core::conversation::SessionId;
use biochat_core::error::{Error, IndexError, Result};
use biochat_core::index::{MatchResult, SimilarityIndex};
use biochat_core::message::Turn;
use biochat_core::persona::Persona;
use biochat_core::provider::Provider;
use tracing::{debug, info, warn};

use crate::context::{HistoryBudget, PromptAssembler};
use crate::embedder::Embedder;
use crate::generator::Generator;
use crate::session::SessionStore;

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Embedding,
    Retrieving,
    Assembling,
    Generating,
    Responded,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Embedding => "embedding",
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::Generating => "generating",
            Self::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Similarity lookup parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    pub threshold: f64,
    /// Candidate count forwarded to the index.
    pub match_count: usize,
    pub timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            match_count: 1,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct ChatPipeline {
    embedder: Embedder,
    index: Arc<dyn SimilarityIndex>,
    assembler: PromptAssembler,
    generator: Generator,
    sessions: Arc<SessionStore>,
    retrieval: RetrievalSettings,
    dimensions: Option<usize>,
}

impl ChatPipeline {
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn SimilarityIndex>,
        assembler: PromptAssembler,
        generator: Generator,
        sessions: Arc<SessionStore>,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            assembler,
            generator,
            sessions,
            retrieval,
            dimensions: None,
        }
    }

    /// Wire the pipeline from configuration around the given backends.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        index: Arc<dyn SimilarityIndex>,
    ) -> Result<Self> {
        let persona = Persona::resolve(
            &config.persona.version,
            config.persona.system_prompt_override.as_deref(),
            config.persona.system_prompt_file.as_deref(),
        )?;

        let embedder = Embedder::new(provider.clone(), &config.embedding.model)
            .with_dimensions(config.embedding.dimensions)
            .with_max_input_tokens(config.embedding.max_input_tokens)
            .with_timeout(Duration::from_secs(config.embedding.timeout_secs));

        let assembler = PromptAssembler::new(
            persona,
            HistoryBudget {
                max_turns: config.session.max_history_turns,
                max_tokens: config.session.max_history_tokens,
            },
        )
        .with_few_shot(config.generation.few_shot)
        .with_name_invite(config.persona.ask_for_name);

        let generator = Generator::new(
            provider,
            &config.generation.model,
            biochat_providers::sampling_from_config(config),
        )
        .with_timeout(Duration::from_secs(config.generation.timeout_secs));

        let sessions = Arc::new(SessionStore::new(
            Duration::from_secs(config.session.idle_ttl_secs),
            config.session.max_sessions,
        ));

        let retrieval = RetrievalSettings {
            threshold: config.index.match_threshold,
            match_count: config.index.match_count,
            timeout: Duration::from_secs(config.index.timeout_secs),
        };

        let mut pipeline = Self::new(embedder, index, assembler, generator, sessions, retrieval);
        pipeline.dimensions = config.embedding.dimensions;
        Ok(pipeline)
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    pub fn persona(&self) -> &Persona {
        self.assembler.persona()
    }

    /// Embed visitor text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    /// Nearest passage for a query vector.
    pub async fn retrieve(&self, embedding: &[f32]) -> Result<MatchResult> {
        let RetrievalSettings {
            threshold,
            match_count,
            timeout,
        } = self.retrieval;

        let matched = tokio::time::timeout(
            timeout,
            self.index.find_nearest(embedding, threshold, match_count),
        )
        .await
        .map_err(|_| Error::IndexUnavailable(IndexError::Timeout(timeout.as_secs())))?
        .map_err(Error::IndexUnavailable)?;

        match &matched {
            MatchResult::Match { id, score, .. } => debug!(id, score, "Passage matched"),
            MatchResult::NoMatch => debug!(threshold, "No passage above threshold"),
        }
        Ok(matched)
    }

    /// Answer a visitor message using a precomputed query vector.
    pub async fn answer_with_embedding(
        &self,
        session: &SessionId,
        embedding: &[f32],
        message: &str,
    ) -> Result<String> {
        self.enter(session, PipelineStage::Received);
        let result = self.run_from_embedding(session, embedding, message).await;
        self.finish(session, &result);
        result
    }

    /// Answer a visitor message end to end.
    pub async fn answer(&self, session: &SessionId, message: &str) -> Result<String> {
        self.enter(session, PipelineStage::Received);
        let result: Result<String> = async {
            validate_message(message)?;
            self.enter(session, PipelineStage::Embedding);
            let embedding = self.embed(message).await?;
            self.run_from_embedding(session, &embedding, message).await
        }
        .await;
        self.finish(session, &result);
        result
    }

    async fn run_from_embedding(
        &self,
        session: &SessionId,
        embedding: &[f32],
        message: &str,
    ) -> Result<String> {
        validate_message(message)?;
        if embedding.is_empty() {
            return Err(Error::InputValidation("embedding must not be empty".into()));
        }
        if let Some(expected) = self.dimensions {
            if embedding.len() != expected {
                return Err(Error::InputValidation(format!(
                    "embedding has {} dimensions, expected {expected}",
                    embedding.len()
                )));
            }
        }

        self.enter(session, PipelineStage::Retrieving);
        let matched = self.retrieve(embedding).await?;

        self.enter(session, PipelineStage::Assembling);
        let handle = self.sessions.get_or_create(session).await;
        let mut state = handle.lock().await;

        state.extract_and_remember_name(message);
        let prompt = self.assembler.assemble(&state, &matched, message);
        debug!(
            session = %session,
            turns = prompt.turns.len(),
            total_tokens = prompt.metadata.total_tokens,
            drops = prompt.metadata.drops.len(),
            "Prompt assembled"
        );

        let appended = state.append(Turn::visitor(message));

        let reply = match appended {
            Ok(()) => {
                self.enter(session, PipelineStage::Generating);
                self.generator.respond(&mut state, prompt.turns).await
            }
            Err(e) => Err(e),
        };

        if let Err(e @ Error::StateCorrupt(_)) = &reply {
            warn!(session = %session, error = %e, "Session state corrupt, evicting");
            drop(state);
            self.sessions.remove(session).await;
        }
        reply
    }

    fn enter(&self, session: &SessionId, stage: PipelineStage) {
        debug!(session = %session, stage = %stage, "Pipeline stage");
    }

    fn finish(&self, session: &SessionId, result: &Result<String>) {
        match result {
            Ok(reply) => {
                debug!(session = %session, stage = %PipelineStage::Responded, "Pipeline stage");
                info!(session = %session, reply_len = reply.len(), "Reply sent");
            }
            Err(e) => {
                warn!(
                    session = %session,
                    stage = %PipelineStage::Responded,
                    kind = ?e.kind(),
                    error = %e,
                    "Request failed"
                );
            }
        }
    }
}

fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(Error::InputValidation("message must not be empty".into()));
    }
    Ok(())
}
