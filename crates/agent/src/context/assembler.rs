//! Prompt assembly — persona, visitor facts, history window, and question.
//!
//! The assembled turn list always has this shape:
//!
//! 1. **System** — persona text, a visitor-facts section, and (on no match)
//!    the clarifying-question instruction. Never trimmed.
//! 2. **Demonstration** — the persona's fixed one-shot pair, when enabled.
//! 3. **History** — prior session turns in original order. Whole
//!    visitor/assistant pairs are dropped oldest first to fit the budget.
//! 4. **Question** — `Context: <passage> Question: <message>`.
//!
//! # Determinism
//!
//! Identical inputs produce identical turn contents. No random or
//! time-dependent logic is used during assembly.

use crate::context::token;
use biochat_core::conversation::ConversationState;
use biochat_core::index::MatchResult;
use biochat_core::message::{Role, Turn};
use biochat_core::persona::Persona;
use biochat_core::visitor::VisitorIdentity;
use serde::{Deserialize, Serialize};

/// Invitation added while the visitor's name is unknown.
pub const NAME_INVITE: &str =
    "You don't know the visitor's name yet. If it fits naturally, invite them to share it.";

/// Instruction added when retrieval found nothing.
pub const CLARIFY_INSTRUCTION: &str = "No stored information matched this question. \
Ask one short clarifying question instead of guessing.";

// ── Types ─────────────────────────────────────────────────────────────────

/// Limits on how much prior conversation reaches the prompt.
#[derive(Debug, Clone, Copy)]
pub struct HistoryBudget {
    /// Maximum prior turns kept.
    pub max_turns: usize,
    /// Maximum estimated tokens for prior turns.
    pub max_tokens: usize,
}

impl Default for HistoryBudget {
    fn default() -> Self {
        Self {
            max_turns: 20,
            max_tokens: 3000,
        }
    }
}

/// The assembled prompt, ready for the generator.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// System turn first, question turn last.
    pub turns: Vec<Turn>,
    pub metadata: AssemblyMetadata,
}

impl AssembledPrompt {
    /// The final visitor turn carrying context and question.
    pub fn question(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Total estimated tokens in the assembled prompt.
    pub total_tokens: usize,
    /// Per-layer statistics.
    pub per_layer: Vec<LayerStats>,
    /// Items dropped during budget enforcement.
    pub drops: Vec<DropInfo>,
}

/// Statistics for a single prompt layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub tokens: usize,
    pub items_included: usize,
    pub items_total: usize,
}

/// Information about items dropped from a layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    pub layer: String,
    pub items_dropped: usize,
    pub tokens_dropped: usize,
    pub reason: String,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The prompt assembler. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: Persona,
    budget: HistoryBudget,
    few_shot: bool,
    ask_for_name: bool,
}

impl PromptAssembler {
    pub fn new(persona: Persona, budget: HistoryBudget) -> Self {
        Self {
            persona,
            budget,
            few_shot: false,
            ask_for_name: true,
        }
    }

    /// Prepend the persona's demonstration pair to every prompt.
    pub fn with_few_shot(mut self, enabled: bool) -> Self {
        self.few_shot = enabled;
        self
    }

    /// Invite visitors with an unknown name to share it.
    pub fn with_name_invite(mut self, enabled: bool) -> Self {
        self.ask_for_name = enabled;
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Assemble the prompt for one visitor message.
    ///
    /// `state` holds the prior turns only; the current message arrives
    /// separately and is framed as the final question turn.
    pub fn assemble(
        &self,
        state: &ConversationState,
        matched: &MatchResult,
        visitor_message: &str,
    ) -> AssembledPrompt {
        let mut stats: Vec<LayerStats> = Vec::new();
        let mut drops: Vec<DropInfo> = Vec::new();
        let mut turns: Vec<Turn> = Vec::new();

        // ── System ──────────────────────────────────────────────────────
        let system = Turn::system(self.render_system(state, matched));
        stats.push(Self::single_stats("system", &system));
        turns.push(system);

        // ── Demonstration ───────────────────────────────────────────────
        if self.few_shot {
            let demo = &self.persona.demonstration;
            let pair = [Turn::visitor(&demo.question), Turn::assistant(&demo.answer)];
            stats.push(LayerStats {
                name: "demonstration".into(),
                tokens: token::estimate_turns_tokens(&pair),
                items_included: 2,
                items_total: 2,
            });
            turns.extend(pair);
        }

        // ── History ─────────────────────────────────────────────────────
        let (history, hist_stats, hist_drop) = self.render_history(state.turns());
        stats.push(hist_stats);
        if let Some(d) = hist_drop {
            drops.push(d);
        }
        turns.extend(history);

        // ── Question ────────────────────────────────────────────────────
        let question = Turn::visitor(frame_question(matched.content(), visitor_message));
        stats.push(Self::single_stats("question", &question));
        turns.push(question);

        let total_tokens = stats.iter().map(|s| s.tokens).sum();

        AssembledPrompt {
            turns,
            metadata: AssemblyMetadata {
                total_tokens,
                per_layer: stats,
                drops,
            },
        }
    }

    fn render_system(&self, state: &ConversationState, matched: &MatchResult) -> String {
        let mut facts: Vec<String> = Vec::new();

        match state.visitor() {
            VisitorIdentity::Named(name) => {
                facts.push(format!("The visitor's name is {name}. Use it naturally, not in every reply."));
            }
            VisitorIdentity::Anonymous => {
                facts.push(format!(
                    "The visitor prefers not to share their name. Call them \"{}\" if you need to address them.",
                    biochat_core::visitor::ANONYMOUS_ADDRESS
                ));
            }
            VisitorIdentity::Unknown => {
                if self.ask_for_name {
                    facts.push(NAME_INVITE.into());
                }
            }
        }

        if state.should_greet() {
            match state.greeting_address() {
                Some(address) => facts.push(format!(
                    "This is the first message of the conversation. Open with a short, warm greeting to {address}."
                )),
                None => facts.push(
                    "This is the first message of the conversation. Open with a short, warm greeting."
                        .into(),
                ),
            }
        } else {
            facts.push("The conversation is already under way. Do not greet the visitor again.".into());
        }

        let mut out = format!(
            "{}\n\n[Visitor]\n{}",
            self.persona.system_prompt,
            facts.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n")
        );

        if !matched.is_match() {
            out.push_str("\n\n");
            out.push_str(CLARIFY_INSTRUCTION);
        }
        out
    }

    /// Keep the newest whole exchanges that fit both limits.
    fn render_history(&self, history: &[Turn]) -> (Vec<Turn>, LayerStats, Option<DropInfo>) {
        let layer = "history";
        if history.is_empty() {
            return (
                Vec::new(),
                LayerStats {
                    name: layer.into(),
                    tokens: 0,
                    items_included: 0,
                    items_total: 0,
                },
                None,
            );
        }

        // An exchange starts at a visitor turn and carries any replies after it.
        let mut exchanges: Vec<&[Turn]> = Vec::new();
        let mut start = 0;
        for (i, turn) in history.iter().enumerate().skip(1) {
            if turn.role == Role::Visitor {
                exchanges.push(&history[start..i]);
                start = i;
            }
        }
        exchanges.push(&history[start..]);

        let mut kept_turns = history.len();
        let mut kept_tokens = token::estimate_turns_tokens(history);
        let mut first_kept = 0;
        let mut dropped_tokens = 0;

        while first_kept < exchanges.len()
            && (kept_turns > self.budget.max_turns || kept_tokens > self.budget.max_tokens)
        {
            let exchange = exchanges[first_kept];
            let tokens = token::estimate_turns_tokens(exchange);
            kept_turns -= exchange.len();
            kept_tokens -= tokens;
            dropped_tokens += tokens;
            first_kept += 1;
        }

        let included: Vec<Turn> = exchanges[first_kept..]
            .iter()
            .flat_map(|e| e.iter().cloned())
            .collect();
        let dropped = history.len() - included.len();

        (
            included,
            LayerStats {
                name: layer.into(),
                tokens: kept_tokens,
                items_included: kept_turns,
                items_total: history.len(),
            },
            Self::maybe_drop(layer, dropped, dropped_tokens, "Oldest exchanges dropped"),
        )
    }

    // ── Helpers ────────────────────────────────────────────────────────────

    fn single_stats(layer: &str, turn: &Turn) -> LayerStats {
        LayerStats {
            name: layer.into(),
            tokens: token::estimate_turn_tokens(turn),
            items_included: 1,
            items_total: 1,
        }
    }

    fn maybe_drop(layer: &str, count: usize, tokens: usize, reason: &str) -> Option<DropInfo> {
        if count > 0 {
            Some(DropInfo {
                layer: layer.into(),
                items_dropped: count,
                tokens_dropped: tokens,
                reason: reason.into(),
            })
        } else {
            None
        }
    }
}

/// The final visitor turn: retrieved passage followed by the question.
pub fn frame_question(content: &str, visitor_message: &str) -> String {
    format!("Context: {content} Question: {visitor_message}")
}

// ── Tests ─────────────────────────────────────────────────────────────────
