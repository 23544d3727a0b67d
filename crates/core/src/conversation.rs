//! Per-session conversation state.
//!
//! One [`ConversationState`] lives per visitor session. It owns the ordered
//! turn history (system instructions are held by the persona, not stored
//! here) and the facts extracted from the visitor's messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::message::{Role, Turn};
use crate::visitor::{self, NameSignal, VisitorIdentity};

/// Unique identifier for a visitor session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The running state of one visitor session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: SessionId,

    /// Visitor and assistant turns, oldest first.
    turns: Vec<Turn>,

    visitor: VisitorIdentity,

    /// Set once the first assistant reply lands.
    greeted: bool,

    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            turns: Vec::new(),
            visitor: VisitorIdentity::Unknown,
            greeted: false,
            created_at: now,
            last_active: now,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn visitor(&self) -> &VisitorIdentity {
        &self.visitor
    }

    pub fn visitor_name(&self) -> Option<&str> {
        self.visitor.name()
    }

    /// Add a turn to the end of the history.
    ///
    /// Rejects turns that would break causal order: system turns are never
    /// stored, and an assistant turn must answer the visitor turn before it.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        match turn.role {
            Role::System => {
                return Err(Error::StateCorrupt(
                    "system turns are not part of the session history".into(),
                ));
            }
            Role::Assistant => {
                let answers_visitor = self
                    .turns
                    .last()
                    .is_some_and(|last| last.role == Role::Visitor);
                if !answers_visitor {
                    return Err(Error::StateCorrupt(
                        "assistant turn does not follow a visitor turn".into(),
                    ));
                }
                self.greeted = true;
            }
            Role::Visitor => {}
        }

        self.last_active = Utc::now();
        self.turns.push(turn);
        Ok(())
    }

    /// Scan visitor text for a self-introduction or a decline and remember it.
    ///
    /// The first stated name wins; a decline is sticky. Unrecognized text
    /// leaves the state unchanged.
    pub fn extract_and_remember_name(&mut self, text: &str) -> &VisitorIdentity {
        if self.visitor.is_settled() {
            return &self.visitor;
        }

        match visitor::detect(text, self.name_prompt_pending()) {
            NameSignal::Introduced(name) => {
                debug!(session = %self.id, "Visitor introduced themselves");
                self.visitor = VisitorIdentity::Named(name);
            }
            NameSignal::Declined => {
                debug!(session = %self.id, "Visitor declined to share a name");
                self.visitor = VisitorIdentity::Anonymous;
            }
            NameSignal::None => {}
        }
        &self.visitor
    }

    /// True until the assistant has replied once in this session.
    pub fn should_greet(&self) -> bool {
        !self.greeted
    }

    /// The remembered name, the anonymous placeholder, or nothing yet.
    pub fn greeting_address(&self) -> Option<&str> {
        self.visitor.address()
    }

    /// Whether the most recent assistant turn asked for the visitor's name.
    pub fn name_prompt_pending(&self) -> bool {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .is_some_and(|t| visitor::asks_for_name(&t.content))
    }

    /// Rough token estimate for the stored history (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(|t| t.content.len() / 4).sum()
    }
}
