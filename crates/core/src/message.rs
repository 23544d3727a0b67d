//! Turn domain types.
//!
//! A turn is the value object that flows through the whole pipeline:
//! visitor asks -> assembler frames it -> provider answers -> state records it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona and policy instructions
    System,
    /// The person chatting with the assistant
    #[serde(rename = "user")]
    Visitor,
    /// The generated reply
    Assistant,
}

impl Role {
    /// Role name in the OpenAI chat wire format.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Visitor => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn visitor(content: impl Into<String>) -> Self {
        Self::new(Role::Visitor, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_visitor_turn() {
        let turn = Turn::visitor("Hello!");
        assert_eq!(turn.role, Role::Visitor);
        assert_eq!(turn.content, "Hello!");
        assert!(!turn.id.is_empty());
    }

    #[test]
    fn visitor_role_uses_chat_wire_name() {
        let json = serde_json::to_string(&Turn::visitor("hi")).unwrap();
        assert!(json.contains(r#""role":"user""#));
        assert_eq!(Role::Visitor.as_wire(), "user");
        assert_eq!(Role::System.as_wire(), "system");
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::assistant("Rafa lives in Houston.");
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::Assistant);
        assert_eq!(back.content, "Rafa lives in Houston.");
    }
}
