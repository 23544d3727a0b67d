//! Visitor-name grammar.
//!
//! A small, ordered pattern set that recognizes when a visitor introduces
//! themselves or declines to share a name. Precedence, first hit wins:
//!
//! 1. Explicit introductions: `my name is X`, `my name's X`, `name's X`, `call me X`
//! 2. Soft introductions: `I'm X`, `I am X`, `this is X`. X must be capitalized
//!    in the original text and must not be a common non-name word.
//! 3. Name declines: "stay anonymous", "not telling you my name", ...
//! 4. General declines ("I'd rather not", "prefer not to", "no thanks") and
//!    bare negatives ("no", "nope", "nah"), only while a name prompt is pending.
//!
//! Detection is best-effort: anything unrecognized is [`NameSignal::None`].

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use regex::Regex;

/// Address used for visitors who declined to share a name.
pub const ANONYMOUS_ADDRESS: &str = "friend";

const MAX_NAME_CHARS: usize = 40;

/// What we know about who we are talking to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "name", rename_all = "snake_case")]
pub enum VisitorIdentity {
    #[default]
    Unknown,
    Named(String),
    /// Sticky: the visitor declined, we never ask again.
    Anonymous,
}

impl VisitorIdentity {
    /// How the assistant should address the visitor, if it knows.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Unknown => None,
            Self::Named(name) => Some(name),
            Self::Anonymous => Some(ANONYMOUS_ADDRESS),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Once settled, the identity never changes for the session.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Result of scanning one visitor message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSignal {
    Introduced(String),
    Declined,
    None,
}

static EXPLICIT_INTRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\bmy\s+name\s+is|\bname['’]s|\bcall\s+me)\s+(?P<name>\p{L}[\p{L}'’-]*)(?:\s+(?P<second>\p{Lu}[\p{L}'’-]*))?",
    )
    .expect("explicit introduction pattern is valid")
});

static SOFT_INTRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\bi['’]?m|\bi\s+am|\bthis\s+is)\s+(?P<name>\p{Lu}[\p{L}'’-]*)(?:\s+(?P<second>\p{Lu}[\p{L}'’-]*))?",
    )
    .expect("soft introduction pattern is valid")
});

static NAME_DECLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:stay|remain)\s+anonymous|none\s+of\s+your\s+business|(?:not|won['’]?t|don['’]?t\s+want\s+to|rather\s+not|prefer\s+not\s+to)\s+(?:say|saying|share|sharing|give|giving|tell|telling)(?:\s+you)?\s+my\s+name)\b",
    )
    .expect("name decline pattern is valid")
});

static GENERAL_DECLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:i['’]?d\s+rather\s+not|rather\s+not\s+(?:say|share|tell)|prefer\s+not\s+to|no\s+thanks|no\s+thank\s+you|not\s+telling)\b",
    )
    .expect("decline pattern is valid")
});

static BARE_NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:no|nope|nah|pass|no\s+way)\s*[.!]*\s*$")
        .expect("bare negative pattern is valid")
});

/// Words that follow "I'm" / "this is" / "my name is" without being names.
const NON_NAMES: &[&str] = &[
    "a", "an", "i", "the", "not", "no", "yes", "so", "just", "here", "fine", "good", "great",
    "okay", "ok", "well", "doing", "looking", "interested", "curious", "trying", "wondering",
    "new", "back", "sorry", "glad", "happy", "excited", "ready", "sure", "from", "in", "on",
    "at", "with", "hiring", "recruiting", "working", "currently", "also", "very", "really",
    "still", "asking", "building", "going", "actually", "your", "his", "her", "their",
    "this", "that", "called", "amazing", "awesome", "impressed", "what", "how", "why",
];

/// Scan a visitor message for an introduction or a decline.
///
/// `name_prompt_pending` should be true when the previous assistant turn
/// asked for the visitor's name. Only then do general refusals ("no thanks",
/// "I'd rather not") and a bare "no" count as a decline.
pub fn detect(text: &str, name_prompt_pending: bool) -> NameSignal {
    if let Some(name) = capture_name(&EXPLICIT_INTRO, text) {
        return NameSignal::Introduced(name);
    }
    if let Some(name) = capture_name(&SOFT_INTRO, text) {
        return NameSignal::Introduced(name);
    }
    if NAME_DECLINE.is_match(text) {
        return NameSignal::Declined;
    }
    if name_prompt_pending && (GENERAL_DECLINE.is_match(text) || BARE_NEGATIVE.is_match(text)) {
        return NameSignal::Declined;
    }
    NameSignal::None
}

/// Whether an assistant reply asked the visitor for their name.
pub fn asks_for_name(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains('?') && (lower.contains("your name") || lower.contains("call you"))
}

fn capture_name(pattern: &Regex, text: &str) -> Option<String> {
    for caps in pattern.captures_iter(text) {
        let Some(first) = caps.name("name").map(|m| trim_word(m.as_str())) else {
            continue;
        };
        if !is_plausible_name(first) {
            continue;
        }
        let mut name = capitalize(first);
        if let Some(second) = caps.name("second").map(|m| trim_word(m.as_str())) {
            if is_plausible_name(second) {
                name.push(' ');
                name.push_str(second);
            }
        }
        return Some(name.chars().take(MAX_NAME_CHARS).collect());
    }
    None
}

fn trim_word(word: &str) -> &str {
    word.trim_end_matches(['\'', '’', '-'])
}

fn is_plausible_name(word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    // Possessives ("I'm Rafa's recruiter") name someone else.
    if word.ends_with("'s") || word.ends_with("’s") {
        return false;
    }
    let lower = word.to_lowercase();
    !NON_NAMES.contains(&lower.as_str())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn introduced(name: &str) -> NameSignal {
        NameSignal::Introduced(name.into())
    }

    #[test]
    fn explicit_introductions() {
        assert_eq!(detect("my name is Ana", false), introduced("Ana"));
        assert_eq!(detect("Hi! My name is ana, nice to meet you", false), introduced("Ana"));
        assert_eq!(detect("name's Bob.", false), introduced("Bob"));
        assert_eq!(detect("you can call me Jo-Ann", false), introduced("Jo-Ann"));
        assert_eq!(detect("My name is Ana Maria", false), introduced("Ana Maria"));
    }

    #[test]
    fn soft_introductions_need_capitalized_name() {
        assert_eq!(detect("Hey, I'm Carlos", false), introduced("Carlos"));
        assert_eq!(detect("I am Priya from Austin", false), introduced("Priya"));
        assert_eq!(detect("this is Lee", false), introduced("Lee"));
        assert_eq!(detect("i'm interested in Rafa's work", false), NameSignal::None);
        assert_eq!(detect("I'm Interested in the role", false), NameSignal::None);
    }

    #[test]
    fn possessives_are_not_names() {
        assert_eq!(detect("I'm Rafa's former manager", false), NameSignal::None);
    }

    #[test]
    fn explicit_intro_wins_over_decline() {
        assert_eq!(
            detect("I'd rather not say much, but my name is Dana", true),
            introduced("Dana")
        );
    }

    #[test]
    fn name_declines_count_anytime() {
        assert_eq!(detect("I'll stay anonymous", false), NameSignal::Declined);
        assert_eq!(detect("not telling you my name", false), NameSignal::Declined);
        assert_eq!(detect("I'd rather not share my name", false), NameSignal::Declined);
        assert_eq!(detect("I won't give my name, sorry", false), NameSignal::Declined);
    }

    #[test]
    fn general_declines_need_name_prompt() {
        assert_eq!(detect("I'd rather not", true), NameSignal::Declined);
        assert_eq!(detect("no thanks, just tell me about his skills", true), NameSignal::Declined);
        assert_eq!(detect("I prefer not to share that", true), NameSignal::Declined);

        assert_eq!(detect("Would Rafa prefer not to relocate?", false), NameSignal::None);
        assert_eq!(detect("No thanks, that's all I needed", false), NameSignal::None);
        assert_eq!(detect("I'd rather not guess his age", false), NameSignal::None);
    }

    #[test]
    fn bare_negative_only_counts_after_name_prompt() {
        assert_eq!(detect("no", false), NameSignal::None);
        assert_eq!(detect("Nope!", true), NameSignal::Declined);
        assert_eq!(detect("no, what does he do?", true), NameSignal::None);
    }

    #[test]
    fn plain_questions_are_silent() {
        assert_eq!(detect("Tell me about Rafa", false), NameSignal::None);
        assert_eq!(detect("What is his favorite food?", true), NameSignal::None);
    }

    #[test]
    fn long_names_are_capped() {
        let long = "A".repeat(80);
        match detect(&format!("my name is {long}"), false) {
            NameSignal::Introduced(name) => assert_eq!(name.chars().count(), MAX_NAME_CHARS),
            other => panic!("expected introduction, got {other:?}"),
        }
    }

    #[test]
    fn name_prompt_detection() {
        assert!(asks_for_name("Before we start, what's your name?"));
        assert!(asks_for_name("What should I call you?"));
        assert!(!asks_for_name("Your name is lovely."));
        assert!(!asks_for_name("Rafa lives in Houston."));
    }

    #[test]
    fn identity_addresses() {
        assert_eq!(VisitorIdentity::Unknown.address(), None);
        assert_eq!(VisitorIdentity::Named("Ana".into()).address(), Some("Ana"));
        assert_eq!(VisitorIdentity::Anonymous.address(), Some(ANONYMOUS_ADDRESS));
        assert!(VisitorIdentity::Anonymous.is_settled());
        assert!(!VisitorIdentity::Unknown.is_settled());
    }
}
