//! Message and Conversation domain types.
//!
//! A browser widget posts the whole transcript on every request; these are
//! the value objects that transcript is parsed into. Turns are appended only
//! and never mutated, and their order is replayed to the model as-is.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque session identifier supplied by the caller.
///
/// Only used as the correlation key for the conversation log; it is never
/// looked up or validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The prospective student
    User,
    /// The assistant (model output, welcome or rejection)
    Assistant,
    /// System instructions
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured marker describing what an assistant turn was.
///
/// Clients that send it let trust classification skip the literal text
/// comparison against the welcome and rejection messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Welcome,
    Rejection,
    Content,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Optional structured marker (assistant turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TurnKind>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            kind: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            kind: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            kind: None,
        }
    }

    /// Attach a structured marker.
    pub fn with_kind(mut self, kind: TurnKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// An ordered, non-empty sequence of turns whose last turn is from the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Build a conversation, enforcing the structural invariants.
    pub fn new(messages: Vec<Message>) -> Result<Self, ValidationError> {
        match messages.last() {
            None => Err(ValidationError::EmptyConversation),
            Some(last) if last.role != Role::User => Err(ValidationError::LastTurnNotUser {
                role: last.role.to_string(),
            }),
            Some(_) => Ok(Self { messages }),
        }
    }

    /// All turns, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Every turn before the one currently being answered.
    pub fn history(&self) -> &[Message] {
        &self.messages[..self.messages.len() - 1]
    }

    /// The user turn currently being answered.
    pub fn latest(&self) -> &Message {
        // Non-empty by construction.
        &self.messages[self.messages.len() - 1]
    }

    /// The most recent `n` turns, oldest first.
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
