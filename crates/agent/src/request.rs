//! The chat request as it arrives on the wire, and its validation.

use serde::{Deserialize, Serialize};
use tutorgate_core::error::ValidationError;
use tutorgate_core::message::{Conversation, Message, Role, SessionId, TurnKind};

/// One turn as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingTurn {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TurnKind>,
}

/// `POST /chat` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The full conversation so far, oldest first
    pub message: Vec<IncomingTurn>,
    pub session_id: String,
}

impl IncomingTurn {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            kind: None,
        }
    }
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, turns: Vec<IncomingTurn>) -> Self {
        Self {
            message: turns,
            session_id: session_id.into(),
        }
    }

    pub fn session(&self) -> SessionId {
        SessionId::new(self.session_id.clone())
    }

    /// Check roles and user message lengths (in characters), then build a
    /// [`Conversation`].
    pub fn validate(&self, max_user_chars: usize) -> Result<Conversation, ValidationError> {
        if self.message.is_empty() {
            return Err(ValidationError::EmptyConversation);
        }

        let mut messages = Vec::with_capacity(self.message.len());

        for (index, turn) in self.message.iter().enumerate() {
            let message = Message {
                role: turn.role.parse()?,
                content: turn.content.clone(),
                kind: turn.kind,
            };

            let length = message.char_len();
            if message.role == Role::User && length > max_user_chars {
                return Err(ValidationError::MessageTooLong {
                    index,
                    length,
                    max: max_user_chars,
                });
            }

            messages.push(message);
        }

        Conversation::new(messages)
    }
}
