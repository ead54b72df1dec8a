//! Conversation log: append-only record of who said what in a session.
//!
//! Writes are best-effort: the pipeline never lets a log failure reach the
//! caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LogError;
use crate::message::SessionId;

/// Who produced a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    User,
    Ai,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

/// One log row: `(conversation id, source, text)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub conversation_id: SessionId,
    pub source: LogSource,
    pub message: String,
}

impl LogEntry {
    pub fn user(session: &SessionId, message: impl Into<String>) -> Self {
        Self {
            conversation_id: session.clone(),
            source: LogSource::User,
            message: message.into(),
        }
    }

    pub fn ai(session: &SessionId, message: impl Into<String>) -> Self {
        Self {
            conversation_id: session.clone(),
            source: LogSource::Ai,
            message: message.into(),
        }
    }
}

/// The conversation log sink.
///
/// Implementations: Supabase table, in-memory (tests), none (logging disabled).
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// The sink name (e.g., "supabase", "none").
    fn name(&self) -> &str;

    /// Append one entry.
    async fn append(&self, entry: LogEntry) -> Result<(), LogError>;
}
