//! In-process conversation log sinks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tutorgate_core::error::LogError;
use tutorgate_core::log::{ConversationLog, LogEntry};

/// A sink that discards everything; used when conversation logging is off.
pub struct NoopLog;

#[async_trait]
impl ConversationLog for NoopLog {
    fn name(&self) -> &str {
        "none"
    }

    async fn append(&self, _entry: LogEntry) -> Result<(), LogError> {
        Ok(())
    }
}

/// A sink that keeps entries in memory.
///
/// Can be told to fail every write, to check that log failures never reach
/// the chat caller.
#[derive(Clone, Default)]
pub struct InMemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    fail_writes: bool,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log whose every append returns an error.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl ConversationLog for InMemoryLog {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, entry: LogEntry) -> Result<(), LogError> {
        if self.fail_writes {
            return Err(LogError::WriteFailed("in-memory log set to fail".into()));
        }
        self.entries.lock().await.push(entry);
        Ok(())
    }
}
