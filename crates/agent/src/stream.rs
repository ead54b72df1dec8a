//! Response streaming: turns a provider stream, or a canned rejection, into
//! ordered wire frames.
//!
//! Frames travel over a single-producer mpsc channel. Conversation log
//! writes are spawned so they never hold up a frame.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tutorgate_core::error::ProviderError;
use tutorgate_core::log::{ConversationLog, LogEntry};
use tutorgate_core::message::SessionId;
use tutorgate_core::provider::ChunkReceiver;

/// Receiving half of a response stream.
pub type FrameReceiver = mpsc::Receiver<StreamFrame>;

const FRAME_BUFFER: usize = 64;

/// One frame of the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A piece of text
    Content(String),
    /// Terminal sentinel
    Done,
}

#[derive(Serialize)]
struct ContentEnvelope<'a> {
    content: &'a str,
}

impl StreamFrame {
    /// The SSE `data:` payload: `{"content": "..."}` or `[DONE]`.
    pub fn data(&self) -> String {
        match self {
            Self::Content(text) => serde_json::to_string(&ContentEnvelope { content: text })
                .unwrap_or_else(|_| String::from(r#"{"content":""}"#)),
            Self::Done => "[DONE]".to_string(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Content(text) => Some(text),
            Self::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// The contact frame text: the email in a fenced block.
pub fn contact_block(email: &str) -> String {
    format!("\n\n```\n{email}\n```")
}

/// Append to the conversation log on a detached task. Failures are traced
/// and dropped.
pub fn spawn_log(log: Arc<dyn ConversationLog>, entry: LogEntry) {
    tokio::spawn(async move {
        if let Err(e) = log.append(entry).await {
            warn!(sink = log.name(), error = %e, "Conversation log write failed");
        }
    });
}

pub struct ResponseStreamer {
    log: Arc<dyn ConversationLog>,
    rejection_message: String,
    contact_email: String,
}

impl ResponseStreamer {
    pub fn new(
        log: Arc<dyn ConversationLog>,
        rejection_message: impl Into<String>,
        contact_email: impl Into<String>,
    ) -> Self {
        Self {
            log,
            rejection_message: rejection_message.into(),
            contact_email: contact_email.into(),
        }
    }

    /// Rejection text, contact block, sentinel. The rejection text is logged
    /// as the AI turn.
    pub fn reject(&self, session: &SessionId) -> FrameReceiver {
        let frames = [
            StreamFrame::Content(self.rejection_message.clone()),
            StreamFrame::Content(contact_block(&self.contact_email)),
            StreamFrame::Done,
        ];

        let (tx, rx) = mpsc::channel(frames.len());
        for frame in frames {
            // Capacity matches the frame count and `rx` is still held here,
            // so neither Full nor Closed can happen.
            if let Err(e) = tx.try_send(frame) {
                error!(error = %e, "Rejection frame could not be queued");
            }
        }

        spawn_log(
            self.log.clone(),
            LogEntry::ai(session, self.rejection_message.clone()),
        );

        rx
    }

    /// Forward provider deltas as frames until the provider finishes.
    ///
    /// - completion: the full text is logged, then `Done` is sent
    /// - provider error, or the provider closing without a terminal chunk:
    ///   any partial text is logged and the stream ends without `Done`
    /// - cancellation or a dropped receiver: the provider stream is dropped
    ///   and nothing is logged
    pub fn generate(
        &self,
        mut upstream: ChunkReceiver,
        session: SessionId,
        cancel: CancellationToken,
    ) -> FrameReceiver {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let log = self.log.clone();

        tokio::spawn(async move {
            let mut full_text = String::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(session_id = %session, "Generation cancelled");
                        return;
                    }
                    next = upstream.recv() => next,
                };

                let failure = match next {
                    Some(Ok(chunk)) => {
                        if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                            full_text.push_str(&text);
                            let sent = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => false,
                                result = tx.send(StreamFrame::Content(text)) => result.is_ok(),
                            };
                            if !sent {
                                debug!(session_id = %session, "Client went away mid-stream");
                                return;
                            }
                        }
                        if chunk.done {
                            break;
                        }
                        continue;
                    }
                    Some(Err(e)) => e,
                    None => ProviderError::StreamInterrupted(
                        "provider closed the stream without a terminal chunk".into(),
                    ),
                };

                error!(
                    session_id = %session,
                    error = %failure,
                    partial_chars = full_text.chars().count(),
                    "Generation failed mid-stream"
                );
                if !full_text.is_empty() {
                    spawn_log(log, LogEntry::ai(&session, full_text));
                }
                return;
            }

            spawn_log(log, LogEntry::ai(&session, full_text));
            let _ = tx.send(StreamFrame::Done).await;
        });

        rx
    }
}
