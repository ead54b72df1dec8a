//! Error types for the tutorgate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum so callers can tell a
//! bad request apart from a failing upstream.

use thiserror::Error;

/// The top-level error type for all tutorgate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request validation ---
    #[error("{0}")]
    Validation(#[from] ValidationError),

    // --- Provider errors (generation, embeddings) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Knowledge store errors ---
    #[error("Knowledge store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Whether this error was caused by the caller rather than an upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A chat request that must be rejected before any provider is called.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Conversation is empty: at least one user message is required")]
    EmptyConversation,

    #[error("The last message must come from the user (got '{role}')")]
    LastTurnNotUser { role: String },

    #[error("Unknown message role: '{0}'")]
    UnknownRole(String),

    #[error(
        "Message too long: user messages are limited to {max} characters (message {index} has {length})"
    )]
    MessageTooLong {
        index: usize,
        length: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Knowledge store not configured: {0}")]
    NotConfigured(String),

    #[error("Similarity query failed: {0}")]
    QueryFailed(String),

    #[error("Knowledge write failed: {0}")]
    WriteFailed(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum LogError {
    #[error("Conversation log not configured: {0}")]
    NotConfigured(String),

    #[error("Log write failed: {0}")]
    WriteFailed(String),

    #[error("Network error: {0}")]
    Network(String),
}
