//! # tutorgate core
//!
//! Domain types, traits, and error definitions for the tutorgate chat
//! backend. This crate has no HTTP or storage dependencies; it defines the
//! model that the providers, the pipeline and the gateway build against.
//!
//! Every external collaborator is a trait here:
//! - [`Provider`]: chat generation (streaming) and text embeddings
//! - [`SimilarityStore`] / [`KnowledgeWriter`]: the vector knowledge base
//! - [`ConversationLog`]: the append-only message log
//!
//! Implementations live in `tutorgate-providers` (network clients) and
//! `tutorgate-knowledge` (in-memory backends), so tests can swap in fakes.

pub mod error;
pub mod knowledge;
pub mod log;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, LogError, ProviderError, Result, StoreError, ValidationError};
pub use knowledge::{ContextChunk, KnowledgeRecord, KnowledgeWriter, SimilarityQuery, SimilarityStore};
pub use log::{ConversationLog, LogEntry, LogSource};
pub use message::{Conversation, Message, Role, SessionId, TurnKind};
pub use provider::{
    ChunkReceiver, EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
    StreamChunk, Usage,
};
