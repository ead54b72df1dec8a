//! Knowledge base traits: similarity search over curated content chunks.
//!
//! The store is read on every request (`SimilarityStore`) and written only
//! by the seeding command (`KnowledgeWriter`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A retrieved knowledge snippet with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    /// The chunk text
    pub content: String,

    /// Relevance in [0, 1]
    pub score: f32,
}

impl ContextChunk {
    /// Create a chunk, clamping the score into [0, 1].
    ///
    /// Stores report `1 - cosine_distance`, which can dip below zero.
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self {
            content: content.into(),
            score,
        }
    }
}

/// A nearest-neighbour query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityQuery {
    /// The query embedding
    pub embedding: Vec<f32>,

    /// Inclusion floor: chunks scoring below this are not returned
    pub match_threshold: f32,

    /// Maximum number of chunks to return
    pub match_count: usize,
}

/// One row of the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Read side of the knowledge base.
///
/// Implementations: Supabase (pgvector RPC), in-memory (tests, offline runs).
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// The backend name (e.g., "supabase", "in_memory").
    fn name(&self) -> &str;

    /// Return up to `match_count` chunks, most relevant first.
    ///
    /// An empty result means "no knowledge found" and is not an error.
    async fn search(&self, query: SimilarityQuery) -> Result<Vec<ContextChunk>, StoreError>;
}

/// Write side of the knowledge base, used when (re)seeding.
#[async_trait]
pub trait KnowledgeWriter: Send + Sync {
    /// Remove every existing row.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Insert one row.
    async fn insert(&self, record: KnowledgeRecord) -> Result<(), StoreError>;
}
