//! Context retrieval: embed the query, then ask the similarity store.

use std::sync::Arc;

use tracing::debug;
use tutorgate_core::error::{Error, ProviderError};
use tutorgate_core::knowledge::{ContextChunk, SimilarityQuery, SimilarityStore};
use tutorgate_core::provider::{EmbeddingRequest, Provider};

pub struct ContextRetriever {
    embedder: Arc<dyn Provider>,
    store: Arc<dyn SimilarityStore>,
    embedding_model: String,
    top_k: usize,
    match_floor: f32,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn Provider>,
        store: Arc<dyn SimilarityStore>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            embedding_model: embedding_model.into(),
            top_k: 5,
            match_floor: 0.01,
        }
    }

    /// Set the result cap and the inclusion floor.
    pub fn with_limits(mut self, top_k: usize, match_floor: f32) -> Self {
        self.top_k = top_k;
        self.match_floor = match_floor;
        self
    }

    /// Return at most `top_k` chunks in the store's order (most relevant
    /// first). Embedding or store failures propagate.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ContextChunk>, Error> {
        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![query.to_string()],
            })
            .await?;

        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "embedding response contained no vector".into(),
            })?;

        let mut chunks = self
            .store
            .search(SimilarityQuery {
                embedding,
                match_threshold: self.match_floor,
                match_count: self.top_k,
            })
            .await?;

        chunks.truncate(self.top_k);

        debug!(
            store = self.store.name(),
            chunks = chunks.len(),
            top_score = chunks.first().map(|c| c.score),
            "Context retrieved"
        );

        Ok(chunks)
    }
}
