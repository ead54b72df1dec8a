//! In-memory knowledge store, useful for testing and offline runs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tutorgate_core::error::StoreError;
use tutorgate_core::knowledge::{
    ContextChunk, KnowledgeRecord, KnowledgeWriter, SimilarityQuery, SimilarityStore,
};

use crate::vector::vector_search;

/// A knowledge store that keeps records in a Vec and ranks them by cosine
/// similarity.
#[derive(Clone, Default)]
pub struct InMemoryKnowledgeStore {
    records: Arc<RwLock<Vec<KnowledgeRecord>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with records.
    pub fn with_records(records: Vec<KnowledgeRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of the stored chunk texts, in insertion order.
    pub async fn contents(&self) -> Vec<String> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| r.content.clone())
            .collect()
    }
}

#[async_trait]
impl SimilarityStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: SimilarityQuery) -> Result<Vec<ContextChunk>, StoreError> {
        let records = self.records.read().await;
        Ok(vector_search(
            &records,
            &query.embedding,
            query.match_count,
            query.match_threshold,
        ))
    }
}

#[async_trait]
impl KnowledgeWriter for InMemoryKnowledgeStore {
    async fn clear(&self) -> Result<(), StoreError> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn insert(&self, record: KnowledgeRecord) -> Result<(), StoreError> {
        if record.embedding.is_empty() {
            return Err(StoreError::WriteFailed(
                "record has an empty embedding".into(),
            ));
        }
        self.records.write().await.push(record);
        Ok(())
    }
}
