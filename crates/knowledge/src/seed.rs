//! Knowledge seeding: replace the whole knowledge base from a TOML file.
//!
//! ```toml
//! [[chunks]]
//! content = "A-Level Computer Science tutoring covers the full OCR and AQA syllabus."
//! ```
//!
//! The store is cleared first, then each chunk is embedded and inserted one
//! at a time. A failed insert is logged and skipped; a failed embedding call
//! aborts the run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tutorgate_core::error::{ProviderError, StoreError};
use tutorgate_core::knowledge::{KnowledgeRecord, KnowledgeWriter};
use tutorgate_core::provider::{EmbeddingRequest, Provider};

/// Sample file written by `tutorgate init`.
pub const SAMPLE_KNOWLEDGE: &str = r#"# Curated knowledge chunks. Re-run `tutorgate seed` after editing.

[[chunks]]
content = "Barney Evans offers one-to-one private tutoring in GCSE and A-Level Computer Science, covering the OCR and AQA specifications."

[[chunks]]
content = "Lessons are held online. Each session is one hour and focuses on exam technique, programming practice and theory."

[[chunks]]
content = "The Python course takes complete beginners through variables, control flow, functions and small projects."
"#;

/// The on-disk knowledge file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeFile {
    #[serde(default)]
    pub chunks: Vec<KnowledgeChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub content: String,
}

impl KnowledgeFile {
    /// Parse a knowledge file from TOML text. Blank chunks are dropped.
    pub fn parse(text: &str) -> Result<Self, SeedError> {
        let mut file: Self =
            toml::from_str(text).map_err(|e| SeedError::Parse(e.to_string()))?;
        file.chunks.retain(|c| !c.content.trim().is_empty());
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SeedError::Read(format!("{}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn contents(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.content.clone()).collect()
    }
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read knowledge file: {0}")]
    Read(String),

    #[error("Failed to parse knowledge file: {0}")]
    Parse(String),

    #[error("Failed to clear knowledge base: {0}")]
    Clear(#[source] StoreError),

    #[error("Embedding chunk {index} failed: {source}")]
    Embed {
        index: usize,
        #[source]
        source: ProviderError,
    },
}

/// Clear the store, then embed and insert every chunk.
pub async fn seed_knowledge(
    embedder: &dyn Provider,
    writer: &dyn KnowledgeWriter,
    model: &str,
    chunks: &[String],
) -> Result<SeedReport, SeedError> {
    info!(count = chunks.len(), "Starting knowledge seed");

    writer.clear().await.map_err(SeedError::Clear)?;

    let mut report = SeedReport::default();

    for (i, chunk) in chunks.iter().enumerate() {
        let response = embedder
            .embed(EmbeddingRequest {
                model: model.to_string(),
                inputs: vec![chunk.clone()],
            })
            .await
            .map_err(|source| SeedError::Embed {
                index: i + 1,
                source,
            })?;

        let Some(embedding) = response.embeddings.into_iter().next() else {
            warn!(chunk = i + 1, "Embedding response was empty, skipping chunk");
            report.failed += 1;
            continue;
        };

        let record = KnowledgeRecord {
            content: chunk.clone(),
            embedding,
        };

        match writer.insert(record).await {
            Ok(()) => {
                info!(chunk = i + 1, "Chunk inserted");
                report.inserted += 1;
            }
            Err(e) => {
                warn!(chunk = i + 1, error = %e, "Chunk insert failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
