//! Vector similarity utilities.
//!
//! Mirrors what the pgvector match function does server-side, so the
//! in-memory store ranks chunks the same way the hosted one does.

use tutorgate_core::knowledge::{ContextChunk, KnowledgeRecord};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank records by cosine similarity to a query embedding.
///
/// Records scoring below `min_score` are dropped; the rest come back most
/// similar first, at most `limit` of them.
pub fn vector_search(
    records: &[KnowledgeRecord],
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<ContextChunk> {
    let mut scored: Vec<(f32, &KnowledgeRecord)> = records
        .iter()
        .filter_map(|record| {
            let sim = cosine_similarity(&record.embedding, query_embedding);
            (sim >= min_score).then_some((sim, record))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
        .into_iter()
        .map(|(sim, record)| ContextChunk::new(record.content.clone(), sim))
        .collect()
}
