//! Shared test helpers: scripted collaborators for pipeline tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tutorgate_core::error::{ProviderError, StoreError};
use tutorgate_core::knowledge::{ContextChunk, SimilarityQuery, SimilarityStore};
use tutorgate_core::log::LogEntry;
use tutorgate_core::message::Message;
use tutorgate_core::provider::*;
use tutorgate_knowledge::InMemoryLog;

use crate::stream::{FrameReceiver, StreamFrame};

/// Embeds every text as `[chars, 1.0]`, or fails every call.
pub struct ScriptedEmbedder {
    fail: bool,
    calls: Mutex<usize>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        panic!("ScriptedEmbedder: complete() is not scripted");
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(ProviderError::Network("embedding endpoint unreachable".into()));
        }
        Ok(EmbeddingResponse {
            embeddings: request
                .inputs
                .iter()
                .map(|t| vec![t.chars().count() as f32, 1.0])
                .collect(),
            model: request.model,
            usage: None,
        })
    }
}

/// Returns fixed chunks for every search, or fails every call.
pub struct ScriptedStore {
    chunks: Vec<ContextChunk>,
    fail: bool,
    queries: Mutex<Vec<SimilarityQuery>>,
}

impl ScriptedStore {
    /// One chunk per score, named "chunk 0", "chunk 1", ...
    pub fn scores(scores: &[f32]) -> Self {
        Self {
            chunks: scores
                .iter()
                .enumerate()
                .map(|(i, s)| ContextChunk::new(format!("chunk {i}"), *s))
                .collect(),
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            chunks: Vec::new(),
            fail: true,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn last_query(&self) -> Option<SimilarityQuery> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SimilarityStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted_store"
    }

    async fn search(&self, query: SimilarityQuery) -> Result<Vec<ContextChunk>, StoreError> {
        self.queries.lock().unwrap().push(query);
        if self.fail {
            return Err(StoreError::QueryFailed("rpc failed".into()));
        }
        Ok(self.chunks.clone())
    }
}

/// Streams scripted deltas, optionally ending in an error.
pub struct ScriptedGenerator {
    deltas: Vec<String>,
    error: Option<ProviderError>,
    fail_to_start: bool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedGenerator {
    pub fn deltas(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            error: None,
            fail_to_start: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Stream `deltas`, then an interruption error.
    pub fn interrupted_after(deltas: &[&str]) -> Self {
        Self {
            error: Some(ProviderError::StreamInterrupted("connection reset".into())),
            ..Self::deltas(deltas)
        }
    }

    /// Refuse the request outright.
    pub fn unavailable() -> Self {
        Self {
            fail_to_start: true,
            ..Self::deltas(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted_generator"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        Ok(ProviderResponse {
            message: Message::assistant(self.deltas.concat()),
            usage: None,
            model: "mock-model".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if self.fail_to_start {
            return Err(ProviderError::ApiError {
                status_code: 503,
                message: "model overloaded".into(),
            });
        }

        let (tx, rx) = mpsc::channel(self.deltas.len() + 2);
        for delta in &self.deltas {
            let _ = tx.try_send(Ok(StreamChunk::text(delta.clone())));
        }
        match &self.error {
            Some(e) => {
                let _ = tx.try_send(Err(e.clone()));
            }
            None => {
                let _ = tx.try_send(Ok(StreamChunk::finished(None)));
            }
        }
        Ok(rx)
    }
}

/// Drain a frame receiver to the end.
pub async fn collect_frames(mut rx: FrameReceiver) -> Vec<StreamFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

/// Poll the log until it holds at least `n` entries (log writes are
/// detached tasks).
pub async fn wait_for_entries(log: &InMemoryLog, n: usize) -> Vec<LogEntry> {
    for _ in 0..100 {
        let entries = log.entries().await;
        if entries.len() >= n {
            return entries;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("log never reached {n} entries: {:?}", log.entries().await);
}
