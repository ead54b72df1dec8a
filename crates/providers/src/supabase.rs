//! Supabase backend, spoken to over its PostgREST API.
//!
//! One client covers three roles:
//! - similarity search via the `match_function` RPC (pgvector)
//! - knowledge writes for seeding
//! - the append-only conversation log table
//!
//! Missing credentials never panic: every call returns a `NotConfigured`
//! error instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tutorgate_config::SupabaseConfig;
use tutorgate_core::error::{LogError, StoreError};
use tutorgate_core::knowledge::{
    ContextChunk, KnowledgeRecord, KnowledgeWriter, SimilarityQuery, SimilarityStore,
};
use tutorgate_core::log::{ConversationLog, LogEntry};

pub struct SupabaseClient {
    url: Option<String>,
    key: Option<String>,
    match_function: String,
    knowledge_table: String,
    messages_table: String,
    client: reqwest::Client,
}

/// Why a PostgREST call failed, before mapping onto a caller's error type.
enum RestFailure {
    NotConfigured,
    Network(String),
    Status(u16, String),
}

impl SupabaseClient {
    pub fn from_config(config: &SupabaseConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url: config
                .url
                .as_deref()
                .filter(|u| !u.is_empty())
                .map(|u| u.trim_end_matches('/').to_string()),
            key: config.key.clone().filter(|k| !k.is_empty()),
            match_function: config.match_function.clone(),
            knowledge_table: config.knowledge_table.clone(),
            messages_table: config.messages_table.clone(),
            client,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), RestFailure> {
        match (self.url.as_deref(), self.key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(RestFailure::NotConfigured),
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, RestFailure> {
        let (url, key) = self.credentials()?;
        Ok(self
            .client
            .request(method, format!("{url}/rest/v1/{path}"))
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}")))
    }

    async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, RestFailure> {
        let response = builder
            .send()
            .await
            .map_err(|e| RestFailure::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Supabase returned error");
            return Err(RestFailure::Status(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn insert_row<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<(), RestFailure> {
        let builder = self
            .request(reqwest::Method::POST, table)?
            .header("Prefer", "return=minimal")
            .json(row);
        Self::send(builder).await.map(|_| ())
    }
}

impl RestFailure {
    fn into_store_error(self, write: bool) -> StoreError {
        match self {
            Self::NotConfigured => {
                StoreError::NotConfigured("SUPABASE_URL and SUPABASE_KEY must be set".into())
            }
            Self::Network(e) => StoreError::Network(e),
            Self::Status(code, body) if write => {
                StoreError::WriteFailed(format!("status {code}: {body}"))
            }
            Self::Status(code, body) => StoreError::QueryFailed(format!("status {code}: {body}")),
        }
    }

    fn into_log_error(self) -> LogError {
        match self {
            Self::NotConfigured => {
                LogError::NotConfigured("SUPABASE_URL and SUPABASE_KEY must be set".into())
            }
            Self::Network(e) => LogError::Network(e),
            Self::Status(code, body) => LogError::WriteFailed(format!("status {code}: {body}")),
        }
    }
}

#[derive(Serialize)]
struct MatchParams<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

#[derive(Deserialize)]
struct MatchRow {
    content: String,
    similarity: f32,
}

#[async_trait]
impl SimilarityStore for SupabaseClient {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn search(&self, query: SimilarityQuery) -> Result<Vec<ContextChunk>, StoreError> {
        let params = MatchParams {
            query_embedding: &query.embedding,
            match_threshold: query.match_threshold,
            match_count: query.match_count,
        };

        debug!(function = %self.match_function, count = query.match_count, "Similarity search");

        let builder = self
            .request(
                reqwest::Method::POST,
                &format!("rpc/{}", self.match_function),
            )
            .map_err(|f| f.into_store_error(false))?
            .json(&params);

        let response = Self::send(builder)
            .await
            .map_err(|f| f.into_store_error(false))?;

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Failed to parse matches: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| ContextChunk::new(r.content, r.similarity))
            .collect())
    }
}

#[async_trait]
impl KnowledgeWriter for SupabaseClient {
    async fn clear(&self) -> Result<(), StoreError> {
        // PostgREST refuses an unfiltered DELETE; `id <> 0` matches every row.
        let builder = self
            .request(
                reqwest::Method::DELETE,
                &format!("{}?id=neq.0", self.knowledge_table),
            )
            .map_err(|f| f.into_store_error(true))?;

        Self::send(builder)
            .await
            .map(|_| ())
            .map_err(|f| f.into_store_error(true))
    }

    async fn insert(&self, record: KnowledgeRecord) -> Result<(), StoreError> {
        self.insert_row(&self.knowledge_table, &record)
            .await
            .map_err(|f| f.into_store_error(true))
    }
}

#[async_trait]
impl ConversationLog for SupabaseClient {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn append(&self, entry: LogEntry) -> Result<(), LogError> {
        self.insert_row(&self.messages_table, &entry)
            .await
            .map_err(RestFailure::into_log_error)
    }
}
