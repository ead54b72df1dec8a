//! Backend wiring: turns an `AppConfig` into the collaborators the chat
//! pipeline needs.

use std::sync::Arc;

use tutorgate_config::AppConfig;
use tutorgate_core::knowledge::{KnowledgeWriter, SimilarityStore};
use tutorgate_core::log::ConversationLog;
use tutorgate_core::provider::Provider;
use tutorgate_knowledge::NoopLog;

use crate::openai_compat::OpenAiCompatProvider;
use crate::supabase::SupabaseClient;

/// Every external collaborator, behind its trait.
#[derive(Clone)]
pub struct Backends {
    /// Streams answers
    pub generator: Arc<dyn Provider>,
    /// Turns text into vectors
    pub embedder: Arc<dyn Provider>,
    pub store: Arc<dyn SimilarityStore>,
    pub writer: Arc<dyn KnowledgeWriter>,
    pub log: Arc<dyn ConversationLog>,
}

/// Build backends from configuration.
///
/// The same OpenAI-compatible provider serves generation and embeddings, and
/// one Supabase client serves search, seeding and logging. With
/// `logging.conversation_log = false` the log is a no-op sink.
pub fn build_from_config(config: &AppConfig) -> Backends {
    let openai: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.model.api_url,
        config.api_key.clone(),
    ));

    let supabase = Arc::new(SupabaseClient::from_config(&config.supabase));

    let log: Arc<dyn ConversationLog> = if config.logging.conversation_log {
        supabase.clone()
    } else {
        Arc::new(NoopLog)
    };

    Backends {
        generator: openai.clone(),
        embedder: openai,
        store: supabase.clone(),
        writer: supabase,
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_from_default_config() {
        let backends = build_from_config(&AppConfig::default());
        assert_eq!(backends.generator.name(), "openai");
        assert_eq!(backends.store.name(), "supabase");
        assert_eq!(backends.log.name(), "supabase");
    }

    #[test]
    fn disabled_logging_uses_noop_sink() {
        let mut config = AppConfig::default();
        config.logging.conversation_log = false;
        let backends = build_from_config(&config);
        assert_eq!(backends.log.name(), "none");
    }
}
