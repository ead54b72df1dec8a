//! The chat pipeline.
//!
//! Per request, strictly in order:
//!
//! 1. **Validate** the conversation (nothing is called or logged on failure)
//! 2. **Log** the user turn (detached)
//! 3. **Classify** trust from the prior turns
//! 4. **Retrieve** context for the latest user message
//! 5. **Gate**: probationary callers need a confident top chunk
//! 6. **Stream** either the canned rejection or a generated answer
//!
//! Collaborators are injected as trait objects, so no state is shared across
//! requests beyond them.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tutorgate_config::AppConfig;
use tutorgate_core::error::Error;
use tutorgate_core::knowledge::SimilarityStore;
use tutorgate_core::log::{ConversationLog, LogEntry};
use tutorgate_core::message::SessionId;
use tutorgate_core::provider::{Provider, ProviderRequest};
use tutorgate_providers::Backends;

use crate::gatekeeper::{GateDecision, Gatekeeper};
use crate::prompt::{PromptAssembler, PromptTemplate};
use crate::request::ChatRequest;
use crate::retriever::ContextRetriever;
use crate::stream::{FrameReceiver, ResponseStreamer, spawn_log};
use crate::trust::{TrustClassifier, TrustState};

/// Tunables pulled out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_k: usize,
    pub match_floor: f32,
    pub confidence_threshold: f32,
    pub trust_ratchet: bool,
    pub history_limit: usize,
    pub max_message_chars: usize,
    pub welcome_message: String,
    pub template: PromptTemplate,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chat_model: config.model.chat_model.clone(),
            embedding_model: config.model.embedding_model.clone(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            top_k: config.retrieval.top_k,
            match_floor: config.retrieval.match_floor,
            confidence_threshold: config.gate.confidence_threshold,
            trust_ratchet: config.gate.trust_ratchet,
            history_limit: config.chat.history_limit,
            max_message_chars: config.chat.max_message_chars,
            welcome_message: config.prompt.welcome_message.clone(),
            template: PromptTemplate::from(&config.prompt),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What the pipeline decided, plus the frames to send.
pub struct ChatReply {
    pub session: SessionId,
    pub trust: TrustState,
    pub decision: GateDecision,
    pub top_score: Option<f32>,
    pub frames: FrameReceiver,
    /// Cancelling stops generation and releases the provider stream.
    pub cancel: CancellationToken,
}

pub struct ChatPipeline {
    generator: Arc<dyn Provider>,
    log: Arc<dyn ConversationLog>,
    settings: PipelineSettings,
    classifier: TrustClassifier,
    retriever: ContextRetriever,
    gatekeeper: Gatekeeper,
    assembler: PromptAssembler,
    streamer: ResponseStreamer,
}

impl ChatPipeline {
    pub fn new(
        generator: Arc<dyn Provider>,
        embedder: Arc<dyn Provider>,
        store: Arc<dyn SimilarityStore>,
        log: Arc<dyn ConversationLog>,
        settings: PipelineSettings,
    ) -> Self {
        let classifier = TrustClassifier::new(
            settings.welcome_message.clone(),
            settings.template.rejection_message.clone(),
        )
        .with_ratchet(settings.trust_ratchet);

        let retriever = ContextRetriever::new(embedder, store, settings.embedding_model.clone())
            .with_limits(settings.top_k, settings.match_floor);

        let streamer = ResponseStreamer::new(
            log.clone(),
            settings.template.rejection_message.clone(),
            settings.template.contact_email.clone(),
        );

        Self {
            generator,
            log,
            classifier,
            retriever,
            gatekeeper: Gatekeeper::new(settings.confidence_threshold),
            assembler: PromptAssembler::new(settings.template.clone(), settings.history_limit),
            streamer,
            settings,
        }
    }

    pub fn from_backends(backends: &Backends, config: &AppConfig) -> Self {
        Self::new(
            backends.generator.clone(),
            backends.embedder.clone(),
            backends.store.clone(),
            backends.log.clone(),
            PipelineSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatReply, Error> {
        self.handle_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run one request. Validation, embedding, store and generation-start
    /// failures come back as `Err`; anything after the first frame is
    /// reported through the frame stream.
    pub async fn handle_with_cancel(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatReply, Error> {
        let conversation = request.validate(self.settings.max_message_chars)?;
        let session = request.session();
        let query = conversation.latest().content.clone();

        spawn_log(self.log.clone(), LogEntry::user(&session, query.clone()));

        let trust = self.classifier.classify(conversation.history());
        let chunks = self.retriever.retrieve(&query).await?;
        let decision = self.gatekeeper.decide(trust, &chunks);
        let top_score = chunks.first().map(|c| c.score);

        info!(
            session_id = %session,
            trust = %trust,
            chunks = chunks.len(),
            top_score,
            blocked = decision.is_blocked(),
            "Gate decision"
        );

        let frames = match decision {
            GateDecision::Blocked => self.streamer.reject(&session),
            GateDecision::Allowed => {
                let messages = self.assembler.assemble(&chunks, &conversation);
                debug!(
                    session_id = %session,
                    turns = messages.len(),
                    "Prompt assembled"
                );

                let upstream = self
                    .generator
                    .stream(ProviderRequest {
                        model: self.settings.chat_model.clone(),
                        messages,
                        temperature: self.settings.temperature,
                        max_tokens: self.settings.max_tokens,
                        stream: true,
                    })
                    .await?;

                self.streamer
                    .generate(upstream, session.clone(), cancel.clone())
            }
        };

        Ok(ChatReply {
            session,
            trust,
            decision,
            top_score,
            frames,
            cancel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::IncomingTurn;
    use crate::stream::{StreamFrame, contact_block};
    use crate::test_helpers::*;
    use tutorgate_core::log::LogSource;
    use tutorgate_core::message::{Role, TurnKind};
    use tutorgate_knowledge::InMemoryLog;

    struct Harness {
        generator: Arc<ScriptedGenerator>,
        embedder: Arc<ScriptedEmbedder>,
        store: Arc<ScriptedStore>,
        log: InMemoryLog,
        pipeline: ChatPipeline,
    }

    fn harness(
        generator: ScriptedGenerator,
        embedder: ScriptedEmbedder,
        store: ScriptedStore,
    ) -> Harness {
        harness_with_log(generator, embedder, store, InMemoryLog::new())
    }

    fn harness_with_log(
        generator: ScriptedGenerator,
        embedder: ScriptedEmbedder,
        store: ScriptedStore,
        log: InMemoryLog,
    ) -> Harness {
        let generator = Arc::new(generator);
        let embedder = Arc::new(embedder);
        let store = Arc::new(store);
        let pipeline = ChatPipeline::new(
            generator.clone(),
            embedder.clone(),
            store.clone(),
            Arc::new(log.clone()),
            PipelineSettings::default(),
        );
        Harness {
            generator,
            embedder,
            store,
            log,
            pipeline,
        }
    }

    fn welcome() -> String {
        PipelineSettings::default().welcome_message
    }

    fn first_message(text: &str) -> ChatRequest {
        ChatRequest::new(
            "s-1",
            vec![
                IncomingTurn::new("assistant", welcome()),
                IncomingTurn::new("user", text),
            ],
        )
    }

    fn texts(frames: &[StreamFrame]) -> String {
        frames.iter().filter_map(|f| f.text()).collect()
    }

    #[tokio::test]
    async fn off_topic_first_message_is_rejected() {
        let h = harness(
            ScriptedGenerator::deltas(&["should not run"]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.05]),
        );

        let reply = h.pipeline.handle(&first_message("What is a stack?")).await.unwrap();
        assert_eq!(reply.trust, TrustState::Probation);
        assert_eq!(reply.decision, GateDecision::Blocked);

        let frames = collect_frames(reply.frames).await;
        let settings = PipelineSettings::default();
        assert_eq!(
            frames,
            vec![
                StreamFrame::Content(settings.template.rejection_message.clone()),
                StreamFrame::Content(contact_block(&settings.template.contact_email)),
                StreamFrame::Done,
            ]
        );
        assert_eq!(h.generator.calls(), 0);

        let entries = wait_for_entries(&h.log, 2).await;
        assert!(entries.iter().any(|e| e.source == LogSource::User && e.message == "What is a stack?"));
        assert!(entries.iter().any(|e| e.source == LogSource::Ai
            && e.message == settings.template.rejection_message));
    }

    #[tokio::test]
    async fn on_topic_first_message_is_answered() {
        let h = harness(
            ScriptedGenerator::deltas(&["Yes, ", "A-Level CS is covered."]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.6, 0.3]),
        );

        let reply = h
            .pipeline
            .handle(&first_message("Do you teach A-Level Computer Science?"))
            .await
            .unwrap();
        assert_eq!(reply.decision, GateDecision::Allowed);
        assert_eq!(reply.top_score, Some(0.6));

        let frames = collect_frames(reply.frames).await;
        assert_eq!(texts(&frames), "Yes, A-Level CS is covered.");
        assert_eq!(frames.last(), Some(&StreamFrame::Done));

        let request = h.generator.last_request().unwrap();
        assert_eq!(request.model, "gpt-5-nano");
        assert!(request.stream);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("chunk 0\n\nchunk 1"));

        let entries = wait_for_entries(&h.log, 2).await;
        let ai: Vec<_> = entries.iter().filter(|e| e.source == LogSource::Ai).collect();
        assert_eq!(ai.len(), 1);
        assert_eq!(ai[0].message, "Yes, A-Level CS is covered.");
    }

    #[tokio::test]
    async fn trusted_caller_passes_with_low_relevance() {
        let h = harness(
            ScriptedGenerator::deltas(&["I only know about tutoring."]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.02]),
        );

        let request = ChatRequest::new(
            "s-2",
            vec![
                IncomingTurn::new("assistant", welcome()),
                IncomingTurn::new("user", "Do you teach A-Level?"),
                IncomingTurn::new("assistant", "Yes, A-Level CS is covered."),
                IncomingTurn::new("user", "what's your favorite color?"),
            ],
        );

        let reply = h.pipeline.handle(&request).await.unwrap();
        assert_eq!(reply.trust, TrustState::Trusted);
        assert_eq!(reply.decision, GateDecision::Allowed);
        collect_frames(reply.frames).await;
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test]
    async fn trusted_caller_with_no_chunks_still_generates() {
        let h = harness(
            ScriptedGenerator::deltas(&["ok"]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[]),
        );
        let request = ChatRequest::new(
            "s-3",
            vec![
                IncomingTurn {
                    role: "assistant".into(),
                    content: "anything".into(),
                    kind: Some(TurnKind::Content),
                },
                IncomingTurn::new("user", "more?"),
            ],
        );

        let reply = h.pipeline.handle(&request).await.unwrap();
        assert_eq!(reply.decision, GateDecision::Allowed);
        assert_eq!(reply.top_score, None);
    }

    #[tokio::test]
    async fn validation_failure_calls_nothing() {
        let h = harness(
            ScriptedGenerator::deltas(&["x"]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.9]),
        );

        let err = h
            .pipeline
            .handle(&first_message(&"a".repeat(300)))
            .await
            .err()
            .unwrap();
        assert!(err.is_client_error());
        assert_eq!(h.embedder.calls(), 0);
        assert_eq!(h.store.calls(), 0);
        assert_eq!(h.generator.calls(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(h.log.is_empty().await);
    }

    #[tokio::test]
    async fn embedding_failure_is_an_error() {
        let h = harness(
            ScriptedGenerator::deltas(&["x"]),
            ScriptedEmbedder::failing(),
            ScriptedStore::scores(&[0.9]),
        );

        let err = h.pipeline.handle(&first_message("pricing?")).await.err().unwrap();
        assert!(matches!(err, Error::Provider(_)));
        assert!(!err.is_client_error());
        assert_eq!(h.store.calls(), 0);
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn generator_refusal_is_an_error() {
        let h = harness(
            ScriptedGenerator::unavailable(),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.9]),
        );
        let err = h.pipeline.handle(&first_message("pricing?")).await.err().unwrap();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn interrupted_generation_logs_partial_text() {
        let h = harness(
            ScriptedGenerator::interrupted_after(&["Lessons are "]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.9]),
        );

        let reply = h.pipeline.handle(&first_message("pricing?")).await.unwrap();
        let frames = collect_frames(reply.frames).await;
        assert!(!frames.iter().any(StreamFrame::is_done));

        let entries = wait_for_entries(&h.log, 2).await;
        assert!(entries
            .iter()
            .any(|e| e.source == LogSource::Ai && e.message == "Lessons are "));
    }

    #[tokio::test]
    async fn failing_log_never_reaches_the_caller() {
        let answered = harness_with_log(
            ScriptedGenerator::deltas(&["Yes."]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.9]),
            InMemoryLog::failing(),
        );
        let reply = answered
            .pipeline
            .handle(&first_message("Do you teach A-Level?"))
            .await
            .unwrap();
        assert_eq!(
            collect_frames(reply.frames).await,
            vec![StreamFrame::Content("Yes.".into()), StreamFrame::Done]
        );

        let rejected = harness_with_log(
            ScriptedGenerator::deltas(&["unused"]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.05]),
            InMemoryLog::failing(),
        );
        let reply = rejected
            .pipeline
            .handle(&first_message("What is a stack?"))
            .await
            .unwrap();
        let frames = collect_frames(reply.frames).await;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames.last(), Some(&StreamFrame::Done));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(answered.log.is_empty().await);
        assert!(rejected.log.is_empty().await);
    }

    #[tokio::test]
    async fn history_cap_applies_to_generation_request() {
        let h = harness(
            ScriptedGenerator::deltas(&["ok"]),
            ScriptedEmbedder::new(),
            ScriptedStore::scores(&[0.9]),
        );

        let mut turns = Vec::new();
        for i in 0..7 {
            turns.push(IncomingTurn::new("user", format!("q{i}")));
            turns.push(IncomingTurn::new("assistant", format!("a{i}")));
        }
        turns.push(IncomingTurn::new("user", "last"));

        let reply = h.pipeline.handle(&ChatRequest::new("s", turns)).await.unwrap();
        collect_frames(reply.frames).await;

        let request = h.generator.last_request().unwrap();
        assert_eq!(request.messages.len(), 11);
        assert_eq!(request.messages[1].content, "a2");
        assert_eq!(request.messages[10].content, "last");
    }
}
