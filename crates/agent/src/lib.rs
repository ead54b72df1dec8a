//! The chat pipeline: the heart of tutorgate.
//!
//! For every incoming message the pipeline decides whether the caller is
//! **trusted**, retrieves knowledge for the question, and lets the
//! **gatekeeper** block probationary callers whose question does not match
//! the knowledge base well enough. Allowed requests get a bounded prompt
//! (system instructions + context + recent turns) streamed through the
//! generator; blocked ones get a fixed rejection.

pub mod gatekeeper;
pub mod pipeline;
pub mod prompt;
pub mod request;
pub mod retriever;
pub mod stream;
pub mod trust;

#[cfg(test)]
mod test_helpers;

pub use gatekeeper::{GateDecision, Gatekeeper};
pub use pipeline::{ChatPipeline, ChatReply, PipelineSettings};
pub use prompt::{PromptAssembler, PromptTemplate};
pub use request::{ChatRequest, IncomingTurn};
pub use retriever::ContextRetriever;
pub use stream::{FrameReceiver, ResponseStreamer, StreamFrame, contact_block};
pub use trust::{TrustClassifier, TrustState};
