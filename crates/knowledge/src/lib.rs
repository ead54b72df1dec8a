//! Knowledge base and conversation log backends for tutorgate.
//!
//! The production backend (Supabase) lives in `tutorgate-providers`; this
//! crate holds the in-process implementations and the seeding workflow.

pub mod in_memory;
pub mod log;
pub mod seed;
pub mod vector;

pub use in_memory::InMemoryKnowledgeStore;
pub use log::{InMemoryLog, NoopLog};
pub use seed::{KnowledgeFile, SeedError, SeedReport, seed_knowledge};
pub use vector::{cosine_similarity, vector_search};
