//! Backend implementations for tutorgate.
//!
//! The OpenAI-compatible provider implements `tutorgate_core::Provider`;
//! the Supabase client implements the knowledge store and conversation log
//! traits. `build_from_config` wires them up from an `AppConfig`.

pub mod openai_compat;
pub mod router;
pub mod supabase;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{Backends, build_from_config};
pub use supabase::SupabaseClient;
