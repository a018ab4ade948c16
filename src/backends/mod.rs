//! External collaborators consumed by the pipeline
//!
//! - Search: ranked full-text hits for an expression
//! - Generation: opaque text completion

pub mod generation;
pub mod search;

pub use generation::{GenerationBackend, OllamaBackend, OllamaConfig, SamplingParams};
pub use search::{HttpSearchProvider, SearchConfig, SearchHit, SearchProvider};
