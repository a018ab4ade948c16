// Retrieval-augmented query serving
//
// Components:
// - Query optimizer: free text -> search expression
// - Retriever: provider search, score normalization, relevance floor
// - Context builder: token-budgeted snippet packing
// - Pipeline: cache, deadlines, generation, fallbacks

pub mod context;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod retrieval;
pub mod tokens;
pub mod types;

// Re-export key types
pub use context::{AssembledContext, ContextBuilder, ContextConfig};
pub use pipeline::{
    GenerationConfig, PipelineCacheStats, PipelineConfig, RagConfig, RagPipeline, ResponseCache,
};
pub use query::QueryOptimizer;
pub use retrieval::{RetrievalConfig, Retriever};
pub use types::{PipelineResult, QueryRequest, ScoredDocument, SourceRef};
