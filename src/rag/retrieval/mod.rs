// Retrieval: provider search, score normalization, relevance filtering
pub mod engine;
pub mod normalize;

pub use engine::{HitCache, RetrievalConfig, Retriever};
pub use normalize::{NormalizationPolicy, ScoreOrder};
