//! ragserve - retrieval-augmented question answering over a document corpus
//!
//! # Architecture
//!
//! - **cache**: bounded TTL/LRU store, used for retrieval hits and answers
//! - **rag**: query optimization, retrieval, context packing, orchestration
//! - **backends**: search provider and generation backend seams
//! - **telemetry**: per-request outcome counters

pub mod errors;

// Re-export commonly used types
pub use errors::{RagError, Result};

pub mod backends;
pub mod cache;
pub mod cli;
pub mod config;
pub mod rag;
pub mod telemetry;

pub use rag::{PipelineResult, QueryRequest, RagPipeline};
