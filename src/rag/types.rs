//! Records flowing through the query-serving pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{RagError, Result};

/// Longest query accepted, in characters
pub const MAX_QUERY_CHARS: usize = 2000;

/// Inclusive bounds for `top_k`
pub const TOP_K_RANGE: (usize, usize) = (1, 10);

/// Inclusive bounds for sampling temperature
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

/// Inclusive bounds for generated tokens
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 4096);

/// Document returned by retrieval with a normalized relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document_id: i64,
    pub title: String,
    pub category: String,
    pub snippet: String,
    /// Normalized into `[0.0, 1.0]`, best match is `1.0`
    pub relevance_score: f64,
    pub retrieved_at: DateTime<Utc>,
}

/// Citation attached to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: i64,
    pub title: String,
    pub relevance_score: f64,
}

impl From<&ScoredDocument> for SourceRef {
    fn from(doc: &ScoredDocument) -> Self {
        Self {
            document_id: doc.document_id,
            title: doc.title.clone(),
            relevance_score: doc.relevance_score,
        }
    }
}

/// Outcome of one query, identical in shape on every branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub response_time_ms: u64,
    pub retrieval_time_ms: u64,
    pub llm_time_ms: u64,
    pub cache_hit: bool,
    /// Always equal to `sources.len()`
    pub documents_retrieved: usize,
}

impl PipelineResult {
    /// Build a result whose document count tracks its sources
    pub fn new(answer: String, sources: Vec<SourceRef>) -> Self {
        let documents_retrieved = sources.len();
        Self {
            answer,
            sources,
            response_time_ms: 0,
            retrieval_time_ms: 0,
            llm_time_ms: 0,
            cache_hit: false,
            documents_retrieved,
        }
    }
}

/// Parameters of a single `serve` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub user_id: Option<String>,
    pub top_k: usize,
    pub min_relevance: f64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl QueryRequest {
    /// Request with default retrieval and sampling parameters
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_id: None,
            top_k: 5,
            min_relevance: 0.3,
            temperature: 0.3,
            max_tokens: 512,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_relevance(mut self, min_relevance: f64) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Reject malformed requests before any I/O happens
    pub fn validate(&self) -> Result<()> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(RagError::invalid("query", "must not be empty"));
        }
        let chars = query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(RagError::invalid(
                "query",
                format!("must be at most {} characters, got {}", MAX_QUERY_CHARS, chars),
            ));
        }

        validate_top_k(self.top_k)?;
        validate_min_relevance(self.min_relevance)?;

        let (t_min, t_max) = TEMPERATURE_RANGE;
        if !(t_min..=t_max).contains(&self.temperature) {
            return Err(RagError::invalid(
                "temperature",
                format!("must be between {} and {}, got {}", t_min, t_max, self.temperature),
            ));
        }

        let (m_min, m_max) = MAX_TOKENS_RANGE;
        if !(m_min..=m_max).contains(&self.max_tokens) {
            return Err(RagError::invalid(
                "max_tokens",
                format!("must be between {} and {}, got {}", m_min, m_max, self.max_tokens),
            ));
        }

        Ok(())
    }
}

pub(crate) fn validate_top_k(top_k: usize) -> Result<()> {
    let (min, max) = TOP_K_RANGE;
    if !(min..=max).contains(&top_k) {
        return Err(RagError::invalid(
            "top_k",
            format!("must be between {} and {}, got {}", min, max, top_k),
        ));
    }
    Ok(())
}

pub(crate) fn validate_min_relevance(min_relevance: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&min_relevance) {
        return Err(RagError::invalid(
            "min_relevance",
            format!("must be between 0.0 and 1.0, got {}", min_relevance),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_is_valid() {
        assert!(QueryRequest::new("politica de vacaciones").validate().is_ok());
    }

    #[test]
    fn test_blank_query_rejected() {
        let err = QueryRequest::new("   ").validate().unwrap_err();
        assert!(matches!(err, RagError::InvalidInput { field: "query", .. }));
    }

    #[test]
    fn test_overlong_query_rejected() {
        let err = QueryRequest::new("a".repeat(MAX_QUERY_CHARS + 1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput { field: "query", .. }));
    }

    #[test]
    fn test_top_k_bounds() {
        for top_k in [0, 11, 100] {
            let err = QueryRequest::new("q").with_top_k(top_k).validate().unwrap_err();
            assert!(matches!(err, RagError::InvalidInput { field: "top_k", .. }));
        }
        for top_k in [1, 10] {
            assert!(QueryRequest::new("q").with_top_k(top_k).validate().is_ok());
        }
    }

    #[test]
    fn test_sampling_bounds() {
        let err = QueryRequest::new("q").with_sampling(2.5, 100).validate().unwrap_err();
        assert!(matches!(err, RagError::InvalidInput { field: "temperature", .. }));

        let err = QueryRequest::new("q").with_sampling(0.5, 0).validate().unwrap_err();
        assert!(matches!(err, RagError::InvalidInput { field: "max_tokens", .. }));
    }

    #[test]
    fn test_min_relevance_bounds() {
        let err = QueryRequest::new("q").with_min_relevance(1.5).validate().unwrap_err();
        assert!(matches!(err, RagError::InvalidInput { field: "min_relevance", .. }));
    }

    #[test]
    fn test_result_counts_sources() {
        let result = PipelineResult::new(
            "answer".to_string(),
            vec![SourceRef {
                document_id: 7,
                title: "Manual".to_string(),
                relevance_score: 1.0,
            }],
        );
        assert_eq!(result.documents_retrieved, result.sources.len());
        assert!(!result.cache_hit);
    }
}
