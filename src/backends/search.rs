//! Scored-search provider seam and its HTTP adapter
//!
//! The provider owns full-text indexing and ranking; this side only sends an
//! expression and decodes the ranked hits it gets back.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{Phase, RagError, Result};

/// Default search service endpoint
pub const DEFAULT_SEARCH_URL: &str = "http://127.0.0.1:8700";

/// Transport-level timeout; the pipeline applies its own tighter budget
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One ranked hit with the provider's raw score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: i64,
    pub title: String,
    pub category: String,
    pub snippet: String,
    /// Provider-specific, unbounded; direction depends on the provider
    pub score: f64,
}

/// External full-text search
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Ranked hits for `expression`, at most `limit` of them
    async fn search(&self, expression: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Search endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    expression: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchResponse {
    results: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    document_id: Option<i64>,
    title: Option<String>,
    category: Option<String>,
    snippet: Option<String>,
    score: Option<f64>,
}

impl TryFrom<RawHit> for SearchHit {
    type Error = RagError;

    fn try_from(raw: RawHit) -> Result<Self> {
        let document_id = raw.document_id.ok_or_else(|| missing("document_id"))?;
        if document_id < 0 {
            return Err(RagError::InvalidResponse {
                field: "document_id",
                reason: format!("must be non-negative, got {}", document_id),
            });
        }

        let title = raw.title.ok_or_else(|| missing("title"))?;
        if title.trim().is_empty() {
            return Err(RagError::InvalidResponse {
                field: "title",
                reason: "must not be empty".to_string(),
            });
        }

        let score = raw.score.ok_or_else(|| missing("score"))?;
        if !score.is_finite() {
            return Err(RagError::InvalidResponse {
                field: "score",
                reason: format!("must be finite, got {}", score),
            });
        }

        Ok(Self {
            document_id,
            title,
            category: raw.category.unwrap_or_default(),
            snippet: raw.snippet.ok_or_else(|| missing("snippet"))?,
            score,
        })
    }
}

fn missing(field: &'static str) -> RagError {
    RagError::InvalidResponse {
        field,
        reason: "missing".to_string(),
    }
}

/// Decode a provider payload into validated hits
pub fn decode_hits(body: &str) -> Result<Vec<SearchHit>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    response.results.into_iter().map(SearchHit::try_from).collect()
}

/// Search provider reached over HTTP (`POST {base}/search`)
#[derive(Debug, Clone)]
pub struct HttpSearchProvider {
    client: Client,
    base_url: String,
}

impl HttpSearchProvider {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::HttpError)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, expression: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&SearchRequest { expression, limit })
            .send()
            .await
            .map_err(|e| RagError::upstream(Phase::Retrieval, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::upstream(
                Phase::Retrieval,
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let body = response.text().await?;
        decode_hits(&body)
    }
}
