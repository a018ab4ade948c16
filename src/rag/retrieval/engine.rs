// Retriever: optimized expression -> provider hits -> normalized, filtered documents
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backends::search::{SearchHit, SearchProvider};
use crate::cache::{generate_key, TtlCache};
use crate::errors::Result;
use crate::rag::query::{Lexicon, QueryOptimizer, DEFAULT_MAX_TERMS};
use crate::rag::retrieval::normalize::{NormalizationPolicy, ScoreOrder};
use crate::rag::types::{validate_min_relevance, validate_top_k, ScoredDocument};

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Budget for the whole retrieval phase
    pub timeout_ms: u64,
    /// Default number of documents per query
    pub top_k: usize,
    /// Default aggregate relevance floor (0.0 to 1.0)
    pub min_relevance: f64,
    /// Direction of the provider's raw scores
    pub score_order: ScoreOrder,
    /// Strength under which an identical-score set is treated as weak
    pub weak_match_strength: f64,
    /// Normalized score given to a weak identical-score set
    pub weak_match_score: f64,
    /// Cap on terms in the optimized expression
    pub max_terms: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let policy = NormalizationPolicy::default();
        Self {
            timeout_ms: 300,
            top_k: 5,
            min_relevance: 0.3,
            score_order: policy.order,
            weak_match_strength: policy.weak_match_strength,
            weak_match_score: policy.weak_match_score,
            max_terms: DEFAULT_MAX_TERMS,
        }
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn normalization(&self) -> NormalizationPolicy {
        NormalizationPolicy {
            order: self.score_order,
            weak_match_strength: self.weak_match_strength,
            weak_match_score: self.weak_match_score,
        }
    }
}

/// Retrieval-tier cache of raw provider hits
pub type HitCache = TtlCache<Vec<SearchHit>>;

/// Turns a free-text query into a ranked, normalized document list
pub struct Retriever {
    provider: Arc<dyn SearchProvider>,
    optimizer: QueryOptimizer,
    policy: NormalizationPolicy,
    cache: Option<(Arc<HitCache>, Duration)>,
}

impl Retriever {
    /// Create a retriever without a hit cache
    pub fn new(provider: Arc<dyn SearchProvider>, config: &RetrievalConfig) -> Self {
        Self {
            provider,
            optimizer: QueryOptimizer::with_lexicon(Lexicon::corporate(), config.max_terms),
            policy: config.normalization(),
            cache: None,
        }
    }

    /// Cache raw provider hits for `ttl`
    pub fn with_cache(mut self, cache: Arc<HitCache>, ttl: Duration) -> Self {
        self.cache = Some((cache, ttl));
        self
    }

    pub fn with_optimizer(mut self, optimizer: QueryOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn optimizer(&self) -> &QueryOptimizer {
        &self.optimizer
    }

    /// Retrieve documents for `query`
    ///
    /// An empty result is a valid outcome: either nothing searchable was left
    /// after optimization, or the best match is below `min_relevance`.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        min_relevance: f64,
    ) -> Result<Vec<ScoredDocument>> {
        validate_top_k(top_k)?;
        validate_min_relevance(min_relevance)?;

        let expression = self.optimizer.optimize(query);
        if expression.is_empty() {
            debug!("no searchable terms after optimization");
            return Ok(Vec::new());
        }

        let hits = self.fetch_hits(&expression, top_k).await?;
        let documents = self.score(hits, top_k);

        let best = documents
            .iter()
            .map(|d| d.relevance_score)
            .fold(0.0_f64, f64::max);
        if documents.is_empty() || best < min_relevance {
            debug!(
                best,
                min_relevance,
                candidates = documents.len(),
                "no document reached the relevance floor"
            );
            return Ok(Vec::new());
        }

        debug!(%expression, documents = documents.len(), best, "retrieval complete");
        Ok(documents)
    }

    async fn fetch_hits(&self, expression: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let key = generate_key(&format!("{}|{}", expression, top_k));

        if let Some((cache, _)) = &self.cache {
            if let Some(hits) = cache.get(&key) {
                debug!(%expression, "retrieval cache hit");
                return Ok(hits);
            }
        }

        let hits = self.provider.search(expression, top_k).await?;

        if let Some((cache, ttl)) = &self.cache {
            cache.set(key, hits.clone(), *ttl);
        }
        Ok(hits)
    }

    fn score(&self, hits: Vec<SearchHit>, top_k: usize) -> Vec<ScoredDocument> {
        let total = hits.len();
        let hits: Vec<SearchHit> = hits.into_iter().filter(|h| h.score.is_finite()).collect();
        if hits.len() < total {
            warn!(dropped = total - hits.len(), "provider returned non-finite scores");
        }

        let raw: Vec<f64> = hits.iter().map(|h| h.score).collect();
        let normalized = self.policy.normalize(&raw);
        let retrieved_at = Utc::now();

        let mut documents: Vec<ScoredDocument> = hits
            .into_iter()
            .zip(normalized)
            .map(|(hit, relevance_score)| ScoredDocument {
                document_id: hit.document_id,
                title: hit.title,
                category: hit.category,
                snippet: hit.snippet,
                relevance_score,
                retrieved_at,
            })
            .collect();

        // Stable sort keeps provider order among equal scores
        documents.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        documents.truncate(top_k);
        documents
    }
}
