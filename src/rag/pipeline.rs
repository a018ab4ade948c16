// End-to-end query serving: cache -> retrieval -> context -> generation -> format
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backends::generation::{GenerationBackend, SamplingParams};
use crate::backends::search::SearchProvider;
use crate::cache::{generate_key, CacheConfig, CacheStats, Clock, SystemClock, TtlCache};
use crate::errors::{Phase, RagError, Result};
use crate::rag::context::{ContextBuilder, ContextConfig};
use crate::rag::prompt::{
    self, FAILURE_ANSWER, GENERATION_TIMEOUT_ANSWER, NO_RESULTS_ANSWER, RETRIEVAL_TIMEOUT_ANSWER,
};
use crate::rag::retrieval::{HitCache, RetrievalConfig, Retriever};
use crate::rag::types::{PipelineResult, QueryRequest};
use crate::telemetry::{PipelineEvent, PipelineTelemetry};

/// Response-tier cache of formatted answers
pub type ResponseCache = TtlCache<PipelineResult>;

/// Generation phase configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Budget for the generation call
    pub timeout_ms: u64,
    /// Sampling temperature used when the caller gives none
    pub temperature: f32,
    /// Completion length used when the caller gives none
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 6000,
            temperature: 0.3,
            max_tokens: 512,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Whole-request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hard ceiling on a request; phase budgets are clipped to what is left
    pub request_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_deadline_ms: 8000,
        }
    }
}

impl PipelineConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    pub cache: CacheConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub generation: GenerationConfig,
    pub pipeline: PipelineConfig,
}

/// Statistics for both cache tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineCacheStats {
    pub retrieval: CacheStats,
    pub response: CacheStats,
}

/// Absolute end of a request, shared by every phase
#[derive(Debug, Clone, Copy)]
struct Deadline {
    /// `None` when the budget reaches past what `Instant` can represent
    at: Option<Instant>,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
        }
    }

    fn remaining(&self) -> Duration {
        match self.at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    /// Phase budget clipped to the time left on the request
    fn budget(&self, phase_max: Duration) -> Duration {
        phase_max.min(self.remaining())
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Query-serving orchestrator
///
/// Holds no per-request state; share it behind an `Arc` and call
/// [`RagPipeline::serve`] from as many tasks as needed.
pub struct RagPipeline {
    retriever: Retriever,
    context_builder: ContextBuilder,
    backend: Arc<dyn GenerationBackend>,
    retrieval_cache: Arc<HitCache>,
    response_cache: Arc<ResponseCache>,
    telemetry: PipelineTelemetry,
    config: RagConfig,
}

impl RagPipeline {
    /// Create a pipeline with fresh caches on the system clock
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        backend: Arc<dyn GenerationBackend>,
        config: RagConfig,
    ) -> Self {
        Self::with_clock(provider, backend, config, Arc::new(SystemClock))
    }

    /// Create a pipeline whose caches read time from `clock`
    pub fn with_clock(
        provider: Arc<dyn SearchProvider>,
        backend: Arc<dyn GenerationBackend>,
        config: RagConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let retrieval_cache = Arc::new(HitCache::with_clock(config.cache.capacity, clock.clone()));
        let response_cache = Arc::new(ResponseCache::with_clock(config.cache.capacity, clock));
        Self::with_caches(provider, backend, config, retrieval_cache, response_cache)
    }

    /// Create a pipeline around caches owned by the caller
    pub fn with_caches(
        provider: Arc<dyn SearchProvider>,
        backend: Arc<dyn GenerationBackend>,
        config: RagConfig,
        retrieval_cache: Arc<HitCache>,
        response_cache: Arc<ResponseCache>,
    ) -> Self {
        let retriever = Retriever::new(provider, &config.retrieval)
            .with_cache(retrieval_cache.clone(), config.cache.retrieval_ttl());

        Self {
            retriever,
            context_builder: ContextBuilder::with_config(config.context.clone()),
            backend,
            retrieval_cache,
            response_cache,
            telemetry: PipelineTelemetry::new(),
            config,
        }
    }

    /// Answer one query
    ///
    /// Only input validation produces `Err`. Timeouts and upstream failures
    /// are logged and turned into fallback answers of the same shape.
    pub async fn serve(&self, request: &QueryRequest) -> Result<PipelineResult> {
        request.validate()?;

        let request_id = Uuid::new_v4();
        let user_id = request.user_id.as_deref().unwrap_or("anonymous");
        let span = info_span!("serve", %request_id, user_id = %user_id);

        Ok(self.run(request).instrument(span).await)
    }

    async fn run(&self, request: &QueryRequest) -> PipelineResult {
        let started = Instant::now();
        let deadline = Deadline::after(self.config.pipeline.request_deadline());
        let key = generate_key(&request.query);

        if let Some(cached) = self.response_cache.get(&key) {
            self.telemetry.record(PipelineEvent::CacheHit {
                timestamp: Instant::now(),
            });
            let result = PipelineResult {
                cache_hit: true,
                retrieval_time_ms: 0,
                llm_time_ms: 0,
                response_time_ms: elapsed_ms(started),
                ..cached
            };
            info!(response_time_ms = result.response_time_ms, "response cache hit");
            return result;
        }

        // Retrieval
        let budget = deadline.budget(self.config.retrieval.timeout());
        let retrieval_started = Instant::now();
        let outcome = timeout(
            budget,
            self.retriever
                .retrieve(&request.query, request.top_k, request.min_relevance),
        )
        .await;
        let retrieval_ms = elapsed_ms(retrieval_started);

        let documents = match outcome {
            Ok(Ok(documents)) => {
                self.telemetry.record(PipelineEvent::RetrievalCompleted {
                    duration_ms: retrieval_ms,
                    documents: documents.len(),
                    timestamp: Instant::now(),
                });
                documents
            }
            Ok(Err(err)) => {
                error!(error = %err, retrieval_ms, "retrieval failed");
                self.telemetry.record(PipelineEvent::RetrievalFailed {
                    timestamp: Instant::now(),
                });
                return Self::fallback(FAILURE_ANSWER, started, retrieval_ms, 0);
            }
            Err(_) => {
                let budget_ms = budget.as_millis() as u64;
                let err = RagError::timeout(Phase::Retrieval, retrieval_ms);
                warn!(error = %err, budget_ms, "retrieval abandoned");
                self.telemetry.record(PipelineEvent::RetrievalTimeout {
                    budget_ms,
                    timestamp: Instant::now(),
                });
                return Self::fallback(RETRIEVAL_TIMEOUT_ANSWER, started, retrieval_ms, 0);
            }
        };

        let context = self.context_builder.build(&documents);
        if context.documents.is_empty() {
            self.telemetry.record(PipelineEvent::NoResults {
                timestamp: Instant::now(),
            });
            let mut result =
                PipelineResult::new(prompt::with_disclaimer(NO_RESULTS_ANSWER), Vec::new());
            result.retrieval_time_ms = retrieval_ms;
            result.response_time_ms = elapsed_ms(started);
            self.response_cache
                .set(key, result.clone(), self.config.cache.no_results_ttl());
            info!(retrieved = documents.len(), "no relevant documents, skipping generation");
            return result;
        }

        let augmented = prompt::augment(&context.text, &request.query);
        debug!(
            documents = context.document_count(),
            context_tokens = context.estimated_tokens,
            truncated = context.truncated,
            "context assembled"
        );

        // Generation
        let budget = deadline.budget(self.config.generation.timeout());
        let params = SamplingParams {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let generation_started = Instant::now();
        let outcome = timeout(budget, self.backend.complete(&augmented, params)).await;
        let llm_ms = elapsed_ms(generation_started);

        let answer = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                error!(error = %err, llm_ms, "generation failed");
                self.telemetry.record(PipelineEvent::GenerationFailed {
                    timestamp: Instant::now(),
                });
                return Self::fallback(FAILURE_ANSWER, started, retrieval_ms, llm_ms);
            }
            Err(_) => {
                let budget_ms = budget.as_millis() as u64;
                let err = RagError::timeout(Phase::Generation, llm_ms);
                warn!(error = %err, budget_ms, "generation abandoned");
                self.telemetry.record(PipelineEvent::GenerationTimeout {
                    budget_ms,
                    timestamp: Instant::now(),
                });
                return Self::fallback(GENERATION_TIMEOUT_ANSWER, started, retrieval_ms, llm_ms);
            }
        };
        self.telemetry.record(PipelineEvent::GenerationCompleted {
            duration_ms: llm_ms,
            timestamp: Instant::now(),
        });

        let mut result =
            PipelineResult::new(prompt::with_disclaimer(answer.trim()), context.sources());
        result.retrieval_time_ms = retrieval_ms;
        result.llm_time_ms = llm_ms;
        result.response_time_ms = elapsed_ms(started);

        self.response_cache
            .set(key, result.clone(), self.config.cache.response_ttl());
        info!(
            sources = result.documents_retrieved,
            retrieval_ms,
            llm_ms,
            response_time_ms = result.response_time_ms,
            "answer generated"
        );
        result
    }

    /// Degraded answer; never cached
    fn fallback(answer: &str, started: Instant, retrieval_ms: u64, llm_ms: u64) -> PipelineResult {
        let mut result = PipelineResult::new(prompt::with_disclaimer(answer), Vec::new());
        result.retrieval_time_ms = retrieval_ms;
        result.llm_time_ms = llm_ms;
        result.response_time_ms = elapsed_ms(started);
        result
    }

    /// Statistics for both cache tiers
    pub fn cache_stats(&self) -> PipelineCacheStats {
        PipelineCacheStats {
            retrieval: self.retrieval_cache.stats(),
            response: self.response_cache.stats(),
        }
    }

    /// Administrative reset of both cache tiers
    pub fn reset_caches(&self) {
        self.retrieval_cache.clear();
        self.response_cache.clear();
        info!("caches reset");
    }

    /// Drop expired entries from both tiers; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        self.retrieval_cache.purge_expired() + self.response_cache.purge_expired()
    }

    pub fn telemetry(&self) -> &PipelineTelemetry {
        &self.telemetry
    }

    /// Get current configuration
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Request pre-filled with the configured defaults
    pub fn request(&self, query: impl Into<String>) -> QueryRequest {
        QueryRequest::new(query)
            .with_top_k(self.config.retrieval.top_k)
            .with_min_relevance(self.config.retrieval.min_relevance)
            .with_sampling(
                self.config.generation.temperature,
                self.config.generation.max_tokens,
            )
    }
}
